use rkyv::{Archive, Deserialize, Serialize};

/// Outcome of a drag or hint operation, consumed by the side-effect sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionEvent {
    None,
    DragPiece,
    ReturnPiece,
    DropPiece,
    PuzzleAssembled,
}

impl TransitionEvent {
    pub fn is_none(self) -> bool {
        self == TransitionEvent::None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[repr(u8)]
pub enum DecomposeMode {
    /// Scatter pieces across the decomposition areas.
    #[default]
    Scatter,
    /// Shuffle home positions among pieces without leaving the puzzle area.
    Swap,
    /// Keep every piece in place and only randomise rotation.
    RotationOnly,
}
