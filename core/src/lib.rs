pub mod action;
pub mod codec;
pub mod decompose;
pub mod error;
pub mod game;
pub mod grid;
pub mod rules;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod timer;

pub use action::{DecomposeMode, TransitionEvent};
pub use codec::{decode, decode_text, encode, encode_text};
pub use decompose::{AreaSide, DecompositionArea};
pub use error::SessionError;
pub use grid::{Bounds, GeometryProvider, GridLayout, PieceGeometry, PieceList, Transform};
pub use rules::{AreaPair, DecompositionSettings, SessionRules};
pub use session::{LoadReport, PuzzleSession};
pub use snapshot::ProgressKeys;
pub use state::{Group, GroupId, Piece, PieceId, SessionState};
pub use store::{MemoryStore, ProgressStore, StoreError, StoreValue};
pub use timer::{Timer, TimerState, TimerTick};
