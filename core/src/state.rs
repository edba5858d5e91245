use crate::grid::Transform;

pub type PieceId = usize;
pub type GroupId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Decomposed,
    InProgress,
    Assembled,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Piece {
    pub id: PieceId,
    pub home: Transform,
    pub current: Transform,
    pub half_size: [f32; 2],
    pub placed: bool,
    pub group: Option<GroupId>,
    /// Visual tilt while dragged, in degrees. Zero at rest.
    pub tilt: f32,
}

impl Piece {
    pub fn at_home(id: PieceId, home: Transform, half_size: [f32; 2]) -> Self {
        Self {
            id,
            home,
            current: home,
            half_size,
            placed: false,
            group: None,
            tilt: 0.0,
        }
    }

    pub fn snap_home(&mut self) {
        self.current = self.home;
        self.placed = true;
        self.group = None;
        self.tilt = 0.0;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<PieceId>,
}

impl Group {
    pub fn contains(&self, piece: PieceId) -> bool {
        self.members.contains(&piece)
    }
}
