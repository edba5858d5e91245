use crate::game::{normalize_angle, rotate_vec};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub pos: [f32; 3],
    pub rot_deg: f32,
}

impl Transform {
    pub fn new(x: f32, y: f32, z: f32, rot_deg: f32) -> Self {
        Self {
            pos: [x, y, z],
            rot_deg: normalize_angle(rot_deg),
        }
    }

    pub fn at(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.pos.iter().all(|v| v.is_finite()) && self.rot_deg.is_finite()
    }

    /// Whether the point lies inside a rectangle of `half_size` centred on this transform.
    pub fn contains(&self, half_size: [f32; 2], point: [f32; 2]) -> bool {
        let dx = point[0] - self.pos[0];
        let dy = point[1] - self.pos[1];
        let (lx, ly) = rotate_vec(dx, dy, -self.rot_deg);
        lx.abs() <= half_size[0] && ly.abs() <= half_size[1]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Bounds {
    pub fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> [f32; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    pub fn contains(&self, point: [f32; 2]) -> bool {
        point[0] >= self.min[0]
            && point[0] <= self.max[0]
            && point[1] >= self.min[1]
            && point[1] <= self.max[1]
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PieceGeometry {
    pub home: Transform,
    pub half_size: [f32; 2],
}

impl PieceGeometry {
    pub fn bounds(&self) -> Bounds {
        let [x, y, _] = self.home.pos;
        Bounds::new(
            [x - self.half_size[0], y - self.half_size[1]],
            [x + self.half_size[0], y + self.half_size[1]],
        )
    }
}

/// Source of piece home transforms and hit-test extents, e.g. an image slicer.
pub trait GeometryProvider {
    fn piece_count(&self) -> usize;
    fn piece(&self, id: usize) -> Option<PieceGeometry>;

    fn puzzle_bounds(&self) -> Option<Bounds> {
        (0..self.piece_count())
            .filter_map(|id| self.piece(id))
            .map(|piece| piece.bounds())
            .reduce(|acc, next| acc.union(&next))
    }
}

/// Rectangular cols x rows layout with the top-left piece centred at `origin`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub piece_width: f32,
    pub piece_height: f32,
    pub origin: [f32; 2],
}

impl GridLayout {
    pub fn new(cols: u32, rows: u32, piece_width: f32, piece_height: f32) -> Self {
        Self {
            cols,
            rows,
            piece_width,
            piece_height,
            origin: [0.0, 0.0],
        }
    }

    pub fn total(&self) -> usize {
        (self.cols as usize) * (self.rows as usize)
    }

    pub fn home_of(&self, id: usize) -> Transform {
        let cols = self.cols.max(1) as usize;
        let col = (id % cols) as f32;
        let row = (id / cols) as f32;
        Transform::at(
            self.origin[0] + col * self.piece_width,
            self.origin[1] + row * self.piece_height,
        )
    }
}

impl GeometryProvider for GridLayout {
    fn piece_count(&self) -> usize {
        self.total()
    }

    fn piece(&self, id: usize) -> Option<PieceGeometry> {
        if id >= self.total() {
            return None;
        }
        Some(PieceGeometry {
            home: self.home_of(id),
            half_size: [self.piece_width * 0.5, self.piece_height * 0.5],
        })
    }
}

/// Explicit per-piece geometry list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PieceList {
    pub pieces: Vec<PieceGeometry>,
}

impl GeometryProvider for PieceList {
    fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    fn piece(&self, id: usize) -> Option<PieceGeometry> {
        self.pieces.get(id).copied()
    }
}
