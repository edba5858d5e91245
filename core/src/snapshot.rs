use rkyv::{Archive, Deserialize, Serialize};

use crate::action::DecomposeMode;

pub const PLACED_RECORD_VERSION: u32 = 1;
pub const POSITIONS_RECORD_VERSION: u32 = 1;

pub const HINTS_SUFFIX: &str = "_hints";
pub const TIMER_SUFFIX: &str = "_timer";
pub const ELAPSED_SUFFIX: &str = "_elapsedTime";
pub const POSITIONS_SUFFIX: &str = "_Positions";
pub const COLS_SUFFIX: &str = "_X";
pub const ROWS_SUFFIX: &str = "_Y";

/// Store keys owned by one puzzle name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressKeys {
    name: String,
}

impl ProgressKeys {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placed-piece record. Doubles as the "has a save" marker.
    pub fn placed(&self) -> String {
        self.name.clone()
    }

    pub fn hints(&self) -> String {
        format!("{}{HINTS_SUFFIX}", self.name)
    }

    pub fn timer(&self) -> String {
        format!("{}{TIMER_SUFFIX}", self.name)
    }

    pub fn elapsed(&self) -> String {
        format!("{}{ELAPSED_SUFFIX}", self.name)
    }

    pub fn positions(&self) -> String {
        format!("{}{POSITIONS_SUFFIX}", self.name)
    }

    pub fn cols(&self) -> String {
        format!("{}{COLS_SUFFIX}", self.name)
    }

    pub fn rows(&self) -> String {
        format!("{}{ROWS_SUFFIX}", self.name)
    }

    pub fn all(&self) -> [String; 7] {
        [
            self.placed(),
            self.hints(),
            self.timer(),
            self.elapsed(),
            self.positions(),
            self.cols(),
            self.rows(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PlacedRecord {
    pub version: u32,
    pub piece_count: u32,
    pub placed: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct PieceRecord {
    pub pos: [f32; 3],
    pub rot_deg: f32,
    pub placed: bool,
    pub group: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PositionsRecord {
    pub version: u32,
    pub mode: DecomposeMode,
    pub nonce: u32,
    pub pieces: Vec<PieceRecord>,
}

impl PlacedRecord {
    pub fn matches(&self, piece_count: usize) -> bool {
        self.version == PLACED_RECORD_VERSION
            && self.piece_count as usize == piece_count
            && self.placed.iter().all(|&id| (id as usize) < piece_count)
    }
}

impl PositionsRecord {
    pub fn matches(&self, piece_count: usize) -> bool {
        self.version == POSITIONS_RECORD_VERSION && self.pieces.len() == piece_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_text, encode_text};

    #[test]
    fn keys_follow_name_suffixes() {
        let keys = ProgressKeys::new("Puzzle_cat_3x3");
        assert_eq!(keys.placed(), "Puzzle_cat_3x3");
        assert_eq!(keys.elapsed(), "Puzzle_cat_3x3_elapsedTime");
        assert_eq!(keys.positions(), "Puzzle_cat_3x3_Positions");
        assert_eq!(keys.rows(), "Puzzle_cat_3x3_Y");
    }

    #[test]
    fn stale_records_do_not_match() {
        let record = PlacedRecord {
            version: PLACED_RECORD_VERSION,
            piece_count: 4,
            placed: vec![0, 3],
        };
        let text = encode_text(&record).unwrap();
        let decoded: PlacedRecord = decode_text(&text).unwrap();
        assert!(decoded.matches(4));
        assert!(!decoded.matches(3));
        let old = PlacedRecord { version: 0, ..decoded };
        assert!(!old.matches(4));
    }
}
