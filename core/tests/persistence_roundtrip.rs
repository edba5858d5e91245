use jigsaw_kit_core::snapshot::{PositionsRecord, POSITIONS_RECORD_VERSION};
use jigsaw_kit_core::{
    encode_text, DecomposeMode, GridLayout, MemoryStore, ProgressKeys, ProgressStore,
    PuzzleSession, SessionRules, SessionState, StoreError, StoreValue, TransitionEvent,
};

const NAME: &str = "Puzzle_roundtrip_3x3";

fn rules() -> SessionRules {
    SessionRules {
        time_limit: 120.0,
        hint_limit: 5,
        randomize_rotation: true,
        ..SessionRules::default()
    }
}

fn fresh(rules: SessionRules) -> PuzzleSession {
    let mut session = PuzzleSession::new(NAME, rules);
    session.prepare(9, &GridLayout::new(3, 3, 1.0, 1.0)).unwrap();
    session
}

fn played(rules: SessionRules) -> PuzzleSession {
    let mut session = fresh(rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    assert_eq!(session.use_hint(), TransitionEvent::ReturnPiece);
    assert_eq!(session.return_piece(Some(5)), TransitionEvent::ReturnPiece);
    session.timer_mut().tick(12.75);
    session
}

/// Store whose reads always fail, as a broken backend would.
struct BrokenStore;

impl ProgressStore for BrokenStore {
    fn has(&self, _key: &str) -> bool {
        true
    }

    fn get(&self, _key: &str) -> Result<Option<StoreValue>, StoreError> {
        Err(StoreError::Unavailable("disk gone".to_string()))
    }

    fn set(&mut self, _key: &str, _value: StoreValue) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".to_string()))
    }

    fn delete(&mut self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

#[test]
fn save_then_load_reproduces_progress() {
    let original = played(rules());
    let mut store = MemoryStore::new();
    original.save(&mut store).unwrap();

    let mut restored = fresh(rules());
    let report = restored.load(&store).unwrap();
    assert!(report.is_clean());
    assert!(report.restored_positions);
    assert!(report.misses.is_empty());

    assert_eq!(restored.remaining_hints(), original.remaining_hints());
    assert_eq!(restored.timer().state(), original.timer().state());
    assert_eq!(restored.state(), SessionState::InProgress);
    assert_eq!(restored.mode(), original.mode());
    for (a, b) in original.pieces().iter().zip(restored.pieces()) {
        assert_eq!(a.placed, b.placed);
        for axis in 0..3 {
            assert!((a.current.pos[axis] - b.current.pos[axis]).abs() <= 1e-4);
        }
        assert!((a.current.rot_deg - b.current.rot_deg).abs() <= 1e-4);
    }
}

#[test]
fn placed_record_survives_without_position_saving() {
    let rules = SessionRules {
        enable_position_saving: false,
        ..rules()
    };
    let original = played(rules);
    let mut store = MemoryStore::new();
    original.save(&mut store).unwrap();
    assert!(!store.has(&ProgressKeys::new(NAME).positions()));

    let mut restored = fresh(rules);
    let report = restored.load(&store).unwrap();
    assert!(!report.restored_positions);
    restored.decompose(DecomposeMode::Scatter).unwrap();
    for (a, b) in original.pieces().iter().zip(restored.pieces()) {
        assert_eq!(a.placed, b.placed);
        if b.placed {
            assert_eq!(b.current, b.home);
        }
    }
    assert_eq!(restored.pieces_left(), 7);
}

#[test]
fn empty_store_is_a_miss_with_defaults() {
    let store = MemoryStore::new();
    let mut session = fresh(rules());
    let report = session.load(&store).unwrap();
    assert!(report.is_clean());
    assert!(!report.restored_positions);
    let keys = ProgressKeys::new(NAME);
    assert!(report.misses.contains(&keys.hints()));
    assert!(report.misses.contains(&keys.timer()));
    assert_eq!(session.remaining_hints(), 5);
    assert_eq!(session.timer().state().remaining, 120.0);
    assert_eq!(session.state(), SessionState::Decomposed);
}

#[test]
fn read_failures_fall_back_to_defaults() {
    let mut session = fresh(rules());
    let report = session.load(&BrokenStore).unwrap();
    assert!(!report.is_clean());
    assert!(report.failures.len() >= 4);
    assert_eq!(session.remaining_hints(), 5);
    assert_eq!(session.timer().state().remaining, 120.0);

    let mut store = MemoryStore::new();
    let keys = ProgressKeys::new(NAME);
    store.set_string(&keys.hints(), "three").unwrap();
    store.set_string(&keys.positions(), "not base64 at all!").unwrap();
    let report = session.load(&store).unwrap();
    assert!(report
        .failures
        .iter()
        .any(|(key, err)| key == &keys.hints() && matches!(err, StoreError::TypeMismatch { .. })));
    assert!(report
        .failures
        .iter()
        .any(|(key, err)| key == &keys.positions() && matches!(err, StoreError::Decode { .. })));
    assert_eq!(session.remaining_hints(), 5);
}

#[test]
fn save_errors_propagate() {
    let session = played(rules());
    assert!(session.save(&mut BrokenStore).is_err());
}

#[test]
fn stale_or_mismatched_records_are_misses() {
    let keys = ProgressKeys::new(NAME);
    let mut store = MemoryStore::new();
    let stale = PositionsRecord {
        version: POSITIONS_RECORD_VERSION + 1,
        mode: DecomposeMode::Scatter,
        nonce: 0,
        pieces: Vec::new(),
    };
    store
        .set_string(&keys.positions(), &encode_text(&stale).unwrap())
        .unwrap();
    let mut session = fresh(rules());
    let report = session.load(&store).unwrap();
    assert!(report.is_clean());
    assert!(!report.restored_positions);
    assert!(report.misses.contains(&keys.positions()));

    // same name, different grid size
    let mut store = MemoryStore::new();
    played(rules()).save(&mut store).unwrap();
    let mut smaller = PuzzleSession::new(NAME, rules());
    smaller.prepare(4, &GridLayout::new(2, 2, 1.0, 1.0)).unwrap();
    let report = smaller.load(&store).unwrap();
    assert!(!report.restored_positions);
    assert!(report.misses.contains(&keys.positions()));
    assert!(report.misses.contains(&keys.placed()));
    assert_eq!(smaller.pieces_left(), 4);
}

#[test]
fn groups_come_back_after_reload() {
    let rules = SessionRules {
        enable_groups: true,
        randomize_rotation: false,
        ..rules()
    };
    let mut session = fresh(rules);
    assert_eq!(session.drag_start([1.0, 1.0, 0.0]), Some(4));
    session.drag_update([20.0, 20.0, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    assert_eq!(session.drag_start([2.0, 1.0, 0.0]), Some(5));
    session.drag_update([21.05, 20.0, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    assert_eq!(session.groups().len(), 1);

    let mut store = MemoryStore::new();
    session.save(&mut store).unwrap();
    let mut restored = fresh(rules);
    restored.load(&store).unwrap();
    assert_eq!(restored.groups().len(), 1);
    assert_eq!(restored.groups()[0].members, vec![4, 5]);
    assert_eq!(restored.piece(5).unwrap().group, restored.piece(4).unwrap().group);
}

#[test]
fn assembled_progress_reloads_as_assembled() {
    let mut session = fresh(rules());
    session.decompose(DecomposeMode::Scatter).unwrap();
    while session.return_piece(None) == TransitionEvent::ReturnPiece {}
    let mut store = MemoryStore::new();
    session.save(&mut store).unwrap();

    let mut restored = fresh(rules());
    restored.load(&store).unwrap();
    assert_eq!(restored.state(), SessionState::Assembled);
    assert!(!restored.timer().is_running());
}

#[test]
fn clear_saved_removes_every_key() {
    let mut store = MemoryStore::new();
    let session = played(rules());
    session.save(&mut store).unwrap();
    store.set_int(&ProgressKeys::new(NAME).cols(), 3).unwrap();
    store.set_int("MusicPlayer", 1).unwrap();
    session.clear_saved(&mut store).unwrap();
    assert_eq!(store.keys(), vec!["MusicPlayer".to_string()]);
}
