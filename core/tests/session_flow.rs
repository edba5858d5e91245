use jigsaw_kit_core::game::{angle_delta, normalize_angle, rotate_vec};
use jigsaw_kit_core::{
    AreaPair, DecomposeMode, DecompositionSettings, PieceGeometry, PieceId, PieceList,
    PuzzleSession, SessionRules, SessionState, Transform, TransitionEvent,
};

const HALF: f32 = 0.25;

fn build_layout(cols: usize, rows: usize) -> PieceList {
    let mut pieces = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            pieces.push(PieceGeometry {
                home: Transform::at(col as f32, row as f32),
                half_size: [HALF, HALF],
            });
        }
    }
    PieceList { pieces }
}

fn wide_rules() -> SessionRules {
    let mut horizontal = AreaPair::both();
    horizontal.size = [8.0, 12.0, 2.0];
    SessionRules {
        decomposition: DecompositionSettings {
            horizontal,
            vertical: AreaPair::disabled(),
        },
        ..SessionRules::default()
    }
}

fn build_session(cols: usize, rows: usize, rules: SessionRules) -> PuzzleSession {
    let layout = build_layout(cols, rows);
    let mut session = PuzzleSession::new(format!("Puzzle_flow_{cols}x{rows}"), rules);
    session.prepare(cols * rows, &layout).unwrap();
    session
}

/// A point on `id` that no unplaced piece above it covers.
fn grab_point(session: &PuzzleSession, id: PieceId) -> [f32; 3] {
    let piece = session.piece(id).unwrap();
    let order = session.z_order();
    let rank = order.iter().position(|&other| other == id).unwrap();
    let above: Vec<_> = order[rank + 1..]
        .iter()
        .map(|&other| session.piece(other).unwrap())
        .filter(|other| !other.placed)
        .collect();
    let [hw, hh] = piece.half_size;
    for [fx, fy] in [[0.0, 0.0], [0.8, 0.8], [-0.8, 0.8], [0.8, -0.8], [-0.8, -0.8]] {
        let (dx, dy) = rotate_vec(fx * hw, fy * hh, piece.current.rot_deg);
        let point = [piece.current.pos[0] + dx, piece.current.pos[1] + dy];
        if !above
            .iter()
            .any(|other| other.current.contains(other.half_size, point))
        {
            return [point[0], point[1], 0.0];
        }
    }
    panic!("piece {id} is fully covered");
}

fn drag_to(session: &mut PuzzleSession, id: PieceId, target: [f32; 2]) -> TransitionEvent {
    let pointer = grab_point(session, id);
    assert_eq!(session.drag_start(pointer), Some(id));
    let current = session.piece(id).unwrap().current.pos;
    let next = [
        pointer[0] + target[0] - current[0],
        pointer[1] + target[1] - current[1],
        0.0,
    ];
    session.drag_update(next, 0.0);
    session.drag_end()
}

fn assert_invariant(session: &PuzzleSession) {
    let all_placed = session.pieces().iter().all(|piece| piece.placed);
    let covering_group = session
        .groups()
        .iter()
        .any(|group| group.members.len() == session.pieces().len());
    let assembled = session.state() == SessionState::Assembled;
    if all_placed {
        assert!(assembled);
    }
    if assembled {
        assert!(all_placed || (session.rules().assembles_anywhere() && covering_group));
    }
}

#[test]
fn nine_piece_puzzle_assembles_piece_by_piece() {
    let mut session = build_session(3, 3, wide_rules());
    session.decompose(DecomposeMode::Scatter).unwrap();
    assert_eq!(session.state(), SessionState::Decomposed);

    let home = session.piece(0).unwrap().home.pos;
    let event = drag_to(&mut session, 0, [home[0] + 0.03, home[1] + 0.04]);
    assert_eq!(event, TransitionEvent::ReturnPiece);
    assert!(session.piece(0).unwrap().placed);
    assert_eq!(session.piece(0).unwrap().current, session.piece(0).unwrap().home);
    assert_eq!(session.state(), SessionState::InProgress);
    assert_eq!(session.pieces_left(), 8);

    for id in 1..9 {
        let home = session.piece(id).unwrap().home.pos;
        let event = drag_to(&mut session, id, [home[0], home[1]]);
        assert_invariant(&session);
        if id < 8 {
            assert_eq!(event, TransitionEvent::ReturnPiece);
            assert_eq!(session.state(), SessionState::InProgress);
        } else {
            assert_eq!(event, TransitionEvent::PuzzleAssembled);
        }
    }
    assert_eq!(session.state(), SessionState::Assembled);
    assert!(session.timer().state().elapsed >= 0.0);
    assert_eq!(session.drag_start([0.0, 0.0, 0.0]), None);
}

#[test]
fn placement_boundary_is_inclusive() {
    let rules = SessionRules {
        center_dragged_piece: true,
        ..wide_rules()
    };
    let limit = rules.allowed_distance;

    let mut session = build_session(3, 3, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    session.drag_update([limit, 0.0, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
    assert!(session.piece(0).unwrap().placed);

    let mut session = build_session(3, 3, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    session.drag_update([limit + 1e-4, 0.0, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    assert!(!session.piece(0).unwrap().placed);
}

#[test]
fn drag_end_twice_is_a_no_op() {
    let mut session = build_session(3, 3, wide_rules());
    session.decompose(DecomposeMode::Scatter).unwrap();
    assert_eq!(drag_to(&mut session, 4, [-20.0, 0.0]), TransitionEvent::DropPiece);
    let pieces = session.pieces().to_vec();
    let state = session.state();
    assert_eq!(session.drag_end(), TransitionEvent::None);
    assert_eq!(session.pieces(), &pieces[..]);
    assert_eq!(session.state(), state);
}

#[test]
fn scattered_pieces_stay_inside_their_areas() {
    for fully_in_3d in [false, true] {
        for seed in 0..8 {
            let rules = SessionRules {
                fully_in_3d,
                ..wide_rules()
            };
            let layout = build_layout(4, 3);
            let mut session = PuzzleSession::new("Puzzle_areas_4x3", rules).with_seed(seed);
            session.prepare(12, &layout).unwrap();
            session.decompose(DecomposeMode::Scatter).unwrap();
            let areas = session.decomposition_areas();
            assert_eq!(areas.len(), 2);
            for piece in session.pieces() {
                let home_z = piece.home.pos[2];
                assert!(
                    areas.iter().any(|area| area.contains(piece.current.pos, home_z)),
                    "piece {} at {:?} outside every area",
                    piece.id,
                    piece.current.pos
                );
            }
        }
    }
}

#[test]
fn decompose_only_moves_unplaced_pieces() {
    let mut session = build_session(3, 3, wide_rules());
    session.decompose(DecomposeMode::Scatter).unwrap();
    assert_eq!(session.return_piece(Some(4)), TransitionEvent::ReturnPiece);
    session.shuffle().unwrap();
    let piece = session.piece(4).unwrap();
    assert!(piece.placed);
    assert_eq!(piece.current, piece.home);
    assert_eq!(session.state(), SessionState::InProgress);
}

#[test]
fn hints_return_lowest_unplaced_piece() {
    let rules = SessionRules {
        hint_limit: 3,
        ..wide_rules()
    };
    let mut session = build_session(2, 2, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    assert_eq!(session.use_hint(), TransitionEvent::ReturnPiece);
    assert!(session.piece(0).unwrap().placed);
    assert_eq!(session.use_hint(), TransitionEvent::ReturnPiece);
    assert_eq!(session.use_hint(), TransitionEvent::ReturnPiece);
    assert_eq!(session.remaining_hints(), 0);
    assert_eq!(session.use_hint(), TransitionEvent::None);
    assert_eq!(session.pieces_left(), 1);
    assert_invariant(&session);
    assert_eq!(session.return_piece(None), TransitionEvent::PuzzleAssembled);
    assert_invariant(&session);
}

#[test]
fn grouped_pieces_move_and_place_together() {
    let rules = SessionRules {
        enable_groups: true,
        ..wide_rules()
    };
    let mut session = build_session(3, 3, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();

    let anchor = session.piece(0).unwrap().current.pos;
    let event = drag_to(&mut session, 1, [anchor[0] + 1.05, anchor[1] - 0.05]);
    assert_eq!(event, TransitionEvent::DropPiece);
    assert_eq!(session.groups().len(), 1);
    assert_eq!(session.groups()[0].members, vec![0, 1]);
    let joined = session.piece(1).unwrap().current.pos;
    assert!((joined[0] - (anchor[0] + 1.0)).abs() < 1e-5);
    assert!((joined[1] - anchor[1]).abs() < 1e-5);

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    assert_eq!(session.held().map(|held| held.len()), Some(2));
    // groups are centred on the pointer
    session.drag_update([0.5, 0.0, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
    assert!(session.piece(0).unwrap().placed);
    assert!(session.piece(1).unwrap().placed);
    assert!(session.groups().is_empty());
    assert_eq!(session.pieces_left(), 7);
}

#[test]
fn any_place_assembly_needs_a_covering_group() {
    let rules = SessionRules {
        enable_groups: true,
        assemble_in_any_place: true,
        ..wide_rules()
    };
    let mut session = build_session(2, 1, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let anchor = session.piece(0).unwrap().current.pos;
    let event = drag_to(&mut session, 1, [anchor[0] + 1.0, anchor[1]]);
    assert_eq!(event, TransitionEvent::PuzzleAssembled);
    assert_eq!(session.state(), SessionState::Assembled);
    assert!(session.pieces().iter().all(|piece| !piece.placed));
    assert_invariant(&session);

    let rules = SessionRules {
        enable_groups: false,
        assemble_in_any_place: true,
        ..wide_rules()
    };
    let mut session = build_session(2, 1, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let anchor = session.piece(0).unwrap().current.pos;
    let event = drag_to(&mut session, 1, [anchor[0] + 1.0, anchor[1]]);
    assert_eq!(event, TransitionEvent::DropPiece);
    assert!(session.groups().is_empty());
    assert_eq!(session.state(), SessionState::InProgress);
}

#[test]
fn swap_mode_exchanges_slots_without_grouping() {
    let rules = SessionRules {
        enable_groups: true,
        ..wide_rules()
    };
    let mut session = build_session(3, 3, rules);
    session.decompose(DecomposeMode::Swap).unwrap();

    let homes: Vec<[f32; 3]> = session.pieces().iter().map(|piece| piece.home.pos).collect();
    for piece in session.pieces() {
        assert!(homes.contains(&piece.current.pos));
        assert_ne!(piece.current.pos, piece.home.pos);
    }

    let start = session.piece(0).unwrap().current.pos;
    let home = session.piece(0).unwrap().home.pos;
    let other = session
        .pieces()
        .iter()
        .find(|piece| piece.id != 0 && piece.current.pos != home)
        .map(|piece| piece.id)
        .unwrap();
    let slot = session.piece(other).unwrap().current.pos;

    let event = drag_to(&mut session, 0, [slot[0], slot[1]]);
    assert_eq!(event, TransitionEvent::DropPiece);
    assert_eq!(session.piece(0).unwrap().current.pos, slot);
    assert_eq!(session.piece(other).unwrap().current.pos, start);
    assert!(session.groups().is_empty());
}

#[test]
fn rotation_only_keeps_positions() {
    let rules = SessionRules {
        gradual_rotation: true,
        ..wide_rules()
    };
    let mut session = build_session(3, 3, rules);
    session.decompose(DecomposeMode::RotationOnly).unwrap();
    for piece in session.pieces() {
        assert_eq!(piece.current.pos, piece.home.pos);
        assert_eq!(piece.current.rot_deg % 90.0, 0.0);
    }
}

#[test]
fn reset_returns_to_decomposed_from_assembled() {
    let mut session = build_session(2, 2, wide_rules());
    session.decompose(DecomposeMode::Scatter).unwrap();
    while session.return_piece(None) == TransitionEvent::ReturnPiece {}
    assert_eq!(session.state(), SessionState::Assembled);
    session.reset().unwrap();
    assert_eq!(session.state(), SessionState::Decomposed);
    assert_eq!(session.pieces_left(), 4);
    assert!(session.timer().is_running());
}

#[test]
fn depth_counts_toward_placement_in_3d() {
    let rules = SessionRules {
        fully_in_3d: true,
        ..wide_rules()
    };
    let mut session = build_session(2, 2, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let home = session.piece(0).unwrap().home.pos;

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    let start = session.piece(0).unwrap().current.pos;
    let to_home = [
        pointer[0] + home[0] - start[0],
        pointer[1] + home[1] - start[1],
        pointer[2] + home[2] - start[2],
    ];
    session.drag_update([to_home[0], to_home[1], to_home[2] + 1.0], 0.0);
    let lifted = session.piece(0).unwrap().current.pos[2];
    assert!((lifted - (home[2] + 1.0 - rules.drag_offset_z)).abs() < 1e-5);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    let piece = session.piece(0).unwrap();
    assert!(!piece.placed);
    assert!((piece.current.pos[2] - (home[2] + 1.0)).abs() < 1e-5);

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    let start = session.piece(0).unwrap().current.pos;
    session.drag_update(
        [
            pointer[0] + home[0] - start[0],
            pointer[1] + home[1] - start[1],
            pointer[2] + home[2] - start[2],
        ],
        0.0,
    );
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
    assert!(session.piece(0).unwrap().placed);
}

#[test]
fn flat_drop_ignores_scattered_depth() {
    let rules = SessionRules {
        center_dragged_piece: true,
        ..wide_rules()
    };
    let mut session = build_session(2, 2, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let home = session.piece(0).unwrap().home.pos;
    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    session.drag_update([home[0], home[1], 7.0], 0.0);
    assert_eq!(session.piece(0).unwrap().current.pos[2], home[2] - rules.drag_offset_z);
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
}

#[test]
fn drag_offset_lifts_the_piece_above_the_pointer() {
    let rules = SessionRules {
        center_dragged_piece: true,
        drag_offset_y: 0.5,
        ..wide_rules()
    };
    let lift = rules.drag_offset_y * HALF * 2.0;
    let mut session = build_session(2, 2, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    session.drag_update([5.0, 5.0, 0.0], 0.0);
    let pos = session.piece(0).unwrap().current.pos;
    assert_eq!([pos[0], pos[1]], [5.0, 5.0 + lift]);

    let home = session.piece(0).unwrap().home.pos;
    session.drag_update([home[0], home[1], 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    session.drag_update([home[0], home[1] - lift, 0.0], 0.0);
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
}

#[test]
fn free_rotation_scales_by_speed_and_respects_tolerance() {
    let rules = SessionRules {
        center_dragged_piece: true,
        randomize_rotation: true,
        gradual_rotation: false,
        ..wide_rules()
    };
    let speed = rules.rotation_speed;
    let tolerance = rules.allowed_rotation;
    let mut session = build_session(2, 2, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();
    let home = session.piece(0).unwrap().home;

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    let before = session.piece(0).unwrap().current.rot_deg;
    session.drag_update(pointer, 0.5);
    let after = session.piece(0).unwrap().current.rot_deg;
    assert!(angle_delta(after, normalize_angle(before + 0.5 * speed)).abs() < 1e-3);

    let off = normalize_angle(home.rot_deg + tolerance * 2.0);
    let turn = angle_delta(off, after) / speed;
    session.drag_update([home.pos[0], home.pos[1], 0.0], turn);
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    let piece = session.piece(0).unwrap();
    assert!(!piece.placed);
    assert!(angle_delta(piece.current.rot_deg, off).abs() < 1e-3);

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    let within = normalize_angle(home.rot_deg + tolerance * 0.8);
    let turn = angle_delta(within, session.piece(0).unwrap().current.rot_deg) / speed;
    session.drag_update([home.pos[0], home.pos[1], 0.0], turn);
    assert_eq!(session.drag_end(), TransitionEvent::ReturnPiece);
    assert_eq!(session.piece(0).unwrap().current, home);
}

#[test]
fn groups_turn_together_around_the_grabbed_piece() {
    let rules = SessionRules {
        enable_groups: true,
        randomize_rotation: true,
        gradual_rotation: true,
        ..wide_rules()
    };
    let step = rules.rotation_step;
    let mut session = build_session(3, 1, rules);
    session.decompose(DecomposeMode::Scatter).unwrap();

    let anchor = session.piece(0).unwrap().current;
    let pointer = grab_point(&session, 1);
    assert_eq!(session.drag_start(pointer), Some(1));
    let spin = angle_delta(anchor.rot_deg, session.piece(1).unwrap().current.rot_deg);
    let steps = (spin / step).round() as i32;
    for _ in 0..steps.abs() {
        session.drag_update(pointer, steps.signum() as f32);
    }
    assert!(angle_delta(session.piece(1).unwrap().current.rot_deg, anchor.rot_deg).abs() < 1e-3);
    let start = session.piece(1).unwrap().current.pos;
    let (dx, dy) = rotate_vec(1.0, 0.0, anchor.rot_deg);
    session.drag_update(
        [
            pointer[0] + anchor.pos[0] + dx - start[0],
            pointer[1] + anchor.pos[1] + dy - start[1],
            0.0,
        ],
        0.0,
    );
    assert_eq!(session.drag_end(), TransitionEvent::DropPiece);
    assert_eq!(session.groups().len(), 1);

    let pointer = grab_point(&session, 0);
    assert_eq!(session.drag_start(pointer), Some(0));
    let first = session.piece(0).unwrap().current;
    let second = session.piece(1).unwrap().current;
    session.drag_update(pointer, 1.0);
    let turned_first = session.piece(0).unwrap().current;
    let turned_second = session.piece(1).unwrap().current;

    let (ex, ey) = rotate_vec(
        second.pos[0] - first.pos[0],
        second.pos[1] - first.pos[1],
        step,
    );
    assert!((turned_second.pos[0] - turned_first.pos[0] - ex).abs() < 1e-4);
    assert!((turned_second.pos[1] - turned_first.pos[1] - ey).abs() < 1e-4);
    assert_eq!(turned_first.rot_deg, normalize_angle(first.rot_deg + step));
    assert_eq!(turned_second.rot_deg, normalize_angle(second.rot_deg + step));
    // the pair is centred on the pointer
    let mid = [
        (turned_first.pos[0] + turned_second.pos[0]) * 0.5,
        (turned_first.pos[1] + turned_second.pos[1]) * 0.5,
    ];
    assert!((mid[0] - pointer[0]).abs() < 1e-4 && (mid[1] - pointer[1]).abs() < 1e-4);
}

#[test]
fn swapped_piece_landing_home_is_placed() {
    let mut session = build_session(3, 3, wide_rules());
    session.decompose(DecomposeMode::Swap).unwrap();

    let pieces = session.pieces().to_vec();
    let (held, displaced) = pieces
        .iter()
        .find_map(|held| {
            let owner = pieces
                .iter()
                .find(|other| other.home.pos == held.current.pos)?;
            (owner.current.pos != held.home.pos).then_some((held.id, owner.id))
        })
        .unwrap();
    let slot = session.piece(displaced).unwrap().current.pos;

    let event = drag_to(&mut session, held, [slot[0], slot[1]]);
    assert_eq!(event, TransitionEvent::DropPiece);
    let displaced = session.piece(displaced).unwrap();
    assert!(displaced.placed);
    assert_eq!(displaced.current, displaced.home);
    let held = session.piece(held).unwrap();
    assert!(!held.placed);
    assert_eq!(held.current.pos, slot);
    assert_eq!(session.pieces_left(), 8);
    assert_eq!(session.state(), SessionState::InProgress);
}
