use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::action::{DecomposeMode, TransitionEvent};
use crate::codec::{decode_text, encode_text};
use crate::decompose::{random_rotation, scatter_positions, swap_cycle, DecompositionArea};
use crate::error::SessionError;
use crate::game::{angle_matches, distance_2d, name_seed, normalize_angle, rotate_vec, scramble_seed, PUZZLE_SEED};
use crate::grid::{Bounds, GeometryProvider, PieceList, Transform};
use crate::rules::{SessionRules, DRAG_TILT_LIMIT_DEG};
use crate::snapshot::{
    PieceRecord, PlacedRecord, PositionsRecord, ProgressKeys, PLACED_RECORD_VERSION,
    POSITIONS_RECORD_VERSION,
};
use crate::state::{Group, GroupId, Piece, PieceId, SessionState};
use crate::store::{ProgressStore, StoreError};
use crate::timer::Timer;

#[derive(Clone, Debug)]
struct Hold {
    primary: PieceId,
    members: Vec<PieceId>,
    /// Member position minus primary position.
    offsets: Vec<[f32; 2]>,
    /// Primary position minus pointer at grab time.
    grab_offset: [f32; 2],
    start: Vec<Transform>,
    /// Member depth minus pointer depth at grab time, used with `fully_in_3d`.
    depth: Vec<f32>,
    /// Member depth to settle at on release.
    release_z: Vec<f32>,
    last_pointer: [f32; 3],
    last_x: f32,
}

/// What `load` found in the store. Misses and failures both fall back to
/// rule defaults; failures are worth surfacing to the player.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub restored_positions: bool,
    pub misses: Vec<String>,
    pub failures: Vec<(String, StoreError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn miss(&mut self, key: String) {
        info!(key = %key, "no saved value, using default");
        self.misses.push(key);
    }

    fn fail(&mut self, key: String, err: StoreError) {
        warn!(key = %key, error = %err, "saved value unreadable, using default");
        self.failures.push((key, err));
    }
}

pub struct PuzzleSession {
    name: String,
    rules: SessionRules,
    seed: u32,
    nonce: u32,
    mode: DecomposeMode,
    pieces: Vec<Piece>,
    groups: Vec<Group>,
    next_group: GroupId,
    /// Draw order, last entry on top.
    z_order: Vec<PieceId>,
    hold: Option<Hold>,
    state: SessionState,
    timer: Timer,
    remaining_hints: i32,
    puzzle_bounds: Option<Bounds>,
}

impl PuzzleSession {
    pub fn new(name: impl Into<String>, rules: SessionRules) -> Self {
        let name = name.into();
        let seed = PUZZLE_SEED ^ name_seed(&name);
        Self {
            name,
            rules: rules.sanitized(),
            seed,
            nonce: 0,
            mode: DecomposeMode::default(),
            pieces: Vec::new(),
            groups: Vec::new(),
            next_group: 0,
            z_order: Vec::new(),
            hold: None,
            state: SessionState::Decomposed,
            timer: Timer::new(),
            remaining_hints: rules.hint_limit,
            puzzle_bounds: None,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> ProgressKeys {
        ProgressKeys::new(self.name.clone())
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> DecomposeMode {
        self.mode
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn z_order(&self) -> &[PieceId] {
        &self.z_order
    }

    pub fn held(&self) -> Option<&[PieceId]> {
        self.hold.as_ref().map(|hold| hold.members.as_slice())
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_some()
    }

    pub fn is_prepared(&self) -> bool {
        !self.pieces.is_empty()
    }

    pub fn pieces_left(&self) -> usize {
        self.pieces.iter().filter(|piece| !piece.placed).count()
    }

    pub fn remaining_hints(&self) -> i32 {
        self.remaining_hints
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn puzzle_bounds(&self) -> Option<Bounds> {
        self.puzzle_bounds
    }

    pub fn prepare<G>(&mut self, piece_count: usize, layout: &G) -> Result<(), SessionError>
    where
        G: GeometryProvider + ?Sized,
    {
        if piece_count == 0 {
            return Err(SessionError::invalid_layout("piece count must be positive"));
        }
        let available = layout.piece_count();
        if available < piece_count {
            return Err(SessionError::invalid_layout(format!(
                "layout supplies {available} of {piece_count} pieces"
            )));
        }
        let mut geometry_list = PieceList {
            pieces: Vec::with_capacity(piece_count),
        };
        for id in 0..piece_count {
            let Some(geometry) = layout.piece(id) else {
                return Err(SessionError::invalid_layout(format!(
                    "no geometry for piece {id}"
                )));
            };
            let [half_w, half_h] = geometry.half_size;
            let extents_ok =
                half_w.is_finite() && half_h.is_finite() && half_w > 0.0 && half_h > 0.0;
            if !extents_ok || !geometry.home.is_finite() {
                return Err(SessionError::invalid_layout(format!(
                    "piece {id} has degenerate geometry"
                )));
            }
            geometry_list.pieces.push(geometry);
        }
        let bounds = geometry_list.puzzle_bounds();
        let pieces: Vec<Piece> = geometry_list
            .pieces
            .iter()
            .enumerate()
            .map(|(id, geometry)| Piece::at_home(id, geometry.home, geometry.half_size))
            .collect();

        self.z_order = (0..pieces.len()).collect();
        self.pieces = pieces;
        self.groups.clear();
        self.next_group = 0;
        self.hold = None;
        self.state = SessionState::Decomposed;
        self.puzzle_bounds = bounds;
        self.remaining_hints = self.rules.hint_limit;
        self.timer.start(self.rules.time_limit);
        info!(name = %self.name, pieces = piece_count, "puzzle prepared");
        Ok(())
    }

    /// Areas unplaced pieces scatter into, derived from the puzzle footprint.
    pub fn decomposition_areas(&self) -> Vec<DecompositionArea> {
        let Some(puzzle) = self.puzzle_bounds else {
            return Vec::new();
        };
        crate::decompose::decomposition_areas(
            puzzle,
            self.widest_half(),
            &self.rules.decomposition,
            self.rules.fully_in_3d,
        )
    }

    fn widest_half(&self) -> [f32; 2] {
        self.pieces.iter().fold([0.0f32, 0.0f32], |acc, piece| {
            [acc[0].max(piece.half_size[0]), acc[1].max(piece.half_size[1])]
        })
    }

    pub fn decompose(&mut self, mode: DecomposeMode) -> Result<(), SessionError> {
        if !self.is_prepared() {
            return Err(SessionError::MissingCollaborator("layout"));
        }
        self.hold = None;
        self.dissolve_groups();

        let seed = scramble_seed(self.seed, self.nonce, self.pieces.len());
        let ids: Vec<PieceId> = self
            .pieces
            .iter()
            .filter(|piece| !piece.placed)
            .map(|piece| piece.id)
            .collect();

        match mode {
            DecomposeMode::Scatter => {
                let areas = self.decomposition_areas();
                let home_z: Vec<f32> = ids.iter().map(|&id| self.pieces[id].home.pos[2]).collect();
                for (id, _, pos) in scatter_positions(seed, &ids, &home_z, &areas) {
                    self.pieces[id].current.pos = pos;
                }
            }
            DecomposeMode::Swap => {
                let order = swap_cycle(seed, &ids);
                for (&id, &slot) in ids.iter().zip(&order) {
                    let pos = self.pieces[slot].home.pos;
                    self.pieces[id].current.pos = pos;
                }
            }
            DecomposeMode::RotationOnly => {}
        }

        let rotate = mode == DecomposeMode::RotationOnly || self.rules.randomize_rotation;
        for &id in &ids {
            let piece = &mut self.pieces[id];
            piece.current.rot_deg = if rotate {
                random_rotation(seed, id, self.rules.gradual_rotation, self.rules.rotation_step)
            } else {
                piece.home.rot_deg
            };
            piece.tilt = 0.0;
        }

        self.mode = mode;
        self.state = if self.invariant_holds() {
            SessionState::Assembled
        } else if self.pieces_left() < self.pieces.len() {
            SessionState::InProgress
        } else {
            SessionState::Decomposed
        };
        debug!(name = %self.name, ?mode, moved = ids.len(), nonce = self.nonce, "decomposed");
        Ok(())
    }

    /// Scramble the unplaced pieces again with the last mode.
    pub fn shuffle(&mut self) -> Result<(), SessionError> {
        self.nonce = self.nonce.wrapping_add(1);
        self.decompose(self.mode)
    }

    pub fn drag_start(&mut self, pointer: [f32; 3]) -> Option<PieceId> {
        if self.hold.is_some() || self.state == SessionState::Assembled {
            return None;
        }
        if !pointer.iter().all(|v| v.is_finite()) {
            return None;
        }
        let id = self.piece_at([pointer[0], pointer[1]], &[])?;
        let members = self.members_of(id);
        let origin = self.pieces[id].current.pos;
        let offsets = members
            .iter()
            .map(|&member| {
                let pos = self.pieces[member].current.pos;
                [pos[0] - origin[0], pos[1] - origin[1]]
            })
            .collect();
        let start: Vec<Transform> =
            members.iter().map(|&member| self.pieces[member].current).collect();
        let depth = start.iter().map(|t| t.pos[2] - pointer[2]).collect();
        let release_z = members
            .iter()
            .zip(&start)
            .map(|(&member, t)| {
                if self.rules.fully_in_3d {
                    t.pos[2]
                } else {
                    self.pieces[member].home.pos[2]
                }
            })
            .collect();
        self.bring_to_front(&members);
        self.hold = Some(Hold {
            primary: id,
            members,
            offsets,
            grab_offset: [origin[0] - pointer[0], origin[1] - pointer[1]],
            start,
            depth,
            release_z,
            last_pointer: pointer,
            last_x: origin[0],
        });
        self.state = SessionState::InProgress;
        debug!(piece = id, "drag start");
        Some(id)
    }

    pub fn drag_update(&mut self, pointer: [f32; 3], rotation_delta: f32) {
        let Some(mut hold) = self.hold.take() else {
            return;
        };
        if !pointer.iter().all(|v| v.is_finite()) {
            self.hold = Some(hold);
            return;
        }

        let rotation = self.rotation_for(rotation_delta);
        if rotation != 0.0 {
            for offset in &mut hold.offsets {
                let (x, y) = rotate_vec(offset[0], offset[1], rotation);
                *offset = [x, y];
            }
            for &member in &hold.members {
                let current = &mut self.pieces[member].current;
                current.rot_deg = normalize_angle(current.rot_deg + rotation);
            }
        }

        let primary = &self.pieces[hold.primary];
        let lift = self.rules.drag_offset_y * primary.half_size[1] * 2.0;
        let width = (primary.half_size[0] * 2.0).max(f32::EPSILON);
        let anchor = [pointer[0], pointer[1] + lift];
        let origin = if self.rules.center_dragged_piece || hold.members.len() > 1 {
            let count = hold.offsets.len() as f32;
            let (sum_x, sum_y) = hold
                .offsets
                .iter()
                .fold((0.0, 0.0), |(x, y), offset| (x + offset[0], y + offset[1]));
            [anchor[0] - sum_x / count, anchor[1] - sum_y / count]
        } else {
            [anchor[0] + hold.grab_offset[0], anchor[1] + hold.grab_offset[1]]
        };

        let target_tilt = ((origin[0] - hold.last_x) / width * DRAG_TILT_LIMIT_DEG)
            .clamp(-DRAG_TILT_LIMIT_DEG, DRAG_TILT_LIMIT_DEG);
        let tilt_speed = self.rules.drag_tilt_speed;
        let lift_z = self.rules.drag_offset_z;
        let fully_in_3d = self.rules.fully_in_3d;
        for (i, (&member, offset)) in hold.members.iter().zip(&hold.offsets).enumerate() {
            let piece = &mut self.pieces[member];
            let rest_z = if fully_in_3d {
                pointer[2] + hold.depth[i]
            } else {
                piece.home.pos[2]
            };
            piece.current.pos = [origin[0] + offset[0], origin[1] + offset[1], rest_z - lift_z];
            piece.tilt += (target_tilt - piece.tilt) * tilt_speed;
            hold.release_z[i] = rest_z;
        }
        hold.last_x = origin[0];
        hold.last_pointer = pointer;
        self.hold = Some(hold);
    }

    fn rotation_enabled(&self) -> bool {
        self.rules.randomize_rotation || self.mode == DecomposeMode::RotationOnly
    }

    fn rotation_for(&self, delta: f32) -> f32 {
        if !self.rotation_enabled() || !delta.is_finite() || delta == 0.0 {
            return 0.0;
        }
        if self.rules.gradual_rotation {
            self.rules.rotation_step * delta.signum()
        } else {
            delta * self.rules.rotation_speed
        }
    }

    pub fn drag_end(&mut self) -> TransitionEvent {
        let Some(hold) = self.hold.take() else {
            return TransitionEvent::None;
        };
        for (&member, &z) in hold.members.iter().zip(&hold.release_z) {
            let piece = &mut self.pieces[member];
            piece.current.pos[2] = z;
            piece.tilt = 0.0;
        }

        let event = if hold.members.iter().any(|&member| self.is_near_home(member)) {
            self.snap_home(&hold.members);
            TransitionEvent::ReturnPiece
        } else if self.mode == DecomposeMode::Swap {
            self.swap_under(&hold);
            TransitionEvent::DropPiece
        } else {
            if self.rules.groups_active() {
                self.try_group(&hold.members);
            }
            TransitionEvent::DropPiece
        };
        debug!(piece = hold.primary, ?event, "drag end");
        self.finish_move(event)
    }

    /// Put the held pieces back where they were grabbed, without judging the drop.
    pub fn cancel_drag(&mut self) -> bool {
        let Some(hold) = self.hold.take() else {
            return false;
        };
        for (&member, start) in hold.members.iter().zip(&hold.start) {
            let piece = &mut self.pieces[member];
            piece.current = *start;
            piece.tilt = 0.0;
        }
        debug!(piece = hold.primary, "drag cancelled");
        true
    }

    /// Snap one piece (and its group) home, or the lowest unplaced piece.
    pub fn return_piece(&mut self, target: Option<PieceId>) -> TransitionEvent {
        if self.hold.is_some() || self.state == SessionState::Assembled {
            return TransitionEvent::None;
        }
        let id = match target {
            Some(id) => id,
            None => match self.pieces.iter().find(|piece| !piece.placed) {
                Some(piece) => piece.id,
                None => return TransitionEvent::None,
            },
        };
        let Some(piece) = self.pieces.get(id) else {
            return TransitionEvent::None;
        };
        if piece.placed {
            return TransitionEvent::None;
        }
        let members = self.members_of(id);
        self.snap_home(&members);
        self.finish_move(TransitionEvent::ReturnPiece)
    }

    /// Spend a hint on the lowest unplaced piece. Negative limits are unlimited.
    pub fn use_hint(&mut self) -> TransitionEvent {
        if self.remaining_hints == 0 {
            return TransitionEvent::None;
        }
        let event = self.return_piece(None);
        if !event.is_none() && self.remaining_hints > 0 {
            self.remaining_hints -= 1;
        }
        event
    }

    /// Back to a fresh scramble. Hints and timer come from the rules.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if !self.is_prepared() {
            return Err(SessionError::MissingCollaborator("layout"));
        }
        self.hold = None;
        self.groups.clear();
        for piece in &mut self.pieces {
            piece.current = piece.home;
            piece.placed = false;
            piece.group = None;
            piece.tilt = 0.0;
        }
        self.z_order = (0..self.pieces.len()).collect();
        self.remaining_hints = self.rules.hint_limit;
        self.timer.start(self.rules.time_limit);
        self.nonce = self.nonce.wrapping_add(1);
        self.decompose(self.mode)?;
        info!(name = %self.name, "puzzle reset");
        Ok(())
    }

    pub fn save<S>(&self, store: &mut S) -> Result<(), SessionError>
    where
        S: ProgressStore + ?Sized,
    {
        if !self.is_prepared() {
            return Err(SessionError::MissingCollaborator("layout"));
        }
        let keys = self.keys();
        let timer = self.timer.state();
        store.set_int(&keys.hints(), self.remaining_hints)?;
        store.set_float(&keys.timer(), timer.remaining)?;
        store.set_float(&keys.elapsed(), timer.elapsed)?;

        let placed = PlacedRecord {
            version: PLACED_RECORD_VERSION,
            piece_count: self.pieces.len() as u32,
            placed: self
                .pieces
                .iter()
                .filter(|piece| piece.placed)
                .map(|piece| piece.id as u32)
                .collect(),
        };
        let text = encode_text(&placed).ok_or_else(|| StoreError::Encode { key: keys.placed() })?;
        store.set_string(&keys.placed(), &text)?;

        if self.rules.enable_position_saving {
            let record = self.positions_record();
            let text =
                encode_text(&record).ok_or_else(|| StoreError::Encode { key: keys.positions() })?;
            store.set_string(&keys.positions(), &text)?;
        }
        debug!(name = %self.name, placed = placed.placed.len(), "progress saved");
        Ok(())
    }

    fn positions_record(&self) -> PositionsRecord {
        let pieces = self
            .pieces
            .iter()
            .map(|piece| {
                let transform = self.rest_transform(piece.id);
                PieceRecord {
                    pos: transform.pos,
                    rot_deg: transform.rot_deg,
                    placed: piece.placed,
                    group: piece.group.map(|group| group as u32),
                }
            })
            .collect();
        PositionsRecord {
            version: POSITIONS_RECORD_VERSION,
            mode: self.mode,
            nonce: self.nonce,
            pieces,
        }
    }

    /// Where a piece lies when nothing is held; held pieces report their drag start.
    fn rest_transform(&self, id: PieceId) -> Transform {
        if let Some(hold) = &self.hold {
            if let Some(index) = hold.members.iter().position(|&member| member == id) {
                return hold.start[index];
            }
        }
        self.pieces[id].current
    }

    /// Restore progress. Anything missing or unreadable falls back to the
    /// rule defaults; the caller decomposes when positions were not restored.
    pub fn load<S>(&mut self, store: &S) -> Result<LoadReport, SessionError>
    where
        S: ProgressStore + ?Sized,
    {
        if !self.is_prepared() {
            return Err(SessionError::MissingCollaborator("layout"));
        }
        self.hold = None;
        let keys = self.keys();
        let mut report = LoadReport::default();

        let hints_key = keys.hints();
        self.remaining_hints = match store.try_int(&hints_key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                report.miss(hints_key);
                self.rules.hint_limit
            }
            Err(err) => {
                report.fail(hints_key, err);
                self.rules.hint_limit
            }
        };
        let remaining = read_float(store, keys.timer(), self.rules.time_limit.max(0.0), &mut report);
        let elapsed = read_float(store, keys.elapsed(), 0.0, &mut report);
        self.timer.restore(self.rules.time_limit, remaining, elapsed);

        let count = self.pieces.len();
        if self.rules.enable_position_saving {
            let key = keys.positions();
            if let Some(text) = read_text(store, key.clone(), &mut report) {
                match decode_text::<PositionsRecord>(&text) {
                    Some(record) if record.matches(count) => {
                        self.apply_positions(&record);
                        report.restored_positions = true;
                    }
                    Some(_) => report.miss(key),
                    None => report.fail(key.clone(), StoreError::Decode { key }),
                }
            }
        }
        if !report.restored_positions {
            let key = keys.placed();
            if let Some(text) = read_text(store, key.clone(), &mut report) {
                match decode_text::<PlacedRecord>(&text) {
                    Some(record) if record.matches(count) => self.apply_placed(&record),
                    Some(_) => report.miss(key),
                    None => report.fail(key.clone(), StoreError::Decode { key }),
                }
            }
        }

        self.state = if self.invariant_holds() {
            self.timer.stop();
            SessionState::Assembled
        } else if self.pieces_left() < count {
            SessionState::InProgress
        } else {
            SessionState::Decomposed
        };
        info!(
            name = %self.name,
            state = ?self.state,
            restored_positions = report.restored_positions,
            failures = report.failures.len(),
            "progress loaded"
        );
        Ok(report)
    }

    fn apply_positions(&mut self, record: &PositionsRecord) {
        let mut members: BTreeMap<u32, Vec<PieceId>> = BTreeMap::new();
        for (piece, saved) in self.pieces.iter_mut().zip(&record.pieces) {
            piece.tilt = 0.0;
            piece.group = None;
            piece.placed = saved.placed;
            if saved.placed {
                piece.current = piece.home;
                continue;
            }
            piece.current = Transform::new(saved.pos[0], saved.pos[1], saved.pos[2], saved.rot_deg);
            if let Some(group) = saved.group {
                members.entry(group).or_default().push(piece.id);
            }
        }
        self.groups.clear();
        self.next_group = 0;
        for members in members.into_values().filter(|members| members.len() > 1) {
            self.push_group(members);
        }
        self.z_order = (0..self.pieces.len()).collect();
        self.mode = record.mode;
        self.nonce = record.nonce;
    }

    fn apply_placed(&mut self, record: &PlacedRecord) {
        self.groups.clear();
        for piece in &mut self.pieces {
            piece.group = None;
            piece.tilt = 0.0;
            if record.placed.contains(&(piece.id as u32)) {
                piece.snap_home();
            } else {
                piece.placed = false;
            }
        }
    }

    /// Remove every key this puzzle owns.
    pub fn clear_saved<S>(&self, store: &mut S) -> Result<(), SessionError>
    where
        S: ProgressStore + ?Sized,
    {
        for key in self.keys().all() {
            store.delete(&key)?;
        }
        info!(name = %self.name, "saved progress cleared");
        Ok(())
    }

    fn piece_at(&self, point: [f32; 2], exclude: &[PieceId]) -> Option<PieceId> {
        self.z_order.iter().rev().copied().find(|&id| {
            let piece = &self.pieces[id];
            !piece.placed && !exclude.contains(&id) && piece.current.contains(piece.half_size, point)
        })
    }

    fn bring_to_front(&mut self, members: &[PieceId]) {
        self.z_order.retain(|id| !members.contains(id));
        self.z_order.extend_from_slice(members);
    }

    fn members_of(&self, id: PieceId) -> Vec<PieceId> {
        self.groups
            .iter()
            .find(|group| group.contains(id))
            .map(|group| group.members.clone())
            .unwrap_or_else(|| vec![id])
    }

    fn is_near_home(&self, id: PieceId) -> bool {
        let piece = &self.pieces[id];
        let [cx, cy, cz] = piece.current.pos;
        let [hx, hy, hz] = piece.home.pos;
        let mut dist_sq = (cx - hx) * (cx - hx) + (cy - hy) * (cy - hy);
        if self.rules.fully_in_3d {
            dist_sq += (cz - hz) * (cz - hz);
        }
        let limit = self.rules.allowed_distance;
        dist_sq <= limit * limit
            && angle_matches(piece.current.rot_deg, piece.home.rot_deg, self.rules.allowed_rotation)
    }

    fn snap_home(&mut self, members: &[PieceId]) {
        for &member in members {
            self.pieces[member].snap_home();
        }
        self.groups
            .retain(|group| !group.members.iter().any(|id| members.contains(id)));
    }

    /// Swap the held piece with whatever unplaced piece lies under the release point.
    fn swap_under(&mut self, hold: &Hold) {
        let point = [hold.last_pointer[0], hold.last_pointer[1]];
        let Some(other) = self.piece_at(point, &hold.members) else {
            return;
        };
        let slot = self.pieces[other].current.pos;
        let start = hold.start[0].pos;
        self.pieces[other].current.pos = start;
        self.pieces[hold.primary].current.pos = slot;
        for id in [hold.primary, other] {
            if self.is_near_home(id) {
                self.pieces[id].snap_home();
            }
        }
        debug!(held = hold.primary, other, "swapped");
    }

    /// Attach the held pieces to the nearest unplaced piece they line up with.
    fn try_group(&mut self, members: &[PieceId]) -> bool {
        let tolerance = self.rules.grouping_distance;
        let mut best: Option<(f32, PieceId)> = None;
        for &member in members {
            let held = &self.pieces[member];
            for other in &self.pieces {
                if other.placed || members.contains(&other.id) {
                    continue;
                }
                let expected = expected_position(held.home, other.home, other.current);
                let dist = distance_2d(held.current.pos, expected.pos);
                let aligned = angle_matches(
                    held.current.rot_deg - held.home.rot_deg,
                    other.current.rot_deg - other.home.rot_deg,
                    self.rules.allowed_rotation,
                );
                if dist <= tolerance && aligned && best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, other.id));
                }
            }
        }
        let Some((_, anchor)) = best else {
            return false;
        };

        let anchor_home = self.pieces[anchor].home;
        let anchor_current = self.pieces[anchor].current;
        for &member in members {
            let home = self.pieces[member].home;
            self.pieces[member].current = expected_position(home, anchor_home, anchor_current);
        }

        let mut merged: Vec<PieceId> = members.to_vec();
        merged.extend(self.members_of(anchor));
        let absorbed: Vec<GroupId> = merged.iter().filter_map(|&id| self.pieces[id].group).collect();
        self.groups.retain(|group| !absorbed.contains(&group.id));
        merged.sort_unstable();
        merged.dedup();
        let size = merged.len();
        let id = self.push_group(merged);
        debug!(group = id, size, anchor, "pieces grouped");
        true
    }

    fn push_group(&mut self, members: Vec<PieceId>) -> GroupId {
        let id = self.next_group;
        self.next_group += 1;
        for &member in &members {
            self.pieces[member].group = Some(id);
        }
        self.groups.push(Group { id, members });
        id
    }

    fn dissolve_groups(&mut self) {
        self.groups.clear();
        for piece in &mut self.pieces {
            piece.group = None;
        }
    }

    fn invariant_holds(&self) -> bool {
        if self.pieces.is_empty() {
            return false;
        }
        let total = self.pieces.len();
        self.pieces.iter().all(|piece| piece.placed)
            || (self.rules.assembles_anywhere()
                && self.groups.iter().any(|group| group.members.len() == total))
    }

    fn finish_move(&mut self, event: TransitionEvent) -> TransitionEvent {
        if self.invariant_holds() {
            if self.state != SessionState::Assembled {
                self.timer.stop();
                info!(name = %self.name, "puzzle assembled");
            }
            self.state = SessionState::Assembled;
            return TransitionEvent::PuzzleAssembled;
        }
        self.state = SessionState::InProgress;
        event
    }
}

/// Where `home` belongs when its neighbour sits at `anchor_current`.
fn expected_position(home: Transform, anchor_home: Transform, anchor_current: Transform) -> Transform {
    let turn = anchor_current.rot_deg - anchor_home.rot_deg;
    let (dx, dy) = rotate_vec(
        home.pos[0] - anchor_home.pos[0],
        home.pos[1] - anchor_home.pos[1],
        turn,
    );
    Transform {
        pos: [
            anchor_current.pos[0] + dx,
            anchor_current.pos[1] + dy,
            anchor_current.pos[2] + (home.pos[2] - anchor_home.pos[2]),
        ],
        rot_deg: normalize_angle(home.rot_deg + turn),
    }
}

fn read_float<S>(store: &S, key: String, default: f32, report: &mut LoadReport) -> f32
where
    S: ProgressStore + ?Sized,
{
    match store.try_float(&key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            report.miss(key);
            default
        }
        Err(err) => {
            report.fail(key, err);
            default
        }
    }
}

fn read_text<S>(store: &S, key: String, report: &mut LoadReport) -> Option<String>
where
    S: ProgressStore + ?Sized,
{
    match store.try_string(&key) {
        Ok(Some(text)) => Some(text),
        Ok(None) => {
            report.miss(key);
            None
        }
        Err(err) => {
            report.fail(key, err);
            None
        }
    }
}
