use crate::game::{
    normalize_angle, rand_index, rand_range, rand_unit, SALT_AREA, SALT_POS_X, SALT_POS_Y,
    SALT_POS_Z, SALT_ROTATION, SALT_SWAP,
};
use crate::grid::Bounds;
use crate::rules::{AreaPair, DecompositionSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaSide {
    Left,
    Right,
    Top,
    Bottom,
    /// Fallback when no side is enabled: the puzzle footprint itself.
    Puzzle,
}

/// Axis-aligned region pieces are scattered into. `depth` is a half range
/// around each piece's home z and is zero outside of 3D mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecompositionArea {
    pub side: AreaSide,
    pub bounds: Bounds,
    pub depth: f32,
}

impl DecompositionArea {
    pub fn contains(&self, pos: [f32; 3], home_z: f32) -> bool {
        self.bounds.contains([pos[0], pos[1]]) && (pos[2] - home_z).abs() <= self.depth + 1e-6
    }
}

/// Lay out the enabled areas around `puzzle`. Auto offsets keep the widest
/// piece clear of the puzzle edge. Y grows downwards, so top is min y.
pub fn decomposition_areas(
    puzzle: Bounds,
    widest_half: [f32; 2],
    settings: &DecompositionSettings,
    fully_in_3d: bool,
) -> Vec<DecompositionArea> {
    let mut areas = Vec::new();
    let center = puzzle.center();

    let horizontal = &settings.horizontal;
    if horizontal.any_enabled() {
        let (gap, shift) = area_offsets(horizontal, widest_half[0]);
        let [width, height, depth] = sanitize_size(horizontal.size);
        let min_y = center[1] + shift - height * 0.5;
        let max_y = center[1] + shift + height * 0.5;
        let depth = if fully_in_3d { depth * 0.5 } else { 0.0 };
        if horizontal.first {
            let max_x = puzzle.min[0] - gap;
            areas.push(DecompositionArea {
                side: AreaSide::Left,
                bounds: Bounds::new([max_x - width, min_y], [max_x, max_y]),
                depth,
            });
        }
        if horizontal.second {
            let min_x = puzzle.max[0] + gap;
            areas.push(DecompositionArea {
                side: AreaSide::Right,
                bounds: Bounds::new([min_x, min_y], [min_x + width, max_y]),
                depth,
            });
        }
    }

    let vertical = &settings.vertical;
    if vertical.any_enabled() {
        let (gap, shift) = area_offsets(vertical, widest_half[1]);
        let [width, height, depth] = sanitize_size(vertical.size);
        let min_x = center[0] + shift - width * 0.5;
        let max_x = center[0] + shift + width * 0.5;
        let depth = if fully_in_3d { depth * 0.5 } else { 0.0 };
        if vertical.first {
            let max_y = puzzle.min[1] - gap;
            areas.push(DecompositionArea {
                side: AreaSide::Top,
                bounds: Bounds::new([min_x, max_y - height], [max_x, max_y]),
                depth,
            });
        }
        if vertical.second {
            let min_y = puzzle.max[1] + gap;
            areas.push(DecompositionArea {
                side: AreaSide::Bottom,
                bounds: Bounds::new([min_x, min_y], [max_x, min_y + height]),
                depth,
            });
        }
    }

    if areas.is_empty() {
        areas.push(DecompositionArea {
            side: AreaSide::Puzzle,
            bounds: puzzle,
            depth: 0.0,
        });
    }
    areas
}

fn area_offsets(pair: &AreaPair, widest_half: f32) -> (f32, f32) {
    if pair.auto_offset {
        (widest_half.max(0.0), 0.0)
    } else {
        let gap = if pair.offset[0].is_finite() { pair.offset[0] } else { 0.0 };
        let shift = if pair.offset[1].is_finite() { pair.offset[1] } else { 0.0 };
        (gap, shift)
    }
}

fn sanitize_size(size: [f32; 3]) -> [f32; 3] {
    size.map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
}

/// Pick an area and a point inside it for each piece in `ids`.
pub fn scatter_positions(
    seed: u32,
    ids: &[usize],
    home_z: &[f32],
    areas: &[DecompositionArea],
) -> Vec<(usize, DecompositionArea, [f32; 3])> {
    let mut placed = Vec::with_capacity(ids.len());
    if areas.is_empty() {
        return placed;
    }
    for (slot, &id) in ids.iter().enumerate() {
        let salt = id as u32;
        let area = areas[rand_index(seed, SALT_AREA.wrapping_add(salt), areas.len())];
        let x = rand_range(seed, SALT_POS_X.wrapping_add(salt << 4), area.bounds.min[0], area.bounds.max[0]);
        let y = rand_range(seed, SALT_POS_Y.wrapping_add(salt << 4), area.bounds.min[1], area.bounds.max[1]);
        let base_z = home_z.get(slot).copied().unwrap_or(0.0);
        let z = if area.depth > 0.0 {
            rand_range(seed, SALT_POS_Z.wrapping_add(salt << 4), base_z - area.depth, base_z + area.depth)
        } else {
            base_z
        };
        placed.push((id, area, [x, y, z]));
    }
    placed
}

/// Single-cycle permutation of `ids` (Sattolo). With two or more ids no
/// element maps to itself, so every swapped piece leaves its own slot.
pub fn swap_cycle(seed: u32, ids: &[usize]) -> Vec<usize> {
    let mut order = ids.to_vec();
    for i in (1..order.len()).rev() {
        let j = rand_index(seed, SALT_SWAP.wrapping_add(i as u32), i);
        order.swap(i, j);
    }
    order
}

pub fn random_rotation(seed: u32, id: usize, gradual: bool, step: f32) -> f32 {
    let salt = SALT_ROTATION.wrapping_add(id as u32);
    if gradual && step > 0.0 {
        let steps = (360.0 / step).floor().max(1.0) as usize;
        let index = rand_index(seed, salt, steps);
        normalize_angle(index as f32 * step)
    } else {
        normalize_angle(rand_unit(seed, salt) * 360.0)
    }
}
