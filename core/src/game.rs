pub const PUZZLE_SEED: u32 = 0x5EED_2520;

pub const ROTATION_STEP_DEG: f32 = 90.0;

pub const SALT_AREA: u32 = 0xA5EA_0000;
pub const SALT_POS_X: u32 = 0x0000_1000;
pub const SALT_POS_Y: u32 = 0x0000_2000;
pub const SALT_POS_Z: u32 = 0x0000_3000;
pub const SALT_ROTATION: u32 = 0xC001_0000;
pub const SALT_SWAP: u32 = 0xC0DE_0000;

pub fn splitmix32(mut value: u32) -> u32 {
    value = value.wrapping_add(0x9E37_79B9);
    let mut z = value;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}

/// Uniform value in `[0, 1)` derived from `seed` and `salt`.
pub fn rand_unit(seed: u32, salt: u32) -> f32 {
    let mixed = splitmix32(seed ^ splitmix32(salt));
    let top = mixed >> 8;
    top as f32 / ((1u32 << 24) as f32)
}

pub fn rand_range(seed: u32, salt: u32, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    let value = min + (max - min) * rand_unit(seed, salt);
    // f32 rounding can land exactly on max for wide ranges
    value.min(max)
}

pub fn rand_index(seed: u32, salt: u32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((rand_unit(seed, salt) * len as f32) as usize).min(len - 1)
}

pub fn scramble_seed(base: u32, nonce: u32, total: usize) -> u32 {
    base ^ nonce.wrapping_mul(0x9E37_79B9) ^ (total as u32).rotate_left(16) ^ 0x5CA7_7EED
}

/// FNV-1a over the puzzle name so each puzzle scrambles differently.
pub fn name_seed(name: &str) -> u32 {
    name.bytes()
        .fold(0x811C_9DC5u32, |hash, byte| (hash ^ byte as u32).wrapping_mul(0x0100_0193))
}

pub fn normalize_angle(mut angle: f32) -> f32 {
    angle %= 360.0;
    if angle < 0.0 {
        angle += 360.0;
    }
    if angle >= 360.0 {
        angle -= 360.0;
    }
    angle
}

pub fn angle_delta(target: f32, current: f32) -> f32 {
    let mut diff = normalize_angle(target - current);
    if diff > 180.0 {
        diff -= 360.0;
    }
    diff
}

pub fn angle_matches(a: f32, b: f32, tolerance: f32) -> bool {
    angle_delta(a, b).abs() <= tolerance
}

pub fn rotate_vec(x: f32, y: f32, angle_deg: f32) -> (f32, f32) {
    let theta = angle_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

pub fn distance_2d(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}
