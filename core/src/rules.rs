use serde::{Deserialize, Serialize};

use crate::game::ROTATION_STEP_DEG;

pub const ALLOWED_DISTANCE_DEFAULT: f32 = 0.1;
pub const ALLOWED_DISTANCE_MIN: f32 = 0.0;
pub const ALLOWED_DISTANCE_MAX: f32 = 10.0;

pub const ALLOWED_ROTATION_DEFAULT_DEG: f32 = 5.0;
pub const ALLOWED_ROTATION_MIN_DEG: f32 = 0.0;
pub const ALLOWED_ROTATION_MAX_DEG: f32 = 45.0;

pub const GROUPING_DISTANCE_DEFAULT: f32 = 0.1;

pub const ROTATION_SPEED_DEFAULT: f32 = 90.0;

pub const DRAG_OFFSET_Y_DEFAULT: f32 = 0.0;
pub const DRAG_OFFSET_Z_DEFAULT: f32 = 0.5;
pub const DRAG_TILT_SPEED_DEFAULT: f32 = 0.25;
pub const DRAG_TILT_LIMIT_DEG: f32 = 15.0;

pub const AREA_SIZE_DEFAULT: [f32; 3] = [2.0, 4.0, 0.0];
pub const AREA_OFFSET_DEFAULT: [f32; 2] = [0.5, 0.0];

pub const TIME_LIMIT_UNTIMED: f32 = 0.0;
pub const HINT_LIMIT_UNLIMITED: i32 = -1;

/// Placement of one pair of decomposition areas (left/right or top/bottom).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaPair {
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub second: bool,
    /// Width, height and depth of each area. Depth is only used in 3D.
    #[serde(default = "default_area_size")]
    pub size: [f32; 3],
    /// Derive the gap from the puzzle edge from the widest piece.
    #[serde(default = "default_true")]
    pub auto_offset: bool,
    /// Gap from the puzzle edge along the pair's axis, then shift across it.
    #[serde(default = "default_area_offset")]
    pub offset: [f32; 2],
}

impl AreaPair {
    pub fn disabled() -> Self {
        Self {
            first: false,
            second: false,
            size: AREA_SIZE_DEFAULT,
            auto_offset: true,
            offset: AREA_OFFSET_DEFAULT,
        }
    }

    pub fn both() -> Self {
        Self {
            first: true,
            second: true,
            ..Self::disabled()
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.first || self.second
    }
}

impl Default for AreaPair {
    fn default() -> Self {
        Self::disabled()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecompositionSettings {
    /// `first` is left, `second` is right.
    #[serde(default = "AreaPair::both")]
    pub horizontal: AreaPair,
    /// `first` is top, `second` is bottom.
    #[serde(default)]
    pub vertical: AreaPair,
}

impl Default for DecompositionSettings {
    fn default() -> Self {
        Self {
            horizontal: AreaPair::both(),
            vertical: AreaPair::disabled(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRules {
    #[serde(default = "default_allowed_distance")]
    pub allowed_distance: f32,
    #[serde(default = "default_allowed_rotation")]
    pub allowed_rotation: f32,
    #[serde(default = "default_grouping_distance")]
    pub grouping_distance: f32,
    #[serde(default)]
    pub enable_groups: bool,
    #[serde(default)]
    pub assemble_in_any_place: bool,
    #[serde(default = "default_true")]
    pub enable_position_saving: bool,
    #[serde(default)]
    pub fully_in_3d: bool,
    #[serde(default)]
    pub randomize_rotation: bool,
    #[serde(default)]
    pub gradual_rotation: bool,
    #[serde(default = "default_rotation_step")]
    pub rotation_step: f32,
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,
    #[serde(default)]
    pub drag_offset_y: f32,
    #[serde(default = "default_drag_offset_z")]
    pub drag_offset_z: f32,
    #[serde(default = "default_drag_tilt_speed")]
    pub drag_tilt_speed: f32,
    #[serde(default)]
    pub center_dragged_piece: bool,
    #[serde(default)]
    pub time_limit: f32,
    #[serde(default = "default_hint_limit")]
    pub hint_limit: i32,
    #[serde(default)]
    pub decomposition: DecompositionSettings,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            allowed_distance: ALLOWED_DISTANCE_DEFAULT,
            allowed_rotation: ALLOWED_ROTATION_DEFAULT_DEG,
            grouping_distance: GROUPING_DISTANCE_DEFAULT,
            enable_groups: false,
            assemble_in_any_place: false,
            enable_position_saving: true,
            fully_in_3d: false,
            randomize_rotation: false,
            gradual_rotation: false,
            rotation_step: ROTATION_STEP_DEG,
            rotation_speed: ROTATION_SPEED_DEFAULT,
            drag_offset_y: DRAG_OFFSET_Y_DEFAULT,
            drag_offset_z: DRAG_OFFSET_Z_DEFAULT,
            drag_tilt_speed: DRAG_TILT_SPEED_DEFAULT,
            center_dragged_piece: false,
            time_limit: TIME_LIMIT_UNTIMED,
            hint_limit: HINT_LIMIT_UNLIMITED,
            decomposition: DecompositionSettings::default(),
        }
    }
}

impl SessionRules {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<SessionRules>(raw).map(Self::sanitized)
    }

    /// Clamp tolerances into their supported ranges.
    pub fn sanitized(mut self) -> Self {
        self.allowed_distance = clamp_finite(
            self.allowed_distance,
            ALLOWED_DISTANCE_MIN,
            ALLOWED_DISTANCE_MAX,
            ALLOWED_DISTANCE_DEFAULT,
        );
        self.allowed_rotation = clamp_finite(
            self.allowed_rotation,
            ALLOWED_ROTATION_MIN_DEG,
            ALLOWED_ROTATION_MAX_DEG,
            ALLOWED_ROTATION_DEFAULT_DEG,
        );
        self.grouping_distance = clamp_finite(
            self.grouping_distance,
            ALLOWED_DISTANCE_MIN,
            ALLOWED_DISTANCE_MAX,
            GROUPING_DISTANCE_DEFAULT,
        );
        if !self.rotation_step.is_finite() || self.rotation_step <= 0.0 {
            self.rotation_step = ROTATION_STEP_DEG;
        }
        self.drag_tilt_speed = clamp_finite(self.drag_tilt_speed, 0.0, 1.0, DRAG_TILT_SPEED_DEFAULT);
        if !self.time_limit.is_finite() {
            self.time_limit = TIME_LIMIT_UNTIMED;
        }
        self
    }

    pub fn groups_active(&self) -> bool {
        self.enable_groups
    }

    pub fn assembles_anywhere(&self) -> bool {
        self.enable_groups && self.assemble_in_any_place
    }

    pub fn is_timed(&self) -> bool {
        self.time_limit > 0.0
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn default_true() -> bool {
    true
}

fn default_area_size() -> [f32; 3] {
    AREA_SIZE_DEFAULT
}

fn default_area_offset() -> [f32; 2] {
    AREA_OFFSET_DEFAULT
}

fn default_allowed_distance() -> f32 {
    ALLOWED_DISTANCE_DEFAULT
}

fn default_allowed_rotation() -> f32 {
    ALLOWED_ROTATION_DEFAULT_DEG
}

fn default_grouping_distance() -> f32 {
    GROUPING_DISTANCE_DEFAULT
}

fn default_rotation_step() -> f32 {
    ROTATION_STEP_DEG
}

fn default_rotation_speed() -> f32 {
    ROTATION_SPEED_DEFAULT
}

fn default_drag_offset_z() -> f32 {
    DRAG_OFFSET_Z_DEFAULT
}

fn default_drag_tilt_speed() -> f32 {
    DRAG_TILT_SPEED_DEFAULT
}

fn default_hint_limit() -> i32 {
    HINT_LIMIT_UNLIMITED
}
