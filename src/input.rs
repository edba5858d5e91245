use std::collections::HashMap;

use jigsaw_kit_core::game::angle_delta;

/// One frame of host input, already mapped into puzzle space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputSample {
    pub pointer: [f32; 3],
    pub primary_down: bool,
    /// Signed rotation request. Only the sign matters with gradual rotation.
    pub rotation_delta: f32,
    /// Pointer is over a UI widget; presses there never grab pieces.
    pub over_ui: bool,
    pub pause_pressed: bool,
}

impl InputSample {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            pointer: [x, y, 0.0],
            ..Self::default()
        }
    }

    pub fn pressed(mut self) -> Self {
        self.primary_down = true;
        self
    }

    pub fn rotating(mut self, delta: f32) -> Self {
        self.rotation_delta = delta;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEdge {
    Idle,
    Pressed,
    Held,
    Released,
}

/// Turns a level-triggered button into press/release edges.
#[derive(Clone, Copy, Debug, Default)]
pub struct ButtonTracker {
    down: bool,
}

impl ButtonTracker {
    pub fn update(&mut self, down: bool) -> ButtonEdge {
        let edge = match (self.down, down) {
            (false, true) => ButtonEdge::Pressed,
            (true, true) => ButtonEdge::Held,
            (true, false) => ButtonEdge::Released,
            (false, false) => ButtonEdge::Idle,
        };
        self.down = down;
        edge
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    pub fn clear(&mut self) {
        self.down = false;
    }
}

/// Active touches plus the angle of the line between the first two.
#[derive(Debug, Default)]
pub struct TouchTracker {
    touches: HashMap<i32, [f32; 2]>,
    last_angle: Option<f32>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i32, x: f32, y: f32) {
        self.touches.insert(id, [x, y]);
        self.last_angle = None;
    }

    pub fn update(&mut self, id: i32, x: f32, y: f32) {
        if let Some(point) = self.touches.get_mut(&id) {
            *point = [x, y];
        }
    }

    pub fn remove(&mut self, id: i32) {
        self.touches.remove(&id);
        self.last_angle = None;
    }

    pub fn clear(&mut self) {
        self.touches.clear();
        self.last_angle = None;
    }

    pub fn count(&self) -> usize {
        self.touches.len()
    }

    /// First touch by id, which drives the pointer.
    pub fn primary(&self) -> Option<[f32; 2]> {
        self.touches
            .iter()
            .min_by_key(|(id, _)| **id)
            .map(|(_, point)| *point)
    }

    /// Signed degrees the two-finger line turned since the last call.
    /// Zero unless exactly two touches are down.
    pub fn rotation_delta(&mut self) -> f32 {
        if self.touches.len() != 2 {
            self.last_angle = None;
            return 0.0;
        }
        let mut points: Vec<_> = self.touches.iter().collect();
        points.sort_by_key(|(id, _)| **id);
        let [ax, ay] = *points[0].1;
        let [bx, by] = *points[1].1;
        let angle = (by - ay).atan2(bx - ax).to_degrees();
        let delta = match self.last_angle {
            Some(last) => angle_delta(angle, last),
            None => 0.0,
        };
        self.last_angle = Some(angle);
        delta
    }
}
