#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimerState {
    pub remaining: f32,
    pub elapsed: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimerTick {
    pub state: TimerState,
    /// Set on the single tick that ran the countdown out.
    pub expired: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerPhase {
    Idle,
    Running,
    Paused,
    Stopped,
    Expired,
}

/// Level countdown. A limit of zero or less means untimed: the countdown
/// never runs out but elapsed play time is still tracked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timer {
    limit: f32,
    remaining: f32,
    elapsed: f32,
    phase: TimerPhase,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            limit: 0.0,
            remaining: 0.0,
            elapsed: 0.0,
            phase: TimerPhase::Idle,
        }
    }

    pub fn start(&mut self, limit: f32) {
        self.limit = if limit.is_finite() && limit > 0.0 { limit } else { 0.0 };
        self.remaining = self.limit;
        self.elapsed = 0.0;
        self.phase = TimerPhase::Running;
    }

    /// Resume from persisted values. `remaining` is clamped to the limit.
    pub fn restore(&mut self, limit: f32, remaining: f32, elapsed: f32) {
        self.start(limit);
        if self.is_timed() {
            let remaining = if remaining.is_finite() { remaining } else { self.limit };
            self.remaining = remaining.clamp(0.0, self.limit);
            self.elapsed = self.limit - self.remaining;
            if self.remaining <= 0.0 {
                self.phase = TimerPhase::Expired;
            }
        } else if elapsed.is_finite() {
            self.elapsed = elapsed.max(0.0);
        }
    }

    pub fn tick(&mut self, delta: f32) -> TimerTick {
        let mut expired = false;
        if self.phase == TimerPhase::Running && delta.is_finite() && delta > 0.0 {
            if self.is_timed() {
                if delta >= self.remaining {
                    self.remaining = 0.0;
                    self.elapsed = self.limit;
                    self.phase = TimerPhase::Expired;
                    expired = true;
                } else {
                    self.remaining -= delta;
                    self.elapsed = self.limit - self.remaining;
                }
            } else {
                self.elapsed += delta;
            }
        }
        TimerTick {
            state: self.state(),
            expired,
        }
    }

    pub fn pause(&mut self) {
        if self.phase == TimerPhase::Running {
            self.phase = TimerPhase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.phase == TimerPhase::Paused {
            self.phase = TimerPhase::Running;
        }
    }

    /// Freeze for good, e.g. once the puzzle is finished.
    pub fn stop(&mut self) {
        if matches!(self.phase, TimerPhase::Running | TimerPhase::Paused) {
            self.phase = TimerPhase::Stopped;
        }
    }

    /// Re-arm with the current limit and start counting again.
    pub fn reset(&mut self) {
        let limit = self.limit;
        self.start(limit);
    }

    pub fn state(&self) -> TimerState {
        TimerState {
            remaining: self.remaining,
            elapsed: self.elapsed,
        }
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn is_timed(&self) -> bool {
        self.limit > 0.0
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.phase == TimerPhase::Paused
    }

    pub fn has_expired(&self) -> bool {
        self.phase == TimerPhase::Expired
    }
}
