use super::*;

use jigsaw_kit::InputSample;
use jigsaw_kit_core::game::{angle_delta, angle_matches};
use jigsaw_kit_core::{DecomposeMode, PieceId, TransitionEvent};
use rand::rngs::StdRng;

#[derive(clap::Args, Clone, Debug)]
pub(super) struct BotArgs {
    #[arg(long)]
    bot_seed: Option<u64>,
    #[arg(long, default_value_t = 60.0)]
    fps: f32,
    #[arg(long, default_value_t = 4)]
    think_min_frames: u32,
    #[arg(long, default_value_t = 20)]
    think_max_frames: u32,
    #[arg(long, default_value_t = 8)]
    drag_min_frames: u32,
    #[arg(long, default_value_t = 36)]
    drag_max_frames: u32,
    /// Chance to spend a hint instead of picking a piece.
    #[arg(long, default_value_t = 0.0)]
    hint_rate: f32,
    /// Release offset from the exact home, as a share of the allowed distance.
    #[arg(long, default_value_t = 0.5)]
    jitter: f32,
    #[arg(long, default_value_t = 500_000)]
    max_frames: u64,
}

impl Default for BotArgs {
    fn default() -> Self {
        Self {
            bot_seed: None,
            fps: 60.0,
            think_min_frames: 4,
            think_max_frames: 20,
            drag_min_frames: 8,
            drag_max_frames: 36,
            hint_rate: 0.0,
            jitter: 0.5,
            max_frames: 500_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Outcome {
    Assembled { frames: u64 },
    OutOfTime { frames: u64 },
    GaveUp { frames: u64 },
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Think {
        frames: u32,
    },
    Drag {
        piece: PieceId,
        from: [f32; 2],
        /// Held piece depth minus pointer depth at the grab.
        depth: f32,
        jitter: [f32; 2],
        frame: u32,
        total: u32,
    },
    Release {
        at: [f32; 3],
    },
}

/// Plays a puzzle through the controller the way a person would: pick a
/// free piece, carry it home over a few frames and let go.
pub(super) struct SolverBot {
    args: BotArgs,
    rng: StdRng,
    phase: Phase,
}

impl SolverBot {
    pub(super) fn new(args: BotArgs) -> Self {
        let rng = seeded_rng(args.bot_seed);
        Self {
            args,
            rng,
            phase: Phase::Think { frames: 0 },
        }
    }

    pub(super) fn solve(&mut self, controller: &mut SessionController) -> Outcome {
        let dt = 1.0 / self.args.fps.max(1.0);
        let mut frames = 0;
        while frames < self.args.max_frames {
            if controller.is_finished() {
                break;
            }
            self.step(controller, dt);
            frames += 1;
        }
        let assembled = controller
            .session()
            .is_some_and(|session| session.state() == SessionState::Assembled);
        if assembled {
            Outcome::Assembled { frames }
        } else if controller.is_finished() {
            Outcome::OutOfTime { frames }
        } else {
            Outcome::GaveUp { frames }
        }
    }

    fn step(&mut self, controller: &mut SessionController, dt: f32) -> TransitionEvent {
        match self.phase {
            Phase::Think { frames } if frames > 0 => {
                self.phase = Phase::Think { frames: frames - 1 };
                controller.tick(dt, &InputSample::default())
            }
            Phase::Think { .. } => self.pick(controller, dt),
            Phase::Drag {
                piece,
                from,
                depth,
                jitter,
                frame,
                total,
            } => {
                let Some(plan) = plan_carry(controller, piece) else {
                    let at = [from[0], from[1], 0.0];
                    self.phase = Phase::Release { at };
                    return controller.tick(dt, &pointer_sample(at).pressed());
                };
                let t = ((frame + 1) as f32 / total.max(1) as f32).min(1.0);
                let target = [plan.pointer[0] + jitter[0], plan.pointer[1] + jitter[1]];
                let at = [
                    from[0] + (target[0] - from[0]) * t,
                    from[1] + (target[1] - from[1]) * t,
                    (plan.home_z - depth) * t,
                ];
                if t >= 1.0 && plan.rotation == 0.0 {
                    self.phase = Phase::Release { at };
                } else {
                    self.phase = Phase::Drag {
                        piece,
                        from,
                        depth,
                        jitter,
                        frame: frame + 1,
                        total,
                    };
                }
                controller.tick(dt, &pointer_sample(at).pressed().rotating(plan.rotation))
            }
            Phase::Release { at } => {
                self.phase = self.think();
                controller.tick(dt, &pointer_sample(at))
            }
        }
    }

    fn pick(&mut self, controller: &mut SessionController, dt: f32) -> TransitionEvent {
        let hints_left = controller
            .session()
            .is_some_and(|session| session.remaining_hints() != 0);
        if hints_left && self.args.hint_rate > 0.0 && self.rng.random::<f32>() < self.args.hint_rate {
            self.phase = self.think();
            let event = controller.use_hint();
            if !event.is_none() {
                return event;
            }
        }

        let free = controller.session().map(free_pieces).unwrap_or_default();
        if free.is_empty() {
            self.phase = self.think();
            return controller.tick(dt, &InputSample::default());
        }
        let piece = free[self.rng.random_range(0..free.len())];
        let Some(start) = controller
            .session()
            .and_then(|session| session.piece(piece))
            .map(|piece| piece.current.pos)
        else {
            return TransitionEvent::None;
        };
        let from = [start[0], start[1]];

        let event = controller.tick(dt, &InputSample::at(from[0], from[1]).pressed());
        if event != TransitionEvent::DragPiece {
            self.phase = self.think();
            return event;
        }
        let min = self.args.drag_min_frames.max(1);
        let max = self.args.drag_max_frames.max(min);
        self.phase = Phase::Drag {
            piece,
            from,
            depth: start[2],
            jitter: self.jitter(controller),
            frame: 0,
            total: self.rng.random_range(min..=max),
        };
        event
    }

    fn think(&mut self) -> Phase {
        let min = self.args.think_min_frames;
        let max = self.args.think_max_frames.max(min);
        Phase::Think {
            frames: self.rng.random_range(min..=max),
        }
    }

    fn jitter(&mut self, controller: &SessionController) -> [f32; 2] {
        let allowed = controller
            .session()
            .map_or(0.0, |session| session.rules().allowed_distance);
        let radius = allowed * self.args.jitter.clamp(0.0, 0.9) * self.rng.random::<f32>();
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        [radius * angle.cos(), radius * angle.sin()]
    }
}

/// Unplaced pieces whose centre no higher unplaced piece covers.
fn free_pieces(session: &PuzzleSession) -> Vec<PieceId> {
    let order = session.z_order();
    order
        .iter()
        .enumerate()
        .filter_map(|(rank, &id)| {
            let piece = session.piece(id)?;
            if piece.placed {
                return None;
            }
            let center = [piece.current.pos[0], piece.current.pos[1]];
            let covered = order[rank + 1..].iter().any(|&other| {
                session.piece(other).is_some_and(|other| {
                    !other.placed && other.current.contains(other.half_size, center)
                })
            });
            (!covered).then_some(id)
        })
        .collect()
}

fn pointer_sample(at: [f32; 3]) -> InputSample {
    let mut sample = InputSample::at(at[0], at[1]);
    sample.pointer[2] = at[2];
    sample
}

#[derive(Clone, Copy, Debug)]
struct CarryPlan {
    pointer: [f32; 2],
    home_z: f32,
    rotation: f32,
}

/// Where the pointer must be for the held piece to sit on its home, and the
/// rotation request still needed to line it up.
fn plan_carry(controller: &SessionController, piece: PieceId) -> Option<CarryPlan> {
    let session = controller.session()?;
    let members = session.held()?;
    let primary = session.piece(piece)?;
    let rules = session.rules();

    let count = members.len() as f32;
    let (sum_x, sum_y) = members
        .iter()
        .filter_map(|&member| session.piece(member))
        .fold((0.0, 0.0), |(x, y), member| {
            (
                x + member.current.pos[0] - primary.current.pos[0],
                y + member.current.pos[1] - primary.current.pos[1],
            )
        });
    let lift = rules.drag_offset_y * primary.half_size[1] * 2.0;
    let pointer = [
        primary.home.pos[0] + sum_x / count,
        primary.home.pos[1] + sum_y / count - lift,
    ];

    let can_rotate = rules.randomize_rotation || session.mode() == DecomposeMode::RotationOnly;
    let off = angle_delta(primary.home.rot_deg, primary.current.rot_deg);
    let rotation = if !can_rotate
        || angle_matches(primary.current.rot_deg, primary.home.rot_deg, rules.allowed_rotation * 0.5)
    {
        0.0
    } else if rules.gradual_rotation {
        off.signum()
    } else {
        off / rules.rotation_speed.max(f32::EPSILON)
    };
    Some(CarryPlan {
        pointer,
        home_z: primary.home.pos[2],
        rotation,
    })
}
