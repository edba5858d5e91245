use std::cell::RefCell;
use std::rc::Rc;

use jigsaw_kit_core::TransitionEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundCue {
    Grab,
    Drop,
    Assemble,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MusicCue {
    Main,
    Win,
    Lose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Panel {
    Win,
    Lose,
    Pause,
    Timer,
    Hints,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CounterUpdate {
    pub pieces_left: String,
    pub hints: String,
    pub elapsed: String,
    /// Countdown text, only for timed puzzles.
    pub remaining: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SideEffect {
    PlaySound(SoundCue),
    PlayMusic { cue: MusicCue, looped: bool },
    StopMusic,
    ShowPanel(Panel),
    HidePanel(Panel),
    Counters(CounterUpdate),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    PersistenceFailed { key: String, message: String },
}

/// Sink for everything the controller wants the presentation layer to do.
#[derive(Clone)]
pub struct ControllerHooks {
    pub on_transition: Rc<dyn Fn(TransitionEvent)>,
    pub on_effect: Rc<dyn Fn(SideEffect)>,
    pub on_lose: Rc<dyn Fn()>,
    pub on_notice: Rc<dyn Fn(Notice)>,
}

impl ControllerHooks {
    pub fn empty() -> Self {
        Self {
            on_transition: Rc::new(|_| {}),
            on_effect: Rc::new(|_| {}),
            on_lose: Rc::new(|| {}),
            on_notice: Rc::new(|_| {}),
        }
    }
}

impl Default for ControllerHooks {
    fn default() -> Self {
        Self::empty()
    }
}

/// Records every hook call, for headless hosts and tests.
#[derive(Clone, Default)]
pub struct EffectLog {
    inner: Rc<RefCell<EffectLogInner>>,
}

#[derive(Default)]
struct EffectLogInner {
    transitions: Vec<TransitionEvent>,
    effects: Vec<SideEffect>,
    notices: Vec<Notice>,
    losses: usize,
}

impl EffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> ControllerHooks {
        let transitions = self.inner.clone();
        let effects = self.inner.clone();
        let losses = self.inner.clone();
        let notices = self.inner.clone();
        ControllerHooks {
            on_transition: Rc::new(move |event| transitions.borrow_mut().transitions.push(event)),
            on_effect: Rc::new(move |effect| effects.borrow_mut().effects.push(effect)),
            on_lose: Rc::new(move || losses.borrow_mut().losses += 1),
            on_notice: Rc::new(move |notice| notices.borrow_mut().notices.push(notice)),
        }
    }

    pub fn transitions(&self) -> Vec<TransitionEvent> {
        self.inner.borrow().transitions.clone()
    }

    pub fn effects(&self) -> Vec<SideEffect> {
        self.inner.borrow().effects.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.inner.borrow().notices.clone()
    }

    pub fn losses(&self) -> usize {
        self.inner.borrow().losses
    }

    pub fn sounds(&self) -> Vec<SoundCue> {
        self.inner
            .borrow()
            .effects
            .iter()
            .filter_map(|effect| match effect {
                SideEffect::PlaySound(cue) => Some(*cue),
                _ => None,
            })
            .collect()
    }

    pub fn last_counters(&self) -> Option<CounterUpdate> {
        self.inner
            .borrow()
            .effects
            .iter()
            .rev()
            .find_map(|effect| match effect {
                SideEffect::Counters(counters) => Some(counters.clone()),
                _ => None,
            })
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.transitions.clear();
        inner.effects.clear();
        inner.notices.clear();
        inner.losses = 0;
    }
}
