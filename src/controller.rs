use jigsaw_kit_core::{
    GeometryProvider, ProgressStore, PuzzleSession, SessionError, SessionRules, SessionState,
    StoreError, TransitionEvent,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::hud::{format_countdown, format_elapsed, format_hints, format_pieces_left};
use crate::input::{ButtonEdge, ButtonTracker, InputSample};
use crate::persisted::AudioSettings;
use crate::runtime::{ControllerHooks, CounterUpdate, MusicCue, Notice, Panel, SideEffect, SoundCue};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Frame-driven glue between host input, the active puzzle and the hooks.
pub struct SessionController {
    hooks: ControllerHooks,
    store: Option<Box<dyn ProgressStore>>,
    session: Option<PuzzleSession>,
    audio: AudioSettings,
    button: ButtonTracker,
    music: Option<(MusicCue, bool)>,
    paused: bool,
    finished: bool,
    initialized: bool,
}

impl SessionController {
    pub fn new(hooks: ControllerHooks) -> Self {
        Self {
            hooks,
            store: None,
            session: None,
            audio: AudioSettings::default(),
            button: ButtonTracker::default(),
            music: None,
            paused: false,
            finished: false,
            initialized: false,
        }
    }

    pub fn attach_store(&mut self, store: Box<dyn ProgressStore>) {
        self.store = Some(store);
    }

    /// Make `session` the active puzzle. It must already be prepared.
    pub fn attach_puzzle(&mut self, session: PuzzleSession) {
        self.session = Some(session);
        self.initialized = false;
    }

    pub fn session(&self) -> Option<&PuzzleSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut PuzzleSession> {
        self.session.as_mut()
    }

    pub fn store(&self) -> Option<&dyn ProgressStore> {
        self.store.as_deref()
    }

    pub fn store_mut(&mut self) -> Option<&mut (dyn ProgressStore + 'static)> {
        self.store.as_deref_mut()
    }

    pub fn audio(&self) -> AudioSettings {
        self.audio
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Last music cue requested while music was enabled.
    pub fn current_music(&self) -> Option<(MusicCue, bool)> {
        self.music
    }

    pub fn init(&mut self) -> Result<(), ControllerError> {
        let store = self
            .store
            .as_deref_mut()
            .ok_or(ControllerError::MissingCollaborator("store"))?;
        let session = self
            .session
            .as_mut()
            .ok_or(ControllerError::MissingCollaborator("puzzle"))?;
        if !session.is_prepared() {
            return Err(ControllerError::MissingCollaborator("layout"));
        }

        self.audio = AudioSettings::load(&*store);
        let report = session.load(&*store)?;
        if !report.restored_positions {
            session.decompose(session.mode())?;
        }
        let failures: Vec<Notice> = report
            .failures
            .iter()
            .map(|(key, err)| Notice::PersistenceFailed {
                key: key.clone(),
                message: err.to_string(),
            })
            .collect();
        let finished = session.state() == SessionState::Assembled;
        let out_of_time = !finished && session.timer().has_expired();
        let timed = session.rules().is_timed();
        let hints = session.rules().hint_limit != 0;
        info!(
            name = session.name(),
            state = ?session.state(),
            restored = report.restored_positions,
            "controller ready"
        );

        self.paused = false;
        self.finished = finished;
        self.button.clear();
        self.initialized = true;
        for notice in failures {
            (self.hooks.on_notice)(notice);
        }
        self.hide(Panel::Win);
        self.hide(Panel::Lose);
        self.hide(Panel::Pause);
        self.toggle(Panel::Timer, timed);
        self.toggle(Panel::Hints, hints);
        if finished {
            self.show(Panel::Win);
            self.play_music(MusicCue::Win, false);
        } else {
            self.play_music(MusicCue::Main, true);
        }
        self.publish_counters();
        if out_of_time {
            self.lose();
        }
        Ok(())
    }

    /// One host frame. Persistence problems become notices, never errors.
    pub fn tick(&mut self, dt: f32, input: &InputSample) -> TransitionEvent {
        if !self.initialized {
            return TransitionEvent::None;
        }
        if input.pause_pressed {
            self.pause();
        }
        let edge = self.button.update(input.primary_down);
        if self.paused || self.finished {
            return TransitionEvent::None;
        }
        let Some(session) = self.session.as_mut() else {
            return TransitionEvent::None;
        };

        let mut event = TransitionEvent::None;
        if edge == ButtonEdge::Pressed && !session.is_holding() {
            if !input.over_ui && session.drag_start(input.pointer).is_some() {
                event = TransitionEvent::DragPiece;
            }
        } else if session.is_holding() && input.primary_down {
            session.drag_update(input.pointer, input.rotation_delta);
        } else if session.is_holding() {
            event = session.drag_end();
        }

        let timer = if session.state() == SessionState::Assembled {
            None
        } else {
            Some(session.timer_mut().tick(dt))
        };

        self.dispatch(event);
        if timer.is_some_and(|tick| tick.expired) && !self.finished {
            self.lose();
        }
        self.publish_counters();
        event
    }

    fn dispatch(&mut self, event: TransitionEvent) {
        if event.is_none() {
            return;
        }
        debug!(?event, "transition");
        (self.hooks.on_transition)(event);
        match event {
            TransitionEvent::None => {}
            TransitionEvent::DragPiece => self.play_sound(SoundCue::Grab),
            TransitionEvent::ReturnPiece => self.play_sound(SoundCue::Assemble),
            TransitionEvent::DropPiece => self.play_sound(SoundCue::Drop),
            TransitionEvent::PuzzleAssembled => {
                self.play_sound(SoundCue::Assemble);
                self.show(Panel::Win);
                self.play_music(MusicCue::Win, false);
                self.finished = true;
                info!("puzzle finished");
            }
        }
    }

    fn lose(&mut self) {
        info!("time is up");
        self.finished = true;
        if let Some(session) = self.session.as_mut() {
            session.cancel_drag();
        }
        self.play_music(MusicCue::Lose, false);
        self.show(Panel::Lose);
        (self.hooks.on_lose)();
    }

    /// Toggle pause. Freezes input handling and the countdown.
    pub fn pause(&mut self) {
        if !self.initialized || self.finished {
            return;
        }
        self.paused = !self.paused;
        if let Some(session) = self.session.as_mut() {
            if self.paused {
                session.timer_mut().pause();
            } else {
                session.timer_mut().resume();
            }
        }
        self.toggle(Panel::Pause, self.paused);
    }

    /// Spend a hint: the lowest unplaced piece snaps home.
    pub fn use_hint(&mut self) -> TransitionEvent {
        if !self.initialized || self.paused || self.finished {
            return TransitionEvent::None;
        }
        let Some(session) = self.session.as_mut() else {
            return TransitionEvent::None;
        };
        let event = session.use_hint();
        let out_of_hints = session.remaining_hints() == 0;
        self.dispatch(event);
        if out_of_hints {
            self.hide(Panel::Hints);
        }
        self.publish_counters();
        event
    }

    /// Fresh scramble of the current puzzle; hint and timer keys restart from the rules.
    pub fn reset_puzzle(&mut self) -> Result<(), ControllerError> {
        let session = self
            .session
            .as_mut()
            .ok_or(ControllerError::MissingCollaborator("puzzle"))?;
        session.reset()?;
        let rules = *session.rules();
        let keys = session.keys();
        let timed = rules.is_timed();

        let mut notices = Vec::new();
        if let Some(store) = self.store.as_deref_mut() {
            if let Err(err) = store.set_int(&keys.hints(), rules.hint_limit) {
                notices.push(persistence_notice(keys.hints(), &err));
            }
            if let Err(err) = store.set_float(&keys.timer(), rules.time_limit.max(0.0)) {
                notices.push(persistence_notice(keys.timer(), &err));
            }
        }
        for notice in notices {
            self.notify(notice);
        }
        self.paused = false;
        self.finished = false;
        self.hide(Panel::Lose);
        self.hide(Panel::Pause);
        self.toggle(Panel::Timer, timed);
        self.toggle(Panel::Hints, rules.hint_limit != 0);
        self.publish_counters();
        Ok(())
    }

    /// Forget saved placement, leave the win screen and start over.
    pub fn restart_puzzle(&mut self) -> Result<(), ControllerError> {
        let session = self
            .session
            .as_ref()
            .ok_or(ControllerError::MissingCollaborator("puzzle"))?;
        let keys = session.keys();
        let mut notices = Vec::new();
        if let Some(store) = self.store.as_deref_mut() {
            for key in [keys.placed(), keys.positions()] {
                if let Err(err) = store.delete(&key) {
                    notices.push(persistence_notice(key, &err));
                }
            }
        }
        for notice in notices {
            self.notify(notice);
        }
        self.hide(Panel::Win);
        self.play_music(MusicCue::Main, true);
        self.reset_puzzle()
    }

    pub fn save(&mut self) -> Result<(), ControllerError> {
        let store = self
            .store
            .as_deref_mut()
            .ok_or(ControllerError::MissingCollaborator("store"))?;
        let session = self
            .session
            .as_ref()
            .ok_or(ControllerError::MissingCollaborator("puzzle"))?;
        session.save(store)?;
        Ok(())
    }

    /// Save and flush. Failures are reported through hooks and returned.
    pub fn on_quit(&mut self) -> Result<(), ControllerError> {
        let result = self.save().and_then(|()| {
            match self.store.as_deref_mut() {
                Some(store) => store.flush().map_err(ControllerError::from),
                None => Ok(()),
            }
        });
        if let Err(err) = &result {
            warn!(error = %err, "saving on quit failed");
            let key = self
                .session
                .as_ref()
                .map(|session| session.name().to_string())
                .unwrap_or_default();
            self.notify(Notice::PersistenceFailed {
                key,
                message: err.to_string(),
            });
        }
        result
    }

    /// Replace the active puzzle with a new one using the same rules.
    /// The old puzzle is not saved.
    pub fn switch_puzzle<G>(&mut self, name: &str, layout: &G) -> Result<(), ControllerError>
    where
        G: GeometryProvider + ?Sized,
    {
        let rules = self
            .session
            .as_ref()
            .map(|session| *session.rules())
            .unwrap_or_else(SessionRules::default);
        self.switch_puzzle_with(name, rules, layout)
    }

    pub fn switch_puzzle_with<G>(
        &mut self,
        name: &str,
        rules: SessionRules,
        layout: &G,
    ) -> Result<(), ControllerError>
    where
        G: GeometryProvider + ?Sized,
    {
        let mut next = PuzzleSession::new(name, rules);
        next.prepare(layout.piece_count(), layout)?;
        info!(name, "switching puzzle");
        self.session = Some(next);
        self.initialized = false;
        self.init()
    }

    pub fn set_music_active(&mut self, enabled: bool) {
        self.audio.music = enabled;
        self.persist_audio(|store| AudioSettings::save_music(store, enabled));
        if enabled {
            self.play_music(MusicCue::Main, true);
        } else {
            self.music = None;
            self.effect(SideEffect::StopMusic);
        }
    }

    pub fn set_sound_active(&mut self, enabled: bool) {
        self.audio.sound = enabled;
        self.persist_audio(|store| AudioSettings::save_sound(store, enabled));
    }

    fn persist_audio<F>(&mut self, write: F)
    where
        F: FnOnce(&mut dyn ProgressStore) -> Result<(), StoreError>,
    {
        let Some(store) = self.store.as_deref_mut() else {
            return;
        };
        if let Err(err) = write(store) {
            self.notify(persistence_notice("audio".to_string(), &err));
        }
    }

    fn publish_counters(&self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let timer = session.timer();
        let counters = CounterUpdate {
            pieces_left: format_pieces_left(session.pieces_left(), session.pieces().len()),
            hints: format_hints(session.remaining_hints()),
            elapsed: format_elapsed(timer.state().elapsed),
            remaining: timer
                .is_timed()
                .then(|| format_countdown(timer.state().remaining)),
        };
        self.effect(SideEffect::Counters(counters));
    }

    fn play_sound(&self, cue: SoundCue) {
        if self.audio.sound {
            self.effect(SideEffect::PlaySound(cue));
        }
    }

    fn play_music(&mut self, cue: MusicCue, looped: bool) {
        if !self.audio.music {
            return;
        }
        self.music = Some((cue, looped));
        self.effect(SideEffect::PlayMusic { cue, looped });
    }

    fn show(&self, panel: Panel) {
        self.effect(SideEffect::ShowPanel(panel));
    }

    fn hide(&self, panel: Panel) {
        self.effect(SideEffect::HidePanel(panel));
    }

    fn toggle(&self, panel: Panel, visible: bool) {
        if visible {
            self.show(panel);
        } else {
            self.hide(panel);
        }
    }

    fn effect(&self, effect: SideEffect) {
        (self.hooks.on_effect)(effect);
    }

    fn notify(&self, notice: Notice) {
        warn!(?notice, "persistence notice");
        (self.hooks.on_notice)(notice);
    }
}

fn persistence_notice(key: String, err: &StoreError) -> Notice {
    Notice::PersistenceFailed {
        key,
        message: err.to_string(),
    }
}
