//! Host-facing layer over `jigsaw-kit-core`: the frame controller, input
//! edge tracking, HUD text, audio preferences and a file-backed store.

mod controller;
mod hud;
mod input;
mod persisted;
mod persisted_store;
mod runtime;

pub use controller::{ControllerError, SessionController};
pub use hud::{format_countdown, format_elapsed, format_hints, format_pieces_left};
pub use input::{ButtonEdge, ButtonTracker, InputSample, TouchTracker};
pub use persisted::{
    cleanup, list_saved, mark_saved, parse_puzzle_name, puzzle_name, AudioSettings, SavedPuzzle,
    MUSIC_KEY, PUZZLE_NAME_PREFIX, SOUND_KEY,
};
pub use persisted_store::{FileStore, STORE_FILE_VERSION};
pub use runtime::{
    ControllerHooks, CounterUpdate, EffectLog, MusicCue, Notice, Panel, SideEffect, SoundCue,
};
