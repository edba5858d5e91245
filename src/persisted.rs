use jigsaw_kit_core::{ProgressKeys, ProgressStore, StoreError};
use tracing::warn;

pub const MUSIC_KEY: &str = "MusicPlayer";
pub const SOUND_KEY: &str = "SoundPlayer";

pub const PUZZLE_NAME_PREFIX: &str = "Puzzle_";

/// Audio toggles shared by every puzzle. Missing keys mean enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSettings {
    pub music: bool,
    pub sound: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music: true,
            sound: true,
        }
    }
}

impl AudioSettings {
    pub fn load<S>(store: &S) -> Self
    where
        S: ProgressStore + ?Sized,
    {
        Self {
            music: load_flag(store, MUSIC_KEY),
            sound: load_flag(store, SOUND_KEY),
        }
    }

    pub fn save_music<S>(store: &mut S, enabled: bool) -> Result<(), StoreError>
    where
        S: ProgressStore + ?Sized,
    {
        store.set_int(MUSIC_KEY, i32::from(enabled))
    }

    pub fn save_sound<S>(store: &mut S, enabled: bool) -> Result<(), StoreError>
    where
        S: ProgressStore + ?Sized,
    {
        store.set_int(SOUND_KEY, i32::from(enabled))
    }
}

fn load_flag<S>(store: &S, key: &str) -> bool
where
    S: ProgressStore + ?Sized,
{
    match store.try_int(key) {
        Ok(Some(value)) => value > 0,
        Ok(None) => true,
        Err(err) => {
            warn!(key, error = %err, "audio flag unreadable");
            true
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedPuzzle {
    pub name: String,
    pub image: String,
    pub cols: u32,
    pub rows: u32,
}

pub fn puzzle_name(image: &str, cols: u32, rows: u32) -> String {
    format!("{PUZZLE_NAME_PREFIX}{image}_{cols}x{rows}")
}

/// Split `Puzzle_<image>_<cols>x<rows>`. The image may itself contain underscores.
pub fn parse_puzzle_name(name: &str) -> Option<(String, u32, u32)> {
    let rest = name.strip_prefix(PUZZLE_NAME_PREFIX)?;
    let (image, dims) = rest.rsplit_once('_')?;
    let (cols, rows) = dims.split_once('x')?;
    if image.is_empty() {
        return None;
    }
    Some((image.to_string(), cols.parse().ok()?, rows.parse().ok()?))
}

/// Record grid dimensions next to a saved puzzle so it can be listed later.
/// The progress record written by `PuzzleSession::save` is the marker itself.
pub fn mark_saved<S>(store: &mut S, image: &str, cols: u32, rows: u32) -> Result<String, StoreError>
where
    S: ProgressStore + ?Sized,
{
    let name = puzzle_name(image, cols, rows);
    let keys = ProgressKeys::new(name.clone());
    store.set_int(&keys.cols(), cols as i32)?;
    store.set_int(&keys.rows(), rows as i32)?;
    Ok(name)
}

/// Saved puzzles for the given images (all images when empty), up to `max`.
pub fn list_saved<S>(store: &S, images: &[&str], max: usize) -> Vec<SavedPuzzle>
where
    S: ProgressStore + ?Sized,
{
    let mut names: Vec<String> = store
        .keys()
        .into_iter()
        .filter(|key| key.starts_with(PUZZLE_NAME_PREFIX))
        .collect();
    names.sort();

    let mut saved = Vec::new();
    for name in names {
        if saved.len() >= max {
            break;
        }
        let Some((image, cols, rows)) = parse_puzzle_name(&name) else {
            continue;
        };
        if !images.is_empty() && !images.contains(&image.as_str()) {
            continue;
        }
        let keys = ProgressKeys::new(name.clone());
        let stored_cols = store.get_int(&keys.cols(), -1);
        let stored_rows = store.get_int(&keys.rows(), -1);
        if stored_cols != cols as i32 || stored_rows != rows as i32 {
            continue;
        }
        saved.push(SavedPuzzle {
            name,
            image,
            cols,
            rows,
        });
    }
    saved
}

pub fn cleanup<S>(store: &mut S, name: &str) -> Result<(), StoreError>
where
    S: ProgressStore + ?Sized,
{
    let keys = ProgressKeys::new(name);
    for key in [keys.placed(), keys.positions(), keys.cols(), keys.rows()] {
        store.delete(&key)?;
    }
    Ok(())
}
