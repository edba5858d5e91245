/// Play time as `h:m:ss`, minutes unpadded.
pub fn format_elapsed(seconds: f32) -> String {
    let total = whole_seconds(seconds, false);
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let secs = total % 60;
    format!("{hours}:{minutes}:{secs:02}")
}

/// Countdown as `m:ss`. Rounds up so the clock reads 0:00 only once time is out.
pub fn format_countdown(seconds: f32) -> String {
    let total = whole_seconds(seconds, true);
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn format_pieces_left(left: usize, total: usize) -> String {
    format!("{left} / {total}")
}

pub fn format_hints(remaining: i32) -> String {
    if remaining < 0 {
        "∞".to_string()
    } else {
        remaining.to_string()
    }
}

fn whole_seconds(seconds: f32, round_up: bool) -> u32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let value = if round_up { seconds.ceil() } else { seconds.floor() };
    value.min(u32::MAX as f32) as u32
}
