//! Input validation for schedule preferences.

use chrono_tz::Tz;

/// Validate an IANA timezone name.
pub fn validate_timezone(name: &str) -> Option<Tz> {
    name.parse().ok()
}

/// Parse "HH:MM" into (hour, minute), range-checked.
pub fn parse_hhmm(text: &str) -> Option<(i32, i32)> {
    let (hour, minute) = text.split_once(':')?;
    if minute.len() != 2 || hour.is_empty() || hour.len() > 2 {
        return None;
    }
    let hour: i32 = hour.parse().ok()?;
    let minute: i32 = minute.parse().ok()?;
    if (0..=23).contains(&hour) && (0..=59).contains(&minute) {
        Some((hour, minute))
    } else {
        None
    }
}

/// Cap free text at `max_chars` characters, reporting whether anything
/// was cut off.
pub fn truncate_text(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
