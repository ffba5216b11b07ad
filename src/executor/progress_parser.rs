//! # Progress Parser
//!
//! Estrae il tempo di media già codificato dalle righe che ffmpeg scrive
//! con `-progress pipe:1` (`out_time=00:00:05.000000`) o dal vecchio
//! formato a riga unica di stderr (`frame=.. time=00:00:05.00 ..`).
//!
//! Funzione pura, nessuno stato: la monotonicità del progresso è
//! responsabilità del job.

use std::time::Duration;

const TIME_KEY: &str = "time=";

/// Elapsed media time reported by `line`, if it carries one.
///
/// When a line contains several tokens the last one wins.
pub fn parse_elapsed(line: &str) -> Option<Duration> {
    line.match_indices(TIME_KEY)
        .filter_map(|(idx, _)| {
            let value = &line[idx + TIME_KEY.len()..];
            let token = value.split_whitespace().next()?;
            parse_timestamp(token)
        })
        .last()
}

/// Parse `HH:MM:SS[.frac]`; negative or `N/A` values are rejected
fn parse_timestamp(token: &str) -> Option<Duration> {
    let mut parts = token.trim().splitn(3, ':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next()?;

    if [hours, minutes, seconds].iter().any(|p| p.is_empty() || p.starts_with('-')) {
        return None;
    }

    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    if minutes >= 60 || !seconds.is_finite() || seconds >= 60.0 {
        return None;
    }

    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}
