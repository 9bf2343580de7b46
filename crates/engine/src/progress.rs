//! Progress reporting.
//!
//! Engines push [`ProgressEvent`]s into a bounded channel without waiting;
//! when the consumer falls behind, events are dropped. The parsers below
//! understand the status lines printed by ffmpeg and mkvmerge.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Which step a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressStage {
    Download,
    Mux,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Mux => "mux",
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    /// What is being processed, usually the output file name.
    pub label: String,
    /// Completion in percent, when the total is known.
    pub percent: Option<f64>,
    pub bytes: u64,
    /// Media time processed so far.
    pub media_secs: f64,
    pub speed_bytes_per_sec: u64,
    /// Processing speed relative to playback.
    pub playback_ratio: f64,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, label: impl Into<String>) -> Self {
        Self {
            stage,
            label: label.into(),
            percent: None,
            bytes: 0,
            media_secs: 0.0,
            speed_bytes_per_sec: 0,
            playback_ratio: 0.0,
        }
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent.clamp(0.0, 100.0));
        self
    }
}

/// Fire-and-forget handle for publishing progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sender that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx
            && let Err(TrySendError::Full(_)) = tx.try_send(event)
        {
            trace!("Progress channel full, dropping event");
        }
    }
}

/// Create a bounded progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender::new(tx), rx)
}

/// Seconds in an `HH:MM:SS.ms` clock value.
pub fn parse_time(clock: &str) -> Option<f64> {
    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let hours: f64 = h.parse().ok()?;
    let minutes: f64 = m.parse().ok()?;
    let seconds: f64 = s.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse the input duration ffmpeg prints while probing
/// (`  Duration: 00:23:40.04, start: 0.000000, bitrate: N/A`).
pub fn parse_duration(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let end = rest.find(',').unwrap_or(rest.len());
    parse_time(rest[..end].trim())
}

/// Status fields of one ffmpeg progress line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FfmpegStatus {
    pub bytes: u64,
    pub media_secs: f64,
    pub speed_bytes_per_sec: u64,
    pub playback_ratio: f64,
}

/// `key=value` pairs of a status line. ffmpeg pads values with spaces
/// (`size=    1024kB`), so whitespace directly after `=` belongs to the value.
fn status_fields(line: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = line;
    std::iter::from_fn(move || {
        let eq = rest.find('=')?;
        let key = rest[..eq].split_whitespace().next_back().unwrap_or_default();
        let value = rest[eq + 1..].trim_start();
        let end = value.find(char::is_whitespace).unwrap_or(value.len());

        // An empty value runs into the next key, which is left for the next pair.
        if value[..end].contains('=') {
            rest = value;
            return Some((key, ""));
        }
        rest = &value[end..];
        Some((key, &value[..end]))
    })
}

/// Numeric prefix and unit suffix of `1024kB`, `2097.2kbits/s`, `1.00x`.
fn split_unit(value: &str) -> (&str, &str) {
    let at = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    value.split_at(at)
}

/// Parse an ffmpeg status line.
///
/// Format: `frame=X fps=X q=X size=XkB time=HH:MM:SS.ms bitrate=Xkbits/s speed=Xx`.
/// Requires `time=` and one of `frame=`/`size=` so unrelated lines are not
/// mistaken for progress. Fields reported as `N/A` read as zero.
pub fn parse_ffmpeg_status(line: &str) -> Option<FfmpegStatus> {
    let mut status = FfmpegStatus::default();
    let mut has_time = false;
    let mut has_counter = false;

    for (key, value) in status_fields(line) {
        let (number, unit) = split_unit(value);
        match key {
            "frame" => has_counter = true,
            "size" | "Lsize" => {
                has_counter = true;
                if unit.starts_with(['k', 'K']) {
                    status.bytes = number.parse::<u64>().map_or(0, |kib| kib * 1024);
                }
            }
            "time" => {
                has_time = true;
                status.media_secs = parse_time(value).unwrap_or(0.0);
            }
            "bitrate" if unit == "kbits/s" => {
                status.speed_bytes_per_sec = number
                    .parse::<f64>()
                    .map_or(0, |kbits| (kbits * 1024.0 / 8.0) as u64);
            }
            "speed" if unit == "x" => {
                status.playback_ratio = number.parse().unwrap_or(0.0);
            }
            _ => {}
        }
    }

    (has_time && has_counter).then_some(status)
}

/// Parse a mkvmerge progress line (`Progress: 42%`).
pub fn parse_mkvmerge_progress(line: &str) -> Option<f64> {
    let rest = line.trim().strip_prefix("Progress:")?;
    let value: f64 = rest.trim().strip_suffix('%')?.trim().parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}
