//! Terminal rendering of engine progress events.

use std::time::Duration;

use anidl_engine::{ProgressEvent, ProgressStage};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} [{bar:30.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// One-line summary of an event, shown next to the bar.
pub fn format_message(event: &ProgressEvent) -> String {
    let mut message = format!("{} {}", event.stage, event.label);

    match event.stage {
        ProgressStage::Download => {
            if event.bytes > 0 {
                message.push_str(&format!(" {}", HumanBytes(event.bytes)));
            }
            if event.speed_bytes_per_sec > 0 {
                message.push_str(&format!(" {}/s", HumanBytes(event.speed_bytes_per_sec)));
            }
            if event.playback_ratio > 0.0 {
                message.push_str(&format!(" {:.1}x", event.playback_ratio));
            }
        }
        ProgressStage::Mux => {}
    }

    message
}

/// Drain `rx` until every sender is dropped.
///
/// With `show_bar` false events only reach the trace log.
pub fn spawn_renderer(mut rx: mpsc::Receiver<ProgressEvent>, show_bar: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current: Option<(ProgressStage, String, ProgressBar)> = None;

        while let Some(event) = rx.recv().await {
            trace!(
                stage = %event.stage,
                label = %event.label,
                percent = ?event.percent,
                bytes = event.bytes,
                "progress"
            );

            if !show_bar {
                continue;
            }

            let same_task = current
                .as_ref()
                .is_some_and(|(stage, label, _)| *stage == event.stage && *label == event.label);

            if !same_task {
                if let Some((_, _, bar)) = current.take() {
                    bar.finish_and_clear();
                }
                let bar = ProgressBar::new(100);
                bar.set_style(bar_style());
                bar.enable_steady_tick(Duration::from_millis(120));
                current = Some((event.stage, event.label.clone(), bar));
            }

            if let Some((_, _, bar)) = &current {
                if let Some(percent) = event.percent {
                    bar.set_position(percent.round() as u64);
                }
                bar.set_message(format_message(&event));
            }
        }

        if let Some((_, _, bar)) = current {
            bar.finish_and_clear();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anidl_engine::progress_channel;

    #[test]
    fn test_format_download_message() {
        let mut event = ProgressEvent::new(ProgressStage::Download, "Episode 1").with_percent(40.0);
        event.bytes = 2048;
        event.speed_bytes_per_sec = 1024;
        event.playback_ratio = 2.5;

        assert_eq!(
            format_message(&event),
            "download Episode 1 2.00 KiB 1.00 KiB/s 2.5x"
        );
    }

    #[test]
    fn test_format_mux_message() {
        let event = ProgressEvent::new(ProgressStage::Mux, "Episode 1");
        assert_eq!(format_message(&event), "mux Episode 1");
    }

    #[tokio::test]
    async fn test_renderer_stops_when_senders_drop() {
        let (tx, rx) = progress_channel(8);
        let handle = spawn_renderer(rx, false);

        tx.emit(ProgressEvent::new(ProgressStage::Download, "a").with_percent(10.0));
        tx.emit(ProgressEvent::new(ProgressStage::Mux, "a").with_percent(50.0));
        drop(tx);

        handle.await.unwrap();
    }
}
