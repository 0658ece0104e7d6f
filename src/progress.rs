//! Progress reporting for the per-track import and export loops.
//!
//! Interactive runs get an indicatif bar. Cron runs pass `--log-only`, which
//! hides the bar and emits a `tracing` line every `interval` tracks instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tracks";

/// Set once from `--log-only` before any loop starts
static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Run time for the summary block: "4.2s" or "1.5m".
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress over one reconciler loop.
pub struct TrackProgress {
    phase: &'static str,
    total: u64,
    interval: u64,
    done: u64,
    bar: ProgressBar,
}

impl TrackProgress {
    pub fn new(phase: &'static str, total: usize, interval: u64, msg: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        if is_log_only() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(msg.to_string());
        Self {
            phase,
            total: total as u64,
            interval: interval.max(1),
            done: 0,
            bar,
        }
    }

    /// Count one processed track.
    pub fn tick(&mut self) {
        self.done += 1;
        self.bar.inc(1);
        if is_log_only() && (self.done % self.interval == 0 || self.done == self.total) {
            tracing::info!(
                "[{}] {}/{} tracks ({:.1}%)",
                self.phase,
                self.done,
                self.total,
                100.0 * self.done as f64 / self.total as f64
            );
        }
    }

    pub fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    pub fn done(&self) -> u64 {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_track_progress_counts() {
        let mut progress = TrackProgress::new("import", 3, 0, "Importing");
        progress.tick();
        progress.tick();
        assert_eq!(progress.done(), 2);
        progress.finish("Imported".to_string());
    }
}
