//! Progress bars, tail-friendly progress lines and log setup.
//!
//! Bars, spinners and log lines all go to stderr so a match report piped from
//! stdout stays clean. With `--log-only` the bars are hidden and
//! `log_progress` prints `[phase] n/total (pct%)` lines instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default of `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// `runtime.log_only` after `--log-only` is applied; read by every bar and spinner.
static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Switch the match and export runs to plain `[phase] n/total` lines, for
/// cron jobs and logs that cannot render a bar.
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Elapsed time for the "Matching complete!" and "Export complete!" banners.
/// A whole library walk plus a playlist is seconds, a large export can be minutes.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// One tick per playlist track, shared by `Resolver::resolve_all` (rayon
/// workers call `inc`) and `export_playlist`. Hidden under `--log-only`,
/// where `log_progress` reports instead.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tracks ({per_sec}, ETA: {eta})")
                .unwrap()
                .progress_chars("=> "),
        );
    }
    pb.set_message(msg.to_string());
    pb
}

/// Shown while `LibraryIndex::build` walks the library root. The file count is
/// not known until the walk ends, so there is no bar. The caller replaces the
/// message with the indexed file and key counts.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
    }
    pb.set_message(msg.to_string());
    pb
}

/// `[match] 250/1200 (20.8%)` or `[export] ...` on stderr, every `interval` tracks and once
/// for the last one. A no-op unless log-only is set, since the bar already shows it.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && should_log(current, total, interval) {
        let pct = 100.0 * current as f64 / total as f64;
        eprintln!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

fn should_log(current: u64, total: u64, interval: u64) -> bool {
    total > 0 && interval > 0 && (current % interval == 0 || current == total)
}
