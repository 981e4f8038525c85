//! Shared harness and core operations for the dist-tools utilities.
//!
//! The binaries (`dcp`, `dehash`) parse their CLI, build the config
//! structs and hand an async main to [`run`], which owns the tracing
//! subscriber, the tokio runtime and the progress display.

use std::sync::LazyLock;

pub mod config;
pub mod copy;
pub mod preserve;
pub mod progress;
pub mod rename;
#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, ProgressSettings, ProgressType, RuntimeConfig};
pub use copy::copy;
pub use rename::dehash;

static PROG_TRACK: LazyLock<progress::Progress> = LazyLock::new(progress::Progress::new);

/// Process-wide progress counters, shared between the operation in flight
/// and the display task spawned by [`run`].
pub fn prog_track() -> &'static progress::Progress {
    LazyLock::force(&PROG_TRACK)
}

fn init_tracing(output: &OutputConfig) {
    let level = if output.quiet {
        "off"
    } else {
        match output.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // ignore a second init, e.g. when called from tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn progress_loop(settings: ProgressSettings, prog_track: &'static progress::Progress) {
    let delay = match settings.progress_delay.as_deref() {
        Some(text) => match humantime::parse_duration(text) {
            Ok(delay) => Some(delay),
            Err(error) => {
                tracing::warn!("invalid progress delay {:?}: {}", text, error);
                None
            }
        },
        None => None,
    };
    match settings.progress_type {
        ProgressType::ProgressBar => {
            let delay = delay.unwrap_or(std::time::Duration::from_millis(200));
            // the total may only be known once the tool's sizing pass is done,
            // start as a spinner and switch to a bar when it shows up
            let bar = indicatif::ProgressBar::new_spinner();
            let mut interval = tokio::time::interval(delay);
            loop {
                interval.tick().await;
                let status = prog_track.ops.get();
                let total = prog_track.total();
                if total > 0 && bar.length() != Some(total) {
                    bar.set_length(total);
                    if let Ok(style) = indicatif::ProgressStyle::with_template(
                        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
                    ) {
                        bar.set_style(style);
                    }
                }
                bar.set_position(status.finished);
                bar.set_message(format!(
                    "{}",
                    bytesize::ByteSize(prog_track.bytes_copied.get())
                ));
            }
        }
        ProgressType::TextUpdates => {
            let delay = delay.unwrap_or(std::time::Duration::from_secs(10));
            let mut printer = progress::ProgressPrinter::new(prog_track);
            let mut interval = tokio::time::interval(delay);
            // the first tick fires immediately, skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                match printer.print() {
                    Ok(text) => println!("{text}"),
                    Err(error) => tracing::warn!("failed printing progress: {}", error),
                }
            }
        }
    }
}

/// Process harness shared by all tools: initializes tracing, builds the
/// tokio runtime, optionally spawns the progress display and runs `func`
/// to completion.
///
/// Returns the summary on success; on failure the error is logged and
/// `None` is returned so callers can exit with a non-zero status.
pub fn run<Fut, Summary>(
    progress: Option<ProgressSettings>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
    Summary: std::fmt::Display,
{
    init_tracing(&output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let rt = match builder.enable_all().build() {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!("failed building tokio runtime: {}", error);
            return None;
        }
    };
    let result = rt.block_on(async move {
        let progress_task =
            progress.map(|settings| tokio::spawn(progress_loop(settings, prog_track())));
        let result = func().await;
        if let Some(task) = progress_task {
            task.abort();
            let _ = task.await;
        }
        result
    });
    match result {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
