use anyhow::anyhow;
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dcp",
    version,
    about = "Copy a directory tree with progress reporting",
    long_about = "`dcp` copies the entire source tree into the destination tree, reporting \
progress and collecting per-item failures instead of aborting on the first one.

Failures are aggregated per directory: every child is attempted, errors are logged as they \
occur, and a directory whose children (or metadata copy) failed makes the whole run fail \
once everything else was attempted. Already-copied content is left on disk.

EXAMPLES:
    # Copy a build tree with an interactive progress bar
    dcp ./build /srv/release --progress --summary

    # Copy, leaving out caches
    dcp ./build /srv/release --exclude node_modules --exclude .cache"
)]
struct Args {
    // Copy options
    /// Relative path under SRC to skip entirely (can be repeated)
    ///
    /// Each value is joined to the source root and compared by exact path
    /// equality against every encountered child; matches are skipped with
    /// no recursion into them.
    #[arg(long, value_name = "PATH", help_heading = "Copy options")]
    exclude: Vec<std::path::PathBuf>,

    /// Exit on first error
    #[arg(short = 'e', long = "fail-early", help_heading = "Copy options")]
    fail_early: bool,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Set the type of progress display
    ///
    /// If specified, --progress flag is implied.
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Set delay between progress updates
    ///
    /// Default is 200ms for the interactive display and 10s for text updates. Accepts
    /// human-readable durations like "200ms", "10s", "5min". If specified, --progress
    /// flag is implied.
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio runtime default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Source directory
    #[arg()]
    src: std::path::PathBuf,

    /// Destination directory
    #[arg()]
    dst: std::path::PathBuf,
}

#[instrument]
async fn async_main(args: Args) -> anyhow::Result<common::copy::Summary> {
    let excluded = args
        .exclude
        .iter()
        .map(|name| args.src.join(name))
        .collect();
    // sizing pass, only feeds the progress display
    tracing::info!("counting items under {:?}...", &args.src);
    let total = common::copy::count_items(&args.src).await?;
    common::prog_track().set_total(total);
    tracing::info!("{} item(s) to copy", total);
    let settings = common::copy::Settings {
        fail_early: args.fail_early,
        excluded,
    };
    match common::copy(common::prog_track(), &args.src, &args.dst, &settings).await {
        Ok(summary) => Ok(summary),
        Err(error) => {
            if args.summary {
                return Err(anyhow!("{error}\n\n{}", &error.summary));
            }
            Err(error.into())
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(
        if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
            Some(common::ProgressSettings {
                progress_type: args.progress_type.unwrap_or_default(),
                progress_delay: args.progress_delay.clone(),
            })
        } else {
            None
        },
        output,
        runtime,
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
