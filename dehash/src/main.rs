use clap::Parser;
use tracing::instrument;

/// Default fixups matching the extension build workflow this tool grew out
/// of: webpack emits `extension worker.js` (with a space) and leaves the
/// worker source map next to the build script rather than in `dist`.
const DEFAULT_RENAME_FIXUP: (&str, &str) = ("extension worker.js", "extension-worker.js");
const DEFAULT_COPY_FIXUP: (&str, &str) = ("extension-worker.js.map", "extension-worker.js.map");

#[derive(Debug, Clone)]
struct FixupSpec {
    from: std::path::PathBuf,
    to: std::path::PathBuf,
}

impl std::str::FromStr for FixupSpec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('=') {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(FixupSpec {
                from: from.into(),
                to: to.into(),
            }),
            _ => Err(format!("expected FROM=TO, got {value:?}")),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dehash",
    version,
    about = "Strip content hashes from generated bundle filenames",
    long_about = "`dehash` walks a build output directory and renames bundles named \
`<prefix>.<hash>.js` (and their `.js.LICENSE.txt` companions) to the hash-free \
`<prefix>.js` form so they can be referenced with stable names. A designated cache \
subdirectory is pruned from the walk, and a configurable list of fixed rename/copy \
operations runs after the pattern pass.

Without any --rename-fixup/--copy-fixup flag the historical defaults apply: \
`extension worker.js` is renamed to `extension-worker.js` and \
`extension-worker.js.map` is copied into the target directory. Use --no-fixups to \
run the pattern pass only.

EXAMPLES:
    # Default post-build pass over ./dist
    dehash

    # Rename pass only, against a staging tree
    dehash /tmp/stage/dist --no-fixups --summary"
)]
struct Args {
    // Rename options
    /// Subdirectory name excluded from traversal wherever it appears
    #[arg(
        long,
        default_value = "chunks",
        value_name = "NAME",
        help_heading = "Rename options"
    )]
    skip_dir: String,

    /// Post-pass rename, both sides relative to ROOT (can be repeated)
    #[arg(long, value_name = "FROM=TO", help_heading = "Rename options")]
    rename_fixup: Vec<FixupSpec>,

    /// Post-pass copy; FROM as given, TO relative to ROOT (can be repeated)
    #[arg(long, value_name = "FROM=TO", help_heading = "Rename options")]
    copy_fixup: Vec<FixupSpec>,

    /// Run the pattern rename pass only, skipping all fixups
    #[arg(long, help_heading = "Rename options")]
    no_fixups: bool,

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
    /// Accepts human-readable durations like "200ms", "10s". If specified,
    /// --progress flag is implied.
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

    // ARGUMENTS
    /// Build output directory to process
    #[arg(default_value = "dist", value_name = "ROOT")]
    root: std::path::PathBuf,
}

fn build_fixups(args: &Args) -> Vec<common::rename::Fixup> {
    if args.no_fixups {
        return vec![];
    }
    if args.rename_fixup.is_empty() && args.copy_fixup.is_empty() {
        return vec![
            common::rename::Fixup::Rename {
                from: DEFAULT_RENAME_FIXUP.0.into(),
                to: DEFAULT_RENAME_FIXUP.1.into(),
            },
            common::rename::Fixup::Copy {
                from: DEFAULT_COPY_FIXUP.0.into(),
                to: DEFAULT_COPY_FIXUP.1.into(),
            },
        ];
    }
    let renames = args
        .rename_fixup
        .iter()
        .map(|spec| common::rename::Fixup::Rename {
            from: spec.from.clone(),
            to: spec.to.clone(),
        });
    let copies = args.copy_fixup.iter().map(|spec| common::rename::Fixup::Copy {
        from: spec.from.clone(),
        to: spec.to.clone(),
    });
    renames.chain(copies).collect()
}

#[instrument]
async fn async_main(args: Args) -> anyhow::Result<common::rename::Summary> {
    tracing::info!(
        "stripping content hashes under {:?} (skipping {:?} directories)...",
        &args.root,
        &args.skip_dir
    );
    let settings = common::rename::Settings {
        skip_dir: args.skip_dir.clone(),
        fixups: build_fixups(&args),
    };
    let summary = common::dehash(common::prog_track(), &args.root, &settings).await?;
    tracing::info!("done, {} file(s) renamed", summary.files_renamed);
    Ok(summary)
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
        common::RuntimeConfig::default(),
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
