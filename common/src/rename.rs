use anyhow::{Context, Result, anyhow};
use async_recursion::async_recursion;
use std::sync::LazyLock;
use tracing::instrument;

use crate::progress;

/// Matches `<prefix>.<hash>.js` and `<prefix>.<hash>.js.LICENSE.txt` where
/// the prefix may contain dots but the hash segment may not. A hash-free
/// name like `main.js` does not match, so re-running the pass is a no-op.
static HASHED_BUNDLE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(.*?)\.([^.]*?)\.js(\.LICENSE\.txt)?$")
        .expect("hashed bundle pattern must compile")
});

/// A fixed, one-off file operation applied after the pattern rename pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fixup {
    /// Rename `from` to `to`, both relative to the target root
    Rename {
        from: std::path::PathBuf,
        to: std::path::PathBuf,
    },
    /// Copy `from` (used as given) to `to` relative to the target root
    Copy {
        from: std::path::PathBuf,
        to: std::path::PathBuf,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Directory name pruned from traversal wherever it appears
    pub skip_dir: String,
    /// Fixed operations applied in order after the rename pass
    pub fixups: Vec<Fixup>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Summary {
    pub files_renamed: usize,
    pub directories_skipped: usize,
    pub fixups_applied: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_renamed: self.files_renamed + other.files_renamed,
            directories_skipped: self.directories_skipped + other.directories_skipped,
            fixups_applied: self.fixups_applied + other.fixups_applied,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files renamed: {}\n\
            directories skipped: {}\n\
            fixups applied: {}",
            self.files_renamed, self.directories_skipped, self.fixups_applied,
        )
    }
}

/// Return the hash-free form of a bundle filename, or `None` when the name
/// doesn't carry a hash segment.
#[must_use]
pub fn hash_free_name(name: &str) -> Option<String> {
    let captures = HASHED_BUNDLE.captures(name)?;
    let prefix = captures.get(1).map_or("", |m| m.as_str());
    let license = captures.get(3).map_or("", |m| m.as_str());
    Some(format!("{prefix}.js{license}"))
}

/// Strip content hashes from bundle filenames under `root`, then apply the
/// configured fixups.
///
/// Any rename or fixup failure is fatal; files already renamed stay
/// renamed.
#[instrument(skip(prog_track))]
pub async fn dehash(
    prog_track: &'static progress::Progress,
    root: &std::path::Path,
    settings: &Settings,
) -> Result<Summary> {
    let root_metadata = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("cannot access target directory {:?}", &root))?;
    if !root_metadata.is_dir() {
        return Err(anyhow!("target {:?} is not a directory", root));
    }
    let mut summary = strip_hashes(prog_track, root, settings).await?;
    for fixup in &settings.fixups {
        apply_fixup(root, fixup).await?;
        prog_track.fixups_applied.inc();
        summary.fixups_applied += 1;
    }
    Ok(summary)
}

#[instrument(skip(prog_track))]
#[async_recursion]
async fn strip_hashes(
    prog_track: &'static progress::Progress,
    dir: &std::path::Path,
    settings: &Settings,
) -> Result<Summary> {
    let _ops_guard = prog_track.ops.guard();
    let mut summary = Summary::default();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot open directory {dir:?} for reading"))?;
    // list the directory up front, renaming entries mid-iteration is
    // undefined for some filesystems
    let mut children = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &dir))?
    {
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("failed reading file type of {:?}", entry.path()))?;
        children.push((entry.path(), entry.file_name(), file_type));
    }
    for (entry_path, file_name, file_type) in children {
        if file_type.is_dir() {
            if file_name.to_str() == Some(settings.skip_dir.as_str()) {
                tracing::debug!("pruning {:?} from traversal", &entry_path);
                prog_track.directories_skipped.inc();
                summary.directories_skipped += 1;
                continue;
            }
            summary = summary + strip_hashes(prog_track, &entry_path, settings).await?;
            continue;
        }
        // non-UTF-8 names cannot match the pattern, leave them alone
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(new_name) = hash_free_name(name) {
            let new_path = dir.join(&new_name);
            tokio::fs::rename(&entry_path, &new_path)
                .await
                .with_context(|| format!("failed renaming {:?} to {:?}", &entry_path, &new_path))?;
            tracing::info!("renamed {:?} -> {:?}", &entry_path, &new_path);
            prog_track.files_renamed.inc();
            summary.files_renamed += 1;
        }
    }
    Ok(summary)
}

#[instrument]
async fn apply_fixup(root: &std::path::Path, fixup: &Fixup) -> Result<()> {
    match fixup {
        Fixup::Rename { from, to } => {
            let from = root.join(from);
            let to = root.join(to);
            tokio::fs::rename(&from, &to)
                .await
                .with_context(|| format!("fixup: failed renaming {:?} to {:?}", &from, &to))?;
            tracing::info!("fixup: renamed {:?} -> {:?}", &from, &to);
        }
        Fixup::Copy { from, to } => {
            let to = root.join(to);
            tokio::fs::copy(from, &to)
                .await
                .with_context(|| format!("fixup: failed copying {:?} to {:?}", &from, &to))?;
            tracing::info!("fixup: copied {:?} -> {:?}", &from, &to);
        }
    }
    Ok(())
}
