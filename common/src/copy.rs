use anyhow::{Context, anyhow};
use async_recursion::async_recursion;
use tracing::instrument;

use crate::preserve;
use crate::progress;

/// Error type for copy operations that preserves the operation summary even
/// on failure.
///
/// The Display implementation shows the full error chain, so it can be
/// logged with any format specifier.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Abort on the first error instead of collecting per-directory errors
    pub fail_early: bool,
    /// Absolute source paths skipped entirely during the copy pass.
    /// Compared by exact path equality against each encountered child.
    pub excluded: std::collections::HashSet<std::path::PathBuf>,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub directories_created: usize,
    pub directories_unchanged: usize,
    pub items_excluded: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            directories_unchanged: self.directories_unchanged + other.directories_unchanged,
            items_excluded: self.items_excluded + other.items_excluded,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            directories created: {}\n\
            directories unchanged: {}\n\
            items excluded: {}",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.directories_created,
            self.directories_unchanged,
            self.items_excluded,
        )
    }
}

/// Count every item (files + directories, `path` included) in the tree.
///
/// Used only to size the progress display, so unreadable directories are
/// logged and counted as a single item rather than failing the run.
#[async_recursion]
pub async fn count_items(path: &std::path::Path) -> anyhow::Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    if !metadata.is_dir() {
        return Ok(1);
    }
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!("count: cannot open directory {:?}: {}", path, error);
            return Ok(1);
        }
    };
    let mut total = 1;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &path))?
    {
        total += count_items(&entry.path()).await?;
    }
    Ok(total)
}

#[instrument(skip(prog_track))]
async fn copy_file(
    prog_track: &'static progress::Progress,
    src: &std::path::Path,
    dst: &std::path::Path,
) -> Result<Summary, Error> {
    tracing::debug!("copying data");
    // tokio::fs::copy carries over the permission bits along with the contents
    let bytes_copied = tokio::fs::copy(src, dst)
        .await
        .with_context(|| format!("failed copying {:?} to {:?}", &src, &dst))
        .map_err(|err| Error::new(err, Summary::default()))?;
    prog_track.files_copied.inc();
    prog_track.bytes_copied.add(bytes_copied);
    Ok(Summary {
        bytes_copied,
        files_copied: 1,
        ..Default::default()
    })
}

/// Recursively copy the `src` tree into `dst`.
///
/// Children of a directory are processed in order; a failing child is
/// logged and recorded while the remaining children continue (unless
/// `fail_early` is set). Once all children were attempted, directory
/// metadata is copied over and any recorded error fails the directory as
/// a whole. Already-copied content stays on disk, there is no rollback.
#[instrument(skip(prog_track))]
#[async_recursion]
pub async fn copy(
    prog_track: &'static progress::Progress,
    src: &std::path::Path,
    dst: &std::path::Path,
    settings: &Settings,
) -> Result<Summary, Error> {
    let _ops_guard = prog_track.ops.guard();
    tracing::debug!("reading source metadata");
    // symlinks are followed, both here and in tokio::fs::copy
    let src_metadata = tokio::fs::metadata(src)
        .await
        .with_context(|| format!("failed reading metadata from src: {:?}", &src))
        .map_err(|err| Error::new(err, Summary::default()))?;
    if src_metadata.is_file() {
        return copy_file(prog_track, src, dst).await;
    }
    if !src_metadata.is_dir() {
        return Err(Error::new(
            anyhow!(
                "copy: {:?} -> {:?} failed, unsupported src file type: {:?}",
                src,
                dst,
                src_metadata.file_type()
            ),
            Summary::default(),
        ));
    }
    tracing::debug!("process contents of 'src' directory");
    let mut entries = tokio::fs::read_dir(src)
        .await
        .with_context(|| format!("cannot open directory {src:?} for reading"))
        .map_err(|err| Error::new(err, Summary::default()))?;
    let mut copy_summary = {
        if let Err(error) = tokio::fs::create_dir(dst).await {
            if error.kind() == std::io::ErrorKind::AlreadyExists {
                let dst_metadata = tokio::fs::metadata(dst)
                    .await
                    .with_context(|| format!("failed reading metadata from dst: {:?}", &dst))
                    .map_err(|err| Error::new(err, Summary::default()))?;
                if !dst_metadata.is_dir() {
                    return Err(Error::new(
                        anyhow!("destination {:?} exists and is not a directory", dst),
                        Summary::default(),
                    ));
                }
                tracing::debug!("'dst' directory already exists, copying into it");
                prog_track.directories_unchanged.inc();
                Summary {
                    directories_unchanged: 1,
                    ..Default::default()
                }
            } else {
                return Err(Error::new(
                    anyhow::Error::new(error).context(format!("cannot create directory {dst:?}")),
                    Summary::default(),
                ));
            }
        } else {
            prog_track.directories_created.inc();
            Summary {
                directories_created: 1,
                ..Default::default()
            }
        }
    };
    // ordered log of (source, destination, error) for this directory
    let mut errors: Vec<(std::path::PathBuf, std::path::PathBuf, anyhow::Error)> = vec![];
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing src directory {:?}", &src))
        .map_err(|err| Error::new(err, copy_summary))?
    {
        let entry_path = entry.path();
        if settings.excluded.contains(&entry_path) {
            tracing::debug!("skipping excluded path {:?}", &entry_path);
            prog_track.items_excluded.inc();
            copy_summary.items_excluded += 1;
            continue;
        }
        let dst_path = dst.join(entry.file_name());
        match copy(prog_track, &entry_path, &dst_path, settings).await {
            Ok(summary) => copy_summary = copy_summary + summary,
            Err(error) => {
                tracing::error!(
                    "copy: {:?} -> {:?} failed with: {:#}",
                    &entry_path,
                    &dst_path,
                    &error
                );
                copy_summary = copy_summary + error.summary;
                if settings.fail_early {
                    return Err(Error::new(error.source, copy_summary));
                }
                errors.push((entry_path, dst_path, error.source));
            }
        }
    }
    tracing::debug!("set 'dst' directory metadata");
    if let Err(error) = preserve::copy_dir_metadata(&src_metadata, dst).await {
        tracing::error!("copy: {:?} -> {:?} failed with: {:#}", src, dst, &error);
        if settings.fail_early {
            return Err(Error::new(error, copy_summary));
        }
        errors.push((src.to_path_buf(), dst.to_path_buf(), error));
    }
    if !errors.is_empty() {
        tracing::debug!("copy: {:?} -> {:?} failed with: {:?}", src, dst, &errors);
        return Err(Error::new(
            anyhow!(
                "copy: {:?} -> {:?} failed, {} item(s) could not be copied",
                src,
                dst,
                errors.len()
            ),
            copy_summary,
        ));
    }
    Ok(copy_summary)
}
