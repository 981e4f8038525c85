use anyhow::{Context, Result};
use std::os::unix::fs::MetadataExt;
use tracing::instrument;

/// Copy directory metadata (permission bits and atime/mtime) from the
/// source metadata onto `dst`.
///
/// Applied after a directory's children have been processed so the file
/// operations inside don't bump the timestamps we just set.
#[instrument]
pub async fn copy_dir_metadata(metadata: &std::fs::Metadata, dst: &std::path::Path) -> Result<()> {
    tokio::fs::set_permissions(dst, metadata.permissions())
        .await
        .with_context(|| format!("cannot set permissions on {:?}", &dst))?;
    set_timestamps(metadata, dst).await
}

async fn set_timestamps(metadata: &std::fs::Metadata, dst: &std::path::Path) -> Result<()> {
    let dst = dst.to_owned();
    let metadata = metadata.to_owned();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let atime = nix::sys::time::TimeSpec::new(metadata.atime(), metadata.atime_nsec());
        let mtime = nix::sys::time::TimeSpec::new(metadata.mtime(), metadata.mtime_nsec());
        nix::sys::stat::utimensat(
            nix::fcntl::AT_FDCWD,
            &dst,
            &atime,
            &mtime,
            nix::sys::stat::UtimensatFlags::NoFollowSymlink,
        )
        .with_context(|| format!("failed setting timestamps for {:?}", &dst))?;
        Ok(())
    })
    .await?
}
