use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tempfile::TempPath;

use crate::storage::{
    BackendError, OtherIoSnafu, StorageLocation, StorageResult, create_parent_dir,
    create_staging_file, join_local, persist_staging,
};

/// Local filesystem sink that writes to a private staging file and renames
/// it over the target on finish.
struct LocalSink {
    staged: TempPath,
    final_path: PathBuf,
    writer: io::BufWriter<std::fs::File>,
}

impl LocalSink {
    async fn open(location: &StorageLocation, rel_path: &Path) -> StorageResult<Self> {
        let final_path = join_local(location, rel_path);
        create_parent_dir(&final_path).await?;

        // Arrow/Parquet writers require std::io::Write.
        let (file, staged) = create_staging_file(&final_path)?.into_parts();

        Ok(Self {
            staged,
            final_path,
            writer: io::BufWriter::new(file),
        })
    }

    async fn finish(self) -> StorageResult<()> {
        let LocalSink {
            staged,
            final_path,
            mut writer,
        } = self;
        let staged_path = staged.display().to_string();

        writer
            .flush()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: staged_path.clone(),
            })?;
        writer
            .get_ref()
            .sync_all()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu { path: staged_path })?;
        drop(writer);

        persist_staging(staged, &final_path)
    }
}

enum OutputSinkInner {
    Local(LocalSink),
}

/// A streaming output sink with commit-on-finish semantics.
///
/// Bytes written through the [`Write`] impl land in a staging file. Only
/// [`OutputSink::finish`] makes them visible at the target path; dropping the
/// sink without finishing discards the staging file and leaves the target
/// as it was.
pub struct OutputSink {
    inner: OutputSinkInner,
}

impl OutputSink {
    /// Final path the sink commits to.
    pub fn target(&self) -> &Path {
        match &self.inner {
            OutputSinkInner::Local(s) => &s.final_path,
        }
    }

    /// Flush, fsync, and commit to the final location.
    pub async fn finish(self) -> StorageResult<()> {
        match self.inner {
            OutputSinkInner::Local(s) => s.finish().await,
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            OutputSinkInner::Local(s) => s.writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            OutputSinkInner::Local(s) => s.writer.flush(),
        }
    }
}

/// Open a streaming output sink at `location` + `rel_path`.
pub async fn open_output_sink(
    location: &StorageLocation,
    rel_path: &Path,
) -> StorageResult<OutputSink> {
    match location {
        StorageLocation::Local(_) => {
            let sink = LocalSink::open(location, rel_path).await?;
            Ok(OutputSink {
                inner: OutputSinkInner::Local(sink),
            })
        }
    }
}
