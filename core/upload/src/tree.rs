//! Mirroring local directory trees into Drive folders.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use driveup_common::{DriveId, Error, Result};

use crate::drive::DriveClient;
use crate::session::ResumableUploadSession;

/// Per-file progress callback: `(path, bytes_sent, total_bytes)`.
pub type TreeProgressFn = Arc<dyn Fn(&Path, u64, u64) + Send + Sync>;

/// Totals for one `upload` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Remote folders created.
    pub folders_created: usize,
    /// Files uploaded.
    pub files_uploaded: usize,
    /// Bytes of file content sent.
    pub bytes_uploaded: u64,
    /// Entries that are neither directories nor regular files (FIFOs,
    /// sockets, devices), left alone.
    pub entries_skipped: usize,
}

impl UploadReport {
    /// Add another report's totals to this one.
    pub fn merge(&mut self, other: &UploadReport) {
        self.folders_created += other.folders_created;
        self.files_uploaded += other.files_uploaded;
        self.bytes_uploaded += other.bytes_uploaded;
        self.entries_skipped += other.entries_skipped;
    }
}

/// Uploads files and directory trees, one entry at a time.
pub struct TreeUploader<'a> {
    drive: &'a DriveClient,
    chunk_size: Option<u64>,
    progress: Option<TreeProgressFn>,
}

impl<'a> TreeUploader<'a> {
    /// Create an uploader sending through `drive`.
    pub fn new(drive: &'a DriveClient) -> Self {
        Self {
            drive,
            chunk_size: None,
            progress: None,
        }
    }

    /// Use a fixed chunk size for every file.
    pub fn with_chunk_size(mut self, chunk_size: Option<u64>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Report per-file progress to `progress`.
    pub fn on_progress(mut self, progress: TreeProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Upload `local_path` into the folder `destination`.
    ///
    /// A directory becomes a new folder named after it, and its children are
    /// uploaded into that folder; a file is uploaded directly. Entries are
    /// processed from a FIFO queue, so each is visited once and every
    /// directory is created before anything inside it. Symlinks are followed.
    /// Entries that are neither directories nor regular files are skipped
    /// with a warning, since reading a FIFO or device would never finish.
    ///
    /// # Errors
    /// - The first failure of any folder creation or file upload; nothing
    ///   after it is attempted
    pub async fn upload(&self, destination: &DriveId, local_path: &Path) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let mut queue = VecDeque::from([(destination.clone(), local_path.to_path_buf())]);

        while let Some((parent, path)) = queue.pop_front() {
            let metadata = fs::metadata(&path).await?;

            if metadata.is_dir() {
                let name = directory_name(&path).await?;
                let folder = self.drive.create_folder(&name, &parent).await?;
                let folder_id = DriveId::new(folder.id)?;
                report.folders_created += 1;

                for child in list_children(&path).await? {
                    queue.push_back((folder_id.clone(), child));
                }
            } else if metadata.is_file() {
                let size = self.upload_file(&path, parent).await?;
                report.files_uploaded += 1;
                report.bytes_uploaded += size;
            } else {
                warn!(path = %path.display(), "Skipping entry that is not a regular file");
                report.entries_skipped += 1;
            }
        }

        info!(
            path = %local_path.display(),
            folders = report.folders_created,
            files = report.files_uploaded,
            bytes = report.bytes_uploaded,
            skipped = report.entries_skipped,
            "Finished"
        );
        Ok(report)
    }

    async fn upload_file(&self, path: &Path, parent: DriveId) -> Result<u64> {
        let mut session = ResumableUploadSession::new(self.drive, path, parent)?
            .with_chunk_size(self.chunk_size);

        if let Some(progress) = &self.progress {
            let progress = progress.clone();
            let path = path.to_path_buf();
            session = session.on_progress(move |sent, total| progress(&path, sent, total));
        }

        let uploaded = session.upload().await?;
        Ok(uploaded.size)
    }
}

/// Base name used for the remote folder.
///
/// Paths like `.` or `dir/..` have no final component of their own, so
/// they are resolved first.
async fn directory_name(path: &Path) -> Result<String> {
    let resolved = match path.file_name() {
        Some(_) => path.to_path_buf(),
        None => fs::canonicalize(path).await?,
    };

    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidInput(format!("No usable folder name for {}", path.display()))
        })
}

/// Direct children of `dir`, sorted by path for a stable upload order.
async fn list_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        children.push(entry.path());
    }
    children.sort();
    debug!(dir = %dir.display(), count = children.len(), "Listed directory");
    Ok(children)
}
