//! Resumable upload of a single file.
//!
//! A session moves through `Negotiating -> Transferring -> Complete`, or to
//! `Failed` from either active state. Chunks are sent one at a time in
//! ascending offset order; the first failed chunk aborts the session. The
//! remote session is not cleaned up and never resumed.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use driveup_auth::HttpResponse;
use driveup_common::{DriveId, Error, Result};

use crate::drive::{DriveClient, DriveFile};
use crate::plan::{ChunkPlan, ChunkRange};

/// MIME type used when the file name gives no hint.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressFn<'a> = Box<dyn FnMut(u64, u64) + Send + 'a>;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Asking Drive for a session URI.
    Negotiating,
    /// Sending chunks; `next_offset` is the first byte not yet acknowledged.
    Transferring {
        session_uri: String,
        next_offset: u64,
    },
    /// Every chunk was acknowledged.
    Complete,
    /// Negotiation or a chunk failed.
    Failed,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name the file was stored under.
    pub name: String,
    /// Folder it was stored in.
    pub parent: DriveId,
    /// Bytes sent.
    pub size: u64,
    /// Chunk requests sent.
    pub chunks: u64,
    /// Metadata Drive returned with the final chunk, when it sent any.
    pub file: Option<DriveFile>,
}

/// Upload of one local file into one Drive folder.
pub struct ResumableUploadSession<'a> {
    drive: &'a DriveClient,
    source: PathBuf,
    parent: DriveId,
    name: String,
    mime_type: String,
    chunk_size: Option<u64>,
    progress: Option<ProgressFn<'a>>,
    state: SessionState,
}

impl<'a> ResumableUploadSession<'a> {
    /// Prepare an upload of `source` into `parent`.
    ///
    /// The remote name is the file's base name; the MIME type is guessed from
    /// its extension.
    ///
    /// # Errors
    /// - `source` has no file name or it is not valid UTF-8
    pub fn new(drive: &'a DriveClient, source: impl AsRef<Path>, parent: DriveId) -> Result<Self> {
        let source = source.as_ref().to_path_buf();
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!("No usable file name in {}", source.display()))
            })?
            .to_string();
        let mime_type = guess_mime_type(&name);

        Ok(Self {
            drive,
            source,
            parent,
            name,
            mime_type,
            chunk_size: None,
            progress: None,
            state: SessionState::Negotiating,
        })
    }

    /// Use a fixed chunk size instead of the derived one.
    pub fn with_chunk_size(mut self, chunk_size: Option<u64>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Call `progress` after every acknowledged chunk.
    pub fn on_progress(mut self, progress: impl FnMut(u64, u64) + Send + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Remote file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type declared to Drive.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Run the upload to completion.
    ///
    /// The source file is opened before negotiation and closed on return,
    /// whether the upload succeeded or not.
    ///
    /// # Errors
    /// - `SessionInit` if no session could be opened
    /// - `ChunkTransfer` for the first chunk that failed
    /// - `InvalidInput` for a zero chunk size or a session that already ran
    /// - I/O errors opening the source
    pub async fn upload(&mut self) -> Result<UploadedFile> {
        if self.state != SessionState::Negotiating {
            return Err(Error::InvalidInput(format!(
                "Upload session for {} already ran",
                self.source.display()
            )));
        }

        let result = self.run().await;
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    async fn run(&mut self) -> Result<UploadedFile> {
        let mut file = File::open(&self.source).await?;
        let total = file.metadata().await?.len();

        let plan = match self.chunk_size {
            Some(chunk_size) => ChunkPlan::new(total, chunk_size)?,
            None => ChunkPlan::with_default_chunking(total),
        };

        info!(
            file = %self.source.display(),
            parent = %self.parent,
            size = total,
            chunks = plan.len(),
            "Uploading"
        );

        let session_uri = self
            .drive
            .start_resumable_upload(&self.name, &self.parent, &self.mime_type)
            .await?;
        self.state = SessionState::Transferring {
            session_uri: session_uri.clone(),
            next_offset: 0,
        };

        let last = if plan.is_empty() {
            let response = self.drive.finalize_empty_upload(&session_uri).await?;
            self.report_progress(0, 0);
            Some(response)
        } else {
            let mut last = None;
            for range in plan.iter() {
                let data = read_range(&mut file, range).await.map_err(|e| {
                    Error::ChunkTransfer {
                        start: range.start,
                        end: range.end,
                        source: Box::new(e),
                    }
                })?;

                let response = self
                    .drive
                    .upload_chunk(&session_uri, range, total, data)
                    .await?;
                debug!(
                    file = %self.name,
                    range = %range.content_range(total),
                    status = response.status,
                    "Chunk acknowledged"
                );

                self.state = SessionState::Transferring {
                    session_uri: session_uri.clone(),
                    next_offset: range.end + 1,
                };
                self.report_progress(range.end + 1, total);
                last = Some(response);
            }
            last
        };

        self.state = SessionState::Complete;
        info!(file = %self.source.display(), size = total, "Upload complete");

        Ok(UploadedFile {
            name: self.name.clone(),
            parent: self.parent.clone(),
            size: total,
            chunks: plan.len().max(1),
            file: last.as_ref().and_then(final_metadata),
        })
    }

    fn report_progress(&mut self, sent: u64, total: u64) {
        if let Some(progress) = self.progress.as_mut() {
            progress(sent, total);
        }
    }
}

/// MIME type for a file name, falling back to octet-stream.
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string())
}

async fn read_range(file: &mut File, range: ChunkRange) -> Result<Vec<u8>> {
    let len = usize::try_from(range.len())
        .map_err(|_| Error::InvalidInput(format!("Chunk of {} bytes is too large", range.len())))?;
    let mut data = vec![0u8; len];
    file.seek(SeekFrom::Start(range.start)).await?;
    file.read_exact(&mut data).await?;
    Ok(data)
}

fn final_metadata(response: &HttpResponse) -> Option<DriveFile> {
    if (200..300).contains(&response.status) {
        response.json().ok()
    } else {
        None
    }
}
