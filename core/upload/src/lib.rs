//! Resumable Google Drive uploads for driveup.
//!
//! This crate provides:
//! - Drive API calls for folder creation and resumable upload sessions
//! - Chunk planning over a file's byte range
//! - A sequential, chunked upload session per file
//! - Recursive mirroring of local directory trees into Drive folders

pub mod config;
pub mod drive;
pub mod plan;
pub mod session;
pub mod tree;

pub use config::{DriveEndpoints, UploadConfig};
pub use drive::{DriveClient, DriveFile};
pub use plan::{ChunkPlan, ChunkRange};
pub use session::{ResumableUploadSession, SessionState, UploadedFile};
pub use tree::{TreeProgressFn, TreeUploader, UploadReport};

#[cfg(test)]
pub(crate) mod testing;
