use std::io;

use thiserror::Error;

use crate::common::FrameId;

/// Errors surfaced by the storage core.
///
/// Availability-style failures (no evictable frame, full page) are reported
/// through `Option` and `bool` returns instead; only bounds violations and
/// I/O failures are worth carrying a payload for.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("frame id {0} is out of range")]
    OutOfRange(FrameId),

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}
