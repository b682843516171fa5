use thiserror::Error;

/// Errors that can occur when computing results or working with event files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller supplied result settings outside their documented ranges.
    #[error("result settings out of range: {problem}")]
    InvalidSettings {
        /// A human-readable description of the rejected value.
        problem: String,
    },

    /// The file is not a scope_tracker event file.
    #[error("not a scope_tracker event file (bad magic)")]
    BadMagic,

    /// The file was written by an incompatible version of the format.
    #[error("unsupported event file version {0}")]
    UnsupportedVersion(u32),

    /// The file ended before all declared content was read.
    #[error("event file is truncated")]
    Truncated,

    /// The file content does not match its checksum.
    #[error("event file checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        /// The checksum stored in the file footer.
        stored: u32,
        /// The checksum computed over the file payload.
        computed: u32,
    },

    /// An event in the file has an exit timestamp before its enter timestamp.
    #[error("event stream for thread {thread_id} contains an event that exits before it enters")]
    MalformedEventStream {
        /// The persisted identifier of the offending thread.
        thread_id: u64,
    },

    /// Reading or writing the event file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for scope_tracker operations, returning the
/// crate's [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
