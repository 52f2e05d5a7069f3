//! Error types.

use thiserror::Error;

/// Errors surfaced by constructors and backend calls.
///
/// Runtime conditions on the input path (a device that would not open, a
/// missing property, an unknown usage, a detach for a device that was never
/// tracked) are logged or ignored and never reach callers as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// The OS refused to open a device (permissions, exclusive access, ...).
    #[error("failed to open HID device {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("invalid report descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[cfg(feature = "hid")]
    #[error("hidapi: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Problems found while walking a HID report descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("item at offset {offset} runs past the end of the descriptor")]
    Truncated { offset: usize },

    #[error("long items are not supported (offset {offset})")]
    LongItem { offset: usize },

    #[error("End Collection without matching Collection at offset {offset}")]
    UnbalancedCollection { offset: usize },

    #[error("Pop without matching Push at offset {offset}")]
    PopWithoutPush { offset: usize },

    #[error("report size {bits} bits at offset {offset} exceeds 32")]
    FieldTooWide { offset: usize, bits: u32 },

    #[error("input report exceeds 65535 bits at offset {offset}")]
    ReportTooLong { offset: usize },
}
