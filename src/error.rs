use std::{error, fmt};

/// Errors surfaced across the grouping pipeline.
///
/// Data-quality problems in the profile (invalid GUIDs, zero-count direct
/// calls, counter length mismatches) are *not* represented here: per the
/// recoverable-failure policy of the pipeline, those are dropped silently
/// and only show up as counters in [`crate::context::Stats`]. Only the two
/// fatal categories reach this type: allocation failure, and malformed
/// persisted state handed back in through the `.gcda.imports` consumer.
#[derive(Debug, Clone)]
pub enum Error {
    /// A `KeyedSet` or `FibHeap` could not grow to hold another element.
    Alloc,
    /// The `.gcda.imports` text format was malformed at the given line.
    ImportsFileFormat(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc => write!(f, "allocation failure"),
            Self::ImportsFileFormat(line) => {
                write!(f, "malformed .gcda.imports line: `{line}`")
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
