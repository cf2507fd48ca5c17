//! Content filtering for files inside downloads.

mod content;
mod prober;

pub use content::{ContentFilter, ExclusionReason, FileVerdict, FilterContext, FilterError};
pub use prober::{FfprobeProber, MediaProber, ProbeError};
