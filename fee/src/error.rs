use core::fmt;

use crate::driver::FlashStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The `FeeError` type.
pub enum FeeError {
    /// Caller supplied an address outside `[0, density)`. No state was
    /// changed, neither the RAM image nor the persistent region.
    BadAddress,
    /// A driver call returned anything other than `FlashStatus::Complete`.
    /// The RAM image has already been updated by the time this is raised.
    Flash(FlashStatus),
    /// The log region is full and compaction itself could not make room.
    /// Only possible if `density_bytes` leaves no slack at all for the log;
    /// a correctly sized layout never hits this.
    LogFull,
    /// The compile-time/board-config layout itself is not self-consistent
    /// (odd density, density too large, density larger than the backing
    /// pages, ...). Raised by [`crate::config::Layout::new`], never during
    /// normal operation.
    InvalidLayout,
}

/// The result type for `fee`.
pub type Result<T> = core::result::Result<T, FeeError>;

impl fmt::Display for FeeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeError::BadAddress => write!(f, "address out of range"),
            FeeError::Flash(status) => write!(f, "flash driver failure: {:?}", status),
            FeeError::LogFull => write!(f, "write log exhausted, compaction could not recover"),
            FeeError::InvalidLayout => write!(f, "flash layout is not self-consistent"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FeeError {}
