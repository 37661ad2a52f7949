//! Transport error types

use core::fmt;

/// Link operation result type
pub type Result<T> = core::result::Result<T, LinkError>;

/// Transport error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Empty or otherwise invalid input
    InvalidArgument,
    /// Bounded packet queue is full
    QueueFull,
    /// Packet payload allocation failed
    AllocationFailure,
    /// Buffer pool has no free block
    Exhausted,
    /// Device is not ready for the requested operation
    NotReady,
    /// Device operation timed out
    Timeout,
    /// Underlying device or driver reported a failure
    Device,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::QueueFull => write!(f, "Packet queue full"),
            Self::AllocationFailure => write!(f, "Packet allocation failed"),
            Self::Exhausted => write!(f, "Buffer pool exhausted"),
            Self::NotReady => write!(f, "Device not ready"),
            Self::Timeout => write!(f, "Device operation timed out"),
            Self::Device => write!(f, "Device failure"),
        }
    }
}

impl std::error::Error for LinkError {}
