//! Setup-time error type for agent construction.

use core::fmt;

use ixgbe_hal::AllocError;

use crate::device::DeviceError;

/// Why [`crate::Agent::init`] failed.
///
/// Hot-path operation (`Agent::run`) has no failure modes by design (§7);
/// every error the agent can ever report happens here, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentInitError {
    /// The agent was asked to build with no outputs; at least one is required.
    NoOutputs,
    /// A DMA allocation (the packet buffer, a ring, the mailbox array) failed.
    Alloc(AllocError),
    /// A device refused to bind the input or an output ring.
    Device(DeviceError),
}

impl fmt::Display for AgentInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentInitError::NoOutputs => write!(f, "agent requires at least one output"),
            AgentInitError::Alloc(e) => write!(f, "DMA allocation failed: {e}"),
            AgentInitError::Device(e) => write!(f, "device binding failed: {e}"),
        }
    }
}

impl From<AllocError> for AgentInitError {
    fn from(e: AllocError) -> Self {
        AgentInitError::Alloc(e)
    }
}

impl From<DeviceError> for AgentInitError {
    fn from(e: DeviceError) -> Self {
        AgentInitError::Device(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AgentInitError {}
