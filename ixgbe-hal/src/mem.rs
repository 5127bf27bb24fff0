//! DMA memory allocation contract.
//!
//! The core never allocates after setup; everything it touches at runtime
//! came from one of these calls made once during `Agent::init`.

use core::fmt;
use core::ptr::NonNull;

/// A physical (bus) address, as seen by a DMA-capable device.
///
/// Deliberately not `Deref`-able to `u64`: a physical address should never
/// be used as a CPU pointer without going through the allocator that handed
/// it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Setup-time allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The pool or backing region has no space left for a request of this size.
    OutOfMemory { requested: usize },
    /// The requested size or alignment cannot be satisfied by this allocator.
    UnsupportedLayout { requested: usize, align: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory { requested } => {
                write!(f, "out of DMA memory (requested {requested} bytes)")
            }
            AllocError::UnsupportedLayout { requested, align } => {
                write!(f, "cannot satisfy layout: {requested} bytes aligned to {align}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Allocates DMA-capable, physically contiguous memory.
///
/// Implementations never return `Ok` for memory that can move or be paged
/// out for the lifetime of the returned pointer: the core assumes the
/// virtual-to-physical mapping it is handed at allocation time never
/// changes.
pub trait DmaAllocator {
    /// Allocate `size` bytes, `align`-aligned, returning both the CPU
    /// pointer and the physical address the device should use.
    fn allocate_contiguous(
        &mut self,
        size: usize,
        align: usize,
    ) -> Result<(NonNull<u8>, PhysAddr), AllocError>;
}
