//! Static, no-alloc DMA memory pool.
//!
//! Backs every allocation the agent makes at `init` time: the ring arrays,
//! the packet buffer, and the transmit-head mailboxes all come out of one
//! [`BufferPool`]. The pool itself never frees; it is a bump allocator over
//! a caller-supplied backing region, because the agent never frees DMA
//! memory during its lifetime either (§3 of the design: "no allocation
//! occurs" once the hot path begins).
//!
//! The pool does not know how to translate a virtual address to a physical
//! one — that mapping is platform-specific (hugetlbfs + `/proc/self/pagemap`
//! on Linux, an identity map on bare metal, a VFIO IOMMU mapping under
//! virtualization) so it is supplied by the caller as a plain closure.

#![cfg_attr(not(feature = "std"), no_std)]

use core::ptr::NonNull;

use ixgbe_hal::{AllocError, DmaAllocator, PhysAddr};

/// Suggested maximum size, in bytes, for a single pool's backing region.
///
/// Not enforced by [`BufferPool`] itself; callers sizing a hugepage mapping
/// or a bare-metal reserved region can use this as a sane upper bound for a
/// single input+outputs agent (a handful of 256-entry rings plus their
/// packet buffers comfortably fits in a few megabytes).
pub const MAX_POOL_SIZE: usize = 64 * 1024 * 1024;

/// Cache line size assumed for alignment of hardware-shared structures
/// (transmit-head mailboxes in particular: each must sit alone on a line so
/// software polling one doesn't false-share with DMA writes to a neighbor).
pub const CACHE_LINE_SIZE: usize = 64;

/// A bump allocator over a single physically-contiguous backing region.
///
/// `translate` must return, for any pointer inside `backing`, the physical
/// address a DMA-capable device should use to reach that byte. The pool
/// assumes the whole backing region is physically contiguous; it does not
/// attempt to allocate physical pages itself.
pub struct BufferPool<'a, F>
where
    F: Fn(*const u8) -> PhysAddr,
{
    backing: &'a mut [u8],
    translate: F,
    offset: usize,
}

impl<'a, F> BufferPool<'a, F>
where
    F: Fn(*const u8) -> PhysAddr,
{
    /// Wrap a backing region that is already physically contiguous and
    /// DMA-capable (hugepage-backed, identity-mapped, or IOMMU-mapped).
    pub fn new(backing: &'a mut [u8], translate: F) -> Self {
        Self {
            backing,
            translate,
            offset: 0,
        }
    }

    /// Bytes remaining before the pool is exhausted.
    pub fn remaining(&self) -> usize {
        self.backing.len().saturating_sub(self.offset)
    }

    fn align_offset(&self, align: usize) -> usize {
        (self.offset + align - 1) & !(align - 1)
    }
}

impl<'a, F> DmaAllocator for BufferPool<'a, F>
where
    F: Fn(*const u8) -> PhysAddr,
{
    fn allocate_contiguous(
        &mut self,
        size: usize,
        align: usize,
    ) -> Result<(NonNull<u8>, PhysAddr), AllocError> {
        if align == 0 || !align.is_power_of_two() {
            return Err(AllocError::UnsupportedLayout {
                requested: size,
                align,
            });
        }

        let aligned_start = self.align_offset(align);
        let end = aligned_start
            .checked_add(size)
            .ok_or(AllocError::OutOfMemory { requested: size })?;
        if end > self.backing.len() {
            log::error!(
                "DMA pool exhausted: requested {size} bytes aligned to {align}, \
                 {remaining} remaining",
                remaining = self.remaining()
            );
            return Err(AllocError::OutOfMemory { requested: size });
        }

        let ptr = unsafe { self.backing.as_mut_ptr().add(aligned_start) };
        self.offset = end;

        // Safety: the region [aligned_start, end) lies within `backing`,
        // which the caller guarantees is DMA-capable and physically
        // contiguous for its whole length.
        self.backing[aligned_start..end].fill(0);
        let phys = (self.translate)(ptr as *const u8);
        log::debug!("DMA pool: allocated {size} bytes at phys {phys:#x}", phys = phys);

        // `ptr` is non-null: it is derived from `backing`, a live slice.
        Ok((unsafe { NonNull::new_unchecked(ptr) }, phys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_translate(ptr: *const u8) -> PhysAddr {
        PhysAddr(ptr as u64)
    }

    #[test]
    fn allocates_non_overlapping_regions() {
        let mut backing = [0u8; 4096];
        let mut pool = BufferPool::new(&mut backing, identity_translate);

        let (a, phys_a) = pool.allocate_contiguous(64, CACHE_LINE_SIZE).unwrap();
        let (b, phys_b) = pool.allocate_contiguous(128, CACHE_LINE_SIZE).unwrap();

        assert_ne!(a.as_ptr(), b.as_ptr());
        assert_eq!(phys_a.as_u64() + 64, phys_b.as_u64());
    }

    #[test]
    fn aligns_to_cache_line() {
        let mut backing = [0u8; 4096];
        let mut pool = BufferPool::new(&mut backing, identity_translate);

        let _ = pool.allocate_contiguous(1, CACHE_LINE_SIZE).unwrap();
        let (second, _) = pool.allocate_contiguous(1, CACHE_LINE_SIZE).unwrap();

        assert_eq!(second.as_ptr() as usize % CACHE_LINE_SIZE, 0);
    }

    #[test]
    fn refuses_allocation_past_capacity() {
        let mut backing = [0u8; 128];
        let mut pool = BufferPool::new(&mut backing, identity_translate);

        assert!(pool.allocate_contiguous(256, CACHE_LINE_SIZE).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_alignment() {
        let mut backing = [0u8; 128];
        let mut pool = BufferPool::new(&mut backing, identity_translate);

        assert!(matches!(
            pool.allocate_contiguous(8, 3),
            Err(AllocError::UnsupportedLayout { .. })
        ));
    }
}
