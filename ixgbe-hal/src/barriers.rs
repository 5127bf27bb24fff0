//! Memory barrier primitives.
//!
//! The batched transmit-tail flush (the forwarding loop's step 8) must not
//! be reordered ahead of the descriptor writes it is flushing. On x86_64 the
//! MMIO store itself is strongly ordered and no barrier is required, but the
//! hook exists so a weakly-ordered target can insert one without touching
//! the hot loop.

/// Store fence: all prior stores are globally visible before this returns.
///
/// Call before a batched MMIO tail write on weakly-ordered platforms.
#[inline]
pub fn store_fence() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("sfence", options(nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "x86_64"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::Release);
}

/// Load fence: all prior loads complete before any subsequent load.
///
/// Call after reading hardware-written state (a transmit-head mailbox, a
/// receive descriptor's DD bit) that must be observed before acting on it.
#[inline]
pub fn load_fence() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("lfence", options(nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "x86_64"))]
    core::sync::atomic::fence(core::sync::atomic::Ordering::Acquire);
}
