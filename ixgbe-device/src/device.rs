//! [`Ixgbe82599`]: a PCI-enumerated 82599 controller implementing
//! `ixgbe_core::Device`.
//!
//! Bring-up follows the same shape as resetting any Intel NIC generation:
//! assert a full reset and wait for it to self-clear, then program the
//! receive and transmit data paths before any queue is bound. What's
//! specific to the 82599 is the register set (`crate::regs`) and the
//! single-receive-queue, head-writeback transmit configuration this agent
//! needs; nothing here attempts link/PHY/SFP+ autonegotiation; the agent's
//! forwarding loop does not care whether the link is up; that is left to
//! whatever brings the port up before the agent starts polling it.

use core::ptr::NonNull;

use ixgbe_core::{Device, DeviceError, TailRegister};
use ixgbe_hal::{mmio, PhysAddr};

use crate::regs;

/// Number of poll iterations to wait for a self-clearing bit before giving
/// up. There's no clock available in this no_std context to bound this by
/// wall time, so it's a generous iteration count instead.
const RESET_POLL_ITERATIONS: u32 = 1_000_000;

/// A live 82599 controller, its MMIO space mapped at a known virtual base.
pub struct Ixgbe82599 {
    mmio_base: NonNull<u8>,
    rx_queue_bound: bool,
    next_tx_queue: u8,
}

// Safety: the controller is only ever touched by the single thread that owns
// the agent built from it; MMIO accesses are volatile and device-ordered.
unsafe impl Send for Ixgbe82599 {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpError {
    /// `CTRL.RST` did not self-clear within the poll budget.
    ResetTimedOut,
}

impl core::fmt::Display for BringUpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BringUpError::ResetTimedOut => write!(f, "82599 reset did not complete"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BringUpError {}

impl Ixgbe82599 {
    /// Take ownership of an already-mapped BAR0 and bring the controller up.
    ///
    /// # Safety
    /// `mmio_base` must be a valid mapping of the device's BAR0, large
    /// enough to cover every register this module touches, for as long as
    /// the returned value is alive.
    pub unsafe fn new(mmio_base: NonNull<u8>) -> Result<Self, BringUpError> {
        let mut dev = Self {
            mmio_base,
            rx_queue_bound: false,
            next_tx_queue: 0,
        };
        dev.reset()?;
        dev.configure_receive_path();
        dev.configure_transmit_path();
        Ok(dev)
    }

    #[inline]
    unsafe fn reg(&self, offset: u32) -> NonNull<u32> {
        NonNull::new_unchecked(self.mmio_base.as_ptr().add(offset as usize) as *mut u32)
    }

    #[inline]
    unsafe fn read(&self, offset: u32) -> u32 {
        mmio::read32(self.reg(offset).as_ptr())
    }

    #[inline]
    unsafe fn write(&self, offset: u32, value: u32) {
        mmio::write32(self.reg(offset).as_ptr(), value)
    }

    fn reset(&mut self) -> Result<(), BringUpError> {
        unsafe {
            let ctrl = self.read(regs::CTRL);
            self.write(regs::CTRL, ctrl | regs::CTRL_RST | regs::CTRL_LRST);

            for _ in 0..RESET_POLL_ITERATIONS {
                if self.read(regs::CTRL) & regs::CTRL_RST == 0 {
                    log::info!("82599 reset complete");
                    return Ok(());
                }
                core::hint::spin_loop();
            }
        }
        log::error!("82599 reset did not self-clear");
        Err(BringUpError::ResetTimedOut)
    }

    fn configure_receive_path(&mut self) {
        unsafe {
            // Accept everything the classifier might want to see; this
            // agent filters by forwarding decision, not by NIC filter.
            self.write(
                regs::FCTRL,
                regs::FCTRL_BAM | regs::FCTRL_UPE | regs::FCTRL_MPE,
            );
            let rdrxctl = self.read(regs::RDRXCTL);
            self.write(regs::RDRXCTL, rdrxctl | regs::RDRXCTL_CRC_STRIP);
            self.write(regs::RXPBSIZE0, regs::RXPBSIZE_512KB);
        }
        log::debug!("82599 receive path configured");
    }

    fn configure_transmit_path(&mut self) {
        unsafe {
            let hlreg0 = self.read(regs::HLREG0);
            self.write(
                regs::HLREG0,
                hlreg0 | regs::HLREG0_TXCRCEN | regs::HLREG0_TXPADEN,
            );
            self.write(regs::TXPBSIZE0, regs::TXPBSIZE_160KB);

            let rttdcs = self.read(regs::RTTDCS);
            self.write(regs::RTTDCS, rttdcs | regs::RTTDCS_ARBDIS);

            let dmatxctl = self.read(regs::DMATXCTL);
            self.write(regs::DMATXCTL, dmatxctl | regs::DMATXCTL_TE);
        }
        log::debug!("82599 transmit path configured");
    }

    unsafe fn tail_register(&self, queue_tail_offset: u32) -> TailRegister<'_> {
        TailRegister::new(self.reg(queue_tail_offset))
    }
}

impl Device for Ixgbe82599 {
    fn add_input(
        &mut self,
        ring_addr: PhysAddr,
        ring_len: usize,
    ) -> Result<TailRegister<'_>, DeviceError> {
        if self.rx_queue_bound {
            return Err(DeviceError::NoQueueAvailable);
        }
        if ring_addr.as_u64() & 0xF != 0 {
            return Err(DeviceError::InvalidRingAddress);
        }

        let base = regs::rx_queue_base(0);
        let ring_bytes = (ring_len * core::mem::size_of::<ixgbe_core::Descriptor>()) as u32;

        unsafe {
            self.write(base + regs::RDBAL, ring_addr.as_u64() as u32);
            self.write(base + regs::RDBAH, (ring_addr.as_u64() >> 32) as u32);
            self.write(base + regs::RDLEN, ring_bytes);
            self.write(base + regs::SRRCTL, regs::SRRCTL_DESCTYPE_LEGACY);

            let rxdctl = self.read(base + regs::RXDCTL);
            self.write(base + regs::RXDCTL, rxdctl | regs::RXDCTL_ENABLE);

            // RDH/RDT both start at 0: no descriptors are yet handed to
            // hardware. The agent's recycle protocol advances RDT.
            self.write(base + regs::RDH, 0);
            self.write(base + regs::RDT, 0);

            self.rx_queue_bound = true;
            log::info!("bound receive queue 0, ring {ring_len} descriptors at {ring_addr:#x}");
            Ok(self.tail_register(base + regs::RDT))
        }
    }

    fn add_output(
        &mut self,
        ring_addr: PhysAddr,
        ring_len: usize,
        head_mailbox: PhysAddr,
    ) -> Result<TailRegister<'_>, DeviceError> {
        if self.next_tx_queue >= regs::MAX_TX_QUEUES {
            return Err(DeviceError::NoQueueAvailable);
        }
        if ring_addr.as_u64() & 0xF != 0 || head_mailbox.as_u64() & 0x3 != 0 {
            return Err(DeviceError::InvalidRingAddress);
        }

        let n = self.next_tx_queue;
        let base = regs::tx_queue_base(n);
        let ring_bytes = (ring_len * core::mem::size_of::<ixgbe_core::Descriptor>()) as u32;

        unsafe {
            self.write(base + regs::TDBAL, ring_addr.as_u64() as u32);
            self.write(base + regs::TDBAH, (ring_addr.as_u64() >> 32) as u32);
            self.write(base + regs::TDLEN, ring_bytes);

            self.write(
                base + regs::TDWBAL,
                (head_mailbox.as_u64() as u32) | regs::TDWBAL_HEAD_WB_ENABLE,
            );
            self.write(base + regs::TDWBAH, (head_mailbox.as_u64() >> 32) as u32);

            self.write(base + regs::TDH, 0);
            self.write(base + regs::TDT, 0);

            let txdctl = self.read(base + regs::TXDCTL);
            self.write(base + regs::TXDCTL, txdctl | regs::TXDCTL_ENABLE);

            self.next_tx_queue += 1;
            log::info!(
                "bound transmit queue {n}, ring {ring_len} descriptors at {ring_addr:#x}, head writeback at {head_mailbox:#x}"
            );
            Ok(self.tail_register(base + regs::TDT))
        }
    }
}
