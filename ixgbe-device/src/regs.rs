//! 82599 register offsets and bit definitions.
//!
//! Only the subset the agent's device-binding collaborator needs: global
//! reset/enable, one receive queue's block, and however many transmit
//! queues are bound. Offsets and field layout follow the datasheet's
//! per-queue 64-byte stride (`RegistersRx`/`RegistersTx` in the hardware
//! reference); everything outside this subset (flow control, DCB, RSS,
//! MSI-X, statistics) is out of scope (§1 Non-goals: flow steering/RSS).

/// Device Control Register.
pub const CTRL: u32 = 0x0000;
/// Device Status Register.
pub const STATUS: u32 = 0x0008;
/// Extended Device Control Register.
pub const CTRL_EXT: u32 = 0x0018;

/// CTRL: link reset.
pub const CTRL_LRST: u32 = 1 << 3;
/// CTRL: full device reset. Self-clearing; software polls for it to read 0.
pub const CTRL_RST: u32 = 1 << 26;

/// Filter Control Register: accept all unicast/multicast/broadcast traffic.
pub const FCTRL: u32 = 0x5080;
pub const FCTRL_MPE: u32 = 1 << 8;
pub const FCTRL_UPE: u32 = 1 << 9;
pub const FCTRL_BAM: u32 = 1 << 10;

/// Receive DMA Control Register.
pub const RDRXCTL: u32 = 0x2F00;
/// Strip the Ethernet CRC from received frames before DMA.
pub const RDRXCTL_CRC_STRIP: u32 = 1;

/// MAC Core Control 0.
pub const HLREG0: u32 = 0x4240;
pub const HLREG0_TXCRCEN: u32 = 1;
pub const HLREG0_TXPADEN: u32 = 1 << 10;

/// Receive Packet Buffer Size 0 (one packet buffer is enough without DCB/RSS).
pub const RXPBSIZE0: u32 = 0x3C00;
pub const RXPBSIZE_512KB: u32 = 0x200 << 10;
/// Transmit Packet Buffer Size 0.
pub const TXPBSIZE0: u32 = 0xCC00;
pub const TXPBSIZE_160KB: u32 = 0xA0 << 10;
/// DCB arbiters must be disabled for the single-queue, no-DCB configuration
/// this agent uses.
pub const RTTDCS: u32 = 0x4900;
pub const RTTDCS_ARBDIS: u32 = 1 << 6;

/// DMA Tx Control.
pub const DMATXCTL: u32 = 0x4A80;
pub const DMATXCTL_TE: u32 = 1;

const RX_QUEUE_STRIDE: u32 = 0x40;
const RX_QUEUE_BASE: u32 = 0x1000;
const TX_QUEUE_STRIDE: u32 = 0x40;
const TX_QUEUE_BASE: u32 = 0x6000;

/// How many receive queues this agent's device binding supports.
///
/// The core uses exactly one receive queue per device (§1 Non-goals:
/// "flow steering or RSS across multiple receive queues"); queue 0 is the
/// only one ever bound.
pub const MAX_RX_QUEUES: u8 = 1;

/// How many transmit queues a single device can have bound. The 82599
/// supports up to 128; this agent only ever needs as many as it has
/// outputs sharing one physical NIC, so a small fixed cap keeps the
/// device-side bookkeeping simple.
pub const MAX_TX_QUEUES: u8 = 16;

/// Byte offset of receive queue `n`'s register block.
pub fn rx_queue_base(n: u8) -> u32 {
    RX_QUEUE_BASE + (n as u32) * RX_QUEUE_STRIDE
}

/// Byte offset of transmit queue `n`'s register block.
pub fn tx_queue_base(n: u8) -> u32 {
    TX_QUEUE_BASE + (n as u32) * TX_QUEUE_STRIDE
}

// Field offsets within a receive queue's 64-byte block.
pub const RDBAL: u32 = 0x00;
pub const RDBAH: u32 = 0x04;
pub const RDLEN: u32 = 0x08;
pub const RDH: u32 = 0x10;
pub const SRRCTL: u32 = 0x14;
pub const RDT: u32 = 0x18;
pub const RXDCTL: u32 = 0x28;

pub const RXDCTL_ENABLE: u32 = 1 << 25;
/// SRRCTL: legacy descriptor type (vs. advanced/header-split).
pub const SRRCTL_DESCTYPE_LEGACY: u32 = 0;

// Field offsets within a transmit queue's 64-byte block.
pub const TDBAL: u32 = 0x00;
pub const TDBAH: u32 = 0x04;
pub const TDLEN: u32 = 0x08;
pub const TDH: u32 = 0x10;
pub const TDT: u32 = 0x18;
pub const TXDCTL: u32 = 0x28;
pub const TDWBAL: u32 = 0x38;
pub const TDWBAH: u32 = 0x3C;

pub const TXDCTL_ENABLE: u32 = 1 << 25;
/// TDWBAL low bit: enable "head writeback", the mechanism that makes the
/// transmit-head mailbox this agent's recycle protocol depends on.
pub const TDWBAL_HEAD_WB_ENABLE: u32 = 1;
