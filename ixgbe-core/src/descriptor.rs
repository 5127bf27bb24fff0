//! Hardware descriptor layout and metadata bit positions.
//!
//! The 82599 legacy descriptor is 16 bytes: a buffer physical address and a
//! metadata word whose meaning depends on whether the ring is serving
//! receive or transmit. Bit positions below are derived from the legacy
//! descriptor's byte-field layout (length/checksum/status/errors/vlan for
//! receive; length/cso/cmd/status/css/vlan for transmit) packed into the
//! second 64-bit word, little-endian.

use volatile::Volatile;

/// A single hardware descriptor: one buffer address, one metadata word.
///
/// Laid out to match the 82599 legacy descriptor exactly (`repr(C)`, two
/// `u64` words, no padding). `addr` is written once at ring construction and
/// never rewritten; `metadata` is read by software on the receive ring and
/// written by software on every transmit ring.
#[repr(C)]
pub struct Descriptor {
    pub addr: Volatile<u64>,
    pub metadata: Volatile<u64>,
}

const _: () = assert!(core::mem::size_of::<Descriptor>() == 16);

// ---------------------------------------------------------------------
// Receive metadata (hardware-written, software-read)
// ---------------------------------------------------------------------

/// Descriptor Done: set by hardware once DMA of the frame into this slot
/// has completed.
pub const RX_METADATA_DD: u64 = 1 << 32;

/// End Of Packet: always set alongside DD on this path (no multi-descriptor
/// frames), kept for datasheet fidelity rather than relied upon.
pub const RX_METADATA_EOP: u64 = 1 << 33;

/// Extract the received frame length (bits 0..16) from a receive metadata word.
#[inline]
pub fn rx_metadata_length(metadata: u64) -> u16 {
    (metadata & 0xFFFF) as u16
}

// ---------------------------------------------------------------------
// Transmit metadata (software-written, never read back)
// ---------------------------------------------------------------------

/// End Of Packet: every transmit descriptor written by this agent is EOP.
pub const TX_METADATA_EOP: u64 = 1 << 24;

/// Insert FCS: ask hardware to append the Ethernet frame check sequence.
pub const TX_METADATA_IFCS: u64 = 1 << 25;

/// Report Status: ask hardware to write this descriptor's index to the
/// transmit-head mailbox once it has been sent.
pub const TX_METADATA_RS: u64 = 1 << 27;

/// Build a transmit metadata word for a frame of the given length.
///
/// `length` of 0 is valid (a drop on this output) and still produces a
/// well-formed EOP+IFCS descriptor so the ring index advances in lockstep.
#[inline]
pub fn tx_metadata(length: u16, report_status: bool) -> u64 {
    let rs = if report_status { TX_METADATA_RS } else { 0 };
    (length as u64 & 0xFFFF) | rs | TX_METADATA_EOP | TX_METADATA_IFCS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_metadata_encodes_length_and_flags() {
        let meta = tx_metadata(100, false);
        assert_eq!(meta & 0xFFFF, 100);
        assert_ne!(meta & TX_METADATA_EOP, 0);
        assert_ne!(meta & TX_METADATA_IFCS, 0);
        assert_eq!(meta & TX_METADATA_RS, 0);
    }

    #[test]
    fn tx_metadata_sets_rs_when_requested() {
        let meta = tx_metadata(0, true);
        assert_ne!(meta & TX_METADATA_RS, 0);
        assert_eq!(meta & 0xFFFF, 0);
    }

    #[test]
    fn rx_metadata_length_masks_to_low_16_bits() {
        let meta = 0x1_0000_1234u64;
        assert_eq!(rx_metadata_length(meta), 0x1234);
    }
}
