//! Identifier acceptance masks.
//!
//! FlexCAN filters incoming identifiers through one individual mask per
//! message buffer (`RXIMR`) intersected with a global mask (`RXMGMASK`).
//! A set mask bit means the corresponding identifier bit must match the
//! value programmed into the receive buffer; a clear bit is a don't-care.

use crate::message_buffer::{IdField, IdWord};
use crate::pac::RegisterBlock;

/// Mask bit requiring the RTR flag to match.
const RTR_BIT: u32 = 1 << 31;
/// Mask bit requiring the IDE flag to match.
const IDE_BIT: u32 = 1 << 30;

/// Individual acceptance mask of one message buffer (`RXIMR`).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct BufferMask(u32);

impl BufferMask {
    /// Every bit checked: the buffer only latches exact matches of its
    /// programmed identifier. This is the reference configuration's
    /// per-buffer default.
    pub const fn check_all() -> Self {
        BufferMask(0xFFFF_FFFF)
    }

    /// No bit checked: the buffer latches any identifier.
    pub const fn accept_all() -> Self {
        BufferMask(0)
    }

    /// Checks the standard identifier field and the IDE flag, so only
    /// standard frames with the buffer's programmed identifier are
    /// latched.
    pub fn std_id_frames() -> Self {
        BufferMask(IDE_BIT | IdWord::default().with_field(IdField::Standard, 0x7FF).0)
    }

    /// Checks all 29 identifier bits and the IDE flag, so only extended
    /// frames with the buffer's programmed identifier are latched.
    pub fn ext_id_frames() -> Self {
        BufferMask(IDE_BIT | IdWord::default().with_field(IdField::Extended, 0x1FFF_FFFF).0)
    }

    /// Additionally requires the RTR flag to match.
    #[must_use = "returns a new mask without modifying `self`"]
    pub fn match_rtr(self) -> Self {
        BufferMask(self.0 | RTR_BIT)
    }

    /// Returns the raw `RXIMR` value.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Global acceptance mask (`RXMGMASK`), intersected with every buffer
/// mask not covered by an individual register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct GlobalMask(u32);

impl GlobalMask {
    /// The reference configuration's global mask: all 29 identifier bits
    /// take part in the comparison, RTR and IDE are don't-care.
    pub const CHECK_ALL_IDS: Self = GlobalMask(0x1FFF_FFFF);

    /// No bit checked.
    pub const fn accept_all() -> Self {
        GlobalMask(0)
    }

    /// Creates a global mask from a raw `RXMGMASK` value.
    pub const fn from_raw(raw: u32) -> Self {
        GlobalMask(raw)
    }

    /// Returns the raw `RXMGMASK` value.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Programs every buffer's individual mask.
///
/// The controller must be in freeze mode; the mask registers are not
/// writable otherwise.
pub(crate) fn apply_buffer_masks(can: &RegisterBlock, mask: BufferMask) {
    for rximr in can.rximr.iter() {
        rximr.set(mask.as_raw());
    }
}

/// Programs the global acceptance mask.
///
/// The controller must be in freeze mode.
pub(crate) fn apply_global_mask(can: &RegisterBlock, mask: GlobalMask) {
    can.rxmgmask.set(mask.as_raw());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_mask_values() {
        // CHECK_ID and CHECK_ALL_ID from the C driver.
        assert_eq!(BufferMask::check_all().as_raw(), 0xFFFF_FFFF);
        assert_eq!(GlobalMask::CHECK_ALL_IDS.as_raw(), 0x1FFF_FFFF);
    }

    #[test]
    fn std_id_mask_covers_field_and_ide() {
        let mask = BufferMask::std_id_frames();
        assert_eq!(mask.as_raw(), 1 << 30 | 0x1FFC_0000);
        assert_eq!(mask.match_rtr().as_raw(), 0xDFFC_0000);
    }

    #[test]
    fn ext_id_mask_covers_all_id_bits() {
        let mask = BufferMask::ext_id_frames();
        assert_eq!(mask.as_raw(), 1 << 30 | 0x1FFF_FFFF);
    }

    #[test]
    fn masks_reach_the_registers() {
        let can = RegisterBlock::new();
        apply_buffer_masks(&can, BufferMask::check_all());
        apply_global_mask(&can, GlobalMask::CHECK_ALL_IDS);

        for rximr in can.rximr.iter() {
            assert_eq!(rximr.get(), 0xFFFF_FFFF);
        }
        assert_eq!(can.rxmgmask.get(), 0x1FFF_FFFF);
    }
}
