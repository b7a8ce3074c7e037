//! CAN identifier types.

/// Standard 11-bit CAN identifier (0..=0x7FF).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct StandardId(u16);

impl StandardId {
    /// Identifier 0, the highest priority.
    pub const ZERO: Self = StandardId(0);

    /// Identifier 0x7FF, the lowest priority.
    pub const MAX: Self = StandardId(0x7FF);

    /// Tries to create a `StandardId` from a raw 16-bit integer.
    ///
    /// Returns `None` when `raw` is out of range of an 11-bit integer.
    #[inline]
    pub fn new(raw: u16) -> Option<Self> {
        if raw <= 0x7FF {
            Some(StandardId(raw))
        } else {
            None
        }
    }

    /// Creates a `StandardId` without checking that it is in range.
    ///
    /// # Safety
    ///
    /// `raw` must be in the range 0..=0x7FF.
    #[inline]
    pub const unsafe fn new_unchecked(raw: u16) -> Self {
        StandardId(raw)
    }

    /// Returns the identifier as a raw 16-bit integer.
    #[inline]
    pub fn as_raw(&self) -> u16 {
        self.0
    }
}

/// Extended 29-bit CAN identifier (0..=0x1FFF_FFFF).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct ExtendedId(u32);

impl ExtendedId {
    /// Identifier 0, the highest priority.
    pub const ZERO: Self = ExtendedId(0);

    /// Identifier 0x1FFF_FFFF, the lowest priority.
    pub const MAX: Self = ExtendedId(0x1FFF_FFFF);

    /// Tries to create an `ExtendedId` from a raw 32-bit integer.
    ///
    /// Returns `None` when `raw` is out of range of a 29-bit integer.
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        if raw <= 0x1FFF_FFFF {
            Some(ExtendedId(raw))
        } else {
            None
        }
    }

    /// Creates an `ExtendedId` without checking that it is in range.
    ///
    /// # Safety
    ///
    /// `raw` must be in the range 0..=0x1FFF_FFFF.
    #[inline]
    pub const unsafe fn new_unchecked(raw: u32) -> Self {
        ExtendedId(raw)
    }

    /// Returns the identifier as a raw 32-bit integer.
    #[inline]
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the base (standard) part of this extended identifier.
    pub fn standard_id(&self) -> StandardId {
        // The standard id is the upper 11 bits.
        StandardId((self.0 >> 18) as u16)
    }
}

/// A standard or extended CAN identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub enum Id {
    /// Standard 11-bit identifier.
    Standard(StandardId),
    /// Extended 29-bit identifier.
    Extended(ExtendedId),
}

impl From<StandardId> for Id {
    #[inline]
    fn from(id: StandardId) -> Self {
        Id::Standard(id)
    }
}

impl From<ExtendedId> for Id {
    #[inline]
    fn from(id: ExtendedId) -> Self {
        Id::Extended(id)
    }
}
