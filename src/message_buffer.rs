//! Message buffer RAM layout.
//!
//! The FlexCAN message RAM is a flat array of 32-bit words. Each message
//! buffer occupies four consecutive words: control/status, identifier and
//! two data words. This module is the only place those offsets and the
//! word-level field encodings are computed.

pub use crate::pac::{MESSAGE_BUFFER_COUNT, RAM_WORDS, WORDS_PER_MESSAGE_BUFFER};

/// Data words per message buffer (8 payload bytes).
pub const DATA_WORDS: usize = 2;

/// Message buffer reserved for transmission.
pub const TRANSMIT_BUFFER: usize = 0;

/// Message buffer armed for reception.
pub const RECEIVE_BUFFER: usize = 4;

/// RAM word index of a buffer's control/status word.
#[inline]
pub const fn control_status_word(buffer: usize) -> usize {
    buffer * WORDS_PER_MESSAGE_BUFFER
}

/// RAM word index of a buffer's identifier word.
#[inline]
pub const fn id_word(buffer: usize) -> usize {
    buffer * WORDS_PER_MESSAGE_BUFFER + 1
}

/// RAM word index of data word `n` (0 or 1) of a buffer.
#[inline]
pub const fn data_word(buffer: usize, n: usize) -> usize {
    buffer * WORDS_PER_MESSAGE_BUFFER + 2 + n
}

/// Message buffer codes, stored in the `CODE` field of the
/// control/status word.
pub mod code {
    /// Rx buffer inactive.
    pub const RX_INACTIVE: u32 = 0x0;
    /// Rx buffer full, a frame is latched.
    pub const RX_FULL: u32 = 0x2;
    /// Rx buffer empty and armed for reception.
    pub const RX_EMPTY: u32 = 0x4;
    /// Rx buffer overwritten before it was read.
    pub const RX_OVERRUN: u32 = 0x6;
    /// Tx buffer inactive.
    pub const TX_INACTIVE: u32 = 0x8;
    /// Activate the buffer to transmit a data frame.
    pub const TX_DATA: u32 = 0xC;
}

/// Fields of the control/status word.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsField {
    /// Message buffer code.
    Code,
    /// Substitute remote request, set in transmitted frames.
    Srr,
    /// Identifier extension.
    Ide,
    /// Remote transmission request.
    Rtr,
    /// Data length code, the frame's byte count.
    Dlc,
    /// Free-running timer value captured when the frame moved.
    Timestamp,
}

impl CsField {
    fn mask(self) -> u32 {
        match self {
            CsField::Code => 0x0F00_0000,
            CsField::Srr => 0x0040_0000,
            CsField::Ide => 0x0020_0000,
            CsField::Rtr => 0x0010_0000,
            CsField::Dlc => 0x000F_0000,
            CsField::Timestamp => 0x0000_FFFF,
        }
    }

    fn shift(self) -> u32 {
        match self {
            CsField::Code => 24,
            CsField::Srr => 22,
            CsField::Ide => 21,
            CsField::Rtr => 20,
            CsField::Dlc => 16,
            CsField::Timestamp => 0,
        }
    }
}

/// View over a message buffer control/status word.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct ControlStatus(pub u32);

impl ControlStatus {
    /// Extracts a field value.
    #[inline]
    pub fn field(self, field: CsField) -> u32 {
        (self.0 & field.mask()) >> field.shift()
    }

    /// Returns a copy with `field` set to `value`.
    #[inline]
    #[must_use = "returns a new word without modifying `self`"]
    pub fn with_field(self, field: CsField, value: u32) -> Self {
        ControlStatus((self.0 & !field.mask()) | (value << field.shift() & field.mask()))
    }
}

/// Fields of the identifier word.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IdField {
    /// Local transmit priority.
    Prio,
    /// Standard 11-bit identifier.
    Standard,
    /// Extended 29-bit identifier.
    Extended,
}

impl IdField {
    fn mask(self) -> u32 {
        match self {
            IdField::Prio => 0xE000_0000,
            IdField::Standard => 0x1FFC_0000,
            IdField::Extended => 0x1FFF_FFFF,
        }
    }

    fn shift(self) -> u32 {
        match self {
            IdField::Prio => 29,
            IdField::Standard => 18,
            IdField::Extended => 0,
        }
    }
}

/// View over a message buffer identifier word.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct IdWord(pub u32);

impl IdWord {
    /// Extracts a field value.
    #[inline]
    pub fn field(self, field: IdField) -> u32 {
        (self.0 & field.mask()) >> field.shift()
    }

    /// Returns a copy with `field` set to `value`.
    #[inline]
    #[must_use = "returns a new word without modifying `self`"]
    pub fn with_field(self, field: IdField, value: u32) -> Self {
        IdWord((self.0 & !field.mask()) | (value << field.shift() & field.mask()))
    }
}
