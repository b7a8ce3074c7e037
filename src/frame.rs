//! Received frame snapshot.

use crate::id::{ExtendedId, Id, StandardId};
use crate::message_buffer::{ControlStatus, CsField, IdField, IdWord, DATA_WORDS};

/// Snapshot of a received CAN frame.
///
/// This is a plain value copied out of the message buffer RAM; it stays
/// valid after the buffer has been unlocked and overwritten by the next
/// frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct ReceivedFrame {
    code: u8,
    id: Id,
    dlc: u8,
    data: [u32; DATA_WORDS],
    timestamp: u16,
}

impl ReceivedFrame {
    /// Decodes a snapshot from the raw buffer words.
    ///
    /// `timestamp_cs` is the control/status word as re-read after the
    /// data words; the timestamp field is only stable once the frame has
    /// been latched.
    pub(crate) fn from_words(
        cs: ControlStatus,
        id: IdWord,
        data: [u32; DATA_WORDS],
        timestamp_cs: ControlStatus,
    ) -> Self {
        let decoded = if cs.field(CsField::Ide) != 0 {
            Id::Extended(unsafe { ExtendedId::new_unchecked(id.field(IdField::Extended)) })
        } else {
            Id::Standard(unsafe { StandardId::new_unchecked(id.field(IdField::Standard) as u16) })
        };

        ReceivedFrame {
            code: cs.field(CsField::Code) as u8,
            id: decoded,
            dlc: cs.field(CsField::Dlc) as u8,
            data,
            timestamp: timestamp_cs.field(CsField::Timestamp) as u16,
        }
    }

    /// Message buffer code at the time of the read (see
    /// [`message_buffer::code`]).
    ///
    /// [`message_buffer::code`]: ../message_buffer/code/index.html
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Identifier of the frame.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Data length code, the frame's byte count.
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Payload as the two raw data words.
    pub fn data_words(&self) -> [u32; DATA_WORDS] {
        self.data
    }

    /// Payload bytes in wire order (byte 0 is the most significant byte
    /// of the first data word).
    pub fn data_bytes(&self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[0..4].copy_from_slice(&self.data[0].to_be_bytes());
        bytes[4..8].copy_from_slice(&self.data[1].to_be_bytes());
        bytes
    }

    /// Free-running timer value captured when the frame was latched.
    pub fn timestamp(&self) -> u16 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_buffer::code;

    #[test]
    fn decodes_standard_frame() {
        let cs = ControlStatus(0x0208_0000); // RX_FULL, DLC 8
        let id = IdWord(0x511 << 18);
        let ts = ControlStatus(0x0208_BEEF);

        let frame = ReceivedFrame::from_words(cs, id, [0xA511_2233, 0x4455_6677], ts);
        assert_eq!(frame.code(), code::RX_FULL as u8);
        assert_eq!(frame.id(), Id::Standard(StandardId::new(0x511).unwrap()));
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.data_words(), [0xA511_2233, 0x4455_6677]);
        assert_eq!(
            frame.data_bytes(),
            [0xA5, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]
        );
        assert_eq!(frame.timestamp(), 0xBEEF);
    }

    #[test]
    fn decodes_extended_frame() {
        let cs = ControlStatus(0x0224_0000); // RX_FULL, IDE, DLC 4
        let id = IdWord(0x1ABC_DEF0);

        let frame = ReceivedFrame::from_words(cs, id, [0x0102_0304, 0], cs);
        assert_eq!(frame.id(), Id::Extended(ExtendedId::new(0x1ABC_DEF0).unwrap()));
        assert_eq!(frame.dlc(), 4);
    }

    #[test]
    fn snapshot_is_an_independent_value() {
        let cs = ControlStatus(0x0208_0000);
        let id = IdWord(0x511 << 18);
        let frame = ReceivedFrame::from_words(cs, id, [1, 2], cs);
        let copy = frame;
        assert_eq!(copy, frame);
    }
}
