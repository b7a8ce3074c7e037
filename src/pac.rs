//! Hand-written FlexCAN register block.
//!
//! Only the registers this driver touches are named; everything else is
//! padding so the offsets match the S32K14x reference manual.

use vcell::VolatileCell;

const ZERO: VolatileCell<u32> = VolatileCell::new(0);

/// Number of message buffers in the shared RAM region.
pub const MESSAGE_BUFFER_COUNT: usize = 32;

/// 32-bit words occupied by one message buffer.
pub const WORDS_PER_MESSAGE_BUFFER: usize = 4;

/// Total length of the message buffer RAM in words.
pub const RAM_WORDS: usize = MESSAGE_BUFFER_COUNT * WORDS_PER_MESSAGE_BUFFER;

/// FlexCAN register block.
///
/// One of these lives at the base address of every FlexCAN instance
/// (`0x4002_4000`, `0x4002_5000` and `0x4002_B000` on the S32K144).
#[repr(C)]
pub struct RegisterBlock {
    /// Module Configuration Register.
    pub mcr: VolatileCell<u32>,
    /// Control 1 Register (bit timing, clock source).
    pub ctrl1: VolatileCell<u32>,
    /// Free Running Timer. Reading it unlocks the active message buffer.
    pub timer: VolatileCell<u32>,
    _reserved0: [VolatileCell<u32>; 1],
    /// Rx Mailboxes Global Mask Register.
    pub rxmgmask: VolatileCell<u32>,
    /// Rx 14 Mask Register.
    pub rx14mask: VolatileCell<u32>,
    /// Rx 15 Mask Register.
    pub rx15mask: VolatileCell<u32>,
    /// Error Counter.
    pub ecr: VolatileCell<u32>,
    /// Error and Status 1 Register.
    pub esr1: VolatileCell<u32>,
    _reserved1: [VolatileCell<u32>; 1],
    /// Interrupt Masks 1 Register.
    pub imask1: VolatileCell<u32>,
    _reserved2: [VolatileCell<u32>; 1],
    /// Interrupt Flags 1 Register. Write 1 to clear.
    pub iflag1: VolatileCell<u32>,
    /// Control 2 Register.
    pub ctrl2: VolatileCell<u32>,
    /// Error and Status 2 Register.
    pub esr2: VolatileCell<u32>,
    _reserved3: [VolatileCell<u32>; 2],
    /// CRC Register.
    pub crcr: VolatileCell<u32>,
    /// Rx FIFO Global Mask Register.
    pub rxfgmask: VolatileCell<u32>,
    /// Rx FIFO Information Register.
    pub rxfir: VolatileCell<u32>,
    /// CAN Bit Timing Register.
    pub cbt: VolatileCell<u32>,
    _reserved4: [VolatileCell<u32>; 11],
    /// Message buffer RAM, 32 buffers of 4 words each.
    pub ramn: [VolatileCell<u32>; RAM_WORDS],
    _reserved5: [VolatileCell<u32>; 384],
    /// Rx Individual Mask Registers, one per message buffer.
    pub rximr: [VolatileCell<u32>; MESSAGE_BUFFER_COUNT],
}

impl RegisterBlock {
    /// Creates a register block holding the documented power-on reset
    /// values (`MCR` comes up frozen, halted, not ready and with the
    /// freeze mode acknowledged).
    ///
    /// Real hardware is reached through [`Instance::REGISTERS`] instead;
    /// this constructor exists so host tests can run the driver against a
    /// plain in-memory block.
    ///
    /// [`Instance::REGISTERS`]: ../trait.Instance.html
    pub const fn new() -> Self {
        RegisterBlock {
            mcr: VolatileCell::new(mcr::RESET_VALUE),
            ctrl1: ZERO,
            timer: ZERO,
            _reserved0: [ZERO; 1],
            rxmgmask: ZERO,
            rx14mask: ZERO,
            rx15mask: ZERO,
            ecr: ZERO,
            esr1: ZERO,
            _reserved1: [ZERO; 1],
            imask1: ZERO,
            _reserved2: [ZERO; 1],
            iflag1: ZERO,
            ctrl2: ZERO,
            esr2: ZERO,
            _reserved3: [ZERO; 2],
            crcr: ZERO,
            rxfgmask: ZERO,
            rxfir: ZERO,
            cbt: ZERO,
            _reserved4: [ZERO; 11],
            ramn: [ZERO; RAM_WORDS],
            _reserved5: [ZERO; 384],
            rximr: [ZERO; MESSAGE_BUFFER_COUNT],
        }
    }
}

/// `MCR` bit fields.
///
/// Each mask/shift pair is written down exactly once; the driver goes
/// through these accessors instead of repeating magic constants.
pub mod mcr {
    /// Power-on reset value: frozen, halted, not ready, freeze mode
    /// acknowledged, supervisor mode, 16 message buffers.
    pub const RESET_VALUE: u32 = 0x5980_000F;

    /// Module Disable.
    pub const MDIS: u32 = 1 << 31;
    /// Freeze Enable.
    pub const FRZ: u32 = 1 << 30;
    /// Rx FIFO Enable.
    pub const RFEN: u32 = 1 << 29;
    /// Halt FlexCAN.
    pub const HALT: u32 = 1 << 28;
    /// Module Not Ready (read only).
    pub const NOTRDY: u32 = 1 << 27;
    /// Soft Reset.
    pub const SOFTRST: u32 = 1 << 25;
    /// Freeze Mode Acknowledge (read only).
    pub const FRZACK: u32 = 1 << 24;
    /// Self Reception Disable.
    pub const SRXDIS: u32 = 1 << 17;

    const MAXMB_MASK: u32 = 0x7F;

    /// Returns `true` if freeze mode is acknowledged.
    #[inline]
    pub fn freeze_acknowledged(mcr: u32) -> bool {
        mcr & FRZACK != 0
    }

    /// Returns `true` while the module is neither receiving nor
    /// transmitting (disabled, frozen or still synchronizing).
    #[inline]
    pub fn not_ready(mcr: u32) -> bool {
        mcr & NOTRDY != 0
    }

    /// Encodes the highest usable message buffer index.
    #[inline]
    pub fn maxmb(last_buffer: u32) -> u32 {
        last_buffer & MAXMB_MASK
    }
}

/// `CTRL1` bit fields.
pub mod ctrl1 {
    /// CAN Engine Clock Source: set selects the peripheral clock, clear
    /// the oscillator clock.
    pub const CLKSRC: u32 = 1 << 13;
    /// Loop Back Mode.
    pub const LPB: u32 = 1 << 12;

    pub const PRESDIV_SHIFT: u32 = 24;
    pub const RJW_SHIFT: u32 = 22;
    pub const PSEG1_SHIFT: u32 = 19;
    pub const PSEG2_SHIFT: u32 = 16;
    pub const PROPSEG_SHIFT: u32 = 0;

    pub const PRESDIV_MASK: u32 = 0xFF << PRESDIV_SHIFT;
    pub const RJW_MASK: u32 = 0x3 << RJW_SHIFT;
    pub const PSEG1_MASK: u32 = 0x7 << PSEG1_SHIFT;
    pub const PSEG2_MASK: u32 = 0x7 << PSEG2_SHIFT;
    pub const PROPSEG_MASK: u32 = 0x7 << PROPSEG_SHIFT;

    /// Mask covering every bit-timing field.
    pub const TIMING_MASK: u32 =
        PRESDIV_MASK | RJW_MASK | PSEG1_MASK | PSEG2_MASK | PROPSEG_MASK;
}
