//! Driver for the NXP FlexCAN peripheral, as found on the S32K14x family.
//!
//! The driver owns the controller's register block and message buffer RAM
//! and covers bit-timing setup, the freeze-mode initialization sequence,
//! acceptance filter programming and polled transmission/reception on one
//! dedicated message buffer each. Clock gating, pin routing and watchdog
//! handling happen before this driver runs and are out of its hands.
//!
//! A HAL hooks a peripheral up by implementing [`Instance`]:
//!
//! ```
//! pub struct FLEXCAN0 {
//!     _private: (),
//! }
//!
//! unsafe impl flexcan::Instance for FLEXCAN0 {
//!     const REGISTERS: *mut flexcan::RegisterBlock = 0x4002_4000 as *mut _;
//! }
//! ```
//!
//! After [`Can::init`] returns the controller is synchronized to the bus;
//! an external polling loop then drives [`Tx::transmit`] and
//! [`Rx::receive`] off the buffer flag queries.

#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![no_std]

pub mod filter;
mod frame;
mod id;
pub mod message_buffer;
mod pac;
pub mod timing;

pub use crate::frame::ReceivedFrame;
pub use crate::id::{ExtendedId, Id, StandardId};
pub use crate::pac::RegisterBlock;
pub use crate::timing::{BitRate, TimingSegments};

use core::convert::Infallible;
use core::marker::PhantomData;

use crate::filter::{BufferMask, GlobalMask};
use crate::message_buffer::{code, ControlStatus, CsField, IdField, IdWord};
use crate::pac::{ctrl1, mcr};
use crate::timing::BitTiming;

/// A FlexCAN peripheral instance.
///
/// This trait is meant to be implemented for a HAL-specific type that
/// represents ownership of the CAN peripheral (and any pins required by
/// it, although that is entirely up to the HAL).
///
/// # Safety
///
/// It is only safe to implement this trait, when:
///
/// * The implementing type has ownership of the peripheral, preventing any
///   other accesses to the register block.
/// * `REGISTERS` is a pointer to that peripheral's register block and can
///   be safely accessed for as long as ownership or a borrow of the
///   implementing type is present.
pub unsafe trait Instance {
    /// Pointer to the instance's register block.
    const REGISTERS: *mut RegisterBlock;
}

/// The controller never reached the polled-for state.
///
/// Every busy-wait in the initialization sequence is bounded by
/// [`Config::poll_limit`]; hardware that does not acknowledge within the
/// bound surfaces as this error instead of hanging the execution context.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct HardwareNotReady;

/// Clock feeding the CAN engine.
///
/// The source must be selected while the module is disabled; the driver
/// sequences this during [`Can::init`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// The external oscillator clock.
    Oscillator,
    /// The peripheral (bus) clock.
    Peripheral,
}

bitflags::bitflags! {
    /// Message buffer flags backed by `IFLAG1`.
    ///
    /// A set transmit flag means the last requested transmission
    /// completed; a set receive flag means a frame is latched and
    /// waiting to be read.
    pub struct BufferFlags: u32 {
        const TRANSMIT = 1 << message_buffer::TRANSMIT_BUFFER as u32;
        const RECEIVE = 1 << message_buffer::RECEIVE_BUFFER as u32;
    }
}

// In range by construction.
const DEFAULT_TX_ID: StandardId = unsafe { StandardId::new_unchecked(0x555) };
const DEFAULT_RX_ID: StandardId = unsafe { StandardId::new_unchecked(0x511) };

/// Controller configuration consumed by [`Can::init`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct Config {
    /// Clock feeding the CAN engine.
    pub clock_source: ClockSource,
    /// Frequency of that clock in Hz. The clock tree must already be set
    /// up; this is only the number backing the bit-timing arithmetic.
    pub clock_hz: u32,
    /// Nominal bit rate.
    pub bit_rate: BitRate,
    /// Bit segment lengths.
    pub segments: TimingSegments,
    /// Identifier transmitted frames carry.
    pub tx_id: StandardId,
    /// Identifier the receive buffer is armed with.
    pub rx_id: StandardId,
    /// Whether the controller receives its own transmissions.
    pub self_reception: bool,
    /// Internally connect TX to RX, taking the bus out of the loop.
    pub loopback: bool,
    /// Upper bound on every status poll, in register reads.
    pub poll_limit: u32,
}

impl Config {
    /// Creates a configuration with the reference driver's choices:
    /// transmit identifier 0x555, receive identifier 0x511, default
    /// segments, self reception enabled.
    pub fn new(clock_source: ClockSource, clock_hz: u32, bit_rate: BitRate) -> Self {
        Config {
            clock_source,
            clock_hz,
            bit_rate,
            segments: TimingSegments::DEFAULT,
            tx_id: DEFAULT_TX_ID,
            rx_id: DEFAULT_RX_ID,
            self_reception: true,
            loopback: false,
            poll_limit: 10_000,
        }
    }
}

/// Spins on `condition` until it holds, for at most `limit` evaluations.
///
/// This keeps the blocking semantics of a hardware status poll (there is
/// nothing to yield to on bare metal) while making the never-ready case
/// an explicit failure instead of an infinite hang.
fn await_condition(
    limit: u32,
    mut condition: impl FnMut() -> bool,
) -> Result<(), HardwareNotReady> {
    for _ in 0..limit {
        if condition() {
            return Ok(());
        }
    }
    Err(HardwareNotReady)
}

/// Interface to the CAN peripheral.
pub struct Can<I: Instance> {
    _can: PhantomData<I>,
    tx: Option<Tx<I>>,
    rx: Option<Rx<I>>,
}

impl<I> Can<I>
where
    I: Instance,
{
    /// Creates a CAN interface.
    pub fn new() -> Can<I> {
        Can {
            _can: PhantomData,
            tx: Some(Tx {
                _can: PhantomData,
                id: DEFAULT_TX_ID,
            }),
            rx: Some(Rx { _can: PhantomData }),
        }
    }

    fn registers(&self) -> &RegisterBlock {
        unsafe { &*I::REGISTERS }
    }

    /// Runs the full initialization sequence and blocks until the
    /// controller is synchronized to the bus.
    ///
    /// The peripheral clock gate must already be open and the pins
    /// routed. Reinitialization after a successful `init` requires going
    /// through this whole sequence again.
    pub fn init(&mut self, config: &Config) -> Result<(), HardwareNotReady> {
        if let Some(tx) = &mut self.tx {
            tx.id = config.tx_id;
        }
        init_controller(self.registers(), config)
    }

    /// Returns the set buffer flags.
    pub fn pending_flags(&self) -> BufferFlags {
        BufferFlags::from_bits_truncate(self.registers().iflag1.get())
    }

    /// Clears the given buffer flags without disturbing the others.
    pub fn clear_flags(&mut self, flags: BufferFlags) {
        // IFLAG1 is write-1-to-clear.
        self.registers().iflag1.set(flags.bits());
    }

    /// Returns the transmitter interface.
    ///
    /// Only the first call returns a valid transmitter. Subsequent calls
    /// return `None`. Take it after `init` so it carries the configured
    /// transmit identifier.
    pub fn take_tx(&mut self) -> Option<Tx<I>> {
        self.tx.take()
    }

    /// Returns the receiver interface.
    ///
    /// Only the first call returns a valid receiver. Subsequent calls
    /// return `None`.
    pub fn take_rx(&mut self) -> Option<Rx<I>> {
        self.rx.take()
    }
}

impl<I> Default for Can<I>
where
    I: Instance,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Disable, select clock, enable, configure under freeze, unfreeze,
/// synchronize.
fn init_controller(can: &RegisterBlock, config: &Config) -> Result<(), HardwareNotReady> {
    // The clock source may only be changed while the module is disabled;
    // selecting it afterwards yields undefined bit timing.
    can.mcr.set(can.mcr.get() | mcr::MDIS);
    match config.clock_source {
        ClockSource::Oscillator => can.ctrl1.set(can.ctrl1.get() & !ctrl1::CLKSRC),
        ClockSource::Peripheral => can.ctrl1.set(can.ctrl1.get() | ctrl1::CLKSRC),
    }

    // Re-enabling the module drops it into freeze mode on its own; wait
    // for the acknowledge before touching CTRL1 or the RAM.
    can.mcr.set(can.mcr.get() & !mcr::MDIS);
    await_condition(config.poll_limit, || {
        mcr::freeze_acknowledged(can.mcr.get())
    })?;

    let timing = BitTiming::compute(config.clock_hz, config.bit_rate, config.segments);
    let mut ctrl = can.ctrl1.get() & !ctrl1::TIMING_MASK | timing.ctrl1_bits();
    if config.loopback {
        ctrl |= ctrl1::LPB;
    } else {
        ctrl &= !ctrl1::LPB;
    }
    can.ctrl1.set(ctrl);

    // Zero the whole RAM region so no buffer carries a stale state from
    // a previous run.
    for word in can.ramn.iter() {
        word.set(0);
    }

    filter::apply_buffer_masks(can, BufferMask::check_all());
    filter::apply_global_mask(can, GlobalMask::CHECK_ALL_IDS);

    // Arm the receive buffer: EMPTY code plus the identifier to latch.
    let cs = ControlStatus::default().with_field(CsField::Code, code::RX_EMPTY);
    let id = IdWord::default().with_field(IdField::Standard, u32::from(config.rx_id.as_raw()));
    can.ramn[message_buffer::control_status_word(message_buffer::RECEIVE_BUFFER)].set(cs.0);
    can.ramn[message_buffer::id_word(message_buffer::RECEIVE_BUFFER)].set(id.0);

    // Leave freeze mode with a single wholesale store: MAXMB spans all
    // 32 buffers, every request bit (MDIS, FRZ, HALT, SOFTRST) ends up
    // clear, the legacy FIFO and CAN FD stay off. SRXDIS is the one
    // config-dependent bit, so it rides along here; a store to MCR
    // before this point would not survive.
    let mut m = mcr::maxmb(message_buffer::MESSAGE_BUFFER_COUNT as u32 - 1);
    if !config.self_reception {
        m |= mcr::SRXDIS;
    }
    can.mcr.set(m);

    await_condition(config.poll_limit, || {
        !mcr::freeze_acknowledged(can.mcr.get())
    })?;
    await_condition(config.poll_limit, || !mcr::not_ready(can.mcr.get()))
}

/// Interface to the CAN transmitter part.
pub struct Tx<I> {
    _can: PhantomData<I>,
    id: StandardId,
}

impl<I> Tx<I>
where
    I: Instance,
{
    fn registers(&self) -> &RegisterBlock {
        unsafe { &*I::REGISTERS }
    }

    /// Requests transmission of one 8-byte frame given as two data
    /// words, carrying the configured transmit identifier.
    ///
    /// Fire and forget: completion is observed by polling
    /// [`Tx::transmit_complete`], and a request the hardware cannot
    /// honor is not retried at this layer.
    pub fn transmit(&mut self, word0: u32, word1: u32) {
        transmit_words(self.registers(), self.id, word0, word1);
    }

    /// Returns `true` once the last requested transmission completed.
    pub fn transmit_complete(&self) -> bool {
        self.registers().iflag1.get() & BufferFlags::TRANSMIT.bits() != 0
    }
}

fn transmit_words(can: &RegisterBlock, id: StandardId, word0: u32, word1: u32) {
    // Acknowledge any prior completion so the new request does not look
    // stale to the polling loop.
    can.iflag1.set(BufferFlags::TRANSMIT.bits());

    can.ramn[message_buffer::data_word(message_buffer::TRANSMIT_BUFFER, 0)].set(word0);
    can.ramn[message_buffer::data_word(message_buffer::TRANSMIT_BUFFER, 1)].set(word1);

    let id_word = IdWord::default().with_field(IdField::Standard, u32::from(id.as_raw()));
    can.ramn[message_buffer::id_word(message_buffer::TRANSMIT_BUFFER)].set(id_word.0);

    // The control/status store is what activates the buffer, so it goes
    // last: CODE 0xC, SRR for a transmitted frame, DLC 8.
    let cs = ControlStatus::default()
        .with_field(CsField::Code, code::TX_DATA)
        .with_field(CsField::Srr, 1)
        .with_field(CsField::Dlc, 8);
    can.ramn[message_buffer::control_status_word(message_buffer::TRANSMIT_BUFFER)].set(cs.0);
}

/// Interface to the CAN receiver part.
pub struct Rx<I> {
    _can: PhantomData<I>,
}

impl<I> Rx<I>
where
    I: Instance,
{
    fn registers(&self) -> &RegisterBlock {
        unsafe { &*I::REGISTERS }
    }

    /// Returns a received frame once one is latched.
    ///
    /// Returns [`nb::Error::WouldBlock`] while the receive buffer flag
    /// is clear.
    pub fn receive(&mut self) -> nb::Result<ReceivedFrame, Infallible> {
        if !self.frame_pending() {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.read_frame())
    }

    /// Reads the receive buffer unconditionally and unlocks it.
    ///
    /// When no frame arrived since the last call this returns whatever
    /// the buffer holds, which is the previous frame (or the armed,
    /// zeroed state right after init); the hardware offers no way to
    /// tell from the buffer words alone. Check [`Rx::frame_pending`]
    /// first, or use [`Rx::receive`].
    pub fn read_frame(&mut self) -> ReceivedFrame {
        read_receive_buffer(self.registers())
    }

    /// Returns `true` while a latched frame is waiting to be read.
    pub fn frame_pending(&self) -> bool {
        self.registers().iflag1.get() & BufferFlags::RECEIVE.bits() != 0
    }
}

fn read_receive_buffer(can: &RegisterBlock) -> ReceivedFrame {
    let buffer = message_buffer::RECEIVE_BUFFER;

    let cs = ControlStatus(can.ramn[message_buffer::control_status_word(buffer)].get());
    let id = IdWord(can.ramn[message_buffer::id_word(buffer)].get());
    let data = [
        can.ramn[message_buffer::data_word(buffer, 0)].get(),
        can.ramn[message_buffer::data_word(buffer, 1)].get(),
    ];
    // Reading the control/status word locked the buffer; re-read it for
    // the timestamp before releasing.
    let timestamp_cs = ControlStatus(can.ramn[message_buffer::control_status_word(buffer)].get());

    let frame = ReceivedFrame::from_words(cs, id, data, timestamp_cs);

    // Mandatory unlock sequence: the timer read has no payload, but
    // without it the hardware keeps the buffer locked and will not latch
    // the next frame.
    let _ = can.timer.get();
    can.iflag1.set(BufferFlags::RECEIVE.bits());

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_buffer::{
        control_status_word, data_word, id_word, RECEIVE_BUFFER, TRANSMIT_BUFFER,
    };

    fn test_config() -> Config {
        Config::new(ClockSource::Oscillator, 8_000_000, BitRate::B500K)
    }

    #[test]
    fn await_condition_stops_at_the_flip() {
        let mut reads = 0;
        let result = await_condition(100, || {
            reads += 1;
            reads == 7
        });
        assert_eq!(result, Ok(()));
        assert_eq!(reads, 7);
    }

    #[test]
    fn await_condition_bounds_the_spin() {
        let mut reads = 0;
        let result = await_condition(100, || {
            reads += 1;
            false
        });
        assert_eq!(result, Err(HardwareNotReady));
        assert_eq!(reads, 100);
    }

    #[test]
    fn init_reaches_ready() {
        // Out of reset the fake block reports freeze mode acknowledged;
        // the wholesale unfreeze store then clears FRZACK and NOTRDY, so
        // the whole sequence runs through against passive memory.
        let can = RegisterBlock::new();
        assert_eq!(init_controller(&can, &test_config()), Ok(()));

        let m = can.mcr.get();
        assert!(!mcr::freeze_acknowledged(m));
        assert!(!mcr::not_ready(m));
        // No request bit may be left standing after the unfreeze store.
        assert_eq!(m & (mcr::MDIS | mcr::FRZ | mcr::HALT | mcr::SOFTRST), 0);
        assert_eq!(m, 0x1F); // MAXMB 31, everything else clear
    }

    #[test]
    fn init_keeps_self_reception_disabled() {
        // SRXDIS has to survive the wholesale unfreeze store, which
        // overwrites every other MCR bit.
        let can = RegisterBlock::new();
        let mut config = test_config();
        config.self_reception = false;
        init_controller(&can, &config).unwrap();

        let m = can.mcr.get();
        assert_ne!(m & mcr::SRXDIS, 0);
        assert!(!mcr::not_ready(m));
    }

    #[test]
    fn init_programs_the_reference_bit_timing() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        // Oscillator clock keeps CLKSRC clear; 8 MHz / 500 kbit/s at 16
        // quanta is the C driver's CTRL1 value.
        assert_eq!(can.ctrl1.get(), 0x00DB_0006);
    }

    #[test]
    fn init_selects_the_peripheral_clock() {
        let can = RegisterBlock::new();
        let mut config = test_config();
        config.clock_source = ClockSource::Peripheral;
        config.clock_hz = 80_000_000;
        init_controller(&can, &config).unwrap();

        assert_eq!(can.ctrl1.get() & ctrl1::CLKSRC, ctrl1::CLKSRC);
    }

    #[test]
    fn init_arms_filters_and_receive_buffer() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        for rximr in can.rximr.iter() {
            assert_eq!(rximr.get(), 0xFFFF_FFFF);
        }
        assert_eq!(can.rxmgmask.get(), 0x1FFF_FFFF);

        // The receive buffer is armed, every other RAM word is zero.
        for (i, word) in can.ramn.iter().enumerate() {
            let expected = match i {
                _ if i == control_status_word(RECEIVE_BUFFER) => 0x0400_0000,
                _ if i == id_word(RECEIVE_BUFFER) => 0x1444_0000,
                _ => 0,
            };
            assert_eq!(word.get(), expected, "RAM word {}", i);
        }
    }

    #[test]
    fn init_fails_when_never_acknowledged() {
        // FRZACK stays clear: a controller that never enters freeze mode
        // must surface as an error, not as an infinite spin. This only
        // passes because the poll tests the FRZACK bit itself rather
        // than the whole register (the C original's `&&` slip).
        let can = RegisterBlock::new();
        can.mcr.set(mcr::RESET_VALUE & !mcr::FRZACK);

        let mut config = test_config();
        config.poll_limit = 50;
        assert_eq!(init_controller(&can, &config), Err(HardwareNotReady));
    }

    #[test]
    fn transmit_writes_the_reference_words() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        let id = StandardId::new(0x555).unwrap();
        transmit_words(&can, id, 0xA511_2233, 0x4455_6677);

        assert_eq!(can.ramn[data_word(TRANSMIT_BUFFER, 0)].get(), 0xA511_2233);
        assert_eq!(can.ramn[data_word(TRANSMIT_BUFFER, 1)].get(), 0x4455_6677);
        assert_eq!(can.ramn[id_word(TRANSMIT_BUFFER)].get(), 0x1554_0000);
        assert_eq!(
            can.ramn[control_status_word(TRANSMIT_BUFFER)].get(),
            0x0C40_0000 | 8 << 16
        );
        // The pending completion flag was acknowledged up front.
        assert_eq!(can.iflag1.get(), BufferFlags::TRANSMIT.bits());
    }

    /// Copies the transmit buffer into the receive buffer the way the
    /// self-reception path would latch it.
    fn loop_back(can: &RegisterBlock, timestamp: u32) {
        let cs = ControlStatus::default()
            .with_field(CsField::Code, code::RX_FULL)
            .with_field(CsField::Dlc, 8)
            .with_field(CsField::Timestamp, timestamp);
        can.ramn[control_status_word(RECEIVE_BUFFER)].set(cs.0);
        can.ramn[id_word(RECEIVE_BUFFER)].set(can.ramn[id_word(TRANSMIT_BUFFER)].get());
        for n in 0..2 {
            can.ramn[data_word(RECEIVE_BUFFER, n)]
                .set(can.ramn[data_word(TRANSMIT_BUFFER, n)].get());
        }
        can.iflag1
            .set(can.iflag1.get() | BufferFlags::RECEIVE.bits());
    }

    #[test]
    fn transmit_receive_round_trip() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        let id = StandardId::new(0x555).unwrap();
        transmit_words(&can, id, 0xA511_2233, 0x4455_6677);
        loop_back(&can, 0x0042);

        let frame = read_receive_buffer(&can);
        assert_eq!(frame.data_words(), [0xA511_2233, 0x4455_6677]);
        assert_eq!(frame.id(), Id::Standard(id));
        assert_eq!(frame.dlc(), 8);
        assert_eq!(frame.code(), code::RX_FULL as u8);
        assert_eq!(frame.timestamp(), 0x0042);
    }

    #[test]
    fn unlock_is_idempotent_for_returned_snapshots() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        transmit_words(&can, StandardId::new(0x555).unwrap(), 1, 2);
        loop_back(&can, 0);

        let first = read_receive_buffer(&can);
        // No new frame arrived; reading (and unlocking) again must not
        // disturb the snapshot already handed out.
        let second = read_receive_buffer(&can);
        assert_eq!(first, second);
        assert_eq!(first.data_words(), [1, 2]);
    }

    #[test]
    fn stale_read_returns_the_previous_frame() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        transmit_words(
            &can,
            StandardId::new(0x555).unwrap(),
            0xDEAD_BEEF,
            0x0BAD_F00D,
        );
        loop_back(&can, 0);
        let frame = read_receive_buffer(&can);

        // Flag cleared, nothing new latched: the documented sharp edge
        // is that the prior contents come back, not an error.
        let stale = read_receive_buffer(&can);
        assert_eq!(stale.data_words(), frame.data_words());
        assert_eq!(stale.id(), frame.id());
    }

    #[test]
    fn flag_queries_track_iflag1() {
        let can = RegisterBlock::new();
        init_controller(&can, &test_config()).unwrap();

        assert_eq!(can.iflag1.get() & BufferFlags::RECEIVE.bits(), 0);
        loop_back(&can, 0);
        assert_ne!(can.iflag1.get() & BufferFlags::RECEIVE.bits(), 0);

        assert_eq!(
            BufferFlags::from_bits_truncate(can.iflag1.get()),
            BufferFlags::RECEIVE
        );
    }

    // Driving the public surface needs a real `Instance`, so one points
    // at a static block. `RegisterBlock` is all `VolatileCell`s, and the
    // block is only touched from this one test.
    struct StaticBlock(RegisterBlock);
    unsafe impl Sync for StaticBlock {}

    static LOOPBACK_BLOCK: StaticBlock = StaticBlock(RegisterBlock::new());

    struct LOOPBACK0;
    unsafe impl Instance for LOOPBACK0 {
        const REGISTERS: *mut RegisterBlock =
            &LOOPBACK_BLOCK.0 as *const RegisterBlock as *mut RegisterBlock;
    }

    #[test]
    fn receive_would_block_until_a_frame_is_latched() {
        let mut can = Can::<LOOPBACK0>::new();
        can.init(&test_config()).unwrap();
        let mut tx = can.take_tx().unwrap();
        let mut rx = can.take_rx().unwrap();
        assert!(can.take_rx().is_none());

        // Nothing latched yet: the flag-gated wrapper must not hand out
        // the armed buffer's contents.
        assert_eq!(rx.receive(), Err(nb::Error::WouldBlock));

        tx.transmit(0xA511_2233, 0x4455_6677);
        loop_back(unsafe { &*LOOPBACK0::REGISTERS }, 0x0099);

        let frame = rx.receive().unwrap();
        assert_eq!(frame.id(), Id::Standard(StandardId::new(0x555).unwrap()));
        assert_eq!(frame.data_words(), [0xA511_2233, 0x4455_6677]);
        assert_eq!(frame.timestamp(), 0x0099);
    }
}
