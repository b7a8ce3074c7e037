//! Bit-timing calculation.
//!
//! Pure arithmetic, no hardware access: turns a nominal bit rate, the CAN
//! engine clock frequency and the segment lengths into the `CTRL1`
//! prescaler and segment fields.

use crate::pac::ctrl1;

/// Nominal bit rates supported by the driver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub enum BitRate {
    B10K,
    B20K,
    B50K,
    B125K,
    B250K,
    B500K,
    B800K,
    B1M,
}

impl BitRate {
    /// Returns the bit rate in bits per second.
    pub fn bits_per_second(self) -> u32 {
        match self {
            BitRate::B10K => 10_000,
            BitRate::B20K => 20_000,
            BitRate::B50K => 50_000,
            BitRate::B125K => 125_000,
            BitRate::B250K => 250_000,
            BitRate::B500K => 500_000,
            BitRate::B800K => 800_000,
            BitRate::B1M => 1_000_000,
        }
    }
}

/// Lengths of the programmable bit segments, in time quanta.
///
/// These are *real* values; the off-by-one encoding the hardware expects
/// is applied when the register fields are computed. Together with the
/// fixed one-quantum sync segment they determine the number of time
/// quanta per bit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct TimingSegments {
    /// Propagation segment, 1..=8.
    pub prop_seg: u8,
    /// Phase segment 1, 1..=8.
    pub phase_seg_1: u8,
    /// Phase segment 2, 1..=8.
    pub phase_seg_2: u8,
}

impl TimingSegments {
    /// Segment lengths used by the reference configuration: 16 time
    /// quanta per bit with the sample point after the 12th.
    pub const DEFAULT: Self = TimingSegments {
        prop_seg: 7,
        phase_seg_1: 4,
        phase_seg_2: 4,
    };

    /// Number of time quanta per bit, including the sync segment.
    pub fn time_quanta(&self) -> u32 {
        u32::from(self.prop_seg) + u32::from(self.phase_seg_1) + u32::from(self.phase_seg_2) + 1
    }
}

impl Default for TimingSegments {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Register-ready bit timing, as written to `CTRL1`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "unstable-defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Prescaler divisor field (`PRESDIV`), divide-by `presdiv + 1`.
    pub presdiv: u32,
    /// Resync jump width field (`RJW`).
    pub rjw: u32,
    /// Phase segment 1 field (`PSEG1`).
    pub pseg1: u32,
    /// Phase segment 2 field (`PSEG2`).
    pub pseg2: u32,
    /// Propagation segment field (`PROPSEG`).
    pub propseg: u32,
}

impl BitTiming {
    /// Computes the `CTRL1` timing fields for the given engine clock and
    /// bit rate.
    ///
    /// The caller must pick `clock_hz` and `segments` such that
    /// `clock_hz` is an integer multiple of `bit_rate × time_quanta`;
    /// otherwise the resulting bit rate is silently wrong. This is a
    /// configuration contract, not a checked error.
    pub fn compute(clock_hz: u32, bit_rate: BitRate, segments: TimingSegments) -> Self {
        let time_quanta = segments.time_quanta();
        let quantum_hz = bit_rate.bits_per_second() * time_quanta;
        debug_assert!(
            quantum_hz != 0 && clock_hz % quantum_hz == 0 && clock_hz >= quantum_hz,
            "engine clock is not an integer multiple of the time quantum frequency"
        );

        BitTiming {
            presdiv: clock_hz / quantum_hz - 1,
            rjw: u32::from(segments.phase_seg_2) - 1,
            pseg1: u32::from(segments.phase_seg_1) - 1,
            pseg2: u32::from(segments.phase_seg_2) - 1,
            propseg: u32::from(segments.prop_seg) - 1,
        }
    }

    /// Assembles the timing fields into their `CTRL1` bit positions.
    pub fn ctrl1_bits(&self) -> u32 {
        self.presdiv << ctrl1::PRESDIV_SHIFT & ctrl1::PRESDIV_MASK
            | self.rjw << ctrl1::RJW_SHIFT & ctrl1::RJW_MASK
            | self.pseg1 << ctrl1::PSEG1_SHIFT & ctrl1::PSEG1_MASK
            | self.pseg2 << ctrl1::PSEG2_SHIFT & ctrl1::PSEG2_MASK
            | self.propseg << ctrl1::PROPSEG_SHIFT & ctrl1::PROPSEG_MASK
    }
}
