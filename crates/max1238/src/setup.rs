//! Setup byte construction.
//!
//! The setup byte is written once at initialisation and stays in the
//! device until it is rewritten or the chip loses power.
//!
//! Layout (MSB first):
//!   [7]     REG      1 = setup byte
//!   [6:4]   SEL      reference voltage selection
//!   [3]     CLK      0 = internal clock, 1 = external clock
//!   [2]     BIP/UNI  0 = unipolar, 1 = bipolar
//!   [1]     RST      0 = reset config register, 1 = no action
//!   [0]     X        don't care, sent as 0

use serde::Deserialize;

/// Marks a byte as a setup byte.
pub(crate) const REG_SETUP: u8 = 1 << 7;

const SEL_SHIFT: u8 = 4;
const CLK_SHIFT: u8 = 3;
const POLARITY_SHIFT: u8 = 2;
const RST_SHIFT: u8 = 1;

// ── Field variants ──────────────────────────────────────────────────────────

/// Reference voltage and AIN_/REF pin function (SEL[2:0]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceVoltage {
    /// VDD as reference, AIN_/REF used as an analog input.
    Vdd,
    /// External reference applied on AIN_/REF.
    External,
    /// Internal reference, powered down between conversions; AIN_/REF is an
    /// analog input.
    InternalAutoOff,
    /// Internal reference always on; AIN_/REF is an analog input.
    #[default]
    InternalAlwaysOn,
    /// Internal reference, powered down between conversions; reference
    /// driven out on AIN_/REF.
    InternalAutoOffRefOut,
    /// Internal reference always on and driven out on AIN_/REF.
    InternalAlwaysOnRefOut,
}

impl ReferenceVoltage {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Vdd => 0b000,
            Self::External => 0b010,
            Self::InternalAutoOff => 0b100,
            Self::InternalAlwaysOn => 0b101,
            Self::InternalAutoOffRefOut => 0b110,
            Self::InternalAlwaysOnRefOut => 0b111,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Unipolar,
    Bipolar,
}

/// RST bit. Note the inversion: writing 0 resets the config register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    Reset,
    #[default]
    NoAction,
}

// ── Setup ───────────────────────────────────────────────────────────────────

/// Everything the setup byte carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Setup {
    pub reference: ReferenceVoltage,
    pub clock: ClockSource,
    pub polarity: Polarity,
    pub reset: ResetMode,
}

impl Setup {
    pub fn encode(&self) -> u8 {
        encode_setup(self.reference, self.clock, self.polarity, self.reset)
    }
}

/// Build the setup byte. Every input is a closed choice, so this cannot fail.
pub fn encode_setup(
    reference: ReferenceVoltage,
    clock: ClockSource,
    polarity: Polarity,
    reset: ResetMode,
) -> u8 {
    let clk = match clock {
        ClockSource::Internal => 0,
        ClockSource::External => 1,
    };
    let bip = match polarity {
        Polarity::Unipolar => 0,
        Polarity::Bipolar => 1,
    };
    let rst = match reset {
        ResetMode::Reset => 0,
        ResetMode::NoAction => 1,
    };

    REG_SETUP
        | (reference.bits() << SEL_SHIFT)
        | (clk << CLK_SHIFT)
        | (bip << POLARITY_SHIFT)
        | (rst << RST_SHIFT)
}

// ── Tests ───────────────────────────────────────────────────────────────────
