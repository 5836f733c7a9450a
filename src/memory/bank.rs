use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The four Modbus data banks.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bank {
    DiscreteInput,
    Coil,
    InputRegister,
    HoldingRegister,
}

impl Bank {
    pub const ALL: [Bank; 4] = [
        Bank::DiscreteInput,
        Bank::Coil,
        Bank::InputRegister,
        Bank::HoldingRegister,
    ];

    /// Single-bit banks store 0 or 1 per cell.
    pub fn is_bit(&self) -> bool {
        matches!(self, Bank::DiscreteInput | Bank::Coil)
    }

    /// Normalise a value to the native width of the bank.
    pub fn normalize(&self, value: u16) -> u16 {
        if self.is_bit() {
            (value != 0) as u16
        } else {
            value
        }
    }
}

impl Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bank::DiscreteInput => f.write_str("discrete input"),
            Bank::Coil => f.write_str("coil"),
            Bank::InputRegister => f.write_str("input register"),
            Bank::HoldingRegister => f.write_str("holding register"),
        }
    }
}
