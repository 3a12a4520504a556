// src/entity/charge_state.rs
use serde::{Deserialize, Serialize};

/// Charge level a battery is kept at. Stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeState {
    Low,
    Storage,
    Full,
}

impl ChargeState {
    pub const ALL: [ChargeState; 3] = [ChargeState::Low, ChargeState::Storage, ChargeState::Full];

    /// Integer code used in the `etatCharge` column.
    pub fn code(self) -> i64 {
        match self {
            ChargeState::Low => 0,
            ChargeState::Storage => 1,
            ChargeState::Full => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ChargeState::Low),
            1 => Some(ChargeState::Storage),
            2 => Some(ChargeState::Full),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChargeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeState::Low => write!(f, "low"),
            ChargeState::Storage => write!(f, "storage"),
            ChargeState::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for ChargeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "0" => Ok(ChargeState::Low),
            "storage" | "1" => Ok(ChargeState::Storage),
            "full" | "2" => Ok(ChargeState::Full),
            _ => Err(format!("Invalid charge state: {} (expected low, storage or full)", s)),
        }
    }
}
