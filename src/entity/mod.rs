mod battery;
mod charge_state;

pub use battery::{BatteryRecord, IdentityPayload};
pub use charge_state::ChargeState;
