// src/entity/battery.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ChargeState;
use crate::datetime::{self, Timestamp};
use crate::error::Result;

/// Identity snapshot embedded in the `data` column and in the QR code.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPayload {
    pub id: Uuid,
    pub nb_cells: u32,
    pub capacity: u32,
    pub date_enregistrement: String,
}

/// One physical battery unit.
///
/// `id`, `nb_cells`, `capacity`, `registered_at` and `payload` are fixed once
/// the record exists; only the charge state and `updated_at` move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryRecord {
    id: Uuid,
    nb_cells: u32,
    capacity: u32,
    charge_state: ChargeState,
    registered_at: Timestamp,
    updated_at: Timestamp,
    payload: String,
}

impl BatteryRecord {
    /// Create a brand-new unit with a fresh random id.
    pub fn new(
        nb_cells: u32,
        capacity: u32,
        charge_state: ChargeState,
        registered_at: Timestamp,
    ) -> Result<Self> {
        Self::with_id(Uuid::new_v4(), nb_cells, capacity, charge_state, registered_at)
    }

    /// Create a unit with a caller-chosen id; both dates start equal.
    pub fn with_id(
        id: Uuid,
        nb_cells: u32,
        capacity: u32,
        charge_state: ChargeState,
        registered_at: Timestamp,
    ) -> Result<Self> {
        let payload = serde_json::to_string(&IdentityPayload {
            id,
            nb_cells,
            capacity,
            date_enregistrement: datetime::format(&registered_at),
        })?;

        Ok(Self {
            id,
            nb_cells,
            capacity,
            charge_state,
            registered_at,
            updated_at: registered_at,
            payload,
        })
    }

    /// Rebuild a record from stored columns, keeping the stored payload verbatim.
    pub(crate) fn restore(
        id: Uuid,
        nb_cells: u32,
        capacity: u32,
        charge_state: ChargeState,
        registered_at: Timestamp,
        updated_at: Timestamp,
        payload: String,
    ) -> Self {
        Self {
            id,
            nb_cells,
            capacity,
            charge_state,
            registered_at,
            updated_at,
            payload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn nb_cells(&self) -> u32 {
        self.nb_cells
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn charge_state(&self) -> ChargeState {
        self.charge_state
    }

    pub fn registered_at(&self) -> Timestamp {
        self.registered_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Canonical identity payload (JSON text), as computed at creation.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn is_full(&self) -> bool {
        self.charge_state == ChargeState::Full
    }

    pub fn is_low(&self) -> bool {
        self.charge_state == ChargeState::Low
    }

    /// Move to `state` and stamp the change with the current time.
    ///
    /// Every transition is allowed, including to the current state.
    pub fn transition(&mut self, state: ChargeState) {
        self.transition_at(state, datetime::now());
    }

    /// Move to `state` as of `at`. `updated_at` never goes backwards: an `at`
    /// earlier than the last update leaves the stamp where it is.
    pub fn transition_at(&mut self, state: ChargeState, at: Timestamp) {
        self.charge_state = state;
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}
