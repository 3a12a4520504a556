//! JSON backup format for moving batteries between homes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime;
use crate::entity::{BatteryRecord, ChargeState};
use crate::error::{Result, SkyfuelError};

/// Top-level export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(default)]
    pub export_date: String,
    #[serde(default)]
    pub app_version: String,
    pub batteries: Vec<ExportedBattery>,
}

/// One stored row. Field names follow the table columns; `data` is the
/// identity payload, carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedBattery {
    pub id: String,
    pub nb_cells: i64,
    pub capacity: i64,
    pub etat_charge: ChargeState,
    pub date_enregistrement: String,
    pub date_derniere_mis_a_jour: String,
    pub data: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Entries in the document.
    pub total: usize,
    pub imported: usize,
    /// Entries whose id was already stored.
    pub skipped: usize,
}

impl ExportDocument {
    pub fn new(records: &[BatteryRecord]) -> Self {
        Self {
            export_date: datetime::format(&datetime::now()),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            batteries: records.iter().map(ExportedBattery::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SkyfuelError::Validation(format!("Invalid export document: {}", e)))
    }

    /// Convert every entry, failing on the first invalid one.
    pub fn records(&self) -> Result<Vec<BatteryRecord>> {
        self.batteries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry.to_record().map_err(|e| match e {
                    SkyfuelError::Validation(msg) => {
                        SkyfuelError::Validation(format!("batteries[{}]: {}", i, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

impl From<&BatteryRecord> for ExportedBattery {
    fn from(record: &BatteryRecord) -> Self {
        Self {
            id: record.id().to_string(),
            nb_cells: i64::from(record.nb_cells()),
            capacity: i64::from(record.capacity()),
            etat_charge: record.charge_state(),
            date_enregistrement: datetime::format(&record.registered_at()),
            date_derniere_mis_a_jour: datetime::format(&record.updated_at()),
            data: record.payload().to_string(),
        }
    }
}

impl ExportedBattery {
    fn to_record(&self) -> Result<BatteryRecord> {
        let id = Uuid::parse_str(self.id.trim())
            .map_err(|e| SkyfuelError::Validation(format!("invalid id '{}': {}", self.id, e)))?;
        let nb_cells = positive("nbCells", self.nb_cells)?;
        let capacity = positive("capacity", self.capacity)?;
        let registered_at = datetime::parse(&self.date_enregistrement).map_err(|e| {
            SkyfuelError::Validation(format!("dateEnregistrement of {}: {}", id, e))
        })?;
        let updated_at = datetime::parse(&self.date_derniere_mis_a_jour).map_err(|e| {
            SkyfuelError::Validation(format!("dateDerniereMisAJour of {}: {}", id, e))
        })?;
        if updated_at < registered_at {
            return Err(SkyfuelError::Validation(format!(
                "dateDerniereMisAJour of {} precedes dateEnregistrement",
                id
            )));
        }

        Ok(BatteryRecord::restore(
            id,
            nb_cells,
            capacity,
            self.etat_charge,
            registered_at,
            updated_at,
            self.data.clone(),
        ))
    }
}

pub(crate) fn positive(field: &str, value: i64) -> Result<u32> {
    if value <= 0 {
        return Err(SkyfuelError::Validation(format!(
            "{} must be positive, got {}",
            field, value
        )));
    }
    u32::try_from(value)
        .map_err(|_| SkyfuelError::Validation(format!("{} is too large: {}", field, value)))
}
