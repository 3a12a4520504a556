//! Battery operations composed from the store and the identity codec.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::codec::{IdentityCodec, ImageArtifact};
use crate::config::AppConfig;
use crate::datetime;
use crate::entity::{BatteryRecord, ChargeState};
use crate::error::{Result, SkyfuelError};
use crate::storage::BatteryStore;
use crate::transfer::{positive, ExportDocument, ImportSummary};

/// Shortest id prefix accepted by [`BatteryService::resolve_id`].
pub const MIN_ID_PREFIX: usize = 4;

/// Fleet-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatteryStatistics {
    pub total: usize,
    pub low: usize,
    pub storage: usize,
    pub full: usize,
    pub total_cells: u64,
    pub total_capacity: u64,
}

impl BatteryStatistics {
    /// Units that need a charge before use.
    pub fn needing_charge(&self) -> usize {
        self.low
    }
}

pub struct BatteryService {
    store: BatteryStore,
    codec: IdentityCodec,
}

impl BatteryService {
    pub fn new(store: BatteryStore, codec: IdentityCodec) -> Self {
        Self { store, codec }
    }

    /// Build the service for an initialized home directory.
    pub fn open(home: &Path, config: &AppConfig) -> Result<Self> {
        let store = BatteryStore::open(&config.database_path(home))?;
        let codec = IdentityCodec::new(config.pictures_path(home), config.qr_size);
        Ok(Self::new(store, codec))
    }

    pub fn codec(&self) -> &IdentityCodec {
        &self.codec
    }

    /// Register a new unit and render its identity code.
    ///
    /// Inputs are validated before anything is written. If the code cannot be
    /// rendered, the freshly inserted row is removed again.
    pub fn register(
        &self,
        nb_cells: i64,
        capacity: i64,
        state: ChargeState,
    ) -> Result<(BatteryRecord, ImageArtifact)> {
        let nb_cells = positive("nbCells", nb_cells)?;
        let capacity = positive("capacity", capacity)?;

        let record = BatteryRecord::new(nb_cells, capacity, state, datetime::now())?;
        let artifact = self.persist(&record)?;
        info!(id = %record.id(), cells = nb_cells, capacity, "battery registered");
        Ok((record, artifact))
    }

    /// Insert `record` and write its code, removing the row again if the
    /// code cannot be written.
    fn persist(&self, record: &BatteryRecord) -> Result<ImageArtifact> {
        self.store.create(record)?;

        match self.codec.encode(record) {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                if let Err(rollback) = self.store.delete_by_id(&record.id()) {
                    error!(id = %record.id(), error = %rollback, "could not roll back insert");
                }
                Err(e.into())
            }
        }
    }

    /// Resolve raw scanned text to the stored record it identifies.
    pub fn resolve_scan(&self, raw_text: &str) -> Result<BatteryRecord> {
        let identity = self.codec.decode(raw_text)?;
        self.get(&identity.id)
    }

    pub fn get(&self, id: &Uuid) -> Result<BatteryRecord> {
        self.store
            .fetch_by_id(id)?
            .ok_or_else(|| SkyfuelError::NotFound(id.to_string()))
    }

    /// Turn user input into a stored id: a full UUID, or a unique prefix of
    /// at least [`MIN_ID_PREFIX`] characters.
    pub fn resolve_id(&self, text: &str) -> Result<Uuid> {
        let text = text.trim();
        if let Ok(id) = Uuid::parse_str(text) {
            return Ok(id);
        }
        if text.len() < MIN_ID_PREFIX {
            return Err(SkyfuelError::Validation(format!(
                "Id prefix '{}' is too short (need at least {} characters)",
                text, MIN_ID_PREFIX
            )));
        }

        let prefix = text.to_lowercase();
        let matches: Vec<Uuid> = self
            .store
            .fetch_all()?
            .iter()
            .map(|r| r.id())
            .filter(|id| id.to_string().starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [] => Err(SkyfuelError::NotFound(text.to_string())),
            [id] => Ok(*id),
            _ => Err(SkyfuelError::Validation(format!(
                "Id prefix '{}' matches {} batteries",
                text,
                matches.len()
            ))),
        }
    }

    pub fn list(&self) -> Result<Vec<BatteryRecord>> {
        self.store.fetch_all()
    }

    /// Units currently in `state`, in registration order.
    pub fn list_by_state(&self, state: ChargeState) -> Result<Vec<BatteryRecord>> {
        self.store.fetch_by_state(state)
    }

    /// Most recently registered unit.
    pub fn latest(&self) -> Result<Option<BatteryRecord>> {
        self.store.fetch_latest()
    }

    /// Move a unit to `state` and persist the change.
    pub fn change_state(&self, id: &Uuid, state: ChargeState) -> Result<BatteryRecord> {
        let mut record = self.get(id)?;
        record.transition(state);
        if !self.store.update(&record)? {
            return Err(SkyfuelError::NotFound(id.to_string()));
        }
        Ok(record)
    }

    /// Delete a unit, then its identity code image.
    ///
    /// The row goes first: if it cannot be deleted the image is untouched. An
    /// image that cannot be removed afterwards is logged and left behind.
    pub fn remove(&self, id: &Uuid) -> Result<BatteryRecord> {
        let record = self.get(id)?;
        if !self.store.delete(&record)? {
            return Err(SkyfuelError::NotFound(id.to_string()));
        }
        if let Err(e) = self.codec.remove_artifact(id) {
            warn!(id = %id, error = %e, "battery deleted but its image was not");
        }
        Ok(record)
    }

    /// Re-render the identity code of an existing unit. The code still
    /// carries the payload computed at registration.
    pub fn render(&self, id: &Uuid) -> Result<ImageArtifact> {
        let record = self.get(id)?;
        Ok(self.codec.encode(&record)?)
    }

    /// Serialize every stored unit as a JSON export document.
    pub fn export(&self) -> Result<String> {
        let records = self.store.fetch_all()?;
        info!(count = records.len(), "batteries exported");
        ExportDocument::new(&records).to_json()
    }

    /// Insert the units of an export document, skipping ids already stored.
    ///
    /// The whole document is validated before anything is written. Each new
    /// unit gets its identity code rendered from the imported payload.
    pub fn import(&self, json: &str) -> Result<ImportSummary> {
        let records = ExportDocument::from_json(json)?.records()?;
        let mut known: HashSet<Uuid> = self.store.fetch_all()?.iter().map(|r| r.id()).collect();

        let mut summary = ImportSummary {
            total: records.len(),
            ..ImportSummary::default()
        };
        for record in records {
            if !known.insert(record.id()) {
                summary.skipped += 1;
                continue;
            }
            self.persist(&record)?;
            summary.imported += 1;
        }

        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "batteries imported"
        );
        Ok(summary)
    }

    pub fn statistics(&self) -> Result<BatteryStatistics> {
        let mut stats = BatteryStatistics::default();
        for record in self.store.fetch_all()? {
            stats.total += 1;
            match record.charge_state() {
                ChargeState::Low => stats.low += 1,
                ChargeState::Storage => stats.storage += 1,
                ChargeState::Full => stats.full += 1,
            }
            stats.total_cells += u64::from(record.nb_cells());
            stats.total_capacity += u64::from(record.capacity());
        }
        Ok(stats)
    }
}
