use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datetime;
use crate::entity::{BatteryRecord, ChargeState};
use crate::error::{Result, SkyfuelError};

const SELECT_COLUMNS: &str = "SELECT id, nbCells, capacity, etatCharge,
        dateEnregistrement, dateDerniereMisAJour, data
     FROM battery";

/// SQLite-backed table of battery records.
///
/// Only the database location is kept; every operation opens its own
/// connection and drops it before returning.
#[derive(Debug, Clone)]
pub struct BatteryStore {
    path: PathBuf,
}

/// A row exactly as stored, before any parsing.
struct RawRow {
    /// `None` when the column holds NULL or a non-text value.
    id: Option<String>,
    nb_cells: i64,
    capacity: i64,
    charge_state: i64,
    registered_at: String,
    updated_at: String,
    data: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: match row.get_ref(0)? {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            },
            nb_cells: row.get(1)?,
            capacity: row.get(2)?,
            charge_state: row.get(3)?,
            registered_at: row.get(4)?,
            updated_at: row.get(5)?,
            data: row.get(6)?,
        })
    }

    /// Id column as a UUID, `None` when empty, NULL, not text or unparsable.
    fn parsed_id(&self) -> Option<Uuid> {
        self.id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    fn into_record(self, id: Uuid) -> Result<BatteryRecord> {
        let corrupt = |what: &str| SkyfuelError::Storage(format!("Corrupt row {}: {}", id, what));

        let nb_cells = u32::try_from(self.nb_cells).map_err(|_| corrupt("nbCells out of range"))?;
        let capacity = u32::try_from(self.capacity).map_err(|_| corrupt("capacity out of range"))?;
        let charge_state = ChargeState::from_code(self.charge_state)
            .ok_or_else(|| corrupt("unknown etatCharge"))?;
        let registered_at = datetime::parse(&self.registered_at)
            .map_err(|e| corrupt(&format!("dateEnregistrement: {}", e)))?;
        let updated_at = datetime::parse(&self.updated_at)
            .map_err(|e| corrupt(&format!("dateDerniereMisAJour: {}", e)))?;

        Ok(BatteryRecord::restore(
            id,
            nb_cells,
            capacity,
            charge_state,
            registered_at,
            updated_at,
            self.data,
        ))
    }
}

impl BatteryStore {
    /// Open or create the database at `location`, ensuring the schema exists.
    pub fn open(location: &Path) -> Result<Self> {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path: location.to_path_buf(),
        };
        store.init_schema()?;
        debug!(path = %store.path.display(), "battery store opened");
        Ok(store)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS battery (
                id TEXT PRIMARY KEY,
                nbCells INTEGER NOT NULL,
                capacity INTEGER NOT NULL,
                etatCharge INTEGER NOT NULL,
                dateEnregistrement TEXT NOT NULL,
                dateDerniereMisAJour TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Insert a new record. A second insert with the same id fails.
    pub fn create(&self, record: &BatteryRecord) -> Result<Uuid> {
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT INTO battery
             (id, nbCells, capacity, etatCharge, dateEnregistrement, dateDerniereMisAJour, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id().to_string(),
                record.nb_cells(),
                record.capacity(),
                record.charge_state().code(),
                datetime::format(&record.registered_at()),
                datetime::format(&record.updated_at()),
                record.payload(),
            ],
        );

        match inserted {
            Ok(_) => {
                info!(id = %record.id(), "battery created");
                Ok(record.id())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(SkyfuelError::Storage(format!(
                    "Battery id {} already exists",
                    record.id()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Most recently inserted row, by storage order rather than by timestamp.
    pub fn fetch_latest(&self) -> Result<Option<BatteryRecord>> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                &format!("{} ORDER BY rowid DESC LIMIT 1", SELECT_COLUMNS),
                [],
                RawRow::from_row,
            )
            .optional()?;

        match raw {
            None => Ok(None),
            Some(raw) => {
                let id = raw.parsed_id().ok_or_else(|| {
                    SkyfuelError::Storage(format!(
                        "Latest row has an invalid id: {:?}",
                        raw.id.as_deref().unwrap_or("")
                    ))
                })?;
                raw.into_record(id).map(Some)
            }
        }
    }

    /// Every row with a valid UUID id, in insertion order.
    ///
    /// Rows whose id is empty, not text or not a UUID are skipped without error.
    pub fn fetch_all(&self) -> Result<Vec<BatteryRecord>> {
        self.fetch_where("", params![])
    }

    /// Rows in `state`, in insertion order. Invalid ids are skipped as in [`fetch_all`].
    ///
    /// [`fetch_all`]: BatteryStore::fetch_all
    pub fn fetch_by_state(&self, state: ChargeState) -> Result<Vec<BatteryRecord>> {
        self.fetch_where("WHERE etatCharge = ?1", params![state.code()])
    }

    fn fetch_where<P: Params>(&self, filter: &str, params: P) -> Result<Vec<BatteryRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{} {} ORDER BY rowid", SELECT_COLUMNS, filter))?;

        let rows = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for raw in rows {
            match raw.parsed_id() {
                Some(id) => records.push(raw.into_record(id)?),
                None => debug!(id = ?raw.id, "skipping row with invalid id"),
            }
        }

        debug!(count = records.len(), "fetched batteries");
        Ok(records)
    }

    /// First record whose id matches.
    pub fn fetch_by_id(&self, id: &Uuid) -> Result<Option<BatteryRecord>> {
        Ok(self.fetch_all()?.into_iter().find(|r| r.id() == *id))
    }

    /// Rewrite the mutable columns of the row matching `record`'s id.
    ///
    /// `id` and `dateEnregistrement` are never written. Returns `false` (and
    /// changes nothing) when no row matches.
    pub fn update(&self, record: &BatteryRecord) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE battery
             SET nbCells = ?1, capacity = ?2, etatCharge = ?3,
                 dateDerniereMisAJour = ?4, data = ?5
             WHERE id = ?6",
            params![
                record.nb_cells(),
                record.capacity(),
                record.charge_state().code(),
                datetime::format(&record.updated_at()),
                record.payload(),
                record.id().to_string(),
            ],
        )?;

        if changed == 0 {
            warn!(id = %record.id(), "update matched no battery");
            return Ok(false);
        }
        info!(id = %record.id(), state = %record.charge_state(), "battery updated");
        Ok(true)
    }

    /// Remove the row matching `record`'s id. Returns `false` when nothing matched.
    pub fn delete(&self, record: &BatteryRecord) -> Result<bool> {
        self.delete_by_id(&record.id())
    }

    pub(crate) fn delete_by_id(&self, id: &Uuid) -> Result<bool> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM battery WHERE id = ?1", [id.to_string()])?;
        if removed > 0 {
            info!(id = %id, "battery deleted");
        }
        Ok(removed > 0)
    }
}

impl From<rusqlite::Error> for SkyfuelError {
    fn from(e: rusqlite::Error) -> Self {
        SkyfuelError::Storage(format!("SQLite error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn open_store(tmp: &TempDir) -> BatteryStore {
        BatteryStore::open(&tmp.path().join("skyfuel.sqlite")).unwrap()
    }

    fn record(state: ChargeState) -> BatteryRecord {
        BatteryRecord::new(4, 5000, state, datetime::now()).unwrap()
    }

    fn insert_raw(store: &BatteryStore, id: Option<&str>) {
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO battery
             (id, nbCells, capacity, etatCharge, dateEnregistrement, dateDerniereMisAJour, data)
             VALUES (?1, 3, 1500, 1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', '{}')",
            params![id],
        )
        .unwrap();
    }

    #[test]
    fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("skyfuel.sqlite");
        let _store = BatteryStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let r = record(ChargeState::Low);
        store.create(&r).unwrap();

        let reopened = open_store(&tmp);
        assert_eq!(reopened.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn test_create_and_fetch() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let r = record(ChargeState::Storage);

        let id = store.create(&r).unwrap();
        assert_eq!(id, r.id());

        let fetched = store.fetch_by_id(&id).unwrap().unwrap();
        assert_eq!(fetched, r);
    }

    #[test]
    fn test_create_duplicate_id_fails() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let r = record(ChargeState::Storage);
        store.create(&r).unwrap();

        let err = store.create(&r).unwrap_err();
        assert!(matches!(err, SkyfuelError::Storage(ref msg) if msg.contains("already exists")));
        assert_eq!(store.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_latest_empty() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.fetch_latest().unwrap().is_none());
    }

    #[test]
    fn test_fetch_latest_uses_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);

        // Second insert carries an older timestamp; it must still be "latest".
        let now = datetime::now();
        let first = BatteryRecord::new(4, 5000, ChargeState::Full, now).unwrap();
        let second =
            BatteryRecord::new(2, 850, ChargeState::Low, now - Duration::days(30)).unwrap();
        store.create(&first).unwrap();
        store.create(&second).unwrap();

        // Updating the first record does not make it "latest" either.
        let mut first = first;
        first.transition(ChargeState::Storage);
        store.update(&first).unwrap();

        let latest = store.fetch_latest().unwrap().unwrap();
        assert_eq!(latest.id(), second.id());
    }

    #[test]
    fn test_fetch_all_in_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let records: Vec<_> = (0..4).map(|_| record(ChargeState::Storage)).collect();
        for r in &records {
            store.create(r).unwrap();
        }

        let ids: Vec<_> = store.fetch_all().unwrap().iter().map(|r| r.id()).collect();
        let expected: Vec<_> = records.iter().map(|r| r.id()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_fetch_all_skips_malformed_ids() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let good = record(ChargeState::Full);
        store.create(&good).unwrap();
        insert_raw(&store, Some("not-a-uuid"));
        insert_raw(&store, Some(""));
        insert_raw(&store, None);

        let all = store.fetch_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id(), good.id());
    }

    #[test]
    fn test_fetch_all_skips_non_text_ids() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let good = record(ChargeState::Low);
        store.create(&good).unwrap();

        let conn = Connection::open(store.path()).unwrap();
        for id in ["X'DEADBEEF'", "42"] {
            conn.execute(
                &format!(
                    "INSERT INTO battery VALUES ({}, 3, 1500, 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', '{{}}')",
                    id
                ),
                [],
            )
            .unwrap();
        }

        let all = store.fetch_all().unwrap();
        assert_eq!(all, vec![good.clone()]);
        assert_eq!(store.fetch_by_state(ChargeState::Low).unwrap(), vec![good]);

        // The last row's id is not a UUID, so there is no latest record to return.
        let err = store.fetch_latest().unwrap_err();
        assert!(matches!(err, SkyfuelError::Storage(ref msg) if msg.contains("invalid id")));
    }

    #[test]
    fn test_fetch_by_state() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let low_a = record(ChargeState::Low);
        let full = record(ChargeState::Full);
        let low_b = record(ChargeState::Low);
        for r in [&low_a, &full, &low_b] {
            store.create(r).unwrap();
        }

        assert_eq!(store.fetch_by_state(ChargeState::Low).unwrap(), vec![low_a, low_b]);
        assert_eq!(store.fetch_by_state(ChargeState::Full).unwrap(), vec![full]);
        assert!(store.fetch_by_state(ChargeState::Storage).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_by_id_missing() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        store.create(&record(ChargeState::Low)).unwrap();
        assert!(store.fetch_by_id(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_changes_only_state_and_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let original = record(ChargeState::Storage);
        store.create(&original).unwrap();

        let mut changed = original.clone();
        changed.transition_at(ChargeState::Full, original.updated_at() + Duration::hours(2));
        assert!(store.update(&changed).unwrap());

        let stored = store.fetch_by_id(&original.id()).unwrap().unwrap();
        assert_eq!(stored.charge_state(), ChargeState::Full);
        assert_eq!(stored.updated_at(), changed.updated_at());
        assert_eq!(stored.id(), original.id());
        assert_eq!(stored.nb_cells(), original.nb_cells());
        assert_eq!(stored.capacity(), original.capacity());
        assert_eq!(stored.registered_at(), original.registered_at());
        assert_eq!(stored.payload(), original.payload());
    }

    #[test]
    fn test_update_missing_row_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let stored = record(ChargeState::Low);
        store.create(&stored).unwrap();

        let stranger = record(ChargeState::Full);
        assert!(!store.update(&stranger).unwrap());
        assert_eq!(store.fetch_all().unwrap(), vec![stored]);
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let keep = record(ChargeState::Low);
        let gone = record(ChargeState::Full);
        store.create(&keep).unwrap();
        store.create(&gone).unwrap();

        assert!(store.delete(&gone).unwrap());
        assert!(store.fetch_by_id(&gone.id()).unwrap().is_none());
        assert_eq!(store.fetch_all().unwrap(), vec![keep]);

        // Deleting again matches nothing.
        assert!(!store.delete(&gone).unwrap());
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO battery VALUES (?1, 4, 5000, 9, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', '{}')",
            [Uuid::new_v4().to_string()],
        )
        .unwrap();

        let err = store.fetch_all().unwrap_err();
        assert!(matches!(err, SkyfuelError::Storage(ref msg) if msg.contains("etatCharge")));
    }
}
