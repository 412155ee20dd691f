//! SQLite run history.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use shaper_core::{SNAPSHOT_VERSION, Shaper, ShaperConfig, StoreSnapshot};

use crate::error::{Result, StoreError};
use crate::schema;

/// A stored run: the configuration it used and the store it ended with.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: Uuid,
    pub label: String,
    pub created_at: String,
    /// `None` for imported snapshots that never ran with a known seed.
    pub effective_seed: Option<u64>,
    pub steps: u64,
    pub remainder: String,
    pub config: ShaperConfig,
    pub snapshot: StoreSnapshot,
}

/// One row of the run listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: Uuid,
    pub label: String,
    pub created_at: String,
    pub steps: u64,
    pub units: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Save ---

    /// Record a finished (or interrupted) run of `shaper`.
    pub fn save_run(&self, label: &str, shaper: &Shaper, remainder: &str) -> Result<Uuid> {
        self.insert_run(
            label,
            shaper.config(),
            Some(shaper.effective_seed()),
            shaper.step_number(),
            remainder,
            &shaper.snapshot(),
        )
    }

    /// Record a snapshot that did not come from a run in this database.
    pub fn import_snapshot(
        &self,
        label: &str,
        config: &ShaperConfig,
        snapshot: &StoreSnapshot,
    ) -> Result<Uuid> {
        if snapshot.reading_frame != config.reading_frame {
            return Err(StoreError::InvalidData(format!(
                "snapshot reading frame {} does not match config frame {}",
                snapshot.reading_frame, config.reading_frame
            )));
        }
        self.insert_run(label, config, config.seed, 0, "", snapshot)
    }

    fn insert_run(
        &self,
        label: &str,
        config: &ShaperConfig,
        effective_seed: Option<u64>,
        steps: u64,
        remainder: &str,
        snapshot: &StoreSnapshot,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let config_json = serde_json::to_string(config)?;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO runs (id, label, effective_seed, steps, remainder, reading_frame, config)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                label,
                effective_seed.map(|seed| seed.to_string()),
                steps as i64,
                remainder,
                snapshot.reading_frame as i64,
                config_json,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO run_primitives (run_id, primitive, forgotten) VALUES (?1, ?2, ?3)",
            )?;
            let primitives: BTreeSet<&String> = snapshot
                .primitives
                .iter()
                .chain(&snapshot.forgotten_primitives)
                .collect();
            for primitive in primitives {
                let forgotten = snapshot.forgotten_primitives.contains(primitive);
                stmt.execute(params![id.to_string(), primitive, forgotten as i32])?;
            }

            let mut stmt =
                tx.prepare("INSERT INTO run_units (run_id, unit, weight) VALUES (?1, ?2, ?3)")?;
            for (unit, weight) in &snapshot.units {
                stmt.execute(params![id.to_string(), unit, weight])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            "saved run {id} ('{label}'): {} units, {steps} steps",
            snapshot.units.len()
        );
        Ok(id)
    }

    // --- Load ---

    pub fn load_run(&self, id: Uuid) -> Result<RunRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT label, created_at, effective_seed, steps, remainder, config
                 FROM runs WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((label, created_at, seed, steps, remainder, config_json)) = row else {
            return Err(StoreError::InvalidData(format!("run not found: {id}")));
        };

        let effective_seed = seed
            .map(|seed| {
                seed.parse::<u64>()
                    .map_err(|e| StoreError::InvalidData(format!("bad seed {seed:?}: {e}")))
            })
            .transpose()?;
        let config: ShaperConfig = serde_json::from_str(&config_json)?;
        let snapshot = self.load_snapshot(id)?;

        Ok(RunRecord {
            id,
            label,
            created_at,
            effective_seed,
            steps: steps as u64,
            remainder,
            config,
            snapshot,
        })
    }

    pub fn load_snapshot(&self, id: Uuid) -> Result<StoreSnapshot> {
        let reading_frame: Option<i64> = self
            .conn
            .query_row(
                "SELECT reading_frame FROM runs WHERE id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(reading_frame) = reading_frame else {
            return Err(StoreError::InvalidData(format!("run not found: {id}")));
        };

        let mut stmt = self
            .conn
            .prepare("SELECT primitive, forgotten FROM run_primitives WHERE run_id = ?1")?;
        let rows: Vec<(String, bool)> = stmt
            .query_map([id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0))
            })?
            .collect::<std::result::Result<_, _>>()?;
        let mut primitives = BTreeSet::new();
        let mut forgotten_primitives = BTreeSet::new();
        for (primitive, forgotten) in rows {
            if forgotten {
                forgotten_primitives.insert(primitive.clone());
            }
            primitives.insert(primitive);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT unit, weight FROM run_units WHERE run_id = ?1")?;
        let units: BTreeMap<String, f64> = stmt
            .query_map([id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        Ok(StoreSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            reading_frame: reading_frame as usize,
            primitives,
            forgotten_primitives,
            units,
        })
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.label, r.created_at, r.steps,
                    (SELECT COUNT(*) FROM run_units u WHERE u.run_id = r.id)
             FROM runs r ORDER BY r.rowid DESC",
        )?;
        let rows: Vec<(String, String, String, i64, i64)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, label, created_at, steps, units)| {
                Ok(RunSummary {
                    id: parse_uuid(&id)?,
                    label,
                    created_at,
                    steps: steps as u64,
                    units: units as usize,
                })
            })
            .collect()
    }

    pub fn latest_run(&self) -> Result<Option<RunSummary>> {
        Ok(self.list_runs()?.into_iter().next())
    }

    /// Returns false if no such run existed.
    pub fn delete_run(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM runs WHERE id = ?1", [id.to_string()])?;
        if rows > 0 {
            tracing::info!("deleted run {id}");
        }
        Ok(rows > 0)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
