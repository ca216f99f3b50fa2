//! SQLite persistence for voice profiles.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use uuid::Uuid;

use super::types::{ProcessingStatus, VoiceError, VoiceProfile};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS voices (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    original_filename TEXT NOT NULL,
    original_format TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    sample_rate INTEGER NOT NULL,
    processed_audio_path TEXT NOT NULL,
    chatterbox_data TEXT,
    orpheus_data TEXT,
    xtts_data TEXT,
    svara_data TEXT,
    language TEXT NOT NULL DEFAULT 'en',
    tags TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    processing_status TEXT NOT NULL DEFAULT 'pending',
    processing_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_voices_name ON voices (name);
";

const COLUMNS: &str = "id, name, description, original_filename, original_format, \
    duration_seconds, sample_rate, processed_audio_path, chatterbox_data, orpheus_data, \
    xtts_data, svara_data, language, tags, is_active, processing_status, processing_error, \
    created_at, updated_at";

impl ToSql for ProcessingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ProcessingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: VoiceError| FromSqlError::Other(Box::new(e)))
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn json_text(value: &Option<Value>) -> Option<String> {
    value.as_ref().map(Value::to_string)
}

fn tags_text(tags: &[String]) -> Result<Option<String>, serde_json::Error> {
    if tags.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(tags).map(Some)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<VoiceProfile> {
    let id: String = row.get(0)?;
    let tags = match row.get::<_, Option<String>>(13)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_error(13, e))?,
        None => Vec::new(),
    };

    Ok(VoiceProfile {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        name: row.get(1)?,
        description: row.get(2)?,
        original_filename: row.get(3)?,
        original_format: row.get(4)?,
        duration_seconds: row.get(5)?,
        sample_rate: row.get(6)?,
        processed_audio_path: PathBuf::from(row.get::<_, String>(7)?),
        chatterbox_data: json_column(row, 8)?,
        orpheus_data: json_column(row, 9)?,
        xtts_data: json_column(row, 10)?,
        svara_data: json_column(row, 11)?,
        language: row.get(12)?,
        tags,
        is_active: row.get(14)?,
        processing_status: row.get(15)?,
        processing_error: row.get(16)?,
        created_at: time_column(row, 17)?,
        updated_at: time_column(row, 18)?,
    })
}

/// Voice profile table behind a single mutex-guarded connection.
///
/// Writes run inside a transaction that commits on success and rolls back
/// when dropped on error.
pub struct VoiceStore {
    conn: Mutex<Connection>,
}

impl VoiceStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, VoiceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, VoiceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, VoiceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Open transactions roll back on unwind.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(conn: &Connection, id: &Uuid) -> rusqlite::Result<Option<VoiceProfile>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM voices WHERE id = ?1"),
            params![id.to_string()],
            profile_from_row,
        )
        .optional()
    }

    pub fn insert(&self, profile: &VoiceProfile) -> Result<(), VoiceError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO voices ({COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
            ),
            params![
                profile.id.to_string(),
                profile.name,
                profile.description,
                profile.original_filename,
                profile.original_format,
                profile.duration_seconds,
                profile.sample_rate,
                profile.processed_audio_path.to_string_lossy().into_owned(),
                json_text(&profile.chatterbox_data),
                json_text(&profile.orpheus_data),
                json_text(&profile.xtts_data),
                json_text(&profile.svara_data),
                profile.language,
                tags_text(&profile.tags)?,
                profile.is_active,
                profile.processing_status,
                profile.processing_error,
                timestamp(&profile.created_at),
                timestamp(&profile.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<VoiceProfile>, VoiceError> {
        Ok(Self::select(&self.lock(), id)?)
    }

    /// Return up to `limit` profiles after skipping `offset`, plus the total
    /// matching count. Newest first.
    pub fn list(
        &self,
        offset: u64,
        limit: u32,
        active_only: bool,
    ) -> Result<(Vec<VoiceProfile>, u64), VoiceError> {
        let conn = self.lock();
        let filter = if active_only {
            "WHERE is_active = 1"
        } else {
            ""
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM voices {filter}"),
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM voices {filter} \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let items = stmt
            .query_map(params![limit as i64, offset as i64], profile_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((items, total.max(0) as u64))
    }

    /// Read-modify-write one profile inside a transaction.
    ///
    /// `updated_at` is refreshed after `change` succeeds. Nothing is written
    /// if `change` fails.
    pub fn modify<F>(&self, id: &Uuid, change: F) -> Result<VoiceProfile, VoiceError>
    where
        F: FnOnce(&mut VoiceProfile) -> Result<(), VoiceError>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut profile =
            Self::select(&tx, id)?.ok_or_else(|| VoiceError::NotFound(id.to_string()))?;
        change(&mut profile)?;
        profile.updated_at = Utc::now().trunc_subsecs(6);

        tx.execute(
            "UPDATE voices SET name = ?2, description = ?3, chatterbox_data = ?4, \
             orpheus_data = ?5, xtts_data = ?6, svara_data = ?7, language = ?8, tags = ?9, \
             is_active = ?10, processing_status = ?11, processing_error = ?12, updated_at = ?13 \
             WHERE id = ?1",
            params![
                id.to_string(),
                profile.name,
                profile.description,
                json_text(&profile.chatterbox_data),
                json_text(&profile.orpheus_data),
                json_text(&profile.xtts_data),
                json_text(&profile.svara_data),
                profile.language,
                tags_text(&profile.tags)?,
                profile.is_active,
                profile.processing_status,
                profile.processing_error,
                timestamp(&profile.updated_at),
            ],
        )?;
        tx.commit()?;

        Ok(profile)
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: &Uuid) -> Result<bool, VoiceError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM voices WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Cheap round trip used by the readiness probe.
    pub fn ping(&self) -> Result<(), VoiceError> {
        self.lock().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
