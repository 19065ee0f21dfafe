// 💾 Persistence - SQLite snapshot of the list, purchase archive, audit trail
//
// Tables:
// - list_entries: current pending list + session history (replaced on save)
// - purchases:    per-user archive of purchases (append-only, deduped by hash)
// - events:       audit trail of list mutations

use crate::entry::ListEntry;
use crate::store::{AddPolicy, ShoppingListStore};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

const STATE_PENDING: &str = "pending";
const STATE_PURCHASED: &str = "purchased";

// ============================================================================
// EVENTS
// ============================================================================

/// Audit trail entry ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    /// Event about a list entry, carrying the entry as payload
    pub fn for_entry(event_type: &str, entry: &ListEntry, actor: &str) -> Self {
        let data = serde_json::to_value(entry).unwrap_or(serde_json::Value::Null);
        Self::new(event_type, "list_entry", &entry.id, data, actor)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    setup_database(&conn)?;
    tracing::info!(path = %db_path.display(), "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases stay on "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS list_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            state TEXT NOT NULL CHECK (state IN ('pending', 'purchased')),
            position INTEGER NOT NULL,
            entry_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            unit TEXT NOT NULL,
            price REAL NOT NULL,
            image TEXT NOT NULL,
            quantity TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS purchases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            user_id TEXT NOT NULL,
            entry_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            unit TEXT NOT NULL,
            price REAL NOT NULL,
            image TEXT NOT NULL,
            quantity TEXT NOT NULL,
            purchased_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_list_state ON list_entries(state, position)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_purchases_user ON purchases(user_id, purchased_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// LIST SNAPSHOT
// ============================================================================

/// Replace the stored snapshot with the store's current state
pub fn save_snapshot(conn: &Connection, store: &ShoppingListStore) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM list_entries", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO list_entries (
                state, position, entry_id, name, category, unit, price, image, quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;

        let sections = [
            (STATE_PENDING, store.shopping_list()),
            (STATE_PURCHASED, store.recently_purchased()),
        ];
        for (state, entries) in sections {
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![
                    state,
                    position as i64,
                    entry.id,
                    entry.name,
                    entry.category,
                    entry.unit,
                    entry.price,
                    entry.image,
                    entry.quantity,
                ])?;
            }
        }
    }

    tx.commit().context("Failed to save list snapshot")?;
    tracing::debug!(
        pending = store.len(),
        purchased = store.recently_purchased().len(),
        "saved list snapshot"
    );
    Ok(())
}

/// Load the stored snapshot (empty store when nothing was saved yet)
pub fn load_snapshot(conn: &Connection, policy: AddPolicy) -> Result<ShoppingListStore> {
    let pending = load_section(conn, STATE_PENDING)?;
    let history = load_section(conn, STATE_PURCHASED)?;
    Ok(ShoppingListStore::restore(pending, history, policy))
}

fn load_section(conn: &Connection, state: &str) -> Result<Vec<ListEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, name, category, unit, price, image, quantity
         FROM list_entries
         WHERE state = ?1
         ORDER BY position ASC",
    )?;

    let entries = stmt
        .query_map(params![state], |row| entry_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {} entries", state))?;

    Ok(entries)
}

fn entry_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ListEntry> {
    Ok(ListEntry {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        category: row.get(offset + 2)?,
        unit: row.get(offset + 3)?,
        price: row.get(offset + 4)?,
        image: row.get(offset + 5)?,
        quantity: row.get(offset + 6)?,
    })
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// PURCHASE ARCHIVE
// ============================================================================

/// A purchase kept beyond the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub record_id: String,
    pub user_id: String,
    pub entry: ListEntry,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseRecord {
    /// Hash used to skip re-recording the same purchase
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}",
            self.user_id,
            self.entry.id,
            format_timestamp(&self.purchased_at)
        ));
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to load purchases")]
    Storage(#[from] rusqlite::Error),

    #[error("Purchase archive is unavailable")]
    Unavailable,
}

/// Backing store for purchase history beyond the current session
///
/// Implementations may be remote; failures are reported to the caller and
/// never affect the in-memory list.
pub trait PurchaseArchive {
    /// Record a purchase; returns false when it was already recorded
    fn record_purchase(
        &self,
        user_id: &str,
        entry: &ListEntry,
        purchased_at: DateTime<Utc>,
    ) -> Result<bool, ArchiveError>;

    /// A user's purchases, newest first
    fn fetch_purchases(&self, user_id: &str) -> Result<Vec<PurchaseRecord>, ArchiveError>;
}

/// Archive kept in the local SQLite database
pub struct SqliteArchive {
    conn: Connection,
}

impl SqliteArchive {
    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteArchive { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl PurchaseArchive for SqliteArchive {
    fn record_purchase(
        &self,
        user_id: &str,
        entry: &ListEntry,
        purchased_at: DateTime<Utc>,
    ) -> Result<bool, ArchiveError> {
        insert_purchase(&self.conn, user_id, entry, purchased_at)
    }

    fn fetch_purchases(&self, user_id: &str) -> Result<Vec<PurchaseRecord>, ArchiveError> {
        get_purchases(&self.conn, user_id)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn insert_purchase(
    conn: &Connection,
    user_id: &str,
    entry: &ListEntry,
    purchased_at: DateTime<Utc>,
) -> Result<bool, ArchiveError> {
    let record = PurchaseRecord {
        record_id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        entry: entry.clone(),
        purchased_at,
    };
    let hash = record.compute_idempotency_hash();

    let result = conn.execute(
        "INSERT INTO purchases (
            record_id, idempotency_hash, user_id, entry_id, name, category,
            unit, price, image, quantity, purchased_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.record_id,
            hash,
            record.user_id,
            entry.id,
            entry.name,
            entry.category,
            entry.unit,
            entry.price,
            entry.image,
            entry.quantity,
            format_timestamp(&purchased_at),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            tracing::debug!(user_id, entry_id = %entry.id, "purchase already archived");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_purchases(conn: &Connection, user_id: &str) -> Result<Vec<PurchaseRecord>, ArchiveError> {
    let mut stmt = conn.prepare(
        "SELECT record_id, user_id, purchased_at,
                entry_id, name, category, unit, price, image, quantity
         FROM purchases
         WHERE user_id = ?1
         ORDER BY purchased_at DESC, id DESC",
    )?;

    let records = stmt
        .query_map(params![user_id], |row| {
            let purchased_at: String = row.get(2)?;
            Ok(PurchaseRecord {
                record_id: row.get(0)?,
                user_id: row.get(1)?,
                purchased_at: parse_timestamp(2, &purchased_at)?,
                entry: entry_from_row(row, 3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn entry(id: &str, name: &str) -> ListEntry {
        ListEntry {
            id: id.to_string(),
            name: name.to_string(),
            category: "Bakery".to_string(),
            unit: "each".to_string(),
            price: 2.99,
            image: String::new(),
            quantity: "1".to_string(),
        }
    }

    #[test]
    fn test_snapshot_round_trip_preserves_order() {
        let conn = memory_db();

        let mut store = ShoppingListStore::new();
        store.add_item(entry("a", "Bread"));
        store.add_item(entry("b", "Bagels"));
        store.add_item(entry("c", "Cake"));
        store.mark_purchased("a");
        store.mark_purchased("c");

        save_snapshot(&conn, &store).unwrap();
        let loaded = load_snapshot(&conn, AddPolicy::Append).unwrap();

        assert_eq!(loaded.shopping_list(), store.shopping_list());
        assert_eq!(loaded.recently_purchased(), store.recently_purchased());
        assert_eq!(loaded.recently_purchased()[0].id, "c");
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let conn = memory_db();

        let mut store = ShoppingListStore::new();
        store.add_item(entry("a", "Bread"));
        save_snapshot(&conn, &store).unwrap();

        store.remove_item("a");
        save_snapshot(&conn, &store).unwrap();

        let loaded = load_snapshot(&conn, AddPolicy::Append).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_empty_database() {
        let conn = memory_db();
        let loaded = load_snapshot(&conn, AddPolicy::MergeByIdentity).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.recently_purchased().is_empty());
        assert_eq!(loaded.policy(), AddPolicy::MergeByIdentity);
    }

    #[test]
    fn test_archive_newest_first_and_scoped_by_user() {
        let archive = SqliteArchive::new(Connection::open_in_memory().unwrap()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 12, 25, 10, 0, 0).unwrap();

        archive.record_purchase("alex", &entry("a", "Bread"), t0).unwrap();
        archive
            .record_purchase("alex", &entry("b", "Bagels"), t0 + Duration::minutes(5))
            .unwrap();
        archive
            .record_purchase("sam", &entry("c", "Cake"), t0 + Duration::minutes(1))
            .unwrap();

        let alex = archive.fetch_purchases("alex").unwrap();
        let names: Vec<&str> = alex.iter().map(|r| r.entry.name.as_str()).collect();
        assert_eq!(names, vec!["Bagels", "Bread"]);
        assert_eq!(alex[0].purchased_at, t0 + Duration::minutes(5));

        assert_eq!(archive.fetch_purchases("sam").unwrap().len(), 1);
        assert!(archive.fetch_purchases("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_archive_skips_duplicate_record() {
        let archive = SqliteArchive::new(Connection::open_in_memory().unwrap()).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();

        assert!(archive.record_purchase("alex", &entry("a", "Bread"), at).unwrap());
        assert!(!archive.record_purchase("alex", &entry("a", "Bread"), at).unwrap());
        assert_eq!(archive.fetch_purchases("alex").unwrap().len(), 1);
    }

    #[test]
    fn test_idempotency_hash_is_stable() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = PurchaseRecord {
            record_id: "r1".to_string(),
            user_id: "alex".to_string(),
            entry: entry("a", "Bread"),
            purchased_at: at,
        };
        let mut other = record.clone();
        other.record_id = "r2".to_string();

        assert_eq!(record.compute_idempotency_hash(), other.compute_idempotency_hash());
        assert_eq!(record.compute_idempotency_hash().len(), 64);
    }

    #[test]
    fn test_events_round_trip() {
        let conn = memory_db();
        let bread = entry("a", "Bread");

        insert_event(&conn, &Event::for_entry("item_added", &bread, "cli")).unwrap();
        insert_event(&conn, &Event::for_entry("item_purchased", &bread, "cli")).unwrap();
        insert_event(&conn, &Event::for_entry("item_added", &entry("b", "Bagels"), "cli")).unwrap();

        let events = get_events_for_entity(&conn, "list_entry", "a").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "item_purchased");
        assert_eq!(events[1].data["name"], "Bread");
    }
}
