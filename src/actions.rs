// 🧾 List Actions - One mutation, its snapshot and its audit event
//
// The CLI and the HTTP server both change the list through these functions, so
// the saved snapshot and the event history look the same whichever front end
// made the change. Callers hold exclusive access to the store for the whole
// call: the snapshot written is the state right after this mutation.

use crate::db::{insert_event, save_snapshot, Event, PurchaseArchive};
use crate::entry::ListEntry;
use crate::session::{SessionError, SessionToken};
use crate::store::{AddOutcome, ShoppingListStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub const EVENT_ADDED: &str = "item_added";
pub const EVENT_MERGED: &str = "item_merged";
pub const EVENT_READDED: &str = "item_readded";
pub const EVENT_REMOVED: &str = "item_removed";
pub const EVENT_PURCHASED: &str = "item_purchased";

/// Event type recorded for an add
pub fn add_event_type(outcome: AddOutcome, readded: bool) -> &'static str {
    match (readded, outcome) {
        (true, _) => EVENT_READDED,
        (false, AddOutcome::Merged { .. }) => EVENT_MERGED,
        (false, AddOutcome::Appended) => EVENT_ADDED,
    }
}

// ============================================================================
// LIST MUTATIONS
// ============================================================================

pub fn add_entry(
    conn: &Connection,
    store: &mut ShoppingListStore,
    entry: ListEntry,
    actor: &str,
) -> Result<AddOutcome> {
    let outcome = store.add_item(entry.clone());
    persist(conn, store, Event::for_entry(add_event_type(outcome, false), &entry, actor))?;
    Ok(outcome)
}

/// Absent ids change nothing and record nothing
pub fn remove_entry(
    conn: &Connection,
    store: &mut ShoppingListStore,
    id: &str,
    actor: &str,
) -> Result<Option<ListEntry>> {
    let Some(entry) = store.remove_item(id) else {
        return Ok(None);
    };
    persist(conn, store, Event::for_entry(EVENT_REMOVED, &entry, actor))?;
    Ok(Some(entry))
}

pub fn purchase_entry(
    conn: &Connection,
    store: &mut ShoppingListStore,
    id: &str,
    actor: &str,
) -> Result<Option<ListEntry>> {
    let Some(entry) = store.mark_purchased(id) else {
        return Ok(None);
    };
    persist(conn, store, Event::for_entry(EVENT_PURCHASED, &entry, actor))?;
    Ok(Some(entry))
}

/// Re-add a purchased entry; `None` when the id is not in the history
pub fn buy_again(
    conn: &Connection,
    store: &mut ShoppingListStore,
    id: &str,
    actor: &str,
) -> Result<Option<(ListEntry, AddOutcome)>> {
    let Some(entry) = store.history().get(id).cloned() else {
        return Ok(None);
    };
    let Some(outcome) = store.buy_again(id) else {
        return Ok(None);
    };
    persist(conn, store, Event::for_entry(add_event_type(outcome, true), &entry, actor))?;
    Ok(Some((entry, outcome)))
}

// The in-memory change stays even when this fails; the next save carries it
fn persist(conn: &Connection, store: &ShoppingListStore, event: Event) -> Result<()> {
    save_snapshot(conn, store)?;
    insert_event(conn, &event)
}

// ============================================================================
// PURCHASE ARCHIVE
// ============================================================================

/// What happened to a purchase on its way to the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived,
    /// No session token: nothing to archive, not an error
    NotLoggedIn,
    /// Bad token or archive failure; the local purchase stands
    Skipped(String),
}

impl ArchiveOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self, ArchiveOutcome::Archived | ArchiveOutcome::AlreadyArchived)
    }
}

/// Archive a purchase for the signed-in user, if there is one
pub fn archive_purchase<A: PurchaseArchive + ?Sized>(
    archive: &A,
    token: Option<&str>,
    entry: &ListEntry,
    purchased_at: DateTime<Utc>,
) -> ArchiveOutcome {
    let user_id = match SessionToken::from_optional(token).and_then(|t| t.user_id()) {
        Ok(user_id) => user_id,
        Err(SessionError::NotLoggedIn) => return ArchiveOutcome::NotLoggedIn,
        Err(e) => {
            tracing::warn!("purchase not archived: {}", e);
            return ArchiveOutcome::Skipped(e.to_string());
        }
    };

    match archive.record_purchase(&user_id, entry, purchased_at) {
        Ok(true) => ArchiveOutcome::Archived,
        Ok(false) => ArchiveOutcome::AlreadyArchived,
        Err(e) => {
            tracing::warn!(user_id = %user_id, "failed to archive purchase: {}", e);
            ArchiveOutcome::Skipped(e.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
