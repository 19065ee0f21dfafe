// 🗂️ Shopping List Store - Owner of the pending list and its purchase history
//
// Per-entry lifecycle:
//   absent → pending → purchased   (moved to history, terminal)
//   absent → pending → absent      (removed)
//
// All operations are total: unknown ids are silent no-ops, never errors.

use crate::entry::ListEntry;
use crate::history::PurchaseHistoryStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// ADD POLICY
// ============================================================================

/// What `add_item` does when the id is already on the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddPolicy {
    /// Always append; duplicates are left to the identity keys
    #[default]
    Append,

    /// Replace the existing entry in place (position kept, length unchanged)
    MergeByIdentity,
}

impl AddPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddPolicy::Append => "append",
            AddPolicy::MergeByIdentity => "merge",
        }
    }
}

impl FromStr for AddPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(AddPolicy::Append),
            "merge" | "merge_by_identity" => Ok(AddPolicy::MergeByIdentity),
            other => Err(format!("unknown add policy '{}' (expected append or merge)", other)),
        }
    }
}

/// Result of an add, so callers can tell an append from a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Appended,
    Merged { position: usize },
}

// ============================================================================
// SHOPPING LIST STORE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShoppingListStore {
    #[serde(rename = "shoppingList")]
    pending: Vec<ListEntry>,

    #[serde(rename = "recentlyPurchased")]
    history: PurchaseHistoryStore,

    #[serde(skip)]
    policy: AddPolicy,
}

impl ShoppingListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: AddPolicy) -> Self {
        ShoppingListStore {
            policy,
            ..Self::default()
        }
    }

    /// Rehydrate from a persisted snapshot (pending in list order, history newest-first)
    pub fn restore(pending: Vec<ListEntry>, history: Vec<ListEntry>, policy: AddPolicy) -> Self {
        ShoppingListStore {
            pending,
            history: PurchaseHistoryStore::from_entries(history),
            policy,
        }
    }

    pub fn policy(&self) -> AddPolicy {
        self.policy
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Add an entry to the end of the pending list
    ///
    /// Under `AddPolicy::Append` the list grows by exactly one and the new
    /// last element is `entry`, whatever its id.
    pub fn add_item(&mut self, entry: ListEntry) -> AddOutcome {
        if self.policy == AddPolicy::MergeByIdentity {
            if let Some(position) = self.position(&entry.id) {
                tracing::debug!(id = %entry.id, position, "merged list entry");
                self.pending[position] = entry;
                return AddOutcome::Merged { position };
            }
        }

        tracing::debug!(id = %entry.id, name = %entry.name, "added list entry");
        self.pending.push(entry);
        AddOutcome::Appended
    }

    /// Remove every entry with this id; returns the first one removed
    ///
    /// Duplicates left behind by `AddPolicy::Append` all go at once, so a
    /// second call with the same id is always a no-op.
    pub fn remove_item(&mut self, id: &str) -> Option<ListEntry> {
        let position = self.position(id)?;
        let removed = self.pending.remove(position);
        self.pending.retain(|e| e.id != id);
        tracing::debug!(id, "removed list entry");
        Some(removed)
    }

    /// Move the first entry with this id to the front of the history
    ///
    /// Attributes are carried over unchanged. Returns the purchased entry.
    pub fn mark_purchased(&mut self, id: &str) -> Option<ListEntry> {
        let position = self.position(id)?;
        let entry = self.pending.remove(position);
        self.history.record(entry.clone());
        tracing::debug!(id, "marked entry purchased");
        Some(entry)
    }

    /// Put a previously purchased entry back on the list (history unchanged)
    pub fn buy_again(&mut self, id: &str) -> Option<AddOutcome> {
        let entry = self.history.get(id)?.clone();
        Some(self.add_item(entry))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Pending entries in insertion order
    pub fn shopping_list(&self) -> &[ListEntry] {
        &self.pending
    }

    /// Purchased entries, newest first
    pub fn recently_purchased(&self) -> &[ListEntry] {
        self.history.entries()
    }

    pub fn history(&self) -> &PurchaseHistoryStore {
        &self.history
    }

    pub fn get(&self, id: &str) -> Option<&ListEntry> {
        self.pending.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sum of price × quantity over the pending list
    pub fn estimated_total(&self) -> f64 {
        self.pending.iter().map(ListEntry::line_total).sum()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.pending.iter().position(|e| e.id == id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
