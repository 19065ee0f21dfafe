// 🧾 Purchase History - Entries that left the list through a purchase
//
// Newest first. The only writer is `ShoppingListStore::mark_purchased`.

use crate::entry::ListEntry;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PurchaseHistoryStore {
    entries: Vec<ListEntry>,
}

impl PurchaseHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted sequence (already newest-first)
    pub(crate) fn from_entries(entries: Vec<ListEntry>) -> Self {
        PurchaseHistoryStore { entries }
    }

    /// Prepend a purchased entry
    pub(crate) fn record(&mut self, entry: ListEntry) {
        self.entries.insert(0, entry);
    }

    /// Purchased entries, newest first
    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&ListEntry> {
        self.entries.first()
    }

    /// Most recent purchase with this id
    pub fn get(&self, id: &str) -> Option<&ListEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
