// Grocery List - Core Library
// Exposes the list store and its collaborators for the CLI, API server, and tests

pub mod actions;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entry;
pub mod filter;
pub mod history;
pub mod identity;
pub mod session;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use actions::{archive_purchase, ArchiveOutcome};
pub use catalog::{
    CatalogItem, CatalogProvider, CategoryInfo, StaticCatalog,
    find_category, CATEGORIES, UNITS,
};
pub use config::{init_tracing, load_dotenv, Config};
pub use db::{
    ArchiveError, Event, PurchaseArchive, PurchaseRecord, SqliteArchive,
    get_events_for_entity, insert_event, load_snapshot, open_database, save_snapshot,
    setup_database,
};
pub use entry::{FormError, ListEntry, ManualItemForm, ValidatedForm};
pub use filter::filter_catalog;
pub use history::PurchaseHistoryStore;
pub use identity::{IdentityKeyBuilder, KeyInput};
pub use session::{SessionError, SessionToken};
pub use store::{AddOutcome, AddPolicy, ShoppingListStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
