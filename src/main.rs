use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use grocery_list::actions::{self, ArchiveOutcome};
use grocery_list::{
    filter_catalog, get_events_for_entity, init_tracing, load_dotenv, load_snapshot,
    open_database, AddOutcome, AddPolicy, CatalogProvider, Config, IdentityKeyBuilder, ListEntry,
    ManualItemForm, PurchaseArchive, SessionToken, ShoppingListStore, SqliteArchive, CATEGORIES,
    UNITS,
};

const ACTOR: &str = "cli";

#[derive(Parser)]
#[command(name = "grocery-list", version, about = "Shopping list with purchase history")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "GROCERY_DB_PATH")]
    db: Option<PathBuf>,

    /// What to do when an added id is already on the list
    #[arg(long, global = true, value_parser = parse_policy)]
    policy: Option<AddPolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog (a query overrides the category)
    Browse {
        #[arg(short, long, default_value = "")]
        query: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show the home-screen recommendations
    Recommended,
    /// List categories and units for manual items
    Categories,
    /// Add a catalog product
    Add {
        catalog_id: String,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(short, long)]
        quantity: Option<String>,
    },
    /// Add an item that is not in the catalog
    AddManual {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        unit: Option<String>,
        #[arg(short, long)]
        quantity: Option<String>,
    },
    /// Show the pending list
    List,
    /// Remove an entry from the list
    Remove { id: String },
    /// Mark an entry purchased
    Purchase { id: String },
    /// Show recently purchased entries
    Recent,
    /// Put a recently purchased entry back on the list
    BuyAgain { id: String },
    /// Show archived purchases of the signed-in user
    History {
        #[arg(long, env = "GROCERY_SESSION_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Show the audit trail of an entry
    Events { id: String },
}

fn parse_policy(raw: &str) -> Result<AddPolicy, String> {
    raw.parse()
}

fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let settled: &[&str] = if cli.policy.is_some() { &["GROCERY_ADD_POLICY"] } else { &[] };
    let mut config = Config::from_env_except(settled)?;
    init_tracing(&config.log_level);

    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(policy) = cli.policy {
        config.add_policy = policy;
    }

    let catalog = config.load_catalog()?;

    match &cli.command {
        Command::Browse { query, category } => {
            let items = filter_catalog(catalog.items(), query, category.as_deref());
            if items.is_empty() {
                println!("🔍 No items match");
            }
            for item in items {
                println!(
                    "{:>6}  {:<18} {:<18} ${:>6.2} / {}",
                    item.id, item.name, item.category, item.price, item.unit
                );
            }
            return Ok(());
        }
        Command::Recommended => {
            println!("⭐ Recommended For You");
            for item in catalog.recommended() {
                println!("{:>6}  {:<18} ${:>6.2} / {}", item.id, item.name, item.price, item.unit);
            }
            return Ok(());
        }
        Command::Categories => {
            println!("🏷️  Categories");
            for category in CATEGORIES {
                println!("   {} ({})", category.name, category.color);
            }
            println!("📏 Units: {}", UNITS.join(", "));
            return Ok(());
        }
        _ => {}
    }

    let archive = SqliteArchive::new(open_database(&config.db_path)?)?;
    let conn = archive.connection();
    let mut store = load_snapshot(conn, config.add_policy)?;
    let mut keys = IdentityKeyBuilder::new();

    match cli.command {
        Command::Add { catalog_id, unit, quantity } => {
            let Some(item) = catalog.find(&catalog_id) else {
                bail!("Unknown catalog item: {}", catalog_id);
            };
            let entry = ListEntry::from_catalog(item, unit.as_deref(), quantity.as_deref(), &mut keys);
            add_and_report(conn, &mut store, entry)?;
        }
        Command::AddManual { name, category, unit, quantity } => {
            let form = ManualItemForm { name, category, unit, quantity };
            let validated = form.validate()?;
            let entry = ListEntry::from_form(&validated, &mut keys);
            add_and_report(conn, &mut store, entry)?;
        }
        Command::List => print_list(&store),
        Command::Remove { id } => match actions::remove_entry(conn, &mut store, &id, ACTOR)? {
            Some(entry) => println!("🗑️  Removed {}", entry.name),
            None => println!("Nothing to remove for {}", id),
        },
        Command::Purchase { id } => match actions::purchase_entry(conn, &mut store, &id, ACTOR)? {
            Some(entry) => {
                println!("✅ Purchase Completed! {}", entry.name);
                let token = config.session_token.as_deref();
                match actions::archive_purchase(&archive, token, &entry, Utc::now()) {
                    ArchiveOutcome::Archived => println!("🗄️  Saved to purchase history"),
                    ArchiveOutcome::AlreadyArchived | ArchiveOutcome::NotLoggedIn => {}
                    ArchiveOutcome::Skipped(reason) => eprintln!("⚠️  Purchase not archived: {}", reason),
                }
            }
            None => println!("Nothing to purchase for {}", id),
        },
        Command::Recent => {
            if store.recently_purchased().is_empty() {
                println!("No recent purchases");
            }
            for entry in store.recently_purchased() {
                println!("{:>16}  {:<20} {} {}", entry.id, entry.name, entry.quantity, entry.unit);
            }
        }
        Command::BuyAgain { id } => {
            let Some((entry, outcome)) = actions::buy_again(conn, &mut store, &id, ACTOR)? else {
                bail!("Not in purchase history: {}", id);
            };
            report_add(&entry, outcome);
        }
        Command::History { token } => {
            let token = token.or(config.session_token.clone());
            let user_id = SessionToken::from_optional(token.as_deref()).and_then(|t| t.user_id());
            match user_id {
                Ok(user_id) => match archive.fetch_purchases(&user_id) {
                    Ok(records) if records.is_empty() => println!("No purchases yet"),
                    Ok(records) => {
                        for record in records {
                            println!(
                                "{}  {:<20} {} {}",
                                record.purchased_at.format("%Y-%m-%d %H:%M"),
                                record.entry.name,
                                record.entry.quantity,
                                record.entry.unit
                            );
                        }
                    }
                    Err(e) => eprintln!("❌ {}", e),
                },
                Err(e) => eprintln!("❌ {}", e),
            }
        }
        Command::Events { id } => {
            for event in get_events_for_entity(conn, "list_entry", &id)? {
                println!(
                    "{}  {:<15} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.actor
                );
            }
        }
        Command::Browse { .. } | Command::Recommended | Command::Categories => {}
    }

    Ok(())
}

fn add_and_report(conn: &rusqlite::Connection, store: &mut ShoppingListStore, entry: ListEntry) -> Result<()> {
    let outcome = actions::add_entry(conn, store, entry.clone(), ACTOR)?;
    report_add(&entry, outcome);
    Ok(())
}

fn report_add(entry: &ListEntry, outcome: AddOutcome) {
    match outcome {
        AddOutcome::Appended => println!("➕ Added {} ({} {}) as {}", entry.name, entry.quantity, entry.unit, entry.id),
        AddOutcome::Merged { position } => println!("🔁 Updated {} at position {}", entry.name, position + 1),
    }
}

fn print_list(store: &ShoppingListStore) {
    if store.is_empty() {
        println!("🛍️  Your shopping list is empty");
        println!("   Add items to your list to start shopping");
        return;
    }

    println!("🛒 Shopping List - {} items", store.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for entry in store.shopping_list() {
        println!(
            "{:>16}  {:<20} {:>4} {:<7} {:<18}",
            entry.id, entry.name, entry.quantity, entry.unit, entry.category
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Estimated total: ${:.2}", store.estimated_total());
}
