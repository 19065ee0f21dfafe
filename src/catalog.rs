// 🛒 Catalog - Immutable product records supplied to the browse surface
//
// The catalog is read-only from the list's point of view: entries are copied
// out of it (via the identity builder) and never written back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// CATALOG ITEM
// ============================================================================

/// A purchasable product as published by the catalog provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub unit: String,
    #[serde(default)]
    pub image: String,
}

impl CatalogItem {
    pub fn new(id: &str, name: &str, category: &str, price: f64, unit: &str, image: &str) -> Self {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            price,
            unit: unit.to_string(),
            image: image.to_string(),
        }
    }
}

// ============================================================================
// CATALOG PROVIDER
// ============================================================================

/// Source of catalog records (static table, CSV file, remote feed...)
pub trait CatalogProvider {
    /// All products, in display order
    fn items(&self) -> &[CatalogItem];

    /// Products promoted on the home screen
    fn recommended(&self) -> &[CatalogItem] {
        &[]
    }

    /// Lookup by catalog id (searches recommended products too)
    fn find(&self, id: &str) -> Option<&CatalogItem> {
        self.items()
            .iter()
            .chain(self.recommended().iter())
            .find(|item| item.id == id)
    }
}

/// In-memory catalog, either the built-in product table or a loaded file
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    recommended: Vec<CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        StaticCatalog {
            items,
            recommended: Vec::new(),
        }
    }

    /// Built-in product table with the home-screen recommendations
    pub fn with_defaults() -> Self {
        StaticCatalog {
            items: default_items(),
            recommended: default_recommended(),
        }
    }

    /// Load a catalog from CSV with columns `id,name,category,price,unit,image`
    pub fn from_csv(csv_path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(csv_path)
            .with_context(|| format!("Failed to open catalog CSV {}", csv_path.display()))?;

        let mut items = Vec::new();
        for result in rdr.deserialize() {
            let item: CatalogItem = result.context("Failed to deserialize catalog item")?;
            items.push(item);
        }

        tracing::info!(count = items.len(), path = %csv_path.display(), "loaded catalog");
        Ok(StaticCatalog::new(items))
    }
}

impl CatalogProvider for StaticCatalog {
    fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    fn recommended(&self) -> &[CatalogItem] {
        &self.recommended
    }
}

// ============================================================================
// CATEGORIES & UNITS
// ============================================================================

/// Category offered by the manual-add form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryInfo {
    pub name: &'static str,
    pub color: &'static str,
}

pub const CATEGORIES: &[CategoryInfo] = &[
    CategoryInfo { name: "Fruits & Veggies", color: "#4CAF50" },
    CategoryInfo { name: "Dairy & Eggs", color: "#FFC107" },
    CategoryInfo { name: "Bakery", color: "#FF9800" },
    CategoryInfo { name: "Meat & Fish", color: "#F44336" },
    CategoryInfo { name: "Beverages", color: "#2196F3" },
    CategoryInfo { name: "Snacks", color: "#9C27B0" },
    CategoryInfo { name: "Frozen", color: "#00BCD4" },
    CategoryInfo { name: "Pantry", color: "#795548" },
];

/// Units selectable when adding an item by hand
pub const UNITS: &[&str] = &[
    "each", "lb", "oz", "kg", "g", "bunch", "dozen", "gallon", "liter", "ml",
];

pub const DEFAULT_UNIT: &str = "each";

pub fn find_category(name: &str) -> Option<&'static CategoryInfo> {
    CATEGORIES.iter().find(|c| c.name == name)
}

// ============================================================================
// BUILT-IN PRODUCT TABLE
// ============================================================================

fn default_items() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new("1", "Apple", "Fruits & Veggies", 1.99, "lb", "https://images.pexels.com/photos/102104/pexels-photo-102104.jpeg"),
        CatalogItem::new("2", "Banana", "Fruits & Veggies", 0.59, "lb", "https://images.pexels.com/photos/461208/pexels-photo-461208.jpeg"),
        CatalogItem::new("3", "Strawberry", "Fruits & Veggies", 4.99, "pack", "https://images.pexels.com/photos/302478/pexels-photo-302478.jpeg"),
        CatalogItem::new("4", "Ladyfinger", "Fruits & Veggies", 2.49, "lb", "https://i.pinimg.com/originals/87/48/0a/87480a3980de07e9ccb4d52029f15d2a.jpg"),
        CatalogItem::new("5", "Potato", "Fruits & Veggies", 1.29, "lb", "https://www.photos-public-domain.com/wp-content/uploads/2010/11/potatoes.jpg"),
        CatalogItem::new("6", "Milk", "Dairy & Eggs", 3.49, "gallon", "https://www.healthkart.com/connect/wp-content/uploads/2022/07/900x500_thumbnail_HK-Vitamins-and-Minerals-in-Milk-.png"),
        CatalogItem::new("7", "Eggs", "Dairy & Eggs", 4.29, "dozen", "https://images.pexels.com/photos/162712/egg-white-food-protein-162712.jpeg"),
        CatalogItem::new("8", "Bread", "Bakery", 2.99, "loaf", "https://images.pexels.com/photos/1775043/pexels-photo-1775043.jpeg"),
        CatalogItem::new("9", "Chicken Breast", "Meat & Fish", 5.99, "lb", "https://images.pexels.com/photos/616354/pexels-photo-616354.jpeg"),
        CatalogItem::new("10", "Salmon", "Meat & Fish", 12.99, "lb", "https://kasilofseafoods.com/wp-content/uploads/2016/04/wild-alaskan-salmon-scaled.jpg"),
        CatalogItem::new("11", "Cheese", "Dairy & Eggs", 6.49, "block", "http://ghk.h-cdn.co/assets/cm/15/11/54ff1f7753c29-ghk-best-diet-advice-cheese-s2.jpg"),
        CatalogItem::new("12", "Orange Juice", "Beverages", 3.99, "liter", "https://images.pexels.com/photos/96974/pexels-photo-96974.jpeg"),
        CatalogItem::new("13", "Bagels", "Bakery", 2.49, "pack", "https://images.pexels.com/photos/461382/pexels-photo-461382.jpeg"),
        CatalogItem::new("14", "Spinach", "Fruits & Veggies", 1.99, "bunch", "https://eadn-wc01-4177395.nxedge.io/wp-content/uploads/2020/05/iStock-916931074-2-scaled.jpg"),
        CatalogItem::new("15", "Cake", "Bakery", 8.99, "each", "https://www.janespatisserie.com/wp-content/uploads/2019/05/IMG_0074_1.jpg"),
        CatalogItem::new("16", "Biscuits", "Bakery", 2.99, "pack", "https://www.spendwithpennies.com/wp-content/uploads/2022/04/Chocolate-Chip-Cookies-SpendWithPennies-2.jpg"),
    ]
}

// Recommendations carry their own catalog ids so they key like browse items
fn default_recommended() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new("rec-1", "Organic Bananas", "Fruits & Veggies", 2.99, "bunch", "https://images.pexels.com/photos/1093038/pexels-photo-1093038.jpeg"),
        CatalogItem::new("rec-2", "Avocado", "Fruits & Veggies", 1.49, "each", "https://images.pexels.com/photos/557659/pexels-photo-557659.jpeg"),
        CatalogItem::new("rec-3", "Milk", "Dairy & Eggs", 3.49, "gallon", "https://images.pexels.com/photos/248412/pexels-photo-248412.jpeg"),
        CatalogItem::new("rec-4", "Eggs", "Dairy & Eggs", 4.29, "dozen", "https://images.pexels.com/photos/162712/egg-white-food-protein-162712.jpeg"),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog_has_sixteen_products() {
        let catalog = StaticCatalog::with_defaults();
        assert_eq!(catalog.items().len(), 16);
        assert_eq!(catalog.recommended().len(), 4);
    }

    #[test]
    fn test_find_searches_recommendations() {
        let catalog = StaticCatalog::with_defaults();

        assert_eq!(catalog.find("6").map(|i| i.name.as_str()), Some("Milk"));
        assert_eq!(
            catalog.find("rec-1").map(|i| i.name.as_str()),
            Some("Organic Bananas")
        );
        assert!(catalog.find("missing").is_none());
    }

    #[test]
    fn test_find_category_is_exact() {
        assert_eq!(find_category("Bakery").map(|c| c.color), Some("#FF9800"));
        assert!(find_category("bakery").is_none());
    }

    #[test]
    fn test_from_csv() {
        let path = std::env::temp_dir().join(format!("catalog-{}.csv", uuid::Uuid::new_v4()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "id,name,category,price,unit,image").unwrap();
            writeln!(file, "a1,Rice,Pantry,2.5,kg,").unwrap();
            writeln!(file, "a2,Ice Cream,Frozen,4.75,each,http://img").unwrap();
        }

        let catalog = StaticCatalog::from_csv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(catalog.items().len(), 2);
        assert_eq!(catalog.items()[0].name, "Rice");
        assert_eq!(catalog.items()[0].image, "");
        assert_eq!(catalog.items()[1].price, 4.75);
        assert!(catalog.recommended().is_empty());
    }

    #[test]
    fn test_from_csv_missing_file() {
        let result = StaticCatalog::from_csv(Path::new("/nonexistent/catalog.csv"));
        assert!(result.is_err());
    }
}
