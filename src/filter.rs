// 🔎 Catalog Filter - Search box + category chip over the catalog
//
// Precedence: a non-empty query always wins and the category chip is ignored.

use crate::catalog::CatalogItem;

/// Filter catalog items by free-text query and/or category
///
/// - blank query, category set: exact (case-sensitive) category match
/// - blank query, no category: everything
/// - non-empty query: name or category contains the query, case-insensitive
pub fn filter_catalog<'a>(
    catalog: &'a [CatalogItem],
    query: &str,
    category: Option<&str>,
) -> Vec<&'a CatalogItem> {
    let query = query.trim();

    if query.is_empty() {
        return match category {
            Some(category) => catalog.iter().filter(|item| item.category == category).collect(),
            None => catalog.iter().collect(),
        };
    }

    let needle = query.to_lowercase();
    catalog
        .iter()
        .filter(|item| {
            item.name.to_lowercase().contains(&needle)
                || item.category.to_lowercase().contains(&needle)
        })
        .collect()
}
