// 🔑 Identity Keys - One rule for every place that adds to the list
//
// "Is this the same purchasable thing?" is answered by the key alone:
// - catalog-backed items: `{catalog_id}-{unit}-{quantity}` (deterministic)
// - manual items: creation time in epoch millis (always unique, never dedupes)

use chrono::{DateTime, Utc};

// ============================================================================
// KEY INPUT
// ============================================================================

/// Source attributes of a candidate list entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyInput<'a> {
    /// Catalog identity, absent for items typed in by hand
    pub catalog_id: Option<&'a str>,
    pub name: &'a str,
    pub unit: &'a str,
    pub quantity: &'a str,
}

// ============================================================================
// IDENTITY KEY BUILDER
// ============================================================================

/// Derives list-entry ids
///
/// Catalog keys are a pure function of their input. Manual keys come from
/// the creation timestamp; the builder remembers the last one it issued so
/// two manual adds inside the same millisecond still get distinct keys.
#[derive(Debug, Clone, Default)]
pub struct IdentityKeyBuilder {
    last_manual_millis: Option<i64>,
}

impl IdentityKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for a catalog-backed entry
    pub fn catalog_key(catalog_id: &str, unit: &str, quantity: &str) -> String {
        format!("{}-{}-{}", catalog_id, unit, quantity)
    }

    /// Build a key using the current time for manual items
    pub fn build(&mut self, input: &KeyInput<'_>) -> String {
        self.build_at(input, Utc::now())
    }

    /// Build a key with an explicit creation time
    pub fn build_at(&mut self, input: &KeyInput<'_>, created_at: DateTime<Utc>) -> String {
        match input.catalog_id {
            Some(catalog_id) => Self::catalog_key(catalog_id, input.unit, input.quantity),
            None => self.manual_key(created_at),
        }
    }

    fn manual_key(&mut self, created_at: DateTime<Utc>) -> String {
        let mut millis = created_at.timestamp_millis();

        // Clock did not advance (or went backwards): step past the last key
        if let Some(last) = self.last_manual_millis {
            if millis <= last {
                millis = last + 1;
            }
        }

        self.last_manual_millis = Some(millis);
        millis.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
