// 📝 List Entries - What the shopping list actually holds
//
// Every way of adding to the list (browse grid, recommendations, manual form,
// buy-again) builds its entry here, so the identity rule is applied uniformly.

use crate::catalog::{find_category, CatalogItem, DEFAULT_UNIT};
use crate::identity::{IdentityKeyBuilder, KeyInput};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_QUANTITY: &str = "1";

// ============================================================================
// LIST ENTRY
// ============================================================================

/// A pending (or purchased) line on the shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Identity key (see `IdentityKeyBuilder`)
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub price: f64,
    #[serde(default)]
    pub image: String,
    /// Free-form numeric text as typed by the user
    #[serde(default = "default_quantity")]
    pub quantity: String,
}

fn default_quantity() -> String {
    DEFAULT_QUANTITY.to_string()
}

impl ListEntry {
    /// Entry for a catalog product with a chosen unit and quantity
    pub fn from_catalog(
        item: &CatalogItem,
        unit: Option<&str>,
        quantity: Option<&str>,
        keys: &mut IdentityKeyBuilder,
    ) -> Self {
        let unit = unit.unwrap_or(&item.unit);
        let quantity = quantity.unwrap_or(DEFAULT_QUANTITY);

        let id = keys.build(&KeyInput {
            catalog_id: Some(&item.id),
            name: &item.name,
            unit,
            quantity,
        });

        ListEntry {
            id,
            name: item.name.clone(),
            category: item.category.clone(),
            unit: unit.to_string(),
            price: item.price,
            image: item.image.clone(),
            quantity: quantity.to_string(),
        }
    }

    /// Entry from a validated manual form (no price, no image)
    pub fn from_form(form: &ValidatedForm, keys: &mut IdentityKeyBuilder) -> Self {
        let id = keys.build(&KeyInput {
            catalog_id: None,
            name: &form.name,
            unit: &form.unit,
            quantity: &form.quantity,
        });

        ListEntry {
            id,
            name: form.name.clone(),
            category: form.category.clone(),
            unit: form.unit.clone(),
            price: 0.0,
            image: String::new(),
            quantity: form.quantity.clone(),
        }
    }

    /// Quantity as a number; anything unparsable counts as one
    pub fn quantity_value(&self) -> f64 {
        self.quantity
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|q| q.is_finite() && *q >= 0.0)
            .unwrap_or(1.0)
    }

    /// Estimated line cost
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity_value()
    }
}

// ============================================================================
// MANUAL ITEM FORM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Item name is required")]
    MissingName,

    #[error("Please choose a category")]
    MissingCategory,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// Raw input of the "Add Item" form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualItemForm {
    pub name: String,
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

/// Form input that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedForm {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub quantity: String,
}

impl ManualItemForm {
    /// Name must be non-blank and the category one of the known categories
    pub fn validate(&self) -> Result<ValidatedForm, FormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FormError::MissingName);
        }

        let category = match self.category.as_deref() {
            None => return Err(FormError::MissingCategory),
            Some(c) if c.trim().is_empty() => return Err(FormError::MissingCategory),
            Some(c) => c,
        };
        if find_category(category).is_none() {
            return Err(FormError::UnknownCategory(category.to_string()));
        }

        let unit = self
            .unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT);
        let quantity = self
            .quantity
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_QUANTITY);

        Ok(ValidatedForm {
            name: name.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            quantity: quantity.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
