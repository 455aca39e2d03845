//! Item catalog models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::{ItemId, UnitPrice};

/// Category assigned when none is given.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Condition assigned when none is given.
pub const DEFAULT_CONDITION: &str = "Unknown";

/// A catalog item.
///
/// Quantities are not stored on the item; they live in its stock cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Database ID.
    pub id: ItemId,
    /// Display name (not unique).
    pub name: String,
    /// Free-text description; together with the name it identifies an item
    /// when adding stock.
    pub description: String,
    /// Grouping label.
    pub category: String,
    /// Physical condition label.
    pub condition: String,
    /// When the item was acquired, if known.
    pub date_acquired: Option<NaiveDate>,
    /// Price per unit, if known.
    pub price_per_item: Option<UnitPrice>,
}

/// Item metadata supplied when creating or editing an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub name: String,
    pub description: String,
    pub category: String,
    pub condition: String,
    pub date_acquired: Option<NaiveDate>,
    pub price_per_item: Option<UnitPrice>,
}

impl ItemDetails {
    /// Metadata with the given name and every other field at its default.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: DEFAULT_CATEGORY.to_owned(),
            condition: DEFAULT_CONDITION.to_owned(),
            date_acquired: None,
            price_per_item: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category, keeping the default for blank input.
    #[must_use]
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = or_default(category, DEFAULT_CATEGORY);
        self
    }

    /// Set the condition, keeping the default for blank input.
    #[must_use]
    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = or_default(condition, DEFAULT_CONDITION);
        self
    }
}

fn or_default(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_uses_defaults() {
        let details = ItemDetails::named("Altar Candle");
        assert_eq!(details.category, DEFAULT_CATEGORY);
        assert_eq!(details.condition, DEFAULT_CONDITION);
        assert!(details.description.is_empty());
    }

    #[test]
    fn test_blank_category_keeps_default() {
        let details = ItemDetails::named("Chair")
            .with_category("   ")
            .with_condition(" Good ");
        assert_eq!(details.category, DEFAULT_CATEGORY);
        assert_eq!(details.condition, "Good");
    }
}
