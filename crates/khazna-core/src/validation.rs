//! # Validation Module
//!
//! Input checks that run before any storage work starts.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Register boundary (serde)                                    │
//! │  └── Type and shape of the request                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Quantities, prices, non-empty carts                               │
//! │  └── Caller-supplied line totals (InvariantViolation on mismatch)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (current_stock >= 0), CHECK (total = subtotal - discount)   │
//! │  └── Append-only triggers on every fact table                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::{CoreResult, ValidationError};
use crate::types::NewSaleItem;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: non-empty, at most 50 characters.
///
/// ```rust
/// use khazna_core::validation::validate_sku;
///
/// assert!(validate_sku("TEA-250").is_ok());
/// assert!(validate_sku("  ").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_text("sku", sku, 50)
}

/// Validates a display name (product or customer).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates that an identifier is present.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, value)?;
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: 1 to [`MAX_ITEM_QUANTITY`].
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

pub fn validate_non_negative(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price or cost: 0 to [`MAX_UNIT_PRICE_CENTS`].
pub fn validate_price(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_UNIT_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }
    Ok(())
}

pub fn validate_positive(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Sale Validators
// =============================================================================

/// Validates every line a caller wants to put on a sale.
///
/// `allow_empty` is true for edits, where an empty add-set is legal as long
/// as something is returned.
pub fn validate_sale_items(items: &[NewSaleItem], allow_empty: bool) -> CoreResult<()> {
    if items.is_empty() && !allow_empty {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }
    if items.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        }
        .into());
    }

    for item in items {
        validate_required("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
        validate_price("unit_price", item.unit_price_cents)?;
        validate_price("unit_cost", item.unit_cost_cents)?;
        item.check_totals()?;
    }
    Ok(())
}

/// Validates the ids of lines to return: non-empty strings, no duplicates.
pub fn validate_return_ids(ids: &[String]) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        validate_required("return_item_ids", id)?;
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "return_item_ids".to_string(),
                value: id.clone(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("TEA-250").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_sale_items_rejects_oversized_price() {
        let item = NewSaleItem::priced("p1", 3, i64::MAX / 2, 0);
        let err = validate_sale_items(&[item], false).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "unit_price"
        ));

        let item = NewSaleItem::priced("p1", MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS, MAX_UNIT_PRICE_CENTS);
        assert!(validate_sale_items(&[item], false).is_ok());
        assert!(validate_price("unit_cost", -1).is_err());
    }

    #[test]
    fn test_validate_sale_items_requires_lines_for_checkout() {
        let err = validate_sale_items(&[], false).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
        assert!(validate_sale_items(&[], true).is_ok());
    }

    #[test]
    fn test_validate_sale_items_reports_invariant_violation() {
        let mut item = NewSaleItem::priced("p1", 2, 1000, 600);
        item.profit_cents += 1;
        let err = validate_sale_items(&[item], false).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn test_validate_return_ids() {
        assert!(validate_return_ids(&["a".to_string(), "b".to_string()]).is_ok());
        assert!(matches!(
            validate_return_ids(&["a".to_string(), "a".to_string()]),
            Err(ValidationError::Duplicate { .. })
        ));
        assert!(validate_return_ids(&[" ".to_string()]).is_err());
    }
}
