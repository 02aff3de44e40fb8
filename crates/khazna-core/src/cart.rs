//! # Cart
//!
//! Checkout carts and edit carts share one rule: a line's price and cost
//! are locked the moment the product is added.
//!
//! ## Price Locking
//! ```text
//! add_product(tea @ 10.00)      ──► line { unit 10.00, qty 1 }
//! product repriced to 12.00     ──► line unchanged
//! update_quantity(tea, 3)       ──► line { unit 10.00, qty 3, total 30.00 }
//! ```
//! Totals and profit are always re-derived from the locked figures, so the
//! lines a cart hands to the orchestrator pass its invariant checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ItemSnapshot, NewSaleItem, Product};
use crate::validation::validate_quantity;
use crate::MAX_CART_ITEMS;

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Identity and prices captured at add-time.
    pub snapshot: ItemSnapshot,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.snapshot.unit_price_cents).multiply_quantity(self.quantity)
    }

    pub fn profit(&self) -> Money {
        self.total_price()
            - Money::from_cents(self.snapshot.unit_cost_cents).multiply_quantity(self.quantity)
    }

    pub fn to_new_item(&self) -> NewSaleItem {
        NewSaleItem::priced(
            self.snapshot.product_id.clone(),
            self.quantity,
            self.snapshot.unit_price_cents,
            self.snapshot.unit_cost_cents,
        )
    }
}

/// A cart of lines unique by product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds a product, or increases the quantity of its existing line.
    ///
    /// An existing line keeps the price it was locked at.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.snapshot.product_id == product.id)
        {
            let new_qty = line.quantity + quantity;
            validate_quantity(new_qty)?;
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items".to_string(),
                min: 1,
                max: MAX_CART_ITEMS as i64,
            }
            .into());
        }

        self.lines.push(CartLine {
            snapshot: product.snapshot(),
            quantity,
            added_at: Utc::now(),
        });
        Ok(())
    }

    /// Sets a line's quantity; zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_line(product_id);
        }
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.snapshot.product_id == product_id)
            .ok_or_else(|| not_in_cart(product_id))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_line(&mut self, product_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.snapshot.product_id != product_id);
        if self.lines.len() == before {
            return Err(not_in_cart(product_id).into());
        }
        Ok(())
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::total_price).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The lines in the shape the orchestrator accepts.
    pub fn to_new_items(&self) -> Vec<NewSaleItem> {
        self.lines.iter().map(CartLine::to_new_item).collect()
    }
}

fn not_in_cart(product_id: &str) -> ValidationError {
    ValidationError::Inconsistent {
        field: "product_id".to_string(),
        reason: format!("product {} is not in the cart", product_id),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
