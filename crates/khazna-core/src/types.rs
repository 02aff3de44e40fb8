//! # Domain Types
//!
//! The facts and aggregates of the four ledgers.
//!
//! ## Fact Logs and Their Aggregates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Append-only fact               Materialized aggregate                  │
//! │  ─────────────────────          ──────────────────────────────────      │
//! │  StockMovement        ──fold──► Product.current_stock                   │
//! │  CashboxTransaction   ──fold──► Cashbox.balance_{usd,lyd}               │
//! │  CustomerLedgerEntry  ──fold──► Customer.balance_owed / total_purchases │
//! │  SaleItem (active)    ──sum───► Sale.subtotal                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary fields are stored raw (`*_cents: i64`) to match the database
//! columns one-to-one; accessor methods return [`Money`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Currency, ExchangeRate, Money};

// =============================================================================
// Product
// =============================================================================

/// A product whose stock the Inventory Ledger owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit, unique.
    pub sku: String,
    pub name: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    /// Never negative; only the Inventory Ledger writes it.
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub is_active: bool,
    /// Bumped on every write.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.low_stock_threshold
    }

    /// Captures the product's identity and current prices.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            product_id: self.id.clone(),
            sku: self.sku.clone(),
            name: self.name.clone(),
            unit_price_cents: self.selling_price_cents,
            unit_cost_cents: self.cost_price_cents,
        }
    }
}

/// Input for registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    /// Recorded as an `in` movement so stock always equals its log.
    #[serde(default)]
    pub opening_stock: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MovementType {
    /// Stock received or returned.
    In,
    /// Stock sold.
    Out,
    /// Signed correction (stock count, damage).
    Adjustment,
}

impl MovementType {
    /// The change to `current_stock` a movement of `quantity` causes.
    ///
    /// `in` and `out` take a positive quantity; `adjustment` takes the
    /// signed delta itself.
    pub fn stock_delta(&self, quantity: i64) -> i64 {
        match self {
            MovementType::In | MovementType::Adjustment => quantity,
            MovementType::Out => -quantity,
        }
    }

    /// Checks the quantity is meaningful for this movement type.
    pub fn validate_quantity(&self, quantity: i64) -> Result<(), ValidationError> {
        match self {
            MovementType::In | MovementType::Out if quantity <= 0 => {
                Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                })
            }
            MovementType::Adjustment if quantity == 0 => Err(ValidationError::Inconsistent {
                field: "quantity".to_string(),
                reason: "an adjustment must change stock".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Immutable stock change fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Positive for in/out, signed for adjustment.
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub unit_cost_cents: Option<i64>,
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// `new_stock == previous_stock ± quantity` for this row.
    pub fn is_consistent(&self) -> bool {
        self.new_stock == self.previous_stock + self.movement_type.stock_delta(self.quantity)
    }
}

// =============================================================================
// Sale Status / Payment Method
// =============================================================================

/// Lifecycle: `none → completed → (edited)* → returned | cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SaleStatus {
    Completed,
    Pending,
    Cancelled,
    Returned,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Pending => "pending",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Returned => "returned",
        }
    }

    /// Only completed sales accept edits, returns and cancellation.
    pub const fn is_editable(&self) -> bool {
        matches!(self, SaleStatus::Completed)
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    /// Part paid now, the rest carried on the customer's account.
    Partial,
}

impl PaymentMethod {
    /// Whether an unpaid remainder may sit on the customer's balance.
    pub const fn carries_debt(&self) -> bool {
        matches!(self, PaymentMethod::Partial)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `YYYYMMDD-NNNN`, unique.
    pub sale_number: String,
    pub customer_id: Option<String>,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub amount_due_cents: i64,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    /// Present iff `currency` differs from the base currency.
    pub exchange_rate_micros: Option<i64>,
    pub created_by: String,
    pub notes: Option<String>,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    #[inline]
    pub fn amount_due(&self) -> Money {
        Money::from_cents(self.amount_due_cents)
    }

    pub fn exchange_rate(&self) -> Option<ExchangeRate> {
        self.exchange_rate_micros
            .and_then(|micros| ExchangeRate::from_micros(micros).ok())
    }

    /// `total == subtotal - discount` and `amount_due == total - amount_paid`.
    pub fn check_totals(&self) -> CoreResult<()> {
        let expected_total = self.subtotal_cents - self.discount_cents;
        if self.total_cents != expected_total {
            return Err(CoreError::invariant(
                format!("sale {} total", self.id),
                expected_total,
                self.total_cents,
            ));
        }
        let expected_due = self.total_cents - self.amount_paid_cents;
        if self.amount_due_cents != expected_due {
            return Err(CoreError::invariant(
                format!("sale {} amount_due", self.id),
                expected_due,
                self.amount_due_cents,
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// Product identity and prices frozen at the moment a line is created.
///
/// A value object: copied into the line, never a live reference to the
/// product, so later renames and repricing leave history untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemSnapshot {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
}

/// A line fact tied to exactly one sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    /// `quantity × unit_price`.
    pub total_price_cents: i64,
    /// `total_price − quantity × unit_cost`.
    pub profit_cents: i64,
    /// Set when an edit or return takes the line off the sale.
    #[ts(as = "Option<String>")]
    pub returned_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Builds a line from a snapshot and caller-supplied figures.
    pub fn from_snapshot(
        sale_id: &str,
        snapshot: ItemSnapshot,
        quantity: i64,
        total_price_cents: i64,
        profit_cents: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        SaleItem {
            id: uuid::Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            product_id: snapshot.product_id,
            sku_snapshot: snapshot.sku,
            name_snapshot: snapshot.name,
            quantity,
            unit_price_cents: snapshot.unit_price_cents,
            unit_cost_cents: snapshot.unit_cost_cents,
            total_price_cents,
            profit_cents,
            returned_at: None,
            created_at,
        }
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    #[inline]
    pub fn profit(&self) -> Money {
        Money::from_cents(self.profit_cents)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Verifies the line's derived figures.
    pub fn check_totals(&self) -> CoreResult<()> {
        check_line_figures(
            &self.product_id,
            self.quantity,
            self.unit_price_cents,
            self.unit_cost_cents,
            self.total_price_cents,
            self.profit_cents,
        )
    }
}

/// A line the caller wants to add, with figures already computed.
///
/// The figures are checked, never silently recomputed: a mismatch is a
/// caller bug and fails with `InvariantViolation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    pub total_price_cents: i64,
    pub profit_cents: i64,
}

impl NewSaleItem {
    /// Builds a line whose derived figures are consistent by construction.
    pub fn priced(
        product_id: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
        unit_cost_cents: i64,
    ) -> Self {
        // Saturates; validation rejects prices that large before use.
        let total_price_cents = quantity.saturating_mul(unit_price_cents);
        NewSaleItem {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
            unit_cost_cents,
            total_price_cents,
            profit_cents: total_price_cents.saturating_sub(quantity.saturating_mul(unit_cost_cents)),
        }
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    pub fn check_totals(&self) -> CoreResult<()> {
        check_line_figures(
            &self.product_id,
            self.quantity,
            self.unit_price_cents,
            self.unit_cost_cents,
            self.total_price_cents,
            self.profit_cents,
        )
    }
}

fn check_line_figures(
    product_id: &str,
    quantity: i64,
    unit_price_cents: i64,
    unit_cost_cents: i64,
    total_price_cents: i64,
    profit_cents: i64,
) -> CoreResult<()> {
    let out_of_range = |field: &str| {
        CoreError::from(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        })
    };
    let expected_total = quantity
        .checked_mul(unit_price_cents)
        .ok_or_else(|| out_of_range("total_price"))?;
    if total_price_cents != expected_total {
        return Err(CoreError::invariant(
            format!("total_price of line for product {}", product_id),
            expected_total,
            total_price_cents,
        ));
    }
    let expected_profit = quantity
        .checked_mul(unit_cost_cents)
        .and_then(|cost| total_price_cents.checked_sub(cost))
        .ok_or_else(|| out_of_range("profit"))?;
    if profit_cents != expected_profit {
        return Err(CoreError::invariant(
            format!("profit of line for product {}", product_id),
            expected_profit,
            profit_cents,
        ));
    }
    Ok(())
}

/// A sale header with its active lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Cashbox
// =============================================================================

/// Two independent currency balances. No conversion happens between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cashbox {
    pub id: String,
    pub name: String,
    pub balance_usd_cents: i64,
    pub balance_lyd_cents: i64,
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cashbox {
    pub fn balance(&self, currency: Currency) -> Money {
        match currency {
            Currency::Usd => Money::from_cents(self.balance_usd_cents),
            Currency::Lyd => Money::from_cents(self.balance_lyd_cents),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CashboxTxType {
    Sale,
    Expense,
    Deposit,
    Withdrawal,
    Adjustment,
    Refund,
}

impl CashboxTxType {
    /// Checks the signed amount matches the type's direction.
    ///
    /// `sale` and `deposit` bring cash in, `expense`, `withdrawal` and
    /// `refund` take it out, `adjustment` goes either way.
    pub fn permits(&self, amount_cents: i64) -> bool {
        match self {
            CashboxTxType::Sale | CashboxTxType::Deposit => amount_cents >= 0,
            CashboxTxType::Expense | CashboxTxType::Withdrawal | CashboxTxType::Refund => {
                amount_cents <= 0
            }
            CashboxTxType::Adjustment => true,
        }
    }
}

/// Immutable cash fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashboxTransaction {
    pub id: String,
    pub cashbox_id: String,
    pub tx_type: CashboxTxType,
    /// Signed.
    pub amount_usd_cents: i64,
    /// Signed.
    pub amount_lyd_cents: i64,
    pub exchange_rate_micros: Option<i64>,
    pub balance_usd_after_cents: i64,
    pub balance_lyd_after_cents: i64,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// Customer account, kept in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Negative means store credit.
    pub balance_owed_cents: i64,
    /// Lifetime metric, never decremented.
    pub total_purchases_cents: i64,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn balance_owed(&self) -> Money {
        Money::from_cents(self.balance_owed_cents)
    }

    #[inline]
    pub fn total_purchases(&self) -> Money {
        Money::from_cents(self.total_purchases_cents)
    }
}

/// Balance-delta fact. `customers` is the fold of these rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CustomerLedgerEntry {
    pub id: String,
    pub customer_id: String,
    pub balance_delta_cents: i64,
    pub purchases_delta_cents: i64,
    pub balance_after_cents: i64,
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub cashbox_id: String,
    pub category: String,
    pub description: String,
    /// Positive; the matching cashbox row carries the negative amount.
    pub amount_cents: i64,
    pub currency: Currency,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(subtotal: i64, discount: i64, total: i64, paid: i64, due: i64) -> Sale {
        Sale {
            id: "s1".to_string(),
            sale_number: "20260101-0001".to_string(),
            customer_id: None,
            status: SaleStatus::Completed,
            subtotal_cents: subtotal,
            discount_cents: discount,
            total_cents: total,
            amount_paid_cents: paid,
            amount_due_cents: due,
            payment_method: PaymentMethod::Cash,
            currency: Currency::Lyd,
            exchange_rate_micros: None,
            created_by: "u1".to_string(),
            notes: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_movement_stock_delta() {
        assert_eq!(MovementType::In.stock_delta(3), 3);
        assert_eq!(MovementType::Out.stock_delta(3), -3);
        assert_eq!(MovementType::Adjustment.stock_delta(-2), -2);
    }

    #[test]
    fn test_movement_quantity_rules() {
        assert!(MovementType::Out.validate_quantity(0).is_err());
        assert!(MovementType::In.validate_quantity(-1).is_err());
        assert!(MovementType::Adjustment.validate_quantity(0).is_err());
        assert!(MovementType::Adjustment.validate_quantity(-4).is_ok());
    }

    #[test]
    fn test_sale_check_totals() {
        assert!(sale(2000, 0, 2000, 2000, 0).check_totals().is_ok());
        assert!(sale(2000, 500, 1500, 1000, 500).check_totals().is_ok());

        let err = sale(2000, 500, 2000, 2000, 0).check_totals().unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));

        let err = sale(2000, 0, 2000, 1500, 0).check_totals().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvariantViolation { expected: 500, actual: 0, .. }
        ));
    }

    #[test]
    fn test_new_item_figures_are_checked_not_recomputed() {
        let good = NewSaleItem::priced("p1", 2, 1000, 600);
        assert_eq!(good.total_price_cents, 2000);
        assert_eq!(good.profit_cents, 800);
        assert!(good.check_totals().is_ok());

        let mut bad_total = good.clone();
        bad_total.total_price_cents = 1999;
        assert!(matches!(
            bad_total.check_totals(),
            Err(CoreError::InvariantViolation { expected: 2000, actual: 1999, .. })
        ));

        let mut bad_profit = good;
        bad_profit.profit_cents = 900;
        assert!(matches!(
            bad_profit.check_totals(),
            Err(CoreError::InvariantViolation { expected: 800, actual: 900, .. })
        ));
    }

    #[test]
    fn test_overflowing_line_is_a_validation_error() {
        let item = NewSaleItem::priced("p1", 3, i64::MAX / 2, 0);
        assert_eq!(item.total_price_cents, i64::MAX);
        assert!(matches!(
            item.check_totals(),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_cashbox_tx_type_signs() {
        assert!(CashboxTxType::Sale.permits(100));
        assert!(!CashboxTxType::Sale.permits(-100));
        assert!(CashboxTxType::Refund.permits(-500));
        assert!(!CashboxTxType::Refund.permits(500));
        assert!(CashboxTxType::Adjustment.permits(-1));
        assert!(CashboxTxType::Adjustment.permits(1));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut product = Product {
            id: "p1".to_string(),
            sku: "TEA-250".to_string(),
            name: "Green Tea 250g".to_string(),
            cost_price_cents: 600,
            selling_price_cents: 1000,
            current_stock: 5,
            low_stock_threshold: 2,
            is_active: true,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let snapshot = product.snapshot();
        product.name = "Renamed".to_string();
        product.selling_price_cents = 1200;

        assert_eq!(snapshot.name, "Green Tea 250g");
        assert_eq!(snapshot.unit_price_cents, 1000);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
        assert_eq!(
            serde_json::to_string(&CashboxTxType::Withdrawal).unwrap(),
            "\"withdrawal\""
        );
        assert_eq!(SaleStatus::Returned.to_string(), "returned");
    }
}
