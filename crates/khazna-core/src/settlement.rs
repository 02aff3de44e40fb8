//! # Settlement
//!
//! The money arithmetic of creating and editing a sale, with no I/O. The
//! orchestrator turns these plans into ledger writes.
//!
//! ## Edit Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  returned_total = Σ returned lines    new_items_total = Σ added lines  │
//! │  price_diff     = new_items_total − returned_total                     │
//! │                                                                         │
//! │  subtotal' = subtotal + price_diff                                      │
//! │  discount' = min(discount, subtotal')                                   │
//! │  total'    = subtotal' − discount'                                      │
//! │  settled   = total' − total          (== price_diff unless capped)     │
//! │                                                                         │
//! │  settled > 0, partial sale   → amount_due += settled (customer owes)   │
//! │  settled > 0, otherwise      → cash `sale` +settled, paid += settled   │
//! │  settled < 0                 → first reduce amount_due (and customer), │
//! │                                remainder as cash `refund`, paid −= it  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! After every plan `total == subtotal − discount` and
//! `amount_due == total − amount_paid`, with both paid and due ≥ 0.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{NewSaleItem, Sale};

// =============================================================================
// Sale Totals
// =============================================================================

/// The five header figures of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub amount_due: Money,
}

impl SaleTotals {
    /// Totals of a new sale.
    ///
    /// ## Rules
    /// - `0 <= discount <= subtotal`
    /// - `0 <= amount_paid <= total` (change is the caller's concern)
    pub fn compute(items: &[NewSaleItem], discount: Money, amount_paid: Money) -> CoreResult<Self> {
        let subtotal: Money = items.iter().map(NewSaleItem::total_price).sum();

        if discount.is_negative() || discount > subtotal {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: subtotal.cents(),
            }
            .into());
        }
        let total = subtotal - discount;

        if amount_paid.is_negative() || amount_paid > total {
            return Err(ValidationError::OutOfRange {
                field: "amount_paid".to_string(),
                min: 0,
                max: total.cents(),
            }
            .into());
        }

        Ok(SaleTotals {
            subtotal,
            discount,
            total,
            amount_paid,
            amount_due: total - amount_paid,
        })
    }

    pub fn of_sale(sale: &Sale) -> Self {
        SaleTotals {
            subtotal: sale.subtotal(),
            discount: sale.discount(),
            total: sale.total(),
            amount_paid: sale.amount_paid(),
            amount_due: sale.amount_due(),
        }
    }

    pub fn check(&self) -> CoreResult<()> {
        if self.total != self.subtotal - self.discount {
            return Err(CoreError::invariant(
                "total",
                (self.subtotal - self.discount).cents(),
                self.total.cents(),
            ));
        }
        if self.amount_due != self.total - self.amount_paid {
            return Err(CoreError::invariant(
                "amount_due",
                (self.total - self.amount_paid).cents(),
                self.amount_due.cents(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Edit Settlement
// =============================================================================

/// What an edit does to a sale's money, in the sale's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSettlement {
    pub returned_total: Money,
    pub new_items_total: Money,
    /// `new_items_total − returned_total`.
    pub price_diff: Money,
    /// Header figures after the edit.
    pub totals: SaleTotals,
    /// `totals.total − previous total`.
    pub settled_diff: Money,
    /// Positive: collected as a `sale` cash entry. Negative: paid out as a
    /// `refund`.
    pub cash_delta: Money,
    /// Change to the part of the sale carried on the customer's account.
    pub due_delta: Money,
}

/// Plans the settlement of an edit.
///
/// `carries_debt` is true when the sale's remainder may sit on a customer's
/// account (partial payment with a customer attached).
pub fn plan_edit(
    before: &SaleTotals,
    returned_total: Money,
    new_items_total: Money,
    carries_debt: bool,
) -> CoreResult<EditSettlement> {
    if returned_total.is_negative() || returned_total > before.subtotal {
        return Err(CoreError::invariant(
            "returned_total within subtotal",
            before.subtotal.cents(),
            returned_total.cents(),
        ));
    }
    if new_items_total.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "new_items_total".to_string(),
        }
        .into());
    }

    let price_diff = new_items_total - returned_total;
    let subtotal = before.subtotal + price_diff;
    let discount = before.discount.min(subtotal);
    let total = subtotal - discount;
    let settled_diff = total - before.total;

    let mut amount_paid = before.amount_paid;
    let mut amount_due = before.amount_due;

    if settled_diff.is_positive() {
        if carries_debt {
            amount_due += settled_diff;
        } else {
            amount_paid += settled_diff;
        }
    } else if settled_diff.is_negative() {
        let reduction = settled_diff.abs();
        let from_due = reduction.min(amount_due.max(Money::zero()));
        amount_due -= from_due;
        amount_paid -= reduction - from_due;
    }

    let totals = SaleTotals {
        subtotal,
        discount,
        total,
        amount_paid,
        amount_due,
    };
    totals.check()?;

    Ok(EditSettlement {
        returned_total,
        new_items_total,
        price_diff,
        totals,
        settled_diff,
        cash_delta: amount_paid - before.amount_paid,
        due_delta: amount_due - before.amount_due,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn totals(subtotal: i64, discount: i64, paid: i64) -> SaleTotals {
        SaleTotals {
            subtotal: m(subtotal),
            discount: m(discount),
            total: m(subtotal - discount),
            amount_paid: m(paid),
            amount_due: m(subtotal - discount - paid),
        }
    }

    #[test]
    fn test_compute_totals() {
        let items = vec![
            NewSaleItem::priced("a", 2, 1000, 600),
            NewSaleItem::priced("b", 1, 550, 300),
        ];
        let t = SaleTotals::compute(&items, m(50), m(2000)).unwrap();
        assert_eq!(t.subtotal, m(2550));
        assert_eq!(t.total, m(2500));
        assert_eq!(t.amount_due, m(500));
    }

    #[test]
    fn test_compute_rejects_overpayment_and_excess_discount() {
        let items = vec![NewSaleItem::priced("a", 1, 1000, 600)];
        assert!(SaleTotals::compute(&items, m(0), m(1001)).is_err());
        assert!(SaleTotals::compute(&items, m(1001), m(0)).is_err());
        assert!(SaleTotals::compute(&items, m(-1), m(0)).is_err());
    }

    #[test]
    fn test_refund_when_fully_paid() {
        // 20.00 sale, return it, add a 15.00 line
        let plan = plan_edit(&totals(2000, 0, 2000), m(2000), m(1500), false).unwrap();
        assert_eq!(plan.price_diff, m(-500));
        assert_eq!(plan.cash_delta, m(-500));
        assert_eq!(plan.due_delta, m(0));
        assert_eq!(plan.totals.total, m(1500));
        assert_eq!(plan.totals.amount_paid, m(1500));
        assert_eq!(plan.totals.amount_due, m(0));
    }

    #[test]
    fn test_reduction_consumes_due_before_refunding() {
        // 100.00 partial sale, 30.00 paid, 70.00 on account; return 80.00
        let plan = plan_edit(&totals(10000, 0, 3000), m(8000), m(0), true).unwrap();
        assert_eq!(plan.due_delta, m(-7000));
        assert_eq!(plan.cash_delta, m(-1000));
        assert_eq!(plan.totals.amount_due, m(0));
        assert_eq!(plan.totals.amount_paid, m(2000));
    }

    #[test]
    fn test_increase_goes_on_account_for_partial_sales() {
        let plan = plan_edit(&totals(1000, 0, 500), m(0), m(700), true).unwrap();
        assert_eq!(plan.due_delta, m(700));
        assert_eq!(plan.cash_delta, m(0));
        assert_eq!(plan.totals.amount_due, m(1200));
    }

    #[test]
    fn test_increase_collected_in_cash_otherwise() {
        let plan = plan_edit(&totals(1000, 0, 1000), m(0), m(700), false).unwrap();
        assert_eq!(plan.cash_delta, m(700));
        assert_eq!(plan.totals.amount_paid, m(1700));
    }

    #[test]
    fn test_discount_capped_at_new_subtotal() {
        // 10.00 with 3.00 discount; return everything, add a 2.00 line
        let plan = plan_edit(&totals(1000, 300, 700), m(1000), m(200), false).unwrap();
        assert_eq!(plan.price_diff, m(-800));
        assert_eq!(plan.totals.discount, m(200));
        assert_eq!(plan.totals.total, m(0));
        assert_eq!(plan.settled_diff, m(-700));
        assert_eq!(plan.cash_delta, m(-700));
    }

    #[test]
    fn test_full_return_zeroes_sale() {
        let plan = plan_edit(&totals(5000, 500, 2000), m(5000), m(0), true).unwrap();
        assert_eq!(plan.totals, totals(0, 0, 0));
        assert_eq!(plan.due_delta, m(-2500));
        assert_eq!(plan.cash_delta, m(-2000));
    }

    proptest! {
        #[test]
        fn prop_plan_preserves_header_invariants(
            subtotal in 0i64..1_000_000,
            discount_pct in 0i64..=100,
            paid_pct in 0i64..=100,
            returned_pct in 0i64..=100,
            added in 0i64..1_000_000,
            carries_debt in any::<bool>(),
        ) {
            let discount = subtotal * discount_pct / 100;
            let paid = (subtotal - discount) * paid_pct / 100;
            let before = totals(subtotal, discount, paid);
            let returned = subtotal * returned_pct / 100;

            let plan = plan_edit(&before, m(returned), m(added), carries_debt).unwrap();
            let after = plan.totals;

            prop_assert!(after.check().is_ok());
            prop_assert!(!after.amount_paid.is_negative());
            prop_assert!(!after.amount_due.is_negative());
            prop_assert_eq!(plan.cash_delta + plan.due_delta, plan.settled_diff);
            prop_assert_eq!(after.subtotal, before.subtotal + plan.price_diff);
        }

        #[test]
        fn prop_compute_is_consistent(
            qtys in proptest::collection::vec(1i64..50, 1..8),
            price in 0i64..10_000,
            paid_pct in 0i64..=100,
        ) {
            let items: Vec<NewSaleItem> = qtys
                .iter()
                .enumerate()
                .map(|(i, q)| NewSaleItem::priced(format!("p{}", i), *q, price, price / 2))
                .collect();
            let subtotal: i64 = qtys.iter().map(|q| q * price).sum();
            let paid = subtotal * paid_pct / 100;

            let t = SaleTotals::compute(&items, m(0), m(paid)).unwrap();
            prop_assert_eq!(t.subtotal, m(subtotal));
            prop_assert!(t.check().is_ok());
        }
    }
}
