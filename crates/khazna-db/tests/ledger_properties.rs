//! End-to-end properties of the ledgers under create / edit / return.
//!
//! Each test runs against a fresh in-memory database unless it needs two
//! real connections.

use khazna_core::request::{CreateSaleRequest, EditSaleRequest, ReverseSaleRequest};
use khazna_core::{
    Cashbox, CashboxTxType, CoreError, Currency, Customer, ExchangeRate, MovementType, NewProduct,
    NewSaleItem, PaymentMethod, Product, Sale, SaleItem, SaleStatus,
};
use khazna_db::{Database, DbConfig, DbError, LedgerSettings, Reference, TransactionOrchestrator};

// =============================================================================
// Helpers
// =============================================================================

async fn setup() -> (Database, TransactionOrchestrator) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let orchestrator = db.orchestrator(LedgerSettings::default());
    (db, orchestrator)
}

async fn product(db: &Database, sku: &str, price: i64, cost: i64, stock: i64) -> Product {
    db.inventory()
        .register_product(
            &NewProduct {
                sku: sku.to_string(),
                name: format!("Item {sku}"),
                cost_price_cents: cost,
                selling_price_cents: price,
                opening_stock: stock,
                low_stock_threshold: 0,
            },
            Some("admin"),
        )
        .await
        .unwrap()
}

fn sale_request(items: Vec<NewSaleItem>, paid: i64) -> CreateSaleRequest {
    CreateSaleRequest {
        customer_id: None,
        items,
        discount_cents: 0,
        amount_paid_cents: paid,
        payment_method: PaymentMethod::Cash,
        currency: Currency::Lyd,
        exchange_rate: None,
        cashbox_id: None,
        created_by: "cashier-1".to_string(),
        notes: None,
        expected_total_cents: None,
    }
}

fn edit_request(sale_id: &str, returns: Vec<String>, adds: Vec<NewSaleItem>) -> EditSaleRequest {
    EditSaleRequest {
        sale_id: sale_id.to_string(),
        return_item_ids: returns,
        new_items: adds,
        cashbox_id: None,
        created_by: "cashier-1".to_string(),
        expected_version: None,
    }
}

fn reverse_request(sale_id: &str) -> ReverseSaleRequest {
    ReverseSaleRequest {
        sale_id: sale_id.to_string(),
        cashbox_id: None,
        created_by: "manager".to_string(),
        expected_version: None,
    }
}

fn assert_header_consistent(sale: &Sale) {
    assert_eq!(sale.total_cents, sale.subtotal_cents - sale.discount_cents, "{}", sale.id);
    assert_eq!(sale.amount_due_cents, sale.total_cents - sale.amount_paid_cents, "{}", sale.id);
    assert!(sale.amount_paid_cents >= 0);
    assert!(sale.amount_due_cents >= 0);
}

/// Everything an edit could touch.
#[derive(Debug, PartialEq)]
struct Snapshot {
    products: Vec<Product>,
    movements: usize,
    sale: Sale,
    items: Vec<SaleItem>,
    cashbox: Cashbox,
    cash_transactions: usize,
    customer: Option<Customer>,
    customer_ledger: usize,
}

async fn snapshot(db: &Database, sale_id: &str, customer_id: Option<&str>) -> Snapshot {
    let products = db.inventory().list_products().await.unwrap();
    let mut movements = 0;
    for p in &products {
        movements += db.inventory().movements_for(&p.id).await.unwrap().len();
    }
    let (customer, customer_ledger) = match customer_id {
        Some(id) => (
            Some(db.customers().get_customer(id).await.unwrap()),
            db.customers().ledger_for(id).await.unwrap().len(),
        ),
        None => (None, 0),
    };
    Snapshot {
        products,
        movements,
        sale: db.sales().get_sale(sale_id).await.unwrap().unwrap(),
        items: db.sales().get_all_items(sale_id).await.unwrap(),
        cashbox: db.cashbox().get_cashbox("main").await.unwrap(),
        cash_transactions: db.cashbox().transactions_for("main").await.unwrap().len(),
        customer,
        customer_ledger,
    }
}

// =============================================================================
// Worked Scenarios
// =============================================================================

#[tokio::test]
async fn create_then_edit_worked_example() {
    let (db, orchestrator) = setup().await;
    let p = product(&db, "TEA", 1000, 600, 5).await;

    // Create: qty 2 at 10.00 LYD, cost 6.00, fully paid.
    let created = orchestrator
        .create_sale(&sale_request(vec![NewSaleItem::priced(&p.id, 2, 1000, 600)], 2000))
        .await
        .unwrap();

    assert_eq!(db.inventory().get_stock(&p.id).await.unwrap(), 3);
    assert_eq!(created.sale.total_cents, 2000);
    assert_eq!(created.items[0].profit_cents, 800);

    let sale_movements = db
        .inventory()
        .movements_for_reference(Reference::sale(&created.sale.id))
        .await
        .unwrap();
    assert_eq!(sale_movements.len(), 1);
    assert_eq!(sale_movements[0].movement_type, MovementType::Out);
    assert_eq!(sale_movements[0].quantity, 2);
    assert_eq!(sale_movements[0].reason, "sale");

    let cash = db
        .cashbox()
        .transactions_for_reference(Reference::sale(&created.sale.id))
        .await
        .unwrap();
    assert_eq!(cash.len(), 1);
    assert_eq!(cash[0].tx_type, CashboxTxType::Sale);
    assert_eq!(cash[0].amount_lyd_cents, 2000);

    // Edit: return that line, add qty 1 at 15.00.
    let outcome = orchestrator
        .edit_sale(&edit_request(
            &created.sale.id,
            vec![created.items[0].id.clone()],
            vec![NewSaleItem::priced(&p.id, 1, 1500, 600)],
        ))
        .await
        .unwrap();

    assert_eq!(db.inventory().get_stock(&p.id).await.unwrap(), 4);
    assert_eq!(outcome.returned_total_cents, 2000);
    assert_eq!(outcome.new_items_total_cents, 1500);
    assert_eq!(outcome.price_diff_cents, -500);
    assert_eq!(outcome.cash_delta_cents, -500);
    assert_eq!(outcome.sale.sale.total_cents, 1500);
    assert_eq!(outcome.sale.sale.status, SaleStatus::Completed);
    assert_eq!(outcome.sale.items.len(), 1);
    assert_eq!(outcome.sale.items[0].quantity, 1);

    let movements = db
        .inventory()
        .movements_for_reference(Reference::sale(&created.sale.id))
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);
    assert_eq!((movements[1].previous_stock, movements[1].new_stock), (3, 5));
    assert_eq!(movements[1].reason, "sale-edit-return");
    assert_eq!((movements[2].previous_stock, movements[2].new_stock), (5, 4));
    assert_eq!(movements[2].reason, "sale-edit-add");

    let cash = db
        .cashbox()
        .transactions_for_reference(Reference::sale(&created.sale.id))
        .await
        .unwrap();
    assert_eq!(cash.len(), 2);
    assert_eq!(cash[1].tx_type, CashboxTxType::Refund);
    assert_eq!(cash[1].amount_lyd_cents, -500);
    assert_eq!(db.cashbox().get_cashbox("main").await.unwrap().balance_lyd_cents, 1500);

    // The returned line stays on record.
    assert_eq!(db.sales().get_all_items(&created.sale.id).await.unwrap().len(), 2);
}

// =============================================================================
// Conservation and Reconstruction
// =============================================================================

#[tokio::test]
async fn stock_and_cash_fold_from_their_logs() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 20).await;
    let rice = product(&db, "RICE", 3800, 2600, 10).await;
    let oil = product(&db, "OIL", 3200, 2100, 8).await;

    let a = orchestrator
        .create_sale(&sale_request(
            vec![
                NewSaleItem::priced(&tea.id, 3, 1000, 600),
                NewSaleItem::priced(&rice.id, 1, 3800, 2600),
            ],
            6800,
        ))
        .await
        .unwrap();
    let b = orchestrator
        .create_sale(&sale_request(vec![NewSaleItem::priced(&oil.id, 2, 3200, 2100)], 6400))
        .await
        .unwrap();
    orchestrator
        .edit_sale(&edit_request(
            &a.sale.id,
            vec![a.items[0].id.clone()],
            vec![
                NewSaleItem::priced(&oil.id, 1, 3200, 2100),
                NewSaleItem::priced(&tea.id, 1, 1000, 600),
            ],
        ))
        .await
        .unwrap();
    orchestrator.return_sale(&reverse_request(&b.sale.id)).await.unwrap();

    for p in [&tea, &rice, &oil] {
        let stock = db.inventory().get_stock(&p.id).await.unwrap();
        let movements = db.inventory().movements_for(&p.id).await.unwrap();
        let folded: i64 = movements
            .iter()
            .map(|m| m.movement_type.stock_delta(m.quantity))
            .sum();
        assert_eq!(stock, folded, "{}", p.sku);
        assert!(stock >= 0);
        assert!(movements.iter().all(|m| m.is_consistent() && m.new_stock >= 0));
        // Each movement starts where the previous one ended.
        for pair in movements.windows(2) {
            assert_eq!(pair[0].new_stock, pair[1].previous_stock);
        }
    }
    assert_eq!(db.inventory().get_stock(&tea.id).await.unwrap(), 18);
    assert_eq!(db.inventory().get_stock(&rice.id).await.unwrap(), 9);
    assert_eq!(db.inventory().get_stock(&oil.id).await.unwrap(), 7);

    let cashbox = db.cashbox().get_cashbox("main").await.unwrap();
    let txs = db.cashbox().transactions_for("main").await.unwrap();
    assert_eq!(cashbox.balance_lyd_cents, txs.iter().map(|t| t.amount_lyd_cents).sum::<i64>());
    assert_eq!(cashbox.balance_usd_cents, txs.iter().map(|t| t.amount_usd_cents).sum::<i64>());
    assert_eq!(txs.last().unwrap().balance_lyd_after_cents, cashbox.balance_lyd_cents);

    for sale in db.sales().list_sales(50).await.unwrap() {
        assert_header_consistent(&sale);
    }
    assert!(db.auditor().audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn headers_stay_consistent_through_discounted_edits() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 20).await;
    let customer = db.customers().register_customer("Salem", None).await.unwrap();

    let mut req = sale_request(
        vec![
            NewSaleItem::priced(&tea.id, 2, 1000, 600),
            NewSaleItem::priced(&tea.id, 1, 1000, 600),
        ],
        1000,
    );
    req.discount_cents = 1500;
    req.customer_id = Some(customer.id.clone());
    req.payment_method = PaymentMethod::Partial;
    let created = orchestrator.create_sale(&req).await.unwrap();
    assert_eq!(created.sale.total_cents, 1500);
    assert_eq!(created.sale.amount_due_cents, 500);

    // Returning 2000 of a 3000 subtotal caps the discount at 1000.
    let outcome = orchestrator
        .edit_sale(&edit_request(&created.sale.id, vec![created.items[0].id.clone()], vec![]))
        .await
        .unwrap();
    let sale = &outcome.sale.sale;
    assert_header_consistent(sale);
    assert_eq!(sale.subtotal_cents, 1000);
    assert_eq!(sale.discount_cents, 1000);
    assert_eq!(sale.total_cents, 0);
    assert_eq!(outcome.price_diff_cents, -2000);
    assert_eq!(outcome.settled_diff_cents, -1500);
    // Due cleared first, the rest refunded.
    assert_eq!(outcome.customer_balance_delta_cents, -500);
    assert_eq!(outcome.cash_delta_cents, -1000);

    // Adding back on a partial sale goes on account.
    let outcome = orchestrator
        .edit_sale(&edit_request(
            &created.sale.id,
            vec![],
            vec![NewSaleItem::priced(&tea.id, 3, 1000, 600)],
        ))
        .await
        .unwrap();
    assert_header_consistent(&outcome.sale.sale);
    assert_eq!(outcome.cash_delta_cents, 0);
    assert_eq!(outcome.customer_balance_delta_cents, 3000);

    let after = db.customers().get_customer(&customer.id).await.unwrap();
    assert_eq!(after.balance_owed_cents, 3000);
    assert_eq!(after.total_purchases_cents, 1500 + 3000);
    assert!(db.auditor().audit().await.unwrap().is_consistent());
}

// =============================================================================
// Atomicity and No-ops
// =============================================================================

#[tokio::test]
async fn failing_last_line_leaves_everything_untouched() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 10).await;
    let rice = product(&db, "RICE", 3800, 2600, 10).await;
    let oil = product(&db, "OIL", 3200, 2100, 1).await;
    let customer = db.customers().register_customer("Amal", None).await.unwrap();

    let mut req = sale_request(
        vec![
            NewSaleItem::priced(&tea.id, 2, 1000, 600),
            NewSaleItem::priced(&rice.id, 1, 3800, 2600),
        ],
        3000,
    );
    req.customer_id = Some(customer.id.clone());
    req.payment_method = PaymentMethod::Partial;
    let created = orchestrator.create_sale(&req).await.unwrap();

    let before = snapshot(&db, &created.sale.id, Some(&customer.id)).await;

    let err = orchestrator
        .edit_sale(&edit_request(
            &created.sale.id,
            vec![created.items[0].id.clone()],
            vec![
                NewSaleItem::priced(&tea.id, 1, 1000, 600),
                NewSaleItem::priced(&rice.id, 2, 3800, 2600),
                NewSaleItem::priced(&oil.id, 2, 3200, 2100),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));

    assert_eq!(snapshot(&db, &created.sale.id, Some(&customer.id)).await, before);
}

#[tokio::test]
async fn failure_after_writes_rolls_them_back() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 10).await;

    let created = orchestrator
        .create_sale(&sale_request(vec![NewSaleItem::priced(&tea.id, 2, 1000, 600)], 2000))
        .await
        .unwrap();
    let before = snapshot(&db, &created.sale.id, None).await;

    // Stock, lines and header are written before the refund hits the
    // unknown cashbox.
    let mut req = edit_request(&created.sale.id, vec![created.items[0].id.clone()], vec![]);
    req.cashbox_id = Some("missing".to_string());
    let err = orchestrator.edit_sale(&req).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::CashboxNotFound(_))));

    assert_eq!(snapshot(&db, &created.sale.id, None).await, before);
}

#[tokio::test]
async fn empty_edit_is_rejected_and_changes_nothing() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 10).await;
    let created = orchestrator
        .create_sale(&sale_request(vec![NewSaleItem::priced(&tea.id, 1, 1000, 600)], 1000))
        .await
        .unwrap();
    let before = snapshot(&db, &created.sale.id, None).await;

    for _ in 0..2 {
        let err = orchestrator
            .edit_sale(&edit_request(&created.sale.id, vec![], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoChangeRequested { .. })));
    }

    assert_eq!(snapshot(&db, &created.sale.id, None).await, before);
}

// =============================================================================
// Currencies
// =============================================================================

#[tokio::test]
async fn usd_partial_sale_round_trip_through_return() {
    let (db, orchestrator) = setup().await;
    let tea = product(&db, "TEA", 1000, 600, 10).await;
    let customer = db.customers().register_customer("Huda", None).await.unwrap();

    let mut req = sale_request(vec![NewSaleItem::priced(&tea.id, 2, 1000, 600)], 500);
    req.currency = Currency::Usd;
    req.exchange_rate = Some(ExchangeRate::from_micros(5_000_000).unwrap());
    req.customer_id = Some(customer.id.clone());
    req.payment_method = PaymentMethod::Partial;
    let created = orchestrator.create_sale(&req).await.unwrap();

    // 15.00 USD due at 5.0 → 75.00 LYD owed, 100.00 LYD purchased.
    let owed = db.customers().get_customer(&customer.id).await.unwrap();
    assert_eq!(owed.balance_owed_cents, 7500);
    assert_eq!(owed.total_purchases_cents, 10000);
    assert_eq!(db.cashbox().get_cashbox("main").await.unwrap().balance_usd_cents, 500);

    let outcome = orchestrator.return_sale(&reverse_request(&created.sale.id)).await.unwrap();
    assert_eq!(outcome.sale.sale.status, SaleStatus::Returned);
    assert_eq!(outcome.customer_balance_delta_cents, -7500);
    assert_eq!(outcome.cash_delta_cents, -500);

    let after = db.customers().get_customer(&customer.id).await.unwrap();
    assert_eq!(after.balance_owed_cents, 0);
    assert_eq!(after.total_purchases_cents, 10000);

    let main = db.cashbox().get_cashbox("main").await.unwrap();
    assert_eq!((main.balance_usd_cents, main.balance_lyd_cents), (0, 0));
    let refund = db.cashbox().transactions_for("main").await.unwrap().pop().unwrap();
    assert_eq!(refund.exchange_rate_micros, Some(5_000_000));
    assert!(db.auditor().audit().await.unwrap().is_consistent());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_sales_for_the_last_item_sell_it_once() {
    let path = std::env::temp_dir().join(format!("khazna-race-{}.db", uuid::Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
    let orchestrator = db.orchestrator(LedgerSettings::default());
    let last = product(&db, "LAST", 1000, 600, 1).await;

    let attempt = |orchestrator: TransactionOrchestrator, product_id: String| async move {
        let req = sale_request(vec![NewSaleItem::priced(&product_id, 1, 1000, 600)], 1000);
        // The caller owns retries of retryable failures.
        let mut tries = 0;
        loop {
            match orchestrator.create_sale(&req).await {
                Err(e) if e.is_retryable() && tries < 5 => {
                    tries += 1;
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                }
                other => return other,
            }
        }
    };

    let (a, b) = tokio::join!(
        attempt(orchestrator.clone(), last.id.clone()),
        attempt(orchestrator.clone(), last.id.clone()),
    );

    let results = [a, b];
    let sold = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(sold, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(DbError::Domain(CoreError::InsufficientStock { .. }))
    )));
    assert_eq!(db.inventory().get_stock(&last.id).await.unwrap(), 0);
    assert!(db.auditor().audit().await.unwrap().is_consistent());

    db.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}
