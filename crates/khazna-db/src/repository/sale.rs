//! # Sale Record Store
//!
//! Sale headers and their lines.
//!
//! ## Line Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT sale_items (returned_at NULL)     ← active line                │
//! │       │                                                                 │
//! │       ▼  edit / return / cancel                                        │
//! │  UPDATE sale_items SET returned_at = now  ← returned line, kept        │
//! │                                                                         │
//! │  Nothing else about a line ever changes (trigger-enforced).            │
//! │  Header subtotal = Σ total_price of active lines.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Header updates are version-checked so a stale edit cannot overwrite a
//! newer one.

use chrono::{DateTime, Utc};
use khazna_core::{CoreError, Sale, SaleItem, SaleWithItems, ValidationError};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::unit_of_work::UnitOfWork;

const SALE_COLUMNS: &str = "id, sale_number, customer_id, status, subtotal_cents, discount_cents, \
     total_cents, amount_paid_cents, amount_due_cents, payment_method, currency, \
     exchange_rate_micros, created_by, notes, version, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, sku_snapshot, name_snapshot, quantity, \
     unit_price_cents, unit_cost_cents, total_price_cents, profit_cents, returned_at, created_at";

/// Repository for sales and sale items.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Stores a sale with its lines in its own unit of work.
    ///
    /// Stock, cash and customer effects are the orchestrator's job; this
    /// only writes the record.
    pub async fn create_sale(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<SaleWithItems> {
        let mut uow = UnitOfWork::begin(&self.pool, "create_sale_record").await?;
        let result = Self::create_sale_in(uow.conn(), sale, items).await;
        uow.finish(result).await
    }

    /// Writes the header and every line.
    ///
    /// ## Checks
    /// - at least one line, each belonging to this sale
    /// - each line's `total = qty × price`, `profit = total − qty × cost`
    /// - `subtotal = Σ line totals`, `total = subtotal − discount`,
    ///   `due = total − paid`
    pub async fn create_sale_in(
        conn: &mut SqliteConnection,
        sale: &Sale,
        items: &[SaleItem],
    ) -> DbResult<SaleWithItems> {
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }
        for item in items {
            if item.sale_id != sale.id {
                return Err(ValidationError::Inconsistent {
                    field: "sale_id".to_string(),
                    reason: format!("item {} belongs to sale {}", item.id, item.sale_id),
                }
                .into());
            }
            item.check_totals()?;
        }
        let lines_total: i64 = items.iter().map(|i| i.total_price_cents).sum();
        if lines_total != sale.subtotal_cents {
            return Err(CoreError::invariant("subtotal", lines_total, sale.subtotal_cents).into());
        }
        sale.check_totals()?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, customer_id, status, subtotal_cents, discount_cents,
                total_cents, amount_paid_cents, amount_due_cents, payment_method, currency,
                exchange_rate_micros, created_by, notes, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.customer_id)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.amount_paid_cents)
        .bind(sale.amount_due_cents)
        .bind(sale.payment_method)
        .bind(sale.currency)
        .bind(sale.exchange_rate_micros)
        .bind(&sale.created_by)
        .bind(&sale.notes)
        .bind(sale.version)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::insert_items_in(&mut *conn, items).await?;

        debug!(sale_id = %sale.id, sale_number = %sale.sale_number, lines = items.len(), "Sale record stored");

        Ok(SaleWithItems {
            sale: sale.clone(),
            items: items.to_vec(),
        })
    }

    /// Appends lines to an existing sale.
    pub async fn insert_items_in(conn: &mut SqliteConnection, items: &[SaleItem]) -> DbResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot, quantity,
                    unit_price_cents, unit_cost_cents, total_price_cents, profit_cents,
                    returned_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.unit_cost_cents)
            .bind(item.total_price_cents)
            .bind(item.profit_cents)
            .bind(item.returned_at)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Gets a sale header by id.
    pub async fn get_sale(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn get_sale_by_number(&self, sale_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// The header plus its active lines; missing is `SaleNotFound`.
    pub async fn get_sale_with_items(&self, id: &str) -> DbResult<SaleWithItems> {
        let mut conn = self.pool.acquire().await?;
        Self::with_items_in(&mut *conn, id).await
    }

    /// Every line ever on the sale, returned ones included.
    pub async fn get_all_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid");
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Most recent sales first.
    pub async fn list_sales(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY rowid DESC LIMIT ?1");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    pub async fn list_sales_for_customer(&self, customer_id: &str) -> DbResult<Vec<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE customer_id = ?1 ORDER BY rowid DESC");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    pub async fn fetch_sale_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
    }

    pub async fn active_items_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items \
             WHERE sale_id = ?1 AND returned_at IS NULL ORDER BY rowid"
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(conn)
            .await?;
        Ok(items)
    }

    pub async fn with_items_in(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleWithItems> {
        let sale = Self::fetch_sale_in(&mut *conn, id).await?;
        let items = Self::active_items_in(conn, id).await?;
        Ok(SaleWithItems { sale, items })
    }

    /// Next `YYYYMMDD-NNNN` number for the day of `at`.
    ///
    /// Unique within the unit of work that inserts it: SQLite admits one
    /// writer at a time and the UNIQUE index catches anything else.
    pub async fn next_sale_number_in(
        conn: &mut SqliteConnection,
        at: DateTime<Utc>,
    ) -> DbResult<String> {
        let prefix = at.format("%Y%m%d").to_string();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE sale_number LIKE ?1")
            .bind(format!("{prefix}-%"))
            .fetch_one(conn)
            .await?;
        Ok(format!("{}-{:04}", prefix, count + 1))
    }

    /// Marks active lines as returned.
    ///
    /// A line that is not an active line of this sale is `SaleItemNotFound`.
    pub async fn mark_returned_in(
        conn: &mut SqliteConnection,
        sale_id: &str,
        item_ids: &[String],
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        for item_id in item_ids {
            let result = sqlx::query(
                "UPDATE sale_items SET returned_at = ?1 \
                 WHERE id = ?2 AND sale_id = ?3 AND returned_at IS NULL",
            )
            .bind(at)
            .bind(item_id)
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::SaleItemNotFound {
                    sale_id: sale_id.to_string(),
                    item_id: item_id.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Writes new header figures and status if the stored version still
    /// equals `expected_version`. Returns the header as stored.
    pub async fn update_header_in(
        conn: &mut SqliteConnection,
        sale: &Sale,
        expected_version: i64,
    ) -> DbResult<Sale> {
        sale.check_totals()?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET status = ?1,
                subtotal_cents = ?2,
                discount_cents = ?3,
                total_cents = ?4,
                amount_paid_cents = ?5,
                amount_due_cents = ?6,
                version = version + 1,
                updated_at = ?7
            WHERE id = ?8 AND version = ?9
            "#,
        )
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.amount_paid_cents)
        .bind(sale.amount_due_cents)
        .bind(now)
        .bind(&sale.id)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            // Gone entirely, or moved on under us.
            Self::fetch_sale_in(&mut *conn, &sale.id).await?;
            return Err(DbError::concurrent("Sale", &sale.id));
        }

        Self::fetch_sale_in(conn, &sale.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use khazna_core::{Currency, ItemSnapshot, PaymentMethod, SaleStatus};

    use crate::pool::{Database, DbConfig};
    use crate::repository::inventory::InventoryRepository;

    async fn seed_product(db: &Database) -> String {
        let product = InventoryRepository::new(db.pool().clone())
            .register_product(
                &khazna_core::NewProduct {
                    sku: "TEA-250".to_string(),
                    name: "Green Tea 250g".to_string(),
                    cost_price_cents: 600,
                    selling_price_cents: 1000,
                    opening_stock: 10,
                    low_stock_threshold: 0,
                },
                None,
            )
            .await
            .unwrap();
        product.id
    }

    fn header(id: &str, number: &str, subtotal: i64) -> Sale {
        let now = Utc::now();
        Sale {
            id: id.to_string(),
            sale_number: number.to_string(),
            customer_id: None,
            status: SaleStatus::Completed,
            subtotal_cents: subtotal,
            discount_cents: 0,
            total_cents: subtotal,
            amount_paid_cents: subtotal,
            amount_due_cents: 0,
            payment_method: PaymentMethod::Cash,
            currency: Currency::Lyd,
            exchange_rate_micros: None,
            created_by: "cashier-1".to_string(),
            notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(sale_id: &str, product_id: &str, qty: i64) -> SaleItem {
        let snapshot = ItemSnapshot {
            product_id: product_id.to_string(),
            sku: "TEA-250".to_string(),
            name: "Green Tea 250g".to_string(),
            unit_price_cents: 1000,
            unit_cost_cents: 600,
        };
        SaleItem::from_snapshot(sale_id, snapshot, qty, qty * 1000, qty * 400, Utc::now())
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;
        let sales = db.sales();

        let sale = header("s1", "20260101-0001", 3000);
        let items = vec![line("s1", &pid, 1), line("s1", &pid, 2)];
        sales.create_sale(&sale, &items).await.unwrap();

        let stored = sales.get_sale_with_items("s1").await.unwrap();
        assert_eq!(stored.sale.subtotal_cents, 3000);
        assert_eq!(stored.items.len(), 2);
        assert!(stored.items.iter().all(SaleItem::is_active));
    }

    #[tokio::test]
    async fn test_subtotal_must_match_lines() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;

        let sale = header("s1", "20260101-0001", 2500);
        let err = db.sales().create_sale(&sale, &[line("s1", &pid, 2)]).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvariantViolation { .. })));
        assert!(db.sales().get_sale("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.sales().get_sale_with_items("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_sale_number_counts_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;
        let day = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(
            SaleRepository::next_sale_number_in(&mut conn, day).await.unwrap(),
            "20260314-0001"
        );
        drop(conn);

        db.sales()
            .create_sale(&header("s1", "20260314-0001", 1000), &[line("s1", &pid, 1)])
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(
            SaleRepository::next_sale_number_in(&mut conn, day).await.unwrap(),
            "20260314-0002"
        );
        let next_day = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 1).unwrap();
        assert_eq!(
            SaleRepository::next_sale_number_in(&mut conn, next_day).await.unwrap(),
            "20260315-0001"
        );
    }

    #[tokio::test]
    async fn test_returned_lines_are_kept_but_inactive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;
        let items = vec![line("s1", &pid, 1), line("s1", &pid, 2)];
        db.sales()
            .create_sale(&header("s1", "20260101-0001", 3000), &items)
            .await
            .unwrap();

        let mut uow = UnitOfWork::begin(db.pool(), "test").await.unwrap();
        SaleRepository::mark_returned_in(uow.conn(), "s1", &[items[0].id.clone()], Utc::now())
            .await
            .unwrap();
        let again =
            SaleRepository::mark_returned_in(uow.conn(), "s1", &[items[0].id.clone()], Utc::now()).await;
        assert!(matches!(
            again.unwrap_err(),
            DbError::Domain(CoreError::SaleItemNotFound { .. })
        ));
        uow.commit().await.unwrap();

        let stored = db.sales().get_sale_with_items("s1").await.unwrap();
        assert_eq!(stored.items.len(), 1);
        assert_eq!(db.sales().get_all_items("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;
        db.sales()
            .create_sale(&header("s1", "20260101-0001", 1000), &[line("s1", &pid, 1)])
            .await
            .unwrap();

        let mut uow = UnitOfWork::begin(db.pool(), "test").await.unwrap();
        let mut sale = SaleRepository::fetch_sale_in(uow.conn(), "s1").await.unwrap();
        sale.status = SaleStatus::Returned;
        let updated = SaleRepository::update_header_in(uow.conn(), &sale, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        sale.status = SaleStatus::Cancelled;
        let stale = SaleRepository::update_header_in(uow.conn(), &sale, 1).await;
        assert!(matches!(
            stale.unwrap_err(),
            DbError::Domain(CoreError::ConcurrentModification { .. })
        ));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_item_facts_are_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pid = seed_product(&db).await;
        let items = vec![line("s1", &pid, 1)];
        db.sales()
            .create_sale(&header("s1", "20260101-0001", 1000), &items)
            .await
            .unwrap();

        let result = sqlx::query("UPDATE sale_items SET quantity = 5 WHERE id = ?1")
            .bind(&items[0].id)
            .execute(db.pool())
            .await;
        assert!(matches!(
            DbError::from(result.unwrap_err()),
            DbError::ConstraintViolation { .. }
        ));
    }
}
