//! # Inventory Ledger
//!
//! Per-product stock counts and the movement log that explains them.
//!
//! ## One Statement Per Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │     SET current_stock = current_stock + Δ                               │
//! │   WHERE id = ? AND current_stock + Δ >= 0                               │
//! │  RETURNING current_stock                     ← new_stock                │
//! │       │                                                                 │
//! │       ├── row   ──► INSERT stock_movements (previous = new − Δ)        │
//! │       └── none  ──► product missing?  ProductNotFound                   │
//! │                     otherwise          InsufficientStock                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the decrement are the same statement, so two units of work
//! racing for the last item cannot both win. The CHECK on
//! `products.current_stock` backs it up.
//!
//! Replaying every movement of a product from zero reproduces
//! `current_stock`; [`LedgerAuditor`](crate::audit::LedgerAuditor) checks it.

use chrono::Utc;
use khazna_core::validation::{validate_name, validate_non_negative, validate_price, validate_sku};
use khazna_core::{CoreError, MovementType, NewProduct, Product, StockMovement};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::Reference;
use crate::error::DbResult;
use crate::unit_of_work::UnitOfWork;

const PRODUCT_COLUMNS: &str = "id, sku, name, cost_price_cents, selling_price_cents, \
     current_stock, low_stock_threshold, is_active, version, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, previous_stock, \
     new_stock, unit_cost_cents, reason, reference_type, reference_id, created_by, created_at";

// =============================================================================
// Movement Request
// =============================================================================

/// A stock change to apply.
///
/// ## Example
/// ```rust,ignore
/// let req = MovementRequest::new(&product.id, MovementType::Out, 2, "sale")
///     .with_reference(Reference::sale(&sale_id))
///     .with_unit_cost(600)
///     .created_by("cashier-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub product_id: String,
    pub movement_type: MovementType,
    /// Positive for `in` / `out`, the signed delta for `adjustment`.
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
    pub reason: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
}

impl MovementRequest {
    pub fn new(
        product_id: impl Into<String>,
        movement_type: MovementType,
        quantity: i64,
        reason: impl Into<String>,
    ) -> Self {
        MovementRequest {
            product_id: product_id.into(),
            movement_type,
            quantity,
            unit_cost_cents: None,
            reason: reason.into(),
            reference_type: None,
            reference_id: None,
            created_by: None,
        }
    }

    pub fn with_reference(mut self, reference: Reference<'_>) -> Self {
        self.reference_type = Some(reference.kind.to_string());
        self.reference_id = Some(reference.id.to_string());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost_cents: i64) -> Self {
        self.unit_cost_cents = Some(unit_cost_cents);
        self
    }

    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for products and stock movements.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Registers a product; opening stock is recorded as an `in` movement.
    pub async fn register_product(
        &self,
        new: &NewProduct,
        created_by: Option<&str>,
    ) -> DbResult<Product> {
        validate_sku(&new.sku)?;
        validate_name(&new.name)?;
        validate_price("cost_price", new.cost_price_cents)?;
        validate_price("selling_price", new.selling_price_cents)?;
        validate_non_negative("opening_stock", new.opening_stock)?;
        validate_non_negative("low_stock_threshold", new.low_stock_threshold)?;

        let mut uow = UnitOfWork::begin(&self.pool, "register_product").await?;
        let result = Self::register_product_in(uow.conn(), new, created_by).await;
        let product = uow.finish(result).await?;

        info!(product_id = %product.id, sku = %product.sku, stock = product.current_stock, "Product registered");
        Ok(product)
    }

    async fn register_product_in(
        conn: &mut SqliteConnection,
        new: &NewProduct,
        created_by: Option<&str>,
    ) -> DbResult<Product> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, cost_price_cents, selling_price_cents,
                current_stock, low_stock_threshold, is_active, version,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, 1, 1, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(new.sku.trim())
        .bind(new.name.trim())
        .bind(new.cost_price_cents)
        .bind(new.selling_price_cents)
        .bind(new.low_stock_threshold)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if new.opening_stock > 0 {
            let mut req = MovementRequest::new(&id, MovementType::In, new.opening_stock, "opening-stock")
                .with_unit_cost(new.cost_price_cents);
            req.created_by = created_by.map(str::to_string);
            Self::apply_movement_in(&mut *conn, &req).await?;
        }

        Self::fetch_product_in(conn, &id).await
    }

    /// Gets a product by id.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Reads a product inside a unit of work; missing is `ProductNotFound`.
    pub async fn fetch_product_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Current stock of a product.
    pub async fn get_stock(&self, product_id: &str) -> DbResult<i64> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT current_stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;
        stock.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Applies one movement in its own unit of work.
    pub async fn apply_movement(&self, req: &MovementRequest) -> DbResult<StockMovement> {
        let mut uow = UnitOfWork::begin(&self.pool, "apply_movement").await?;
        let result = Self::apply_movement_in(uow.conn(), req).await;
        uow.finish(result).await
    }

    /// Applies one movement on the caller's connection.
    ///
    /// ## Errors
    /// - `ValidationError` for a zero or wrongly signed quantity
    /// - `ProductNotFound` when the product does not exist
    /// - `InsufficientStock` when the movement would take stock below zero;
    ///   nothing is written
    pub async fn apply_movement_in(
        conn: &mut SqliteConnection,
        req: &MovementRequest,
    ) -> DbResult<StockMovement> {
        req.movement_type.validate_quantity(req.quantity)?;
        let delta = req.movement_type.stock_delta(req.quantity);
        let now = Utc::now();

        let new_stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?1,
                version = version + 1,
                updated_at = ?2
            WHERE id = ?3 AND current_stock + ?1 >= 0
            RETURNING current_stock
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(&req.product_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(new_stock) = new_stock else {
            let product = Self::fetch_product_in(conn, &req.product_id).await?;
            debug!(
                product_id = %req.product_id,
                available = product.current_stock,
                requested = -delta,
                "Movement refused"
            );
            return Err(CoreError::InsufficientStock {
                sku: product.sku,
                available: product.current_stock,
                requested: -delta,
            }
            .into());
        };

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: req.product_id.clone(),
            movement_type: req.movement_type,
            quantity: req.quantity,
            previous_stock: new_stock - delta,
            new_stock,
            unit_cost_cents: req.unit_cost_cents,
            reason: req.reason.clone(),
            reference_type: req.reference_type.clone(),
            reference_id: req.reference_id.clone(),
            created_by: req.created_by.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, movement_type, quantity, previous_stock, new_stock,
                unit_cost_cents, reason, reference_type, reference_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(movement.unit_cost_cents)
        .bind(&movement.reason)
        .bind(&movement.reference_type)
        .bind(&movement.reference_id)
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        debug!(
            product_id = %movement.product_id,
            movement_type = ?movement.movement_type,
            previous = movement.previous_stock,
            new = movement.new_stock,
            reason = %movement.reason,
            "Stock movement applied"
        );

        Ok(movement)
    }

    /// Movement log of a product, oldest first.
    pub async fn movements_for(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Movements written on behalf of one reference (e.g. a sale).
    pub async fn movements_for_reference(
        &self,
        reference: Reference<'_>,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE reference_type = ?1 AND reference_id = ?2 ORDER BY rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(reference.kind)
            .bind(reference.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Active products ordered by name.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Active products at or below their low-stock threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND current_stock <= low_stock_threshold \
             ORDER BY current_stock, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
