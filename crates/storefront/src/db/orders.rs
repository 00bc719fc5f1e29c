//! Order ledger repository.
//!
//! Orders are written once, with their items, in a single transaction. After
//! that only two conditional single-row updates touch them: the paid flag and
//! the shipping stage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use shopfront_core::{
    NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId, Price, ProductId,
    ShippingStage, ShippingState, UserId,
};

use super::RepositoryError;

const ORDER_COLUMNS: &str = r"
    id, user_id, created_at, total, is_paid,
    shipping_status, shipping_stage_index,
    processing_date, shipped_date, in_transit_date, delivered_date,
    payment_session_id
";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    total: Price,
    is_paid: bool,
    shipping_status: String,
    shipping_stage_index: i16,
    processing_date: Option<DateTime<Utc>>,
    shipped_date: Option<DateTime<Utc>>,
    in_transit_date: Option<DateTime<Utc>>,
    delivered_date: Option<DateTime<Utc>>,
    payment_session_id: Option<String>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let stage: ShippingStage = self.shipping_status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;
        if stage.index() != self.shipping_stage_index {
            return Err(RepositoryError::DataCorruption(format!(
                "order {}: shipping_stage_index {} does not match status {stage}",
                self.id, self.shipping_stage_index
            )));
        }

        let shipping = ShippingState::from_parts(
            stage,
            self.processing_date,
            self.shipped_date,
            self.in_transit_date,
            self.delivered_date,
        );

        Ok(Order::from_storage(
            self.id,
            self.user_id,
            self.created_at,
            self.total,
            self.is_paid,
            shipping,
            self.payment_session_id,
            items,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    quantity: i32,
    price: Price,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "order item {}: negative quantity {}",
                row.id, row.quantity
            ))
        })?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity,
            price: row.price,
        })
    }
}

/// A buyer's order history at a glance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BuyerSummary {
    pub total_spent: Price,
    pub order_count: i64,
    pub delivered_count: i64,
}

/// Store-wide order figures for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SalesSummary {
    pub order_count: i64,
    pub paid_count: i64,
    /// Sum of totals over paid orders.
    pub revenue: Price,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and all of its items atomically.
    ///
    /// The order starts in `Processing`, stamped with the insert time, and is
    /// paid only if the `NewOrder` says so.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order already exists for the
    /// same checkout session, `RepositoryError::Database` otherwise.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, total, is_paid, shipping_status, shipping_stage_index,
                                processing_date, payment_session_id)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id())
        .bind(order.total())
        .bind(order.is_paid())
        .bind(ShippingStage::Processing.label())
        .bind(ShippingStage::Processing.index())
        .bind(order.payment_session_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "order for this checkout session"))?;

        let mut items = Vec::with_capacity(order.items().len());
        for item in order.items() {
            items.push(insert_item(&mut tx, row.id, item).await?);
        }

        tx.commit().await?;

        tracing::debug!(order_id = %row.id, items = items.len(), "Order inserted");
        row.into_order(items)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored shipping fields disagree.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items_one(row).await
    }

    /// Get an order only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items_one(row).await
    }

    /// Get the order created for a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_payment_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items_one(row).await
    }

    /// Get the newest unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn most_recent_unpaid(&self) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE is_paid = FALSE
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .fetch_optional(self.pool)
        .await?;

        self.with_items_one(row).await
    }

    /// List a buyer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// List all orders, newest first, optionally capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// Set `is_paid` if it is still unset.
    ///
    /// Returns `true` only when this call flipped the flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET is_paid = TRUE WHERE id = $1 AND is_paid = FALSE")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Write the shipping stage and timestamps if the stored stage is still
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn save_shipping(
        &self,
        id: OrderId,
        expected: ShippingStage,
        state: &ShippingState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET shipping_status = $3,
                shipping_stage_index = $4,
                processing_date = $5,
                shipped_date = $6,
                in_transit_date = $7,
                delivered_date = $8
            WHERE id = $1 AND shipping_status = $2
            ",
        )
        .bind(id)
        .bind(expected.label())
        .bind(state.status())
        .bind(state.stage_index())
        .bind(state.processing_at())
        .bind(state.shipped_at())
        .bind(state.in_transit_at())
        .bind(state.delivered_at())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Spending figures for one buyer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn buyer_summary(&self, user_id: UserId) -> Result<BuyerSummary, RepositoryError> {
        let (total_spent, order_count, delivered_count): (Decimal, i64, i64) = sqlx::query_as(
            r"
            SELECT COALESCE(SUM(total) FILTER (WHERE is_paid), 0),
                   COUNT(*),
                   COUNT(*) FILTER (WHERE shipping_status = $2)
            FROM orders
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .bind(ShippingStage::Delivered.label())
        .fetch_one(self.pool)
        .await?;

        Ok(BuyerSummary {
            total_spent: decimal_to_price(total_spent)?,
            order_count,
            delivered_count,
        })
    }

    /// Store-wide order figures.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_summary(&self) -> Result<SalesSummary, RepositoryError> {
        let (order_count, paid_count, revenue): (i64, i64, Decimal) = sqlx::query_as(
            r"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_paid),
                   COALESCE(SUM(total) FILTER (WHERE is_paid), 0)
            FROM orders
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(SalesSummary {
            order_count,
            paid_count,
            revenue: decimal_to_price(revenue)?,
        })
    }

    async fn with_items_one(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, quantity, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            let item = OrderItem::try_from(item)?;
            by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    item: &NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let quantity = i32::try_from(item.quantity).map_err(|_| {
        RepositoryError::DataCorruption(format!("quantity {} out of range", item.quantity))
    })?;

    let row = sqlx::query_as::<_, OrderItemRow>(
        r"
        INSERT INTO order_items (order_id, product_id, product_name, quantity, price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, order_id, product_id, product_name, quantity, price
        ",
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(quantity)
    .bind(item.price)
    .fetch_one(&mut **tx)
    .await?;

    OrderItem::try_from(row)
}

fn decimal_to_price(value: Decimal) -> Result<Price, RepositoryError> {
    Price::new(value).map_err(|e| RepositoryError::DataCorruption(format!("aggregate total: {e}")))
}
