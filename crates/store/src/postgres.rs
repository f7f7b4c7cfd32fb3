use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, CouponId, OrderId, ProductId, UserId};
use domain::{
    Address, CartItem, Coupon, CouponKind, CouponType, Money, Order, OrderHeader, OrderItem,
    OrderStatus, PaymentMethod, Product, ShippingAddress, StatusHistoryEntry,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

/// PostgreSQL-backed store implementation.
///
/// Each [`StoreTx`] is one database transaction. Stock, coupon and order
/// rows read through `*_for_update` methods are locked with
/// `SELECT ... FOR UPDATE`, and every counter write is guarded in its
/// `WHERE` clause so it cannot push a value past its bound.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A unit of work backed by a PostgreSQL transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn to_u32(entity: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::corrupt(entity, format!("negative count {value}")))
}

/// Narrows a count to the `INTEGER` columns it is stored in.
fn to_i32<T>(entity: &'static str, value: T) -> Result<i32>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value.try_into().map_err(|_| StoreError::OutOfRange {
        entity,
        value: value.to_string(),
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32("product", row.try_get("stock")?)?,
    })
}

fn row_to_address(row: PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        recipient: row.try_get("recipient")?,
        phone: row.try_get("phone")?,
        street: row.try_get("street")?,
        city: row.try_get("city")?,
        region: row.try_get("region")?,
        postal_code: row.try_get("postal_code")?,
        country: row.try_get("country")?,
    })
}

fn row_to_coupon(row: PgRow) -> Result<Coupon> {
    let coupon_type: String = row.try_get("coupon_type")?;
    let coupon_type: CouponType = coupon_type
        .parse()
        .map_err(|e| StoreError::corrupt("coupon", e))?;
    let value: Decimal = row.try_get("value")?;
    let max_discount: Option<i64> = row.try_get("max_discount_cents")?;
    let kind = CouponKind::from_parts(coupon_type, value, max_discount.map(Money::from_cents))
        .map_err(|e| StoreError::corrupt("coupon", e))?;

    Ok(Coupon {
        id: CouponId::from_uuid(row.try_get::<Uuid, _>("id")?),
        code: row.try_get("code")?,
        kind,
        expires_at: row.try_get("expires_at")?,
        usage_limit: to_u32("coupon", row.try_get("usage_limit")?)?,
        per_user_limit: to_u32("coupon", row.try_get("per_user_limit")?)?,
        used_count: to_u32("coupon", row.try_get("used_count")?)?,
    })
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse().map_err(|e| StoreError::corrupt("order", e))
}

fn row_to_header(row: PgRow) -> Result<OrderHeader> {
    let shipping_address: ShippingAddress =
        serde_json::from_value(row.try_get("shipping_address")?)?;
    let payment_method: String = row.try_get("payment_method")?;
    let payment_method: PaymentMethod = payment_method
        .parse()
        .map_err(|e: String| StoreError::corrupt("order", e))?;
    let status: String = row.try_get("status")?;

    Ok(OrderHeader {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        shipping_address,
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        discount: Money::from_cents(row.try_get("discount_cents")?),
        coupon_id: row
            .try_get::<Option<Uuid>, _>("coupon_id")?
            .map(CouponId::from_uuid),
        shipping_price: Money::from_cents(row.try_get("shipping_cents")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        payment_method,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_u32("order item", row.try_get("quantity")?)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_history(row: PgRow) -> Result<StatusHistoryEntry> {
    let status: String = row.try_get("status")?;
    Ok(StatusHistoryEntry {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        status: parse_status(&status)?,
        note: row.try_get("note")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

impl PostgresTx {
    async fn load_order(&mut self, order_id: OrderId, lock: bool) -> Result<Option<Order>> {
        let sql = if lock {
            r#"
            SELECT id, user_id, shipping_address, subtotal_cents, discount_cents, coupon_id,
                   shipping_cents, total_cents, payment_method, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, user_id, shipping_address, subtotal_cents, discount_cents, coupon_id,
                   shipping_cents, total_cents, payment_method, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#
        };

        let Some(row) = sqlx::query(sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?
        else {
            return Ok(None);
        };
        let header = row_to_header(row)?;

        let items = sqlx::query(
            r#"
            SELECT product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_item)
        .collect::<Result<Vec<_>>>()?;

        let history = sqlx::query(
            r#"
            SELECT order_id, status, note, recorded_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_history)
        .collect::<Result<Vec<_>>>()?;

        if history.last().map(|entry| entry.status) != Some(header.status) {
            return Err(StoreError::corrupt(
                "order",
                format!("history of {order_id} does not end in {}", header.status),
            ));
        }

        Ok(Some(Order::rehydrate(header, items, history)))
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_items
            WHERE user_id = $1
            ORDER BY added_at ASC, product_id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: to_u32("cart item", row.try_get("quantity")?)?,
                })
            })
            .collect()
    }

    async fn put_cart_item(&mut self, user_id: UserId, item: CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(to_i32("cart quantity", item.quantity)?)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn remove_cart_item(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, price_cents, stock) VALUES ($1, $2, $3, $4)")
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(product.price.cents())
            .bind(to_i32("product stock", product.stock)?)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(
            "SELECT id, name, price_cents, stock FROM products WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn products_for_update(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        // Locks are taken in id order so concurrent checkouts cannot deadlock.
        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result =
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(product_id.as_uuid())
                .bind(to_i32("stock decrement", quantity)?)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_address(&mut self, address: &Address) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, recipient, phone, street, city, region, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(address.user_id.as_uuid())
        .bind(&address.recipient)
        .bind(&address.phone)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.region)
        .bind(&address.postal_code)
        .bind(&address.country)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn address(&mut self, user_id: UserId, address_id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, recipient, phone, street, city, region, postal_code, country
            FROM addresses
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(address_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_address).transpose()
    }

    async fn insert_coupon(&mut self, coupon: &Coupon) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, coupon_type, value, max_discount_cents, expires_at,
                                 usage_limit, per_user_limit, used_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(&coupon.code)
        .bind(coupon.kind.coupon_type().as_str())
        .bind(coupon.kind.value())
        .bind(coupon.kind.max_discount().map(|cap| cap.cents()))
        .bind(coupon.expires_at)
        .bind(to_i32("coupon usage limit", coupon.usage_limit)?)
        .bind(to_i32("coupon per-user limit", coupon.per_user_limit)?)
        .bind(to_i32("coupon used count", coupon.used_count)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_coupon_code")
            {
                return StoreError::Duplicate {
                    entity: "coupon",
                    key: coupon.code.clone(),
                };
            }
            StoreError::from(e)
        })?;
        Ok(())
    }

    async fn coupon_by_code_for_update(&mut self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, coupon_type, value, max_discount_cents, expires_at,
                   usage_limit, per_user_limit, used_count
            FROM coupons
            WHERE code = $1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_coupon).transpose()
    }

    async fn user_redemptions(&mut self, coupon_id: CouponId, user_id: UserId) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        u32::try_from(count).map_err(|_| StoreError::corrupt("coupon redemption", count))
    }

    async fn record_redemption(
        &mut self,
        coupon_id: CouponId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1 WHERE id = $1 AND used_count < usage_limit",
        )
        .bind(coupon_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO coupon_redemptions (coupon_id, user_id, order_id) VALUES ($1, $2, $3)",
        )
        .bind(coupon_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(order_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        Ok(true)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let header = order.header();
        let shipping_address = serde_json::to_value(&header.shipping_address)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping_address, subtotal_cents, discount_cents,
                                coupon_id, shipping_cents, total_cents, payment_method, status,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(header.id.as_uuid())
        .bind(header.user_id.as_uuid())
        .bind(shipping_address)
        .bind(header.subtotal.cents())
        .bind(header.discount.cents())
        .bind(header.coupon_id.map(|id| id.as_uuid()))
        .bind(header.shipping_price.cents())
        .bind(header.total.cents())
        .bind(header.payment_method.as_str())
        .bind(header.status.as_str())
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(header.id.as_uuid())
            .bind(to_i32("order item position", position)?)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(to_i32("order item quantity", item.quantity)?)
            .bind(item.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        for entry in order.history() {
            self.append_history(entry).await?;
        }

        Ok(())
    }

    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.load_order(order_id, false).await
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.load_order(order_id, true).await
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::corrupt(
                "order",
                format!("order {order_id} does not exist"),
            ));
        }
        Ok(())
    }

    async fn append_history(&mut self, entry: &StatusHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (order_id, status, note, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.order_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(&entry.note)
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
