//! # Order Repository
//!
//! Customer orders (pedidos): draft editing, the status machine and price
//! freezing on confirmation. Orders never touch stock or cash.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{begin_write, clean, fetch_product, next_folio};
use mostrador_core::order::{
    ensure_editable, ensure_transition, freeze_prices, order_line_amounts, order_totals,
    OrderLineRequest, ORDER_FOLIO_PREFIX,
};
use mostrador_core::validation::{
    page_size, validate_line_count, validate_optional_text, validate_price_cents,
    validate_quantity,
};
use mostrador_core::{
    Client, CoreError, Order, OrderDetail, OrderItem, OrderStatus, OrderStatusChange, PriceType,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub client_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ?1 ORDER BY rowid")
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    Ok(items)
}

async fn fetch_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<OrderDetail> {
    let order = fetch_order(&mut *conn, id).await?;
    let items = fetch_items(&mut *conn, id).await?;
    let history = sqlx::query_as::<_, OrderStatusChange>(
        "SELECT * FROM order_status_changes WHERE order_id = ?1 ORDER BY changed_at, rowid",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(OrderDetail {
        order,
        items,
        history,
    })
}

async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: &str,
    line: &OrderLineRequest,
) -> DbResult<OrderItem> {
    validate_quantity(line.quantity)?;
    if let Some(price) = line.unit_price_cents {
        validate_price_cents(price)?;
    }

    let product = fetch_product(&mut *conn, &line.product_id).await?;
    if !product.is_active() {
        return Err(CoreError::ProductInactive { sku: product.sku }.into());
    }

    let amounts = order_line_amounts(line.unit_price_cents, line.quantity, product.tax_rate_bps)?;
    let item = OrderItem {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        product_id: product.id,
        quantity: line.quantity,
        unit_price_cents: line.unit_price_cents,
        tax_rate_bps: product.tax_rate_bps,
        subtotal_cents: amounts.subtotal_cents,
        tax_cents: amounts.tax_cents,
        total_cents: amounts.total_cents,
    };

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, quantity, unit_price_cents, tax_rate_bps,
            subtotal_cents, tax_cents, total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.tax_rate_bps)
    .bind(item.subtotal_cents)
    .bind(item.tax_cents)
    .bind(item.total_cents)
    .execute(conn)
    .await?;

    Ok(item)
}

async fn refresh_totals(
    conn: &mut SqliteConnection,
    order_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let items = fetch_items(&mut *conn, order_id).await?;
    let totals = order_totals(&items)?;

    sqlx::query(
        r#"
        UPDATE orders
        SET subtotal_cents = ?2, tax_cents = ?3, total_cents = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates a draft order for an active client.
    pub async fn create(&self, input: &NewOrder) -> DbResult<OrderDetail> {
        validate_line_count(input.items.len(), true)?;
        validate_optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut tx = begin_write(&self.pool).await?;

        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1")
            .bind(&input.client_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Client", input.client_id.as_str()))?;
        if !client.is_active {
            return Err(
                CoreError::InvalidOperation(format!("client {} is inactive", client.name)).into(),
            );
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();
        let folio = next_folio(&mut tx, "orders", ORDER_FOLIO_PREFIX, now).await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, folio, client_id, status, notes,
                subtotal_cents, tax_cents, total_cents, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, ?6, ?6)
            "#,
        )
        .bind(&order_id)
        .bind(&folio)
        .bind(&client.id)
        .bind(OrderStatus::Draft)
        .bind(clean(input.notes.as_deref()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &input.items {
            insert_item(&mut tx, &order_id, line).await?;
        }
        refresh_totals(&mut tx, &order_id, now).await?;

        let detail = fetch_detail(&mut tx, &order_id).await?;
        tx.commit().await?;

        info!(folio = %folio, client = %client.name, "Order created");
        Ok(detail)
    }

    pub async fn add_item(&self, order_id: &str, line: &OrderLineRequest) -> DbResult<OrderDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id).await?;
        ensure_editable(&order)?;
        let count = fetch_items(&mut tx, order_id).await?.len();
        validate_line_count(count + 1, false)?;

        insert_item(&mut tx, order_id, line).await?;
        refresh_totals(&mut tx, order_id, Utc::now()).await?;

        let detail = fetch_detail(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn remove_item(&self, order_id: &str, item_id: &str) -> DbResult<OrderDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id).await?;
        ensure_editable(&order)?;

        let result = sqlx::query("DELETE FROM order_items WHERE id = ?1 AND order_id = ?2")
            .bind(item_id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OrderItem", item_id));
        }
        refresh_totals(&mut tx, order_id, Utc::now()).await?;

        let detail = fetch_detail(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn update_notes(&self, order_id: &str, notes: Option<&str>) -> DbResult<OrderDetail> {
        validate_optional_text("notes", notes, 1000)?;

        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id).await?;
        ensure_editable(&order)?;

        sqlx::query("UPDATE orders SET notes = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(clean(notes))
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let detail = fetch_detail(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Moves the order along its status machine and records the change.
    ///
    /// Confirming freezes the active `normal` price into every unpriced line
    /// and recomputes the totals.
    pub async fn change_status(&self, order_id: &str, to: OrderStatus) -> DbResult<OrderDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id).await?;
        ensure_transition(order.status, to)?;
        let now = Utc::now();

        if to == OrderStatus::Confirmed {
            let items = fetch_items(&mut tx, order_id).await?;

            // product id -> active normal price, or the SKU when it has none
            let mut normal_prices: HashMap<String, Result<i64, String>> = HashMap::new();
            for item in items.iter().filter(|i| i.unit_price_cents.is_none()) {
                if normal_prices.contains_key(&item.product_id) {
                    continue;
                }
                let price: Option<i64> = sqlx::query_scalar(
                    r#"
                    SELECT price_cents FROM product_prices
                    WHERE product_id = ?1 AND price_type = ?2 AND is_active = 1
                    "#,
                )
                .bind(&item.product_id)
                .bind(PriceType::Normal)
                .fetch_optional(&mut *tx)
                .await?;

                let entry = match price {
                    Some(cents) => Ok(cents),
                    None => Err(fetch_product(&mut tx, &item.product_id).await?.sku),
                };
                normal_prices.insert(item.product_id.clone(), entry);
            }

            let (frozen, totals) = freeze_prices(&items, |product_id| {
                match normal_prices.get(product_id) {
                    Some(Ok(cents)) => Ok(*cents),
                    Some(Err(sku)) => Err(CoreError::NoActivePrice {
                        sku: sku.clone(),
                        price_type: PriceType::Normal.to_string(),
                    }),
                    None => Err(CoreError::not_found("Product", product_id)),
                }
            })?;

            for item in &frozen {
                sqlx::query(
                    r#"
                    UPDATE order_items
                    SET unit_price_cents = ?2, subtotal_cents = ?3, tax_cents = ?4, total_cents = ?5
                    WHERE id = ?1
                    "#,
                )
                .bind(&item.id)
                .bind(item.unit_price_cents)
                .bind(item.subtotal_cents)
                .bind(item.tax_cents)
                .bind(item.total_cents)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                "UPDATE orders SET subtotal_cents = ?2, tax_cents = ?3, total_cents = ?4 WHERE id = ?1",
            )
            .bind(order_id)
            .bind(totals.subtotal_cents)
            .bind(totals.tax_cents)
            .bind(totals.total_cents)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(to)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO order_status_changes (id, order_id, from_status, to_status, changed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order_id)
        .bind(order.status)
        .bind(to)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let detail = fetch_detail(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(folio = %order.folio, from = %order.status, to = %to, "Order status changed");
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> DbResult<OrderDetail> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut conn, id).await
    }

    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR client_id = ?2)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(filter.status)
        .bind(&filter.client_id)
        .bind(page_size(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = orders.len(), "Listed orders");
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use OrderStatus::*;

    fn line(product_id: &str, quantity: i64, price: Option<i64>) -> OrderLineRequest {
        OrderLineRequest {
            product_id: product_id.into(),
            quantity,
            unit_price_cents: price,
        }
    }

    #[tokio::test]
    async fn test_confirm_freezes_normal_price() {
        let db = fixtures::db().await;
        let client = fixtures::client(&db, "Fonda Doña Mary").await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 0).await;
        let pan = fixtures::product(&db, "PAN-BCO", 4500, 0).await;
        let repo = db.orders();

        let draft = repo
            .create(&NewOrder {
                client_id: client.id.clone(),
                notes: None,
                items: vec![line(&coke.id, 24, None), line(&pan.id, 2, Some(4000))],
            })
            .await
            .unwrap();
        assert_eq!(draft.order.status, Draft);
        assert!(draft.order.folio.starts_with("P-"));
        // Unpriced lines count as zero until confirmation
        assert_eq!(draft.order.subtotal_cents, 8000);

        // Price changes before confirmation are picked up
        db.products().set_price(&coke.id, PriceType::Normal, 1700).await.unwrap();

        let confirmed = repo.change_status(&draft.order.id, Confirmed).await.unwrap();
        assert_eq!(confirmed.items[0].unit_price_cents, Some(1700));
        assert_eq!(confirmed.items[1].unit_price_cents, Some(4000));
        assert_eq!(confirmed.order.subtotal_cents, 24 * 1700 + 8000);
        assert_eq!(confirmed.history.len(), 1);
        assert_eq!(confirmed.history[0].from_status, Draft);
        assert_eq!(confirmed.history[0].to_status, Confirmed);

        // Later price changes do not touch the frozen order
        db.products().set_price(&coke.id, PriceType::Normal, 9999).await.unwrap();
        let later = repo.get(&draft.order.id).await.unwrap();
        assert_eq!(later.items[0].unit_price_cents, Some(1700));
    }

    #[tokio::test]
    async fn test_transitions_follow_table() {
        let db = fixtures::db().await;
        let client = fixtures::client(&db, "Abarrotes Lupita").await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 0).await;
        let repo = db.orders();

        let order = repo
            .create(&NewOrder {
                client_id: client.id,
                notes: None,
                items: vec![line(&coke.id, 1, None)],
            })
            .await
            .unwrap()
            .order;

        let err = repo.change_status(&order.id, Ready).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        for to in [Confirmed, Preparing, Ready, Invoiced, Delivered] {
            repo.change_status(&order.id, to).await.unwrap();
        }
        let done = repo.get(&order.id).await.unwrap();
        assert_eq!(done.order.status, Delivered);
        assert_eq!(done.history.len(), 5);

        let err = repo.change_status(&order.id, Cancelled).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_only_drafts_are_editable() {
        let db = fixtures::db().await;
        let client = fixtures::client(&db, "Cafetería Central").await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 0).await;
        let repo = db.orders();

        let draft = repo
            .create(&NewOrder {
                client_id: client.id,
                notes: Some("entregar en la mañana".into()),
                items: vec![],
            })
            .await
            .unwrap();
        let id = draft.order.id.clone();

        let with_line = repo.add_item(&id, &line(&coke.id, 3, None)).await.unwrap();
        let second = repo.add_item(&id, &line(&coke.id, 1, Some(1500))).await.unwrap();
        assert_eq!(second.items.len(), 2);
        let removed = repo.remove_item(&id, &with_line.items[0].id).await.unwrap();
        assert_eq!(removed.items.len(), 1);
        let noted = repo.update_notes(&id, Some("por la tarde")).await.unwrap();
        assert_eq!(noted.order.notes.as_deref(), Some("por la tarde"));

        repo.change_status(&id, Cancelled).await.unwrap();
        let err = repo.add_item(&id, &line(&coke.id, 1, None)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
        let err = repo.update_notes(&id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_confirm_requires_lines_and_prices() {
        let db = fixtures::db().await;
        let client = fixtures::client(&db, "Taquería El Güero").await;
        let repo = db.orders();

        let empty = repo
            .create(&NewOrder {
                client_id: client.id.clone(),
                notes: None,
                items: vec![],
            })
            .await
            .unwrap();
        let err = repo.change_status(&empty.order.id, Confirmed).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidOperation(_))));

        // A product without a normal price cannot be frozen
        let unpriced = db
            .products()
            .create(&crate::repository::product::ProductInput {
                sku: "SIN-PRECIO".into(),
                name: "Sin precio".into(),
                description: None,
                unit: "pza".into(),
                tax_rate_bps: 0,
                min_stock: 0,
            })
            .await
            .unwrap();
        let order = repo
            .create(&NewOrder {
                client_id: client.id,
                notes: None,
                items: vec![line(&unpriced.id, 1, None)],
            })
            .await
            .unwrap();
        let err = repo.change_status(&order.order.id, Confirmed).await.unwrap_err();
        match &err {
            DbError::Domain(CoreError::NoActivePrice { sku, .. }) => assert_eq!(sku, "SIN-PRECIO"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("SIN-PRECIO"));
        assert_eq!(repo.get(&order.order.id).await.unwrap().order.status, Draft);

        let drafts = repo
            .list(&OrderFilter {
                status: Some(Draft),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(drafts.len(), 2);
    }
}
