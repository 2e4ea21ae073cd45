//! # Dashboard Repository
//!
//! Read-only aggregates for the back-office home screen. Days are UTC
//! calendar days.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::repository::inventory::InventoryRepository;
use mostrador_core::order::is_open;
use mostrador_core::sale::{compute_totals, LineAmounts};
use mostrador_core::validation::page_size;
use mostrador_core::{OrderStatus, PaymentMethod, SaleStatus, ShiftStatus};

/// Sales of one day plus the current state of shifts, stock and orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub date: NaiveDate,
    /// Paid and returned sales.
    pub sale_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    pub cancelled_count: i64,
    pub refunds_cents: i64,
    pub open_shifts: i64,
    pub low_stock_products: i64,
    pub open_orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProductsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct MethodTotals {
    payment_method: PaymentMethod,
    sale_count: i64,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    /// Summary of `date`, today when `None`.
    pub async fn summary(&self, date: Option<NaiveDate>) -> DbResult<DashboardSummary> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let (start, end) = day_bounds(date);

        let by_method = sqlx::query_as::<_, MethodTotals>(
            r#"
            SELECT
                payment_method,
                COUNT(*) AS sale_count,
                COALESCE(SUM(subtotal_cents), 0) AS subtotal_cents,
                COALESCE(SUM(tax_cents), 0) AS tax_cents,
                COALESCE(SUM(total_cents), 0) AS total_cents
            FROM sales
            WHERE created_at >= ?1 AND created_at < ?2 AND status IN (?3, ?4)
            GROUP BY payment_method
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(SaleStatus::Paid)
        .bind(SaleStatus::Returned)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = DashboardSummary {
            date,
            sale_count: 0,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            cash_cents: 0,
            card_cents: 0,
            transfer_cents: 0,
            cancelled_count: 0,
            refunds_cents: 0,
            open_shifts: 0,
            low_stock_products: 0,
            open_orders: 0,
        };
        // GROUP BY yields at most one row per method
        for row in &by_method {
            summary.sale_count += row.sale_count;
            match row.payment_method {
                PaymentMethod::Cash => summary.cash_cents = row.total_cents,
                PaymentMethod::Card => summary.card_cents = row.total_cents,
                PaymentMethod::Transfer => summary.transfer_cents = row.total_cents,
            }
        }
        let lines: Vec<LineAmounts> = by_method
            .iter()
            .map(|row| LineAmounts {
                subtotal_cents: row.subtotal_cents,
                tax_cents: row.tax_cents,
                total_cents: row.total_cents,
            })
            .collect();
        let totals = compute_totals(&lines)?;
        summary.subtotal_cents = totals.subtotal_cents;
        summary.tax_cents = totals.tax_cents;
        summary.total_cents = totals.total_cents;

        summary.cancelled_count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales WHERE created_at >= ?1 AND created_at < ?2 AND status = ?3",
        )
        .bind(start)
        .bind(end)
        .bind(SaleStatus::Cancelled)
        .fetch_one(&self.pool)
        .await?;

        summary.refunds_cents = sqlx::query_scalar(
            "SELECT COALESCE(SUM(refund_cents), 0) FROM returns WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        summary.open_shifts = sqlx::query_scalar("SELECT COUNT(*) FROM cash_shifts WHERE status = ?1")
            .bind(ShiftStatus::Open)
            .fetch_one(&self.pool)
            .await?;

        summary.low_stock_products = InventoryRepository::new(self.pool.clone())
            .stock_levels(true)
            .await?
            .len() as i64;

        let statuses: Vec<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders")
            .fetch_all(&self.pool)
            .await?;
        summary.open_orders = statuses.into_iter().filter(|s| is_open(*s)).count() as i64;

        Ok(summary)
    }

    /// Best sellers by quantity, cancelled sales excluded.
    pub async fn top_products(&self, query: &TopProductsQuery) -> DbResult<Vec<TopProduct>> {
        let top = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                si.product_id,
                si.sku,
                p.name,
                SUM(si.quantity) AS quantity,
                SUM(si.total_cents) AS total_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.status <> ?1
              AND (?2 IS NULL OR s.created_at >= ?2)
              AND (?3 IS NULL OR s.created_at < ?3)
            GROUP BY si.product_id
            ORDER BY quantity DESC, total_cents DESC
            LIMIT ?4
            "#,
        )
        .bind(SaleStatus::Cancelled)
        .bind(query.from)
        .bind(query.to)
        .bind(page_size(Some(query.limit.unwrap_or(10))))
        .fetch_all(&self.pool)
        .await?;
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::repository::order::NewOrder;
    use crate::repository::sale::NewSale;
    use mostrador_core::sale::SaleLineRequest;

    fn sale(product_id: &str, quantity: i64, method: PaymentMethod) -> NewSale {
        NewSale {
            items: vec![SaleLineRequest {
                product_id: product_id.into(),
                quantity,
                price_type: None,
            }],
            payment_method: method,
            tendered_cents: None,
            client_id: None,
            shift_id: None,
            notes: None,
        }
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start.to_rfc3339(), "2026-10-16T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-10-17T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_summary_of_today() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 10).await;
        let client = fixtures::client(&db, "Fonda").await;
        fixtures::open_shift(&db, "Caja 1", 0).await;

        db.sales().register(&sale(&coke.id, 2, PaymentMethod::Cash)).await.unwrap();
        db.sales().register(&sale(&coke.id, 1, PaymentMethod::Transfer)).await.unwrap();
        let cancelled = db.sales().register(&sale(&coke.id, 1, PaymentMethod::Card)).await.unwrap();
        db.sales().cancel(&cancelled.sale.id, None).await.unwrap();
        db.orders()
            .create(&NewOrder {
                client_id: client.id,
                notes: None,
                items: vec![],
            })
            .await
            .unwrap();

        let summary = db.dashboard().summary(None).await.unwrap();
        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.total_cents, 3_480);
        assert_eq!(summary.cash_cents, 2_320);
        assert_eq!(summary.transfer_cents, 1_160);
        assert_eq!(summary.card_cents, 0);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.open_shifts, 1);
        assert_eq!(summary.open_orders, 1);
        assert_eq!(summary.low_stock_products, 0);

        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        let empty = db.dashboard().summary(Some(yesterday)).await.unwrap();
        assert_eq!(empty.sale_count, 0);
        assert_eq!(empty.total_cents, 0);
    }

    #[tokio::test]
    async fn test_top_products_excludes_cancelled() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 20).await;
        let pepsi = fixtures::product(&db, "PEPSI-600", 1000, 20).await;

        db.sales().register(&sale(&coke.id, 3, PaymentMethod::Cash)).await.unwrap();
        let big = db.sales().register(&sale(&pepsi.id, 10, PaymentMethod::Cash)).await.unwrap();
        db.sales().register(&sale(&pepsi.id, 1, PaymentMethod::Cash)).await.unwrap();
        db.sales().cancel(&big.sale.id, None).await.unwrap();

        let top = db
            .dashboard()
            .top_products(&TopProductsQuery::default())
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].sku, "COKE-600");
        assert_eq!(top[0].quantity, 3);
        assert_eq!(top[1].quantity, 1);

        let one = db
            .dashboard()
            .top_products(&TopProductsQuery {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
    }
}
