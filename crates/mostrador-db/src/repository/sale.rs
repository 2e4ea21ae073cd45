//! # Sale Repository
//!
//! Sale registration and cancellation. Each workflow runs in one transaction.
//!
//! ## Register
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register(lines, payment, shift?)                                      │
//! │       │                                                                 │
//! │       ├── 1. shift open?                   no  → ShiftClosed           │
//! │       ├── 2. every product active?         no  → ProductInactive       │
//! │       ├── 3. Σ ledger ≥ Σ requested?       no  → InsufficientStock     │
//! │       ├── 4. active price of the type?     no  → NoActivePrice         │
//! │       ├── 5. totals, tendered ≥ total?     no  → InsufficientPayment   │
//! │       │                                                                 │
//! │       ├── INSERT sales, sale_items                                     │
//! │       ├── INSERT inventory_movements  (exit, origin sale)              │
//! │       ├── INSERT cash_movements       (income, cash sales on a shift)  │
//! │       └── COMMIT                                                       │
//! │                                                                         │
//! │  Any error before COMMIT rolls the whole sale back.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel
//! Only `paid` sales without returns. Compensating `entry` rows put the goods
//! back; a cash sale on a still-open shift also gets a cash `expense`. Sales
//! of a closed shift must go through a return instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::{
    begin_write, clean, fetch_product, fetch_shift, next_folio, post_cash_movement, post_movement,
    stock_of,
};
use mostrador_core::sale::{
    aggregate_quantities, check_stock, compute_totals, price_line, settle_payment,
    SaleLineRequest, SALE_FOLIO_PREFIX,
};
use mostrador_core::shift::ensure_open;
use mostrador_core::validation::{page_size, validate_line_count, validate_optional_text};
use mostrador_core::{
    CashMovementType, CashOrigin, CoreError, LedgerOrigin, PaymentMethod, Product, ProductPrice,
    Sale, SaleDetail, SaleItem, SaleStatus,
};

/// A sale as submitted by the register.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub items: Vec<SaleLineRequest>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub tendered_cents: Option<i64>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub shift_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filters for [`SaleRepository::list`]. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<SaleStatus>,
    pub shift_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))
}

pub(crate) async fn fetch_sale_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleItem>> {
    let items =
        sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid")
            .bind(sale_id)
            .fetch_all(conn)
            .await?;
    Ok(items)
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, folio, client_id, shift_id, status, payment_method,
            subtotal_cents, tax_cents, total_cents, tendered_cents, change_cents,
            notes, cancel_reason, created_at, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.folio)
    .bind(&sale.client_id)
    .bind(&sale.shift_id)
    .bind(sale.status)
    .bind(sale.payment_method)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.tendered_cents)
    .bind(sale.change_cents)
    .bind(&sale.notes)
    .bind(&sale.cancel_reason)
    .bind(sale.created_at)
    .bind(sale.cancelled_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_sale_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, sku, name, price_type, unit_price_cents,
            tax_rate_bps, quantity, subtotal_cents, tax_cents, total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.sku)
    .bind(&item.name)
    .bind(item.price_type)
    .bind(item.unit_price_cents)
    .bind(item.tax_rate_bps)
    .bind(item.quantity)
    .bind(item.subtotal_cents)
    .bind(item.tax_cents)
    .bind(item.total_cents)
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Registers a sale atomically. See the module docs for the checks.
    pub async fn register(&self, input: &NewSale) -> DbResult<SaleDetail> {
        validate_line_count(input.items.len(), false)?;
        validate_optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(shift_id) = &input.shift_id {
            let shift = fetch_shift(&mut tx, shift_id).await?;
            ensure_open(&shift)?;
        }

        if let Some(client_id) = &input.client_id {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM clients WHERE id = ?1")
                .bind(client_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Client", client_id.as_str()));
            }
        }

        // Products, loaded once each
        let mut products: HashMap<String, Product> = HashMap::new();
        for line in &input.items {
            if !products.contains_key(&line.product_id) {
                let product = fetch_product(&mut tx, &line.product_id).await?;
                if !product.is_active() {
                    return Err(CoreError::ProductInactive { sku: product.sku }.into());
                }
                products.insert(product.id.clone(), product);
            }
        }

        // Stock, aggregated per product across lines
        for (product_id, requested) in aggregate_quantities(&input.items) {
            let available = stock_of(&mut tx, &product_id).await?;
            let sku = products
                .get(&product_id)
                .map(|p| p.sku.as_str())
                .unwrap_or(product_id.as_str());
            check_stock(sku, available, requested)?;
        }

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        let mut items = Vec::with_capacity(input.items.len());
        let mut amounts = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| DbError::not_found("Product", line.product_id.as_str()))?;
            let price_type = line.price_type();

            let price = sqlx::query_as::<_, ProductPrice>(
                "SELECT * FROM product_prices WHERE product_id = ?1 AND price_type = ?2 AND is_active = 1",
            )
            .bind(&product.id)
            .bind(price_type)
            .fetch_optional(&mut *tx)
            .await?;

            let priced = price_line(product, price.as_ref(), price_type, line.quantity)?;
            amounts.push(priced.amounts);
            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: priced.product_id,
                sku: priced.sku,
                name: priced.name,
                price_type: priced.price_type,
                unit_price_cents: priced.unit_price_cents,
                tax_rate_bps: priced.tax_rate_bps,
                quantity: priced.quantity,
                subtotal_cents: priced.amounts.subtotal_cents,
                tax_cents: priced.amounts.tax_cents,
                total_cents: priced.amounts.total_cents,
            });
        }

        let totals = compute_totals(&amounts)?;
        let settlement =
            settle_payment(input.payment_method, totals.total_cents, input.tendered_cents)?;

        let sale = Sale {
            id: sale_id,
            folio: next_folio(&mut tx, "sales", SALE_FOLIO_PREFIX, now).await?,
            client_id: input.client_id.clone(),
            shift_id: input.shift_id.clone(),
            status: SaleStatus::Paid,
            payment_method: input.payment_method,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            tendered_cents: settlement.tendered_cents,
            change_cents: settlement.change_cents,
            notes: clean(input.notes.as_deref()),
            cancel_reason: None,
            created_at: now,
            cancelled_at: None,
        };

        insert_sale(&mut tx, &sale).await?;
        for item in &items {
            insert_sale_item(&mut tx, item).await?;
            post_movement(
                &mut tx,
                &item.product_id,
                LedgerOrigin::Sale,
                Some(&sale.id),
                -item.quantity,
                None,
                now,
            )
            .await?;
        }

        if let (PaymentMethod::Cash, Some(shift_id)) = (sale.payment_method, &sale.shift_id) {
            if sale.total_cents > 0 {
                post_cash_movement(
                    &mut tx,
                    shift_id,
                    CashMovementType::Income,
                    CashOrigin::Sale,
                    Some(&sale.id),
                    sale.total_cents,
                    &format!("Venta {}", sale.folio),
                    now,
                )
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            folio = %sale.folio,
            lines = items.len(),
            total_cents = sale.total_cents,
            payment = %sale.payment_method,
            "Sale registered"
        );
        Ok(SaleDetail { sale, items })
    }

    /// Cancels a paid sale and reverses its stock and cash effects.
    pub async fn cancel(&self, id: &str, reason: Option<&str>) -> DbResult<Sale> {
        validate_optional_text("reason", reason, 500)?;

        let mut tx = begin_write(&self.pool).await?;

        let sale = fetch_sale(&mut tx, id).await?;
        if sale.status != SaleStatus::Paid {
            return Err(
                CoreError::invalid_status("Sale", sale.folio.as_str(), sale.status, "cancel")
                    .into(),
            );
        }

        let returns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM returns WHERE sale_id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if returns > 0 {
            return Err(CoreError::InvalidOperation(format!(
                "sale {} has returns; register a return for the rest",
                sale.folio
            ))
            .into());
        }

        let shift_open = match &sale.shift_id {
            Some(shift_id) => {
                let shift = fetch_shift(&mut tx, shift_id).await?;
                ensure_open(&shift)?;
                true
            }
            None => false,
        };

        let now = Utc::now();
        for item in fetch_sale_items(&mut tx, id).await? {
            post_movement(
                &mut tx,
                &item.product_id,
                LedgerOrigin::SaleCancellation,
                Some(id),
                item.quantity,
                reason,
                now,
            )
            .await?;
        }

        if let (PaymentMethod::Cash, Some(shift_id), true) =
            (sale.payment_method, &sale.shift_id, shift_open)
        {
            if sale.total_cents > 0 {
                post_cash_movement(
                    &mut tx,
                    shift_id,
                    CashMovementType::Expense,
                    CashOrigin::SaleCancellation,
                    Some(id),
                    sale.total_cents,
                    &format!("Cancelación {}", sale.folio),
                    now,
                )
                .await?;
            }
        }

        sqlx::query(
            "UPDATE sales SET status = ?2, cancel_reason = ?3, cancelled_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(SaleStatus::Cancelled)
        .bind(clean(reason))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let cancelled = fetch_sale(&mut tx, id).await?;
        tx.commit().await?;

        info!(folio = %cancelled.folio, "Sale cancelled");
        Ok(cancelled)
    }

    pub async fn get(&self, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        Ok(SaleDetail {
            sale: fetch_sale(&mut conn, id).await?,
            items: fetch_sale_items(&mut conn, id).await?,
        })
    }

    pub async fn get_by_folio(&self, folio: &str) -> DbResult<SaleDetail> {
        let id: String = sqlx::query_scalar("SELECT id FROM sales WHERE folio = ?1")
            .bind(folio.trim())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", folio))?;
        self.get(&id).await
    }

    /// Sales newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR shift_id = ?4)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.status)
        .bind(&filter.shift_id)
        .bind(page_size(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use crate::repository::shift::CloseShift;
    use mostrador_core::{PriceType, ProductStatus};

    fn line(product_id: &str, quantity: i64) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
            price_type: None,
        }
    }

    fn cash_sale(items: Vec<SaleLineRequest>, tendered: Option<i64>, shift_id: Option<&str>) -> NewSale {
        NewSale {
            items,
            payment_method: PaymentMethod::Cash,
            tendered_cents: tendered,
            client_id: None,
            shift_id: shift_id.map(Into::into),
            notes: None,
        }
    }

    async fn ledger_rows(db: &crate::Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cash_sale_with_change() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 10).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 50_000).await;

        let detail = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 2)], Some(5000), Some(&shift.id)))
            .await
            .unwrap();

        let sale = &detail.sale;
        assert_eq!(sale.subtotal_cents, 3700);
        assert_eq!(sale.tax_cents, 592);
        assert_eq!(sale.total_cents, 4292);
        assert_eq!(sale.tendered_cents, 5000);
        assert_eq!(sale.change_cents, 708);
        assert_eq!(sale.status, SaleStatus::Paid);
        assert!(sale.folio.starts_with("V-"));
        assert!(sale.folio.ends_with("-0001"));

        assert_eq!(detail.items[0].sku, "COKE-600");
        assert_eq!(detail.items[0].unit_price_cents, 1850);
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 8);

        let movements = db.shifts().list_movements(&shift.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].origin, CashOrigin::Sale);
        assert_eq!(movements[0].amount_cents, 4292);
    }

    #[tokio::test]
    async fn test_card_sale_has_no_change() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;

        let mut input = cash_sale(vec![line(&coke.id, 1)], Some(99_999), None);
        input.payment_method = PaymentMethod::Card;
        let sale = db.sales().register(&input).await.unwrap().sale;

        assert_eq!(sale.tendered_cents, 1160);
        assert_eq!(sale.change_cents, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 1).await;
        let before = ledger_rows(&db).await;

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 2)], None, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        assert_eq!(ledger_rows(&db).await, before);
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 1);
        assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_checked_across_lines() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 1).await;

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1), line(&coke.id, 1)], None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_inactive_product_and_missing_price() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1850, 5).await;
        let pepsi = fixtures::product(&db, "PEPSI-600", 1700, 5).await;
        db.products().set_status(&pepsi.id, ProductStatus::Inactive).await.unwrap();

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&pepsi.id, 1)], None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductInactive { .. })));

        let mut wholesale = line(&coke.id, 1);
        wholesale.price_type = Some(PriceType::Wholesale);
        let err = db
            .sales()
            .register(&cash_sale(vec![wholesale], None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoActivePrice { .. })));
    }

    #[tokio::test]
    async fn test_insufficient_payment() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1)], Some(1000), None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InsufficientPayment { .. })));
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;

        let err = db
            .products()
            .set_price(&coke.id, PriceType::Normal, i64::MAX / 2)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // The ceiling itself still prices and settles without overflowing
        db.products()
            .set_price(&coke.id, PriceType::Normal, mostrador_core::MAX_AMOUNT_CENTS)
            .await
            .unwrap();
        let mut input = cash_sale(vec![line(&coke.id, 3)], None, None);
        input.payment_method = PaymentMethod::Card;
        let sale = db.sales().register(&input).await.unwrap().sale;
        assert_eq!(sale.total_cents, 34_800_000_000);

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1)], Some(i64::MAX), None))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_folios_are_sequential() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;

        let a = db.sales().register(&cash_sale(vec![line(&coke.id, 1)], None, None)).await.unwrap();
        let b = db.sales().register(&cash_sale(vec![line(&coke.id, 1)], None, None)).await.unwrap();

        assert!(a.sale.folio.ends_with("-0001"));
        assert!(b.sale.folio.ends_with("-0002"));
        assert_eq!(db.sales().get_by_folio(&b.sale.folio).await.unwrap().sale.id, b.sale.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_get_distinct_folios() {
        let path = std::env::temp_dir().join(format!("mostrador-{}.db", uuid::Uuid::new_v4()));
        let db = crate::Database::new(crate::DbConfig::new(&path).max_connections(4).password_cost(4))
            .await
            .unwrap();
        let coke = fixtures::product(&db, "COKE-600", 1000, 20).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let input = cash_sale(vec![line(&coke.id, 1)], None, None);
            handles.push(tokio::spawn(async move { db.sales().register(&input).await }));
        }

        let mut folios = Vec::new();
        for handle in handles {
            folios.push(handle.await.unwrap().unwrap().sale.folio);
        }
        folios.sort();
        folios.dedup();

        assert_eq!(folios.len(), 8);
        assert!(folios[7].ends_with("-0008"));
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 12);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_closed_shift_rejects_sale() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;
        db.shifts()
            .close(&shift.id, &CloseShift { counted_cash_cents: 0, notes: None })
            .await
            .unwrap();

        let err = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1)], None, Some(&shift.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftClosed { .. })));
    }

    #[tokio::test]
    async fn test_cancel_compensates_stock_and_cash() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;

        let sale = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 3)], None, Some(&shift.id)))
            .await
            .unwrap()
            .sale;
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 2);

        let cancelled = db.sales().cancel(&sale.id, Some("cliente se arrepintió")).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("cliente se arrepintió"));
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 5);

        let movements = db.shifts().list_movements(&shift.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].movement_type, CashMovementType::Expense);
        assert_eq!(movements[1].origin, CashOrigin::SaleCancellation);

        // Only once
        let err = db.sales().cancel(&sale.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_cancel_blocked_after_shift_closed() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 5).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;

        let sale = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1)], None, Some(&shift.id)))
            .await
            .unwrap()
            .sale;
        db.shifts()
            .close(&shift.id, &CloseShift { counted_cash_cents: 1160, notes: None })
            .await
            .unwrap();

        let err = db.sales().cancel(&sale.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftClosed { .. })));
        assert_eq!(db.inventory().stock(&coke.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_shift() {
        let db = fixtures::db().await;
        let coke = fixtures::product(&db, "COKE-600", 1000, 10).await;
        let shift = fixtures::open_shift(&db, "Caja 1", 0).await;

        let a = db
            .sales()
            .register(&cash_sale(vec![line(&coke.id, 1)], None, Some(&shift.id)))
            .await
            .unwrap();
        db.sales().register(&cash_sale(vec![line(&coke.id, 1)], None, None)).await.unwrap();
        db.sales().cancel(&a.sale.id, None).await.unwrap();

        let on_shift = db
            .sales()
            .list(&SaleFilter {
                shift_id: Some(shift.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(on_shift.len(), 1);

        let paid = db
            .sales()
            .list(&SaleFilter {
                status: Some(SaleStatus::Paid),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paid.len(), 1);

        let future = db
            .sales()
            .list(&SaleFilter {
                from: Some(Utc::now() + chrono::Duration::hours(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(future.is_empty());
    }
}
