//! Queries shared by several workflows. Every helper takes the connection
//! of the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use mostrador_core::inventory::{check_movement_sign, movement_type_for};
use mostrador_core::sale::{folio_day_prefix, format_folio, next_folio_sequence};
use mostrador_core::validation::validate_search_query;
use mostrador_core::{
    CashMovement, CashMovementType, CashOrigin, CashShift, InventoryMovement, LedgerOrigin,
    Product,
};

/// Opens a transaction that holds the write lock from its first statement.
///
/// Workflows read (stock, folios, open shifts) and then write on what they
/// read. With `BEGIN IMMEDIATE` a second writer waits for the first to commit
/// instead of reading the same rows and failing at its first write.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Turns free-text search input into a LIKE pattern, `None` when empty.
pub(crate) fn like_pattern(search: Option<&str>) -> DbResult<Option<String>> {
    let Some(search) = search else {
        return Ok(None);
    };
    let query = validate_search_query(search)?;
    Ok((!query.is_empty()).then(|| format!("%{}%", query)))
}

/// Trims optional text and maps blank strings to `None`.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
}

pub(crate) async fn fetch_shift(conn: &mut SqliteConnection, id: &str) -> DbResult<CashShift> {
    sqlx::query_as::<_, CashShift>("SELECT * FROM cash_shifts WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("CashShift", id))
}

/// Current stock: the sum of the product's ledger rows.
pub(crate) async fn stock_of(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    let stock: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements WHERE product_id = ?1",
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;
    Ok(stock)
}

/// Appends one inventory ledger row.
pub(crate) async fn post_movement(
    conn: &mut SqliteConnection,
    product_id: &str,
    origin: LedgerOrigin,
    origin_id: Option<&str>,
    quantity: i64,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<InventoryMovement> {
    let movement = InventoryMovement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        movement_type: movement_type_for(origin, quantity),
        quantity,
        origin,
        origin_id: origin_id.map(str::to_string),
        notes: notes.map(str::to_string),
        created_at: now,
    };
    check_movement_sign(movement.movement_type, movement.quantity)?;

    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, product_id, movement_type, quantity, origin, origin_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.origin)
    .bind(&movement.origin_id)
    .bind(&movement.notes)
    .bind(movement.created_at)
    .execute(conn)
    .await?;

    Ok(movement)
}

/// Appends one cash drawer movement. The caller checks the shift is open.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn post_cash_movement(
    conn: &mut SqliteConnection,
    shift_id: &str,
    movement_type: CashMovementType,
    origin: CashOrigin,
    origin_id: Option<&str>,
    amount_cents: i64,
    concept: &str,
    now: DateTime<Utc>,
) -> DbResult<CashMovement> {
    let movement = CashMovement {
        id: Uuid::new_v4().to_string(),
        shift_id: shift_id.to_string(),
        movement_type,
        origin,
        origin_id: origin_id.map(str::to_string),
        amount_cents,
        concept: concept.to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO cash_movements (
            id, shift_id, movement_type, origin, origin_id, amount_cents, concept, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.shift_id)
    .bind(movement.movement_type)
    .bind(movement.origin)
    .bind(&movement.origin_id)
    .bind(movement.amount_cents)
    .bind(&movement.concept)
    .bind(movement.created_at)
    .execute(conn)
    .await?;

    Ok(movement)
}

/// Next `PREFIX-YYYYMMDD-NNNN` folio for `table` (`sales` or `orders`).
pub(crate) async fn next_folio(
    conn: &mut SqliteConnection,
    table: &'static str,
    prefix: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let date = now.date_naive();
    let day_prefix = folio_day_prefix(prefix, date);

    let last: Option<String> = sqlx::query_scalar(&format!(
        "SELECT MAX(folio) FROM {} WHERE folio LIKE ?1",
        table
    ))
    .bind(format!("{}%", day_prefix))
    .fetch_one(conn)
    .await?;

    Ok(format_folio(
        prefix,
        date,
        next_folio_sequence(last.as_deref()),
    ))
}
