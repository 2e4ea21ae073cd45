//! Test data shared by the repository tests.

use crate::repository::client::ClientInput;
use crate::repository::inventory::AdjustmentInput;
use crate::repository::product::ProductInput;
use crate::repository::shift::OpenShift;
use crate::repository::supplier::SupplierInput;
use crate::{Database, DbConfig};
use mostrador_core::{CashShift, Client, PriceType, Product, Supplier};

pub(crate) async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Active product at 16% VAT with a normal price and `stock` units on hand.
pub(crate) async fn product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
    let product = db
        .products()
        .create(&ProductInput {
            sku: sku.to_string(),
            name: format!("Producto {sku}"),
            description: None,
            unit: "pza".to_string(),
            tax_rate_bps: 1600,
            min_stock: 2,
        })
        .await
        .unwrap();

    db.products()
        .set_price(&product.id, PriceType::Normal, price_cents)
        .await
        .unwrap();

    if stock > 0 {
        db.inventory()
            .adjust(&AdjustmentInput {
                product_id: product.id.clone(),
                quantity: stock,
                notes: Some("inventario inicial".to_string()),
            })
            .await
            .unwrap();
    }

    product
}

pub(crate) async fn open_shift(db: &Database, register: &str, float_cents: i64) -> CashShift {
    db.shifts()
        .open(&OpenShift {
            register_name: register.to_string(),
            opened_by: "rosa".to_string(),
            opening_float_cents: float_cents,
        })
        .await
        .unwrap()
}

pub(crate) async fn client(db: &Database, name: &str) -> Client {
    db.clients()
        .create(&ClientInput {
            name: name.to_string(),
            tax_id: None,
            email: None,
            phone: None,
            address: None,
        })
        .await
        .unwrap()
}

pub(crate) async fn supplier(db: &Database, name: &str) -> Supplier {
    db.suppliers()
        .create(&SupplierInput {
            name: name.to_string(),
            tax_id: None,
            contact_name: None,
            email: None,
            phone: None,
        })
        .await
        .unwrap()
}
