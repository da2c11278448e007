// src/db/purchases_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::purchases::{Purchase, PurchaseItemRow},
};

// Colaborador de consulta de compras: o núcleo de devoluções trata a
// compra de origem como autoritativa e somente-leitura.
#[derive(Clone)]
pub struct PurchasesRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

const ITEM_COLUMNS: &str = "id, purchase_id, product_id, variation_id, product_name, sku, \
     quantity, unit, unit_price, total, packing_boxes, packing_pieces, packing_meters";

impl PurchasesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_purchase<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        purchase_id: Uuid,
    ) -> Result<Option<Purchase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, company_id, branch_id, po_no, supplier_id, supplier_name,
                   status, purchase_date, total, created_at, updated_at
            FROM purchases
            WHERE id = $1 AND company_id = $2
            "#,
        )
        .bind(purchase_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(purchase)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseItemRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, PurchaseItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_items WHERE purchase_id = $1 ORDER BY id"
        ))
        .bind(purchase_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    /// Como `list_items`, mas com `FOR UPDATE`: trava as linhas da compra
    /// durante o finalize, serializando devoluções concorrentes contra a
    /// mesma linha (a seção crítica do limite devolvível).
    pub async fn lock_items<'e, E>(
        &self,
        executor: E,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseItemRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, PurchaseItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_items WHERE purchase_id = $1 ORDER BY id FOR UPDATE"
        ))
        .bind(purchase_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }
}
