// src/db/returns_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::returns::{PurchaseReturn, PurchaseReturnRow, ReturnItemRow, ReturnLine, ReturnStatus},
};

#[derive(Clone)]
pub struct ReturnsRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

const RETURN_COLUMNS: &str = "id, company_id, branch_id, original_purchase_id, return_no, \
     return_date, supplier_id, supplier_name, status, subtotal, total, reason, notes, \
     created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, purchase_return_id, purchase_item_id, product_id, variation_id, \
     product_name, sku, quantity, unit, unit_price, total, notes, \
     packing_boxes, packing_pieces, packing_meters";

// Linha da sequência de numeração de documentos.
#[derive(Debug, sqlx::FromRow)]
pub struct SequenceRow {
    pub prefix: String,
    pub padding: i32,
    pub current_number: i32,
}

impl ReturnsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Quanto já foi devolvido contra uma linha de compra, somando as
    /// devoluções NÃO anuladas (void conta como se nunca tivesse existido,
    /// o que devolve a capacidade para uma re-devolução corrigida).
    ///
    /// Sempre recalculado na consulta; não mantemos contador na linha de
    /// compra para não ter contador defasado.
    pub async fn already_returned<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        purchase_item_id: Uuid,
        exclude_return_id: Option<Uuid>,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sum = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(i.quantity), 0)
            FROM purchase_return_items i
            JOIN purchase_returns r ON r.id = i.purchase_return_id
            WHERE i.purchase_item_id = $1
              AND r.company_id = $2
              AND r.status <> 'void'
              AND ($3::uuid IS NULL OR r.id <> $3)
            "#,
        )
        .bind(purchase_item_id)
        .bind(company_id)
        .bind(exclude_return_id)
        .fetch_one(executor)
        .await?;

        Ok(sum)
    }

    pub async fn insert_return<'e, E>(
        &self,
        executor: E,
        ret: &PurchaseReturn,
    ) -> Result<PurchaseReturnRow, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PurchaseReturnRow>(&format!(
            r#"
            INSERT INTO purchase_returns (
                id, company_id, branch_id, original_purchase_id, return_no, return_date,
                supplier_id, supplier_name, status, subtotal, total, reason, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {RETURN_COLUMNS}
            "#
        ))
        .bind(ret.id)
        .bind(ret.company_id)
        .bind(ret.branch_id)
        .bind(ret.original_purchase_id)
        .bind(&ret.return_no)
        .bind(ret.return_date)
        .bind(ret.supplier_id)
        .bind(&ret.supplier_name)
        .bind(ret.status)
        .bind(ret.subtotal)
        .bind(ret.total)
        .bind(&ret.reason)
        .bind(&ret.notes)
        .bind(ret.created_by)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        purchase_return_id: Uuid,
        line: &ReturnLine,
    ) -> Result<ReturnItemRow, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ReturnItemRow>(&format!(
            r#"
            INSERT INTO purchase_return_items (
                purchase_return_id, purchase_item_id, product_id, variation_id,
                product_name, sku, quantity, unit, unit_price, total, notes,
                packing_boxes, packing_pieces, packing_meters
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(purchase_return_id)
        .bind(line.purchase_item_id())
        .bind(line.product_id)
        .bind(line.variation_id)
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(line.quantity)
        .bind(&line.unit)
        .bind(line.unit_price)
        .bind(line.total)
        .bind(&line.notes)
        .bind(line.packing.map(|p| p.boxes))
        .bind(line.packing.map(|p| p.pieces))
        .bind(line.packing.map(|p| p.length_units))
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn get_return_row<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
    ) -> Result<Option<PurchaseReturnRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PurchaseReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM purchase_returns WHERE id = $1 AND company_id = $2"
        ))
        .bind(return_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Como `get_return_row`, mas travando a linha: o finalize/void lê e
    /// transiciona o status dentro da mesma transação.
    pub async fn get_return_row_for_update<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
    ) -> Result<Option<PurchaseReturnRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PurchaseReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM purchase_returns \
             WHERE id = $1 AND company_id = $2 FOR UPDATE"
        ))
        .bind(return_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        purchase_return_id: Uuid,
    ) -> Result<Vec<ReturnItemRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, ReturnItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_return_items \
             WHERE purchase_return_id = $1 ORDER BY id"
        ))
        .bind(purchase_return_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn list_returns<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        branch_id: Option<Uuid>,
    ) -> Result<Vec<PurchaseReturnRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, PurchaseReturnRow>(&format!(
            r#"
            SELECT {RETURN_COLUMNS}
            FROM purchase_returns
            WHERE company_id = $1
              AND ($2::uuid IS NULL OR branch_id = $2)
            ORDER BY return_date DESC, created_at DESC
            "#
        ))
        .bind(company_id)
        .bind(branch_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Transição de status condicionada ao status de partida; retorna
    /// quantas linhas mudaram (0 = outra transação chegou antes).
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
        from: ReturnStatus,
        to: ReturnStatus,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE purchase_returns SET status = $3, updated_at = now() \
             WHERE id = $1 AND company_id = $2 AND status = $4",
        )
        .bind(return_id)
        .bind(company_id)
        .bind(to)
        .bind(from)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Exclusão física, permitida apenas em rascunho (o WHERE garante).
    pub async fn delete_draft<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        return_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM purchase_returns \
             WHERE id = $1 AND company_id = $2 AND status = 'draft'",
        )
        .bind(return_id)
        .bind(company_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Avança a sequência de numeração num único UPDATE atômico.
    /// `None` quando a empresa não configurou sequência para o tipo.
    pub async fn bump_sequence<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        branch_id: Option<Uuid>,
        document_type: &str,
    ) -> Result<Option<SequenceRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, SequenceRow>(
            r#"
            UPDATE document_sequences
            SET current_number = current_number + 1
            WHERE company_id = $1
              AND document_type = $2
              AND branch_id IS NOT DISTINCT FROM $3
            RETURNING prefix, padding, current_number
            "#,
        )
        .bind(company_id)
        .bind(document_type)
        .bind(branch_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
