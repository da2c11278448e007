// src/db/stock_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::stock::{StockLevel, StockMovement, StockMovementType},
};

#[derive(Clone)]
pub struct StockRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Aplica um delta ao saldo num único UPSERT: o incremento acontece
    /// inteiro no banco, então ajustes concorrentes de outros módulos
    /// (venda, transferência, acerto) não perdem atualização.
    pub async fn adjust_stock<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        variation_id: Option<Uuid>,
        delta: Decimal,
    ) -> Result<StockLevel, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            INSERT INTO stock_levels (company_id, branch_id, product_id, variation_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (company_id, branch_id, product_id,
                         COALESCE(variation_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET quantity = stock_levels.quantity + EXCLUDED.quantity,
                          updated_at = now()
            RETURNING id, company_id, branch_id, product_id, variation_id, quantity, updated_at
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(product_id)
        .bind(variation_id)
        .bind(delta)
        .fetch_one(executor)
        .await?;

        Ok(level)
    }

    /// Grava o histórico (append-only) da movimentação.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_movement<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        variation_id: Option<Uuid>,
        movement_type: StockMovementType,
        quantity: Decimal,
        unit_cost: Option<Decimal>,
        total_cost: Option<Decimal>,
        box_change: Option<Decimal>,
        piece_change: Option<Decimal>,
        reference_id: Option<Uuid>,
        notes: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<StockMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements (
                company_id, branch_id, product_id, variation_id, movement_type,
                quantity, unit_cost, total_cost, box_change, piece_change,
                reference_id, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, company_id, branch_id, product_id, variation_id, movement_type,
                      quantity, unit_cost, total_cost, box_change, piece_change,
                      reference_id, notes, created_by, created_at
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(product_id)
        .bind(variation_id)
        .bind(movement_type)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .bind(box_change)
        .bind(piece_change)
        .bind(reference_id)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(movement)
    }
}
