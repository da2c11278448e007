// src/db/ledger_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::ledger::{LedgerEntry, LedgerEntrySource, SupplierLedger},
};

#[derive(Clone)]
pub struct LedgerRepository {
    #[allow(dead_code)]
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Busca (ou cria sob demanda) o razão do fornecedor na empresa.
    pub async fn get_or_create<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        supplier_id: Uuid,
        supplier_name: &str,
    ) -> Result<SupplierLedger, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ledger = sqlx::query_as::<_, SupplierLedger>(
            r#"
            INSERT INTO supplier_ledgers (company_id, supplier_id, supplier_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (company_id, supplier_id)
            DO UPDATE SET supplier_name = EXCLUDED.supplier_name
            RETURNING id, company_id, supplier_id, supplier_name, created_at
            "#,
        )
        .bind(company_id)
        .bind(supplier_id)
        .bind(supplier_name)
        .fetch_one(executor)
        .await?;

        Ok(ledger)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_entry<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        ledger_id: Uuid,
        entry_date: NaiveDate,
        debit: Decimal,
        credit: Decimal,
        source: LedgerEntrySource,
        reference_no: Option<&str>,
        reference_id: Option<Uuid>,
        remarks: Option<&str>,
    ) -> Result<LedgerEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO supplier_ledger_entries (
                company_id, ledger_id, entry_date, debit, credit,
                source, reference_no, reference_id, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, company_id, ledger_id, entry_date, debit, credit,
                      source, reference_no, reference_id, remarks, created_at
            "#,
        )
        .bind(company_id)
        .bind(ledger_id)
        .bind(entry_date)
        .bind(debit)
        .bind(credit)
        .bind(source)
        .bind(reference_no)
        .bind(reference_id)
        .bind(remarks)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }
}
