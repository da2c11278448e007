// src/models/ledger.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "ledger_entry_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntrySource {
    Purchase,
    Payment,
    PurchaseReturn,
}

// Razão de fornecedor: um por (empresa, fornecedor), criado sob demanda.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplierLedger {
    pub id: Uuid,
    pub company_id: Uuid,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub created_at: DateTime<Utc>,
}

// Lançamento do razão. Lançado nunca se edita: correção é lançamento
// inverso (mesma regra da devolução em si).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub ledger_id: Uuid,
    pub entry_date: NaiveDate,
    pub debit: Decimal,
    pub credit: Decimal,
    pub source: LedgerEntrySource,
    pub reference_no: Option<String>,
    pub reference_id: Option<Uuid>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

// Direção do lançamento: finalize debita o total; void credita o mesmo
// total, zerando o efeito líquido no razão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    pub fn amounts(self, total: Decimal) -> (Decimal, Decimal) {
        match self {
            EntryDirection::Debit => (total, Decimal::ZERO),
            EntryDirection::Credit => (Decimal::ZERO, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn entry(debit: Decimal, credit: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            ledger_id: Uuid::new_v4(),
            entry_date: NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(),
            debit,
            credit,
            source: LedgerEntrySource::PurchaseReturn,
            reference_no: None,
            reference_id: None,
            remarks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn finalize_and_void_entries_cancel_out() {
        let total = d("1200.00");
        let (debit, credit) = EntryDirection::Debit.amounts(total);
        let finalize_entry = entry(debit, credit);
        let (debit, credit) = EntryDirection::Credit.amounts(total);
        let void_entry = entry(debit, credit);

        assert_eq!(finalize_entry.net(), total);
        assert_eq!(void_entry.net(), -total);
        // Efeito líquido dos dois lançamentos: zero.
        assert_eq!(finalize_entry.net() + void_entry.net(), Decimal::ZERO);
    }
}
