// src/models/stock.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_movement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockMovementType {
    Purchase,
    Sale,
    PurchaseReturn,
    PurchaseReturnVoid,
    Adjustment,
}

impl StockMovementType {
    /// Sinal aplicado à quantidade do movimento. Devolução de compra é
    /// saída de estoque (negativa); o void repõe o que saiu (positiva).
    pub fn signed(self, quantity: Decimal) -> Decimal {
        match self {
            StockMovementType::Purchase
            | StockMovementType::PurchaseReturnVoid
            | StockMovementType::Adjustment => quantity,
            StockMovementType::Sale | StockMovementType::PurchaseReturn => -quantity,
        }
    }
}

// Saldo por produto/variação/filial. A mutação é sempre um único
// incremento atômico no banco (nunca ler-modificar-gravar em duas idas),
// porque ajustes, transferências e vendas mexem no mesmo saldo.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

// Histórico de movimentações (journal, append-only).
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub movement_type: StockMovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub box_change: Option<Decimal>,
    pub piece_change: Option<Decimal>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn finalize_and_void_movements_cancel_out() {
        let qty = d("12.40");
        let out = StockMovementType::PurchaseReturn.signed(qty);
        let back = StockMovementType::PurchaseReturnVoid.signed(qty);
        assert_eq!(out, d("-12.40"));
        assert_eq!(back, d("12.40"));
        assert_eq!(out + back, Decimal::ZERO);
    }
}
