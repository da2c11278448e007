// src/models/purchases.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::returns::PackingBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Draft,
    Final,
    Received,
}

impl PurchaseStatus {
    /// Devolução só é permitida contra compra finalizada ou recebida.
    pub fn accepts_returns(self) -> bool {
        matches!(self, PurchaseStatus::Final | PurchaseStatus::Received)
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub po_no: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub status: PurchaseStatus,
    pub purchase_date: NaiveDate,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PurchaseItemRow {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub packing_boxes: Option<Decimal>,
    pub packing_pieces: Option<Decimal>,
    pub packing_meters: Option<Decimal>,
}

impl PurchaseItemRow {
    pub fn packing(&self) -> Option<PackingBreakdown> {
        PackingBreakdown::from_columns(
            self.packing_boxes,
            self.packing_pieces,
            self.packing_meters,
        )
    }
}

// --- Snapshot de linha de compra ---
// Visão somente-leitura da linha original, enriquecida com o quanto já
// foi devolvido (somando devoluções não anuladas). É o que a tela de
// devolução consome para calibrar os limites de quantidade.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLineSnapshot {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variation_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub packing: Option<PackingBreakdown>,
    pub already_returned: Decimal,
}

impl PurchaseLineSnapshot {
    pub fn from_row(row: PurchaseItemRow, already_returned: Decimal) -> Self {
        let packing = row.packing();
        Self {
            id: row.id,
            product_id: row.product_id,
            variation_id: row.variation_id,
            product_name: row.product_name,
            sku: row.sku,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            total: row.total,
            packing,
            already_returned,
        }
    }

    /// Capacidade devolvível restante desta linha.
    pub fn max_returnable(&self) -> Decimal {
        self.quantity - self.already_returned
    }
}
