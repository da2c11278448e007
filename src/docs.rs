// src/docs.rs

use axum::Json;
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Devoluções ---
        handlers::returns::create_return,
        handlers::returns::list_returns,
        handlers::returns::get_return,
        handlers::returns::finalize_return,
        handlers::returns::void_return,
        handlers::returns::delete_return,
        handlers::returns::get_original_purchase_items,
    ),
    components(
        schemas(
            // --- Devoluções ---
            models::returns::ReturnStatus,
            models::returns::PackingBreakdown,
            models::returns::ReturnLineSource,
            models::returns::ReturnLine,
            models::returns::PurchaseReturn,
            models::returns::ReturnEvent,
            handlers::returns::CreateReturnPayload,
            handlers::returns::ReturnLinePayload,
            handlers::returns::TransitionPayload,

            // --- Compras ---
            models::purchases::PurchaseStatus,
            models::purchases::Purchase,
            models::purchases::PurchaseLineSnapshot,

            // --- Estoque ---
            models::stock::StockMovementType,
            models::stock::StockLevel,
            models::stock::StockMovement,

            // --- Razão de fornecedor ---
            models::ledger::LedgerEntrySource,
            models::ledger::SupplierLedger,
            models::ledger::LedgerEntry,
        )
    ),
    tags(
        (name = "Devoluções", description = "Ciclo de vida das devoluções de compra")
    ),
    info(
        title = "Boutique ERP - Devoluções de Compra",
        description = "Núcleo de devoluções: rascunho, finalização com baixa de \
                       estoque e lançamento no razão do fornecedor, anulação e exclusão.",
    )
)]
pub struct ApiDoc;

/// Serve o documento OpenAPI em JSON puro; a UI fica a cargo do cliente.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
