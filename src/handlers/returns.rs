// src/handlers/returns.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::CompanyContext,
    models::returns::PackingBreakdown,
    services::returns_service::{CreateReturnInput, ReturnLineInput},
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnPayload {
    pub branch_id: Uuid,

    /// Presente = devolução vinculada; ausente = devolução avulsa.
    pub original_purchase_id: Option<Uuid>,

    /// Quando omitida, assume a data de hoje.
    pub return_date: Option<NaiveDate>,

    pub supplier_id: Option<Uuid>,

    /// Obrigatório na devolução avulsa; na vinculada herda da compra.
    pub supplier_name: Option<String>,

    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,

    #[validate(length(min = 1, message = "Informe ao menos uma linha."))]
    pub lines: Vec<ReturnLinePayload>,
}

// Serialize também: a validação de `lines` serializa o valor rejeitado
// para dentro dos parâmetros do erro.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReturnLinePayload {
    Linked {
        purchase_item_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
    },
    Standalone {
        product_id: Uuid,
        variation_id: Option<Uuid>,
        product_name: String,
        sku: String,
        quantity: Decimal,
        unit: Option<String>,
        unit_price: Decimal,
        packing: Option<PackingBreakdown>,
        notes: Option<String>,
    },
}

impl From<ReturnLinePayload> for ReturnLineInput {
    fn from(payload: ReturnLinePayload) -> Self {
        match payload {
            ReturnLinePayload::Linked {
                purchase_item_id,
                quantity,
                notes,
            } => ReturnLineInput::Linked {
                purchase_item_id,
                quantity,
                notes,
            },
            ReturnLinePayload::Standalone {
                product_id,
                variation_id,
                product_name,
                sku,
                quantity,
                unit,
                unit_price,
                packing,
                notes,
            } => ReturnLineInput::Standalone {
                product_id,
                variation_id,
                product_name,
                sku,
                quantity,
                unit,
                unit_price,
                packing,
                notes,
            },
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPayload {
    /// Usuário responsável, gravado no histórico de estoque.
    pub actor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListReturnsQuery {
    pub branch_id: Option<Uuid>,
}

// ---
// Handlers
// ---

#[utoipa::path(
    post,
    path = "/api/returns",
    tag = "Devoluções",
    request_body = CreateReturnPayload,
    params(("x-company-id" = String, Header, description = "UUID da empresa")),
    responses(
        (status = 201, description = "Devolução criada em rascunho"),
        (status = 404, description = "Compra ou item de origem não encontrado"),
        (status = 422, description = "Quantidade inválida ou acima do devolvível"),
    )
)]
pub async fn create_return(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Json(payload): Json<CreateReturnPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = CreateReturnInput {
        branch_id: payload.branch_id,
        original_purchase_id: payload.original_purchase_id,
        return_date: payload.return_date,
        supplier_id: payload.supplier_id,
        supplier_name: payload.supplier_name,
        reason: payload.reason,
        notes: payload.notes,
        created_by: payload.created_by,
        lines: payload.lines.into_iter().map(Into::into).collect(),
    };

    let created = app_state
        .returns_service
        .create_return(&app_state.db_pool, company.0, input)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/returns",
    tag = "Devoluções",
    params(
        ListReturnsQuery,
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses((status = 200, description = "Devoluções da empresa, mais recentes primeiro"))
)]
pub async fn list_returns(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Query(query): Query<ListReturnsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let returns = app_state
        .returns_service
        .list_returns(&app_state.db_pool, company.0, query.branch_id)
        .await?;

    Ok(Json(returns))
}

#[utoipa::path(
    get,
    path = "/api/returns/{id}",
    tag = "Devoluções",
    params(
        ("id" = Uuid, Path, description = "ID da devolução"),
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses(
        (status = 200, description = "Devolução com suas linhas"),
        (status = 404, description = "Devolução não encontrada"),
    )
)]
pub async fn get_return(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let found = app_state
        .returns_service
        .get_return(&app_state.db_pool, company.0, id)
        .await?;

    Ok(Json(found))
}

#[utoipa::path(
    post,
    path = "/api/returns/{id}/finalize",
    tag = "Devoluções",
    request_body = TransitionPayload,
    params(
        ("id" = Uuid, Path, description = "ID da devolução"),
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses(
        (status = 200, description = "Devolução finalizada; estoque e razão atualizados"),
        (status = 404, description = "Devolução não encontrada"),
        (status = 409, description = "Status não permite finalizar, ou limite consumido por devolução concorrente"),
    )
)]
pub async fn finalize_return(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let actor = payload.and_then(|Json(p)| p.actor_id);

    let event = app_state
        .returns_service
        .finalize_return(&app_state.db_pool, company.0, id, actor)
        .await?;

    Ok(Json(event))
}

#[utoipa::path(
    post,
    path = "/api/returns/{id}/void",
    tag = "Devoluções",
    request_body = TransitionPayload,
    params(
        ("id" = Uuid, Path, description = "ID da devolução"),
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses(
        (status = 200, description = "Devolução anulada; estoque e razão estornados"),
        (status = 404, description = "Devolução não encontrada"),
        (status = 409, description = "Só devoluções finalizadas podem ser anuladas"),
    )
)]
pub async fn void_return(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let actor = payload.and_then(|Json(p)| p.actor_id);

    let event = app_state
        .returns_service
        .void_return(&app_state.db_pool, company.0, id, actor)
        .await?;

    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/api/returns/{id}",
    tag = "Devoluções",
    params(
        ("id" = Uuid, Path, description = "ID da devolução"),
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses(
        (status = 204, description = "Rascunho excluído"),
        (status = 404, description = "Devolução não encontrada"),
        (status = 409, description = "Só rascunhos podem ser excluídos"),
    )
)]
pub async fn delete_return(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .returns_service
        .delete_return(&app_state.db_pool, company.0, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/returns/purchase/{purchase_id}/items",
    tag = "Devoluções",
    params(
        ("purchase_id" = Uuid, Path, description = "ID da compra de origem"),
        ("x-company-id" = String, Header, description = "UUID da empresa"),
    ),
    responses(
        (status = 200, description = "Linhas da compra com a capacidade devolvível restante"),
        (status = 404, description = "Compra não encontrada"),
    )
)]
pub async fn get_original_purchase_items(
    State(app_state): State<AppState>,
    company: CompanyContext,
    Path(purchase_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let snapshots = app_state
        .returns_service
        .get_original_purchase_items(&app_state.db_pool, company.0, purchase_id)
        .await?;

    Ok(Json(snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_payload_rejects_an_empty_line_list() {
        let payload: CreateReturnPayload = serde_json::from_value(json!({
            "branchId": Uuid::new_v4(),
            "supplierName": "Fornecedor Têxtil",
            "lines": [],
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("lines"));
    }

    #[test]
    fn create_payload_parses_linked_and_standalone_lines() {
        let payload: CreateReturnPayload = serde_json::from_value(json!({
            "branchId": Uuid::new_v4(),
            "originalPurchaseId": Uuid::new_v4(),
            "lines": [
                {
                    "kind": "linked",
                    "purchaseItemId": Uuid::new_v4(),
                    "quantity": 10,
                },
                {
                    "kind": "standalone",
                    "productId": Uuid::new_v4(),
                    "productName": "Zíper",
                    "sku": "ZIP-1",
                    "quantity": 4,
                    "unitPrice": 2.5,
                },
            ],
        }))
        .unwrap();

        assert!(payload.validate().is_ok());
        assert!(matches!(payload.lines[0], ReturnLinePayload::Linked { .. }));
        assert!(matches!(
            payload.lines[1],
            ReturnLinePayload::Standalone { .. }
        ));
    }
}
