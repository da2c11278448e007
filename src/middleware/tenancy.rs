// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

// O nome do nosso cabeçalho HTTP customizado
const COMPANY_ID_HEADER: &str = "x-company-id";

// O nosso extrator de empresa.
// Todo dado do sistema é escopado por empresa; os handlers recebem
// este contexto e repassam o UUID para os services.
#[derive(Debug, Clone, Copy)]
pub struct CompanyContext(pub Uuid);

impl<S> FromRequestParts<S> for CompanyContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Tenta ler o cabeçalho X-Company-ID
        let header_value = parts.headers.get(COMPANY_ID_HEADER);

        match header_value {
            Some(value) => {
                let value_str = value.to_str().map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        "Cabeçalho X-Company-ID contém caracteres inválidos.".to_string(),
                    )
                })?;

                let company_id = Uuid::parse_str(value_str).map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        "Cabeçalho X-Company-ID inválido (não é um UUID).".to_string(),
                    )
                })?;

                Ok(CompanyContext(company_id))
            }
            None => Err((
                StatusCode::BAD_REQUEST,
                "O cabeçalho X-Company-ID é obrigatório.".to_string(),
            )),
        }
    }
}
