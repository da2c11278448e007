use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Todas as variantes de negócio são recuperáveis na borda HTTP:
// a operação é abortada e nenhum estado parcial é gravado.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Quantidade não positiva numa devolução avulsa, ou divergência
    // entre quantidade e embalagem.
    #[error("Quantidade inválida: {0}")]
    InvalidQuantity(String),

    // A quantidade pedida excede o que ainda pode ser devolvido
    // (quantidade original - já devolvido).
    #[error("Quantidade excede o devolvível: {0}")]
    QuantityExceeded(String),

    // Rateio de embalagem contra quantidade original zero/negativa.
    #[error("Rateio indefinido: quantidade original deve ser positiva")]
    DivisionUndefined,

    #[error("Campo obrigatório ausente: {0}")]
    MissingRequiredField(String),

    // Transição de estado proibida (ex.: excluir uma devolução finalizada).
    #[error("Transição de estado ilegal: {0}")]
    IllegalStateTransition(String),

    // A re-checagem do limite dentro do finalize detectou que outra
    // devolução concorrente consumiu a capacidade devolvível.
    #[error("Modificação concorrente: {0}")]
    ConcurrentModification(String),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retornar todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidQuantity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::QuantityExceeded(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::DivisionUndefined => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "A quantidade original da embalagem deve ser positiva.".to_string(),
            ),
            AppError::MissingRequiredField(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::IllegalStateTransition(msg) => (StatusCode::CONFLICT, msg),
            AppError::ConcurrentModification(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
