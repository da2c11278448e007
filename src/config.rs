// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, time::Duration};

use crate::{
    db::{LedgerRepository, PurchasesRepository, ReturnsRepository, StockRepository},
    services::ReturnsService,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub returns_service: ReturnsService,
}

impl AppState {
    // A assinatura retorna um Result: configuração inválida derruba a
    // inicialização com contexto em vez de panic solto.
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let returns_repo = ReturnsRepository::new(db_pool.clone());
        let purchases_repo = PurchasesRepository::new(db_pool.clone());
        let stock_repo = StockRepository::new(db_pool.clone());
        let ledger_repo = LedgerRepository::new(db_pool.clone());
        let returns_service =
            ReturnsService::new(returns_repo, purchases_repo, stock_repo, ledger_repo);

        Ok(Self {
            db_pool,
            returns_service,
        })
    }
}
