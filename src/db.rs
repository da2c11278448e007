pub mod ledger_repo;
pub use ledger_repo::LedgerRepository;
pub mod purchases_repo;
pub use purchases_repo::PurchasesRepository;
pub mod returns_repo;
pub use returns_repo::ReturnsRepository;
pub mod stock_repo;
pub use stock_repo::StockRepository;
