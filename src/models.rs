pub mod ledger;
pub mod purchases;
pub mod returns;
pub mod stock;
