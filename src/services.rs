pub mod returns_service;
pub use returns_service::ReturnsService;
