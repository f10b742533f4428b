pub mod handlers;
pub mod models;
pub mod reconcile;
pub mod repository;

pub use repository::LedgerRepository;
