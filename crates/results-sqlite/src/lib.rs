mod context;
mod error;
mod insert;
mod models;
mod open;
mod project;
mod query;
pub mod schema;

pub use context::TxContext;
pub use error::RollbackFailed;
pub use insert::*;
pub use models::*;
pub use open::Db;
pub use project::project;
