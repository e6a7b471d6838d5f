pub mod clicks;
pub mod database;
pub mod error;
pub mod schema;

pub use clicks::ClickRepo;
pub use database::Database;
pub use error::StoreError;
