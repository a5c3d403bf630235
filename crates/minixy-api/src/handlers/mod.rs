//! HTTP handlers.

pub mod companies;
pub mod health;
pub mod upload;

pub use companies::{create_company, delete_companies, list_companies};
pub use health::health_check;
pub use upload::upload_csv;
