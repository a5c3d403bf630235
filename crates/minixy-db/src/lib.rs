//! # minixy-db
//!
//! Record store for minixy company records.
//!
//! This crate provides:
//! - Connection pool management
//! - A PostgreSQL [`CompanyRepository`] implementation
//! - An in-memory implementation for development and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use minixy_db::{CompanyFilter, CompanyRepository, Database, NewCompany};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/minixy_dev").await?;
//!
//!     db.companies.insert(NewCompany {
//!         company_name: Some("Acme".to_string()),
//!         domain: Some("acme.io".to_string()),
//!         ..Default::default()
//!     }).await?;
//!
//!     let all = db.companies.list(CompanyFilter::default()).await?;
//!     println!("{} companies", all.len());
//!     Ok(())
//! }
//! ```
pub mod companies;
pub mod memory;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use minixy_core::*;

pub use companies::PgCompanyRepository;
pub use memory::InMemoryCompanyRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Database handle bundling the pool and its repositories.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Postgres>,
    pub companies: PgCompanyRepository,
}

impl Database {
    /// Create a new Database from an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            companies: PgCompanyRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
