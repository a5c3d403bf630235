//! In-memory company repository.
//!
//! Selected with `DATABASE_URL=memory://`. Data lives for the life of the
//! process; filter semantics mirror the PostgreSQL implementation.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use minixy_core::{CompanyFilter, CompanyRecord, CompanyRepository, NewCompany, Result};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: Vec<CompanyRecord>,
}

impl Inner {
    fn push(&mut self, company: NewCompany) -> CompanyRecord {
        self.next_id += 1;
        let now = Utc::now();
        let record = CompanyRecord {
            id: self.next_id,
            company_name: company.company_name,
            employee_size: company.employee_size,
            country: company.country,
            city: company.city,
            domain: company.domain,
            created_at: now,
            updated_at: now,
        };
        self.records.push(record.clone());
        record
    }
}

/// Process-local implementation of CompanyRepository.
#[derive(Debug, Default)]
pub struct InMemoryCompanyRepository {
    inner: RwLock<Inner>,
}

impl InMemoryCompanyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn insert(&self, company: NewCompany) -> Result<CompanyRecord> {
        company.validate()?;
        Ok(self.inner.write().await.push(company))
    }

    async fn insert_many(&self, companies: Vec<NewCompany>) -> Result<Vec<CompanyRecord>> {
        // Column widths are checked up front so the batch stays all-or-nothing.
        for company in &companies {
            company.validate()?;
        }
        // Single write guard: concurrent readers see all of the batch or none.
        let mut inner = self.inner.write().await;
        Ok(companies.into_iter().map(|c| inner.push(c)).collect())
    }

    async fn list(&self, filter: CompanyFilter) -> Result<Vec<CompanyRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let removed = inner.records.len() as u64;
        inner.records.clear();
        Ok(removed)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
