//! Company repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use minixy_core::{CompanyFilter, CompanyRecord, CompanyRepository, Error, NewCompany, Result};

use crate::escape_like;

const COLUMNS: &str = "id, company_name, employee_size, country, city, domain, created_at, updated_at";

/// PostgreSQL implementation of CompanyRepository.
#[derive(Clone)]
pub struct PgCompanyRepository {
    pool: Pool<Postgres>,
}

impl PgCompanyRepository {
    /// Create a new PgCompanyRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_row(r: &PgRow) -> CompanyRecord {
    CompanyRecord {
        id: r.get("id"),
        company_name: r.get("company_name"),
        employee_size: r.get("employee_size"),
        country: r.get("country"),
        city: r.get("city"),
        domain: r.get("domain"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// Build the WHERE clause and its bind values for a listing filter.
///
/// Placeholders are numbered from `$1` in the order the values are returned.
pub(crate) fn build_filter_clause(filter: &CompanyFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(domain) = &filter.domain_contains {
        params.push(escape_like(domain));
        clauses.push(format!(
            "domain ILIKE '%' || ${} || '%' ESCAPE '\\'",
            params.len()
        ));
    }
    if let Some(country) = &filter.country {
        params.push(country.clone());
        clauses.push(format!("country = ${}", params.len()));
    }
    if let Some(size) = &filter.employee_size {
        params.push(size.clone());
        clauses.push(format!("employee_size = ${}", params.len()));
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

#[async_trait]
impl CompanyRepository for PgCompanyRepository {
    async fn insert(&self, company: NewCompany) -> Result<CompanyRecord> {
        company.validate()?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO companies (company_name, employee_size, country, city, domain)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&company.company_name)
        .bind(&company.employee_size)
        .bind(&company.country)
        .bind(&company.city)
        .bind(&company.domain)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(map_row(&row))
    }

    #[instrument(skip(self, companies), fields(subsystem = "db", component = "companies", op = "insert_many", count = companies.len()))]
    async fn insert_many(&self, companies: Vec<NewCompany>) -> Result<Vec<CompanyRecord>> {
        if companies.is_empty() {
            return Ok(vec![]);
        }
        for company in &companies {
            company.validate()?;
        }

        let mut names = Vec::with_capacity(companies.len());
        let mut sizes = Vec::with_capacity(companies.len());
        let mut countries = Vec::with_capacity(companies.len());
        let mut cities = Vec::with_capacity(companies.len());
        let mut domains = Vec::with_capacity(companies.len());
        for c in companies {
            names.push(c.company_name);
            sizes.push(c.employee_size);
            countries.push(c.country);
            cities.push(c.city);
            domains.push(c.domain);
        }

        // One statement: the batch is appended atomically and identities are
        // handed out in input order.
        let rows = sqlx::query(&format!(
            r#"
            WITH inserted AS (
                INSERT INTO companies (company_name, employee_size, country, city, domain)
                SELECT * FROM UNNEST($1::varchar[], $2::varchar[], $3::varchar[], $4::varchar[], $5::varchar[])
                RETURNING {COLUMNS}
            )
            SELECT {COLUMNS} FROM inserted ORDER BY id
            "#
        ))
        .bind(&names)
        .bind(&sizes)
        .bind(&countries)
        .bind(&cities)
        .bind(&domains)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(result_count = rows.len(), "Inserted companies");
        Ok(rows.iter().map(map_row).collect())
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "companies", op = "list"))]
    async fn list(&self, filter: CompanyFilter) -> Result<Vec<CompanyRecord>> {
        let (where_clause, params) = build_filter_clause(&filter);
        let query = format!("SELECT {COLUMNS} FROM companies{where_clause} ORDER BY id");

        let mut q = sqlx::query(&query);
        for p in &params {
            q = q.bind(p);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        debug!(result_count = rows.len(), "Listed companies");
        Ok(rows.iter().map(map_row).collect())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM companies")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<bool> {
        crate::pool::log_pool_metrics(&self.pool);
        Ok(sqlx::query("SELECT 1").execute(&self.pool).await.is_ok())
    }
}
