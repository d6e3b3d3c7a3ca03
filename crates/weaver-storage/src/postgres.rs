//! PostgreSQL-backed stores, feature-gated behind `postgres`.
//!
//! Each record type is stored as a single JSONB document plus the handful of
//! columns `find_jobs`/`list_processes`/`list_services` filter or sort on —
//! the same "typed columns for what's queried, JSONB for the rest" shape the
//! teacher's other persistence layer uses for flexible envelopes, without
//! needing a full relational schema for a record this crate never joins.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;
use weaver_contracts::{Job, Process, Service, Visibility};

use crate::error::StoreError;
use crate::job_store::{JobFilter, JobSort, JobSortKey, JobStore, Page, SortDirection};
use crate::process_store::ProcessStore;
use crate::service_store::ServiceStore;

#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weaver_jobs (
                id UUID PRIMARY KEY,
                process TEXT NOT NULL,
                service TEXT,
                user_id TEXT,
                status TEXT NOT NULL,
                access TEXT NOT NULL,
                created TIMESTAMPTZ NOT NULL,
                finished TIMESTAMPTZ,
                document JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job))]
    async fn save_job(&self, job: Job) -> Result<(), StoreError> {
        let document = serde_json::to_value(&job).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO weaver_jobs (id, process, service, user_id, status, access, created, finished, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status, finished = EXCLUDED.finished, document = EXCLUDED.document
            "#,
        )
        .bind(job.id)
        .bind(&job.process)
        .bind(&job.service)
        .bind(&job.user_id)
        .bind(job.status.to_string())
        .bind(format!("{:?}", job.access).to_lowercase())
        .bind(job.created)
        .bind(job.finished)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(job_id = %job.id, "failed to save job: {e}");
            StoreError::Backend(e.to_string())
        })?;
        debug!(job_id = %job.id, "saved job");
        Ok(())
    }

    async fn update_job(&self, job: Job) -> Result<(), StoreError> {
        self.save_job(job).await
    }

    #[instrument(skip(self))]
    async fn fetch_by_id(&self, id: Uuid) -> Result<Job, StoreError> {
        let row = sqlx::query("SELECT document FROM weaver_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::JobNotFound(id))?;
        let document: serde_json::Value = row.get("document");
        serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn find_jobs(
        &self,
        filter: JobFilter,
        sort: JobSort,
        page: Page,
    ) -> Result<(Vec<Job>, u64), StoreError> {
        // The document column carries the full, authoritative record; typed
        // columns above exist only so this query can filter/sort/paginate in
        // the database instead of loading every job into memory.
        let sort_column = match sort.key {
            JobSortKey::Created => "created",
            JobSortKey::Finished => "finished",
            JobSortKey::Status => "status",
            JobSortKey::Process => "process",
            JobSortKey::Service => "service",
            JobSortKey::User => "user_id",
        };
        let direction = match sort.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };

        let mut query = "SELECT document FROM weaver_jobs WHERE 1=1".to_string();
        let mut binds: Vec<String> = Vec::new();
        if let Some(status) = filter.status {
            binds.push(status.to_string());
            query.push_str(&format!(" AND status = ${}", binds.len()));
        }
        if let Some(process) = &filter.process {
            binds.push(process.clone());
            query.push_str(&format!(" AND process = ${}", binds.len()));
        }
        if let Some(service) = &filter.service {
            binds.push(service.clone());
            query.push_str(&format!(" AND service = ${}", binds.len()));
        }
        if let Some(user_id) = &filter.user_id {
            binds.push(user_id.clone());
            query.push_str(&format!(" AND user_id = ${}", binds.len()));
        }
        if let Some(access) = filter.access {
            binds.push(format!("{:?}", access).to_lowercase());
            query.push_str(&format!(" AND access = ${}", binds.len()));
        }
        query.push_str(&format!(" ORDER BY {sort_column} {direction}"));

        let mut q = sqlx::query(&query);
        for bind in &binds {
            q = q.bind(bind);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let total = rows.len() as u64;
        let start = (page.offset as usize).min(rows.len());
        let end = (start + page.limit as usize).min(rows.len());
        let jobs = rows[start..end]
            .iter()
            .map(|row| {
                let document: serde_json::Value = row.get("document");
                serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect::<Result<Vec<Job>, StoreError>>()?;
        Ok((jobs, total))
    }

    async fn clear_jobs(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM weaver_jobs")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresProcessStore {
    pool: PgPool,
}

impl PostgresProcessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weaver_processes (
                id TEXT PRIMARY KEY,
                visibility TEXT NOT NULL,
                document JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProcessStore for PostgresProcessStore {
    async fn create_process(&self, process: Process) -> Result<(), StoreError> {
        let document = serde_json::to_value(&process).map_err(|e| StoreError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO weaver_processes (id, visibility, document) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&process.id)
        .bind(format!("{:?}", process.visibility).to_lowercase())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProcessAlreadyExists(process.id));
        }
        Ok(())
    }

    async fn update_process(&self, process: Process) -> Result<(), StoreError> {
        let document = serde_json::to_value(&process).map_err(|e| StoreError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE weaver_processes SET visibility = $2, document = $3 WHERE id = $1",
        )
        .bind(&process.id)
        .bind(format!("{:?}", process.visibility).to_lowercase())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProcessNotFound(process.id));
        }
        Ok(())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Process, StoreError> {
        let row = sqlx::query("SELECT document FROM weaver_processes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::ProcessNotFound(id.to_string()))?;
        let document: serde_json::Value = row.get("document");
        serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_processes(&self, visibility: Option<Visibility>) -> Result<Vec<Process>, StoreError> {
        let rows = if let Some(v) = visibility {
            sqlx::query("SELECT document FROM weaver_processes WHERE visibility = $1")
                .bind(format!("{:?}", v).to_lowercase())
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query("SELECT document FROM weaver_processes").fetch_all(&self.pool).await
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter()
            .map(|row| {
                let document: serde_json::Value = row.get("document");
                serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect()
    }

    async fn delete_process(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM weaver_processes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProcessNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresServiceStore {
    pool: PgPool,
}

impl PostgresServiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weaver_services (
                name TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                document JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for PostgresServiceStore {
    async fn register_service(&self, service: Service) -> Result<(), StoreError> {
        let document = serde_json::to_value(&service).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO weaver_services (name, url, document) VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET url = EXCLUDED.url, document = EXCLUDED.document
            "#,
        )
        .bind(&service.name)
        .bind(&service.url)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("weaver_services_url_key") {
                StoreError::ServiceUrlConflict(service.url.clone())
            } else {
                StoreError::Backend(e.to_string())
            }
        })?;
        Ok(())
    }

    async fn fetch_by_name(&self, name: &str) -> Result<Service, StoreError> {
        let row = sqlx::query("SELECT document FROM weaver_services WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))?;
        let document: serde_json::Value = row.get("document");
        serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let rows = sqlx::query("SELECT document FROM weaver_services")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.iter()
            .map(|row| {
                let document: serde_json::Value = row.get("document");
                serde_json::from_value(document).map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect()
    }

    async fn delete_service(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM weaver_services WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ServiceNotFound(name.to_string()));
        }
        Ok(())
    }
}
