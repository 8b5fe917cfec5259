use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::AllocationRepository;
use crate::engine::overlap::DateRange;
use crate::models::{Project, ResourceAllocation};
use crate::{AppError, AppResult};

const SELECT_ALLOCATION: &str = r#"
    SELECT
        a.id,
        a.resource_id,
        a.project_id,
        p.name AS project_name,
        a.task_id,
        a.organization_id,
        a.start_date,
        a.end_date,
        a.allocation_percentage,
        a.hours_per_day,
        a.created_at,
        a.updated_at
    FROM "ResourceAllocations" a
    LEFT JOIN "Projects" p ON p.id = a.project_id
"#;

const ORDER_BY_START: &str = " ORDER BY a.start_date, a.id";

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS "Projects" (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS "ResourceAllocations" (
        id UUID PRIMARY KEY,
        resource_id UUID NOT NULL,
        project_id UUID NOT NULL,
        task_id UUID,
        organization_id UUID NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        allocation_percentage DOUBLE PRECISION NOT NULL
            CHECK (allocation_percentage > 0 AND allocation_percentage <= 100),
        hours_per_day DOUBLE PRECISION NOT NULL DEFAULT 8,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CHECK (start_date <= end_date)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_allocations_resource_range ON "ResourceAllocations" (resource_id, start_date, end_date)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_allocations_org_range ON "ResourceAllocations" (organization_id, start_date, end_date)"#,
];

/// PostgreSQL-backed store. Nothing here constrains the sum of overlapping
/// percentages; the 100% ceiling is enforced by `AllocationManager` only.
#[derive(Clone)]
pub struct PgAllocationRepository {
    db: PgPool,
}

impl PgAllocationRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create tables and indexes if they are missing.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db).await?;
        }
        tracing::info!("Allocation schema verified");
        Ok(())
    }
}

#[async_trait]
impl AllocationRepository for PgAllocationRepository {
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>> {
        let sql = format!(
            "{} WHERE a.resource_id = $1 AND a.start_date <= $3 AND a.end_date >= $2{}",
            SELECT_ALLOCATION, ORDER_BY_START
        );
        let rows = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(resource_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ResourceAllocation>> {
        let sql = format!("{} WHERE a.id = $1", SELECT_ALLOCATION);
        let row = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn find_by_resource(&self, resource_id: Uuid) -> AppResult<Vec<ResourceAllocation>> {
        let sql = format!("{} WHERE a.resource_id = $1{}", SELECT_ALLOCATION, ORDER_BY_START);
        let rows = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(resource_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_project(&self, project_id: Uuid) -> AppResult<Vec<ResourceAllocation>> {
        let sql = format!("{} WHERE a.project_id = $1{}", SELECT_ALLOCATION, ORDER_BY_START);
        let rows = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(project_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<ResourceAllocation>> {
        let sql = format!("{} WHERE a.organization_id = $1{}", SELECT_ALLOCATION, ORDER_BY_START);
        let rows = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(organization_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_organization_overlapping(
        &self,
        organization_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>> {
        let sql = format!(
            "{} WHERE a.organization_id = $1 AND a.start_date <= $3 AND a.end_date >= $2{}",
            SELECT_ALLOCATION, ORDER_BY_START
        );
        let rows = sqlx::query_as::<_, ResourceAllocation>(&sql)
            .bind(organization_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn save(&self, allocation: ResourceAllocation) -> AppResult<ResourceAllocation> {
        let saved = sqlx::query_as::<_, ResourceAllocation>(
            r#"
            WITH saved AS (
                INSERT INTO "ResourceAllocations" (
                    id, resource_id, project_id, task_id, organization_id,
                    start_date, end_date, allocation_percentage, hours_per_day,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO UPDATE SET
                    project_id = EXCLUDED.project_id,
                    task_id = EXCLUDED.task_id,
                    start_date = EXCLUDED.start_date,
                    end_date = EXCLUDED.end_date,
                    allocation_percentage = EXCLUDED.allocation_percentage,
                    hours_per_day = EXCLUDED.hours_per_day,
                    updated_at = EXCLUDED.updated_at
                RETURNING *
            )
            SELECT saved.*, p.name AS project_name
            FROM saved
            LEFT JOIN "Projects" p ON p.id = saved.project_id
            "#,
        )
        .bind(allocation.id)
        .bind(allocation.resource_id)
        .bind(allocation.project_id)
        .bind(allocation.task_id)
        .bind(allocation.organization_id)
        .bind(allocation.start_date)
        .bind(allocation.end_date)
        .bind(allocation.allocation_percentage)
        .bind(allocation.hours_per_day)
        .bind(allocation.created_at)
        .bind(allocation.updated_at)
        .fetch_one(&self.db)
        .await?;

        Ok(saved)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(r#"DELETE FROM "ResourceAllocations" WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn upsert_project(&self, project: Project) -> AppResult<Project> {
        let saved = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO "Projects" (id, organization_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
                WHERE "Projects".organization_id = EXCLUDED.organization_id
            RETURNING id, organization_id, name
            "#,
        )
        .bind(project.id)
        .bind(project.organization_id)
        .bind(&project.name)
        .fetch_optional(&self.db)
        .await?;

        // No row back means the id belongs to another organization.
        saved.ok_or_else(|| AppError::NotFound(format!("Project {} not found", project.id)))
    }
}
