use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AllocationRepository;
use crate::engine::overlap::DateRange;
use crate::models::{Project, ResourceAllocation};
use crate::{AppError, AppResult};

/// Process-local store. Backs the tests and the server when no database is configured.
#[derive(Default)]
pub struct InMemoryAllocationRepository {
    allocations: RwLock<HashMap<Uuid, ResourceAllocation>>,
    projects: RwLock<HashMap<Uuid, Project>>,
}

impl InMemoryAllocationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect matching rows, join project names and order by `(start_date, id)`.
    async fn select<F>(&self, predicate: F) -> Vec<ResourceAllocation>
    where
        F: Fn(&ResourceAllocation) -> bool,
    {
        let allocations = self.allocations.read().await;
        let projects = self.projects.read().await;
        let mut rows: Vec<ResourceAllocation> = allocations
            .values()
            .filter(|a| predicate(a))
            .map(|a| with_project_name(a.clone(), &projects))
            .collect();
        rows.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        rows
    }
}

fn with_project_name(
    mut allocation: ResourceAllocation,
    projects: &HashMap<Uuid, Project>,
) -> ResourceAllocation {
    allocation.project_name = projects.get(&allocation.project_id).map(|p| p.name.clone());
    allocation
}

#[async_trait]
impl AllocationRepository for InMemoryAllocationRepository {
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>> {
        Ok(self
            .select(|a| a.resource_id == resource_id && a.range().touches(range))
            .await)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ResourceAllocation>> {
        let allocations = self.allocations.read().await;
        let projects = self.projects.read().await;
        Ok(allocations
            .get(&id)
            .map(|a| with_project_name(a.clone(), &projects)))
    }

    async fn find_by_resource(&self, resource_id: Uuid) -> AppResult<Vec<ResourceAllocation>> {
        Ok(self.select(|a| a.resource_id == resource_id).await)
    }

    async fn find_by_project(&self, project_id: Uuid) -> AppResult<Vec<ResourceAllocation>> {
        Ok(self.select(|a| a.project_id == project_id).await)
    }

    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<ResourceAllocation>> {
        Ok(self.select(|a| a.organization_id == organization_id).await)
    }

    async fn find_by_organization_overlapping(
        &self,
        organization_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>> {
        Ok(self
            .select(|a| a.organization_id == organization_id && a.range().touches(range))
            .await)
    }

    async fn save(&self, allocation: ResourceAllocation) -> AppResult<ResourceAllocation> {
        let mut allocations = self.allocations.write().await;
        allocations.insert(allocation.id, allocation.clone());
        drop(allocations);

        let projects = self.projects.read().await;
        Ok(with_project_name(allocation, &projects))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.allocations.write().await.remove(&id);
        Ok(())
    }

    async fn upsert_project(&self, project: Project) -> AppResult<Project> {
        let mut projects = self.projects.write().await;
        if let Some(existing) = projects.get(&project.id) {
            if existing.organization_id != project.organization_id {
                return Err(AppError::NotFound(format!("Project {} not found", project.id)));
            }
        }
        projects.insert(project.id, project.clone());
        Ok(project)
    }
}
