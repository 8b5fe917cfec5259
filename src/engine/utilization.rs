//! Read-only capacity reporting. Nothing here consults the validator, so
//! reports still work when stored allocations are already over-committed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use uuid::Uuid;

use crate::models::capacity::available_capacity;
use crate::models::{
    ConflictType, CrossProjectEntry, OverallocatedWindow, ProjectContribution, ResourceAllocation,
    ResourceCapacity, ResourceConflict, ResourceUtilization,
};
use crate::observability::OVERALLOCATED_WINDOWS_TOTAL;
use crate::repository::AllocationRepository;
use crate::AppResult;

use super::overlap::DateRange;

#[derive(Clone)]
pub struct UtilizationAggregator {
    repo: Arc<dyn AllocationRepository>,
}

impl UtilizationAggregator {
    pub fn new(repo: Arc<dyn AllocationRepository>) -> Self {
        Self { repo }
    }

    /// Total load of one resource, optionally limited to allocations
    /// overlapping `range`. Totals include every organization's bookings;
    /// the per-project breakdown names only `organization_id`'s projects.
    pub async fn get_resource_utilization(
        &self,
        organization_id: Uuid,
        resource_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<ResourceUtilization> {
        let allocations = match range {
            Some(range) => retain_overlapping(
                self.repo.find_overlapping(resource_id, &range).await?,
                &range,
            ),
            None => self.repo.find_by_resource(resource_id).await?,
        };

        let total_allocation = total_percentage(&allocations);
        Ok(ResourceUtilization {
            resource_id,
            start_date: range.map(|r| r.start),
            end_date: range.map(|r| r.end),
            total_allocation,
            available_capacity: available_capacity(total_allocation),
            allocated_hours_per_day: total_hours(&allocations),
            projects: contributions(&allocations, organization_id),
        })
    }

    /// Spare capacity per resource with at least one allocation overlapping
    /// `range`. Resources without allocations in the window are not listed.
    pub async fn get_available_capacity(
        &self,
        organization_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<ResourceCapacity>> {
        let allocations = retain_overlapping(
            self.repo
                .find_by_organization_overlapping(organization_id, &range)
                .await?,
            &range,
        );

        let mut by_resource: BTreeMap<Uuid, (f64, usize)> = BTreeMap::new();
        for allocation in &allocations {
            let entry = by_resource.entry(allocation.resource_id).or_default();
            entry.0 += allocation.allocation_percentage;
            entry.1 += 1;
        }

        Ok(by_resource
            .into_iter()
            .map(|(resource_id, (total_allocation, allocation_count))| ResourceCapacity {
                resource_id,
                total_allocation,
                available_capacity: available_capacity(total_allocation),
                allocation_count,
            })
            .collect())
    }

    /// Every allocation of the organization grouped by resource, regardless of dates.
    pub async fn get_cross_project_view(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<CrossProjectEntry>> {
        let allocations = self.repo.find_by_organization(organization_id).await?;

        Ok(group_by_resource(allocations)
            .into_iter()
            .map(|(resource_id, allocations)| CrossProjectEntry {
                resource_id,
                total_allocation: total_percentage(&allocations),
                allocated_hours_per_day: total_hours(&allocations),
                projects: contributions(&allocations, organization_id),
                allocations,
            })
            .collect())
    }

    pub async fn get_project_allocations(
        &self,
        project_id: Uuid,
    ) -> AppResult<Vec<ResourceAllocation>> {
        let mut allocations = self.repo.find_by_project(project_id).await?;
        sort_by_start(&mut allocations);
        Ok(allocations)
    }

    /// Consistency audit: every maximal window in which a resource's stored
    /// load exceeds 100%. Reports only; it never blocks or repairs anything.
    pub async fn find_overallocations(
        &self,
        organization_id: Uuid,
        range: Option<DateRange>,
    ) -> AppResult<Vec<OverallocatedWindow>> {
        let allocations = match range {
            Some(range) => retain_overlapping(
                self.repo
                    .find_by_organization_overlapping(organization_id, &range)
                    .await?,
                &range,
            ),
            None => self.repo.find_by_organization(organization_id).await?,
        };

        let mut windows = Vec::new();
        for (resource_id, allocations) in group_by_resource(allocations) {
            for window in overcommitted_windows(resource_id, &allocations) {
                match range {
                    Some(range) => windows.extend(clip(window, &range)),
                    None => windows.push(window),
                }
            }
        }

        if !windows.is_empty() {
            tracing::warn!(
                %organization_id,
                windows = windows.len(),
                "Over-committed allocation windows found"
            );
        }
        counter!(OVERALLOCATED_WINDOWS_TOTAL).increment(windows.len() as u64);
        Ok(windows)
    }
}

fn retain_overlapping(
    mut allocations: Vec<ResourceAllocation>,
    range: &DateRange,
) -> Vec<ResourceAllocation> {
    allocations.retain(|a| a.range().overlaps(range));
    allocations
}

fn sort_by_start(allocations: &mut [ResourceAllocation]) {
    allocations.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
}

fn group_by_resource(
    allocations: Vec<ResourceAllocation>,
) -> BTreeMap<Uuid, Vec<ResourceAllocation>> {
    let mut grouped: BTreeMap<Uuid, Vec<ResourceAllocation>> = BTreeMap::new();
    for allocation in allocations {
        grouped.entry(allocation.resource_id).or_default().push(allocation);
    }
    for allocations in grouped.values_mut() {
        sort_by_start(allocations);
    }
    grouped
}

fn total_percentage(allocations: &[ResourceAllocation]) -> f64 {
    allocations.iter().map(|a| a.allocation_percentage).sum()
}

fn total_hours(allocations: &[ResourceAllocation]) -> f64 {
    allocations.iter().map(ResourceAllocation::allocated_hours).sum()
}

/// Per-project totals in order of each project's first allocation. Projects
/// outside `viewer`'s organization collapse into one entry under the nil id.
fn contributions(allocations: &[ResourceAllocation], viewer: Uuid) -> Vec<ProjectContribution> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut projects: Vec<ProjectContribution> = Vec::new();
    for allocation in allocations {
        let (project_id, project_name) = if allocation.organization_id == viewer {
            (allocation.project_id, allocation.project_name.clone())
        } else {
            (Uuid::nil(), None)
        };
        let slot = *index.entry(project_id).or_insert_with(|| {
            projects.push(ProjectContribution {
                project_id,
                project_name,
                allocation_percentage: 0.0,
                allocation_count: 0,
            });
            projects.len() - 1
        });
        projects[slot].allocation_percentage += allocation.allocation_percentage;
        projects[slot].allocation_count += 1;
    }
    projects
}

/// Split the timeline at every allocation boundary and measure the load of
/// each segment `[d_i, d_i+1)`. Segments compare half-open, matching the
/// strict overlap rule, so boundary-only touches never add up. Consecutive
/// over-committed segments merge into one window.
fn overcommitted_windows(
    resource_id: Uuid,
    allocations: &[ResourceAllocation],
) -> Vec<OverallocatedWindow> {
    let mut boundaries: Vec<NaiveDate> = allocations
        .iter()
        .flat_map(|a| [a.start_date, a.end_date])
        .collect();
    boundaries.sort();
    boundaries.dedup();

    let mut windows: Vec<OverallocatedWindow> = Vec::new();
    let mut open: Option<(OverallocatedWindow, Vec<usize>)> = None;

    for segment in boundaries.windows(2) {
        let (seg_start, seg_end) = (segment[0], segment[1]);
        let covering: Vec<usize> = allocations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.start_date <= seg_start && a.end_date >= seg_end)
            .map(|(i, _)| i)
            .collect();
        let load: f64 = covering
            .iter()
            .map(|&i| allocations[i].allocation_percentage)
            .sum();

        if load > 100.0 {
            let (window, members) = open.get_or_insert_with(|| {
                (
                    OverallocatedWindow {
                        resource_id,
                        start_date: seg_start,
                        end_date: seg_end,
                        peak_allocation: load,
                        allocations: Vec::new(),
                    },
                    Vec::new(),
                )
            });
            window.end_date = seg_end;
            window.peak_allocation = window.peak_allocation.max(load);
            for i in covering {
                if !members.contains(&i) {
                    members.push(i);
                }
            }
        } else if let Some(finished) = open.take() {
            windows.push(seal(finished, allocations));
        }
    }
    if let Some(finished) = open.take() {
        windows.push(seal(finished, allocations));
    }
    windows
}

fn seal(
    (mut window, mut members): (OverallocatedWindow, Vec<usize>),
    allocations: &[ResourceAllocation],
) -> OverallocatedWindow {
    // Indices follow the (start_date, id) order of `allocations`.
    members.sort_unstable();
    window.allocations = members
        .into_iter()
        .map(|i| ResourceConflict::from_allocation(&allocations[i], ConflictType::ScheduleOverlap))
        .collect();
    window
}

fn clip(mut window: OverallocatedWindow, range: &DateRange) -> Option<OverallocatedWindow> {
    window.start_date = window.start_date.max(range.start);
    window.end_date = window.end_date.min(range.end);
    (window.start_date < window.end_date).then_some(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryAllocationRepository;
    use crate::models::Project;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::try_new(date(start), date(end)).unwrap()
    }

    struct Fixture {
        repo: Arc<InMemoryAllocationRepository>,
        aggregator: UtilizationAggregator,
        org: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = Arc::new(InMemoryAllocationRepository::new());
            Self {
                aggregator: UtilizationAggregator::new(repo.clone()),
                repo,
                org: Uuid::new_v4(),
            }
        }

        async fn seed(
            &self,
            resource_id: Uuid,
            project_id: Uuid,
            start: &str,
            end: &str,
            percentage: f64,
        ) -> ResourceAllocation {
            let now = Utc::now();
            self.repo
                .save(ResourceAllocation {
                    id: Uuid::new_v4(),
                    resource_id,
                    project_id,
                    project_name: None,
                    task_id: None,
                    organization_id: self.org,
                    start_date: date(start),
                    end_date: date(end),
                    allocation_percentage: percentage,
                    hours_per_day: 8.0,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn resource_utilization_unranged_sums_everything() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        let apollo = Uuid::new_v4();
        let gemini = Uuid::new_v4();
        fx.repo
            .upsert_project(Project { id: apollo, organization_id: fx.org, name: "Apollo".into() })
            .await
            .unwrap();
        fx.seed(r, apollo, "2025-01-01", "2025-01-31", 50.0).await;
        fx.seed(r, gemini, "2025-06-01", "2025-06-30", 25.0).await;
        fx.seed(r, apollo, "2025-09-01", "2025-09-30", 25.0).await;

        let u = fx.aggregator.get_resource_utilization(fx.org, r, None).await.unwrap();
        assert_eq!(u.total_allocation, 100.0);
        assert_eq!(u.available_capacity, 0.0);
        assert_eq!(u.allocated_hours_per_day, 8.0);
        assert_eq!(u.projects.len(), 2);
        assert_eq!(u.projects[0].project_id, apollo);
        assert_eq!(u.projects[0].project_name.as_deref(), Some("Apollo"));
        assert_eq!(u.projects[0].allocation_percentage, 75.0);
        assert_eq!(u.projects[0].allocation_count, 2);
        assert_eq!(u.projects[1].project_name, None);
    }

    #[tokio::test]
    async fn resource_utilization_ranged_uses_strict_overlap() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        fx.seed(r, Uuid::new_v4(), "2025-01-01", "2025-01-10", 40.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-01-05", "2025-01-25", 25.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-02-01", "2025-02-28", 90.0).await;

        let u = fx
            .aggregator
            .get_resource_utilization(fx.org, r, Some(range("2025-01-10", "2025-01-31")))
            .await
            .unwrap();
        // The first allocation only touches the window on its last day.
        assert_eq!(u.total_allocation, 25.0);
        assert_eq!(u.available_capacity, 75.0);
        assert_eq!(u.start_date, Some(date("2025-01-10")));
    }

    #[tokio::test]
    async fn available_capacity_lists_only_allocated_resources() {
        let fx = Fixture::new();
        let busy = Uuid::new_v4();
        let light = Uuid::new_v4();
        let idle = Uuid::new_v4();
        fx.seed(busy, Uuid::new_v4(), "2025-03-01", "2025-03-31", 80.0).await;
        fx.seed(busy, Uuid::new_v4(), "2025-03-10", "2025-03-20", 50.0).await;
        fx.seed(light, Uuid::new_v4(), "2025-03-01", "2025-03-15", 25.0).await;
        fx.seed(idle, Uuid::new_v4(), "2025-05-01", "2025-05-31", 100.0).await;

        let capacity = fx
            .aggregator
            .get_available_capacity(fx.org, range("2025-03-01", "2025-03-31"))
            .await
            .unwrap();
        assert_eq!(capacity.len(), 2);
        let busy_row = capacity.iter().find(|c| c.resource_id == busy).unwrap();
        assert_eq!(busy_row.total_allocation, 130.0);
        assert_eq!(busy_row.available_capacity, 0.0);
        assert_eq!(busy_row.allocation_count, 2);
        let light_row = capacity.iter().find(|c| c.resource_id == light).unwrap();
        assert_eq!(light_row.available_capacity, 75.0);
        assert!(capacity.iter().all(|c| c.resource_id != idle));
    }

    #[tokio::test]
    async fn available_capacity_ignores_other_organizations() {
        let fx = Fixture::new();
        let other = Fixture {
            repo: fx.repo.clone(),
            aggregator: fx.aggregator.clone(),
            org: Uuid::new_v4(),
        };
        other.seed(Uuid::new_v4(), Uuid::new_v4(), "2025-03-01", "2025-03-31", 50.0).await;

        let capacity = fx
            .aggregator
            .get_available_capacity(fx.org, range("2025-03-01", "2025-03-31"))
            .await
            .unwrap();
        assert!(capacity.is_empty());
    }

    #[tokio::test]
    async fn cross_project_view_groups_and_orders() {
        let fx = Fixture::new();
        let r1 = Uuid::new_v4();
        let r2 = Uuid::new_v4();
        let p = Uuid::new_v4();
        let late = fx.seed(r1, p, "2025-08-01", "2025-08-31", 60.0).await;
        let early = fx.seed(r1, Uuid::new_v4(), "2025-02-01", "2025-02-28", 70.0).await;
        fx.seed(r2, p, "2025-04-01", "2025-04-30", 30.0).await;

        let view = fx.aggregator.get_cross_project_view(fx.org).await.unwrap();
        assert_eq!(view.len(), 2);
        let mut expected_resources = vec![r1, r2];
        expected_resources.sort();
        let resources: Vec<Uuid> = view.iter().map(|e| e.resource_id).collect();
        assert_eq!(resources, expected_resources);

        let r1_entry = view.iter().find(|e| e.resource_id == r1).unwrap();
        // Not window-limited: 70 + 60 even though they never overlap.
        assert_eq!(r1_entry.total_allocation, 130.0);
        let ids: Vec<Uuid> = r1_entry.allocations.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(r1_entry.projects.len(), 2);
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        fx.seed(r, Uuid::new_v4(), "2025-01-01", "2025-01-31", 50.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-01-15", "2025-02-15", 30.0).await;

        let first = fx.aggregator.get_resource_utilization(fx.org, r, None).await.unwrap();
        let second = fx.aggregator.get_resource_utilization(fx.org, r, None).await.unwrap();
        assert_eq!(first, second);

        let first = fx.aggregator.get_cross_project_view(fx.org).await.unwrap();
        let second = fx.aggregator.get_cross_project_view(fx.org).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn project_allocations_ordered_by_start() {
        let fx = Fixture::new();
        let p = Uuid::new_v4();
        let b = fx.seed(Uuid::new_v4(), p, "2025-05-01", "2025-05-31", 50.0).await;
        let a = fx.seed(Uuid::new_v4(), p, "2025-01-01", "2025-01-31", 50.0).await;
        fx.seed(Uuid::new_v4(), Uuid::new_v4(), "2025-03-01", "2025-03-31", 50.0).await;

        let rows = fx.aggregator.get_project_allocations(p).await.unwrap();
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn audit_reports_overcommitted_window() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        let a = fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 70.0).await;
        let b = fx.seed(r, Uuid::new_v4(), "2025-06-10", "2025-06-20", 50.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-06-30", "2025-07-15", 50.0).await;

        let windows = fx.aggregator.find_overallocations(fx.org, None).await.unwrap();
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.resource_id, r);
        assert_eq!(w.start_date, date("2025-06-10"));
        assert_eq!(w.end_date, date("2025-06-20"));
        assert_eq!(w.peak_allocation, 120.0);
        let ids: Vec<Uuid> = w.allocations.iter().map(|c| c.allocation_id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert!(w
            .allocations
            .iter()
            .all(|c| c.conflict_type == ConflictType::ScheduleOverlap));
    }

    #[tokio::test]
    async fn audit_merges_adjacent_segments_and_tracks_peak() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 60.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-06-05", "2025-06-15", 50.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-06-10", "2025-06-25", 45.0).await;

        let windows = fx.aggregator.find_overallocations(fx.org, None).await.unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_date, date("2025-06-05"));
        assert_eq!(windows[0].end_date, date("2025-06-25"));
        assert_eq!(windows[0].peak_allocation, 155.0);
        assert_eq!(windows[0].allocations.len(), 3);
    }

    #[tokio::test]
    async fn audit_clean_state_reports_nothing() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        fx.seed(r, Uuid::new_v4(), "2025-01-01", "2025-01-10", 80.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-01-10", "2025-01-20", 80.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-01-05", "2025-01-05", 90.0).await;

        let windows = fx.aggregator.find_overallocations(fx.org, None).await.unwrap();
        assert!(windows.is_empty());
    }

    #[tokio::test]
    async fn audit_clips_to_requested_range() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 70.0).await;
        fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 70.0).await;

        let windows = fx
            .aggregator
            .find_overallocations(fx.org, Some(range("2025-06-10", "2025-07-31")))
            .await
            .unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_date, date("2025-06-10"));
        assert_eq!(windows[0].end_date, date("2025-06-30"));
    }

    #[tokio::test]
    async fn resource_utilization_hides_other_organizations_projects() {
        let fx = Fixture::new();
        let r = Uuid::new_v4();
        let ours = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let other_org = Uuid::new_v4();
        fx.repo
            .upsert_project(Project { id: theirs, organization_id: other_org, name: "Acquisition".into() })
            .await
            .unwrap();
        fx.seed(r, ours, "2025-03-25", "2025-04-30", 20.0).await;
        for (start, end) in [("2025-04-01", "2025-04-15"), ("2025-04-16", "2025-04-30")] {
            let mut foreign = fx.seed(r, theirs, start, end, 35.0).await;
            foreign.organization_id = other_org;
            fx.repo.save(foreign).await.unwrap();
        }

        let u = fx.aggregator.get_resource_utilization(fx.org, r, None).await.unwrap();
        assert_eq!(u.total_allocation, 90.0);
        assert_eq!(u.projects.len(), 2);
        assert_eq!(u.projects[0].project_id, ours);
        assert_eq!(u.projects[1].project_id, Uuid::nil());
        assert_eq!(u.projects[1].project_name, None);
        assert_eq!(u.projects[1].allocation_percentage, 70.0);
        assert_eq!(u.projects[1].allocation_count, 2);

        let theirs_view = fx.aggregator.get_resource_utilization(other_org, r, None).await.unwrap();
        assert_eq!(theirs_view.projects[0].project_name, None);
        assert_eq!(theirs_view.projects[0].project_id, Uuid::nil());
        assert_eq!(theirs_view.projects[1].project_name.as_deref(), Some("Acquisition"));
    }

    #[test]
    fn audit_metric_has_no_organization_label() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let fx = Fixture::new();
                let r = Uuid::new_v4();
                fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 70.0).await;
                fx.seed(r, Uuid::new_v4(), "2025-06-01", "2025-06-30", 70.0).await;
                let windows = fx.aggregator.find_overallocations(fx.org, None).await.unwrap();
                assert_eq!(windows.len(), 1);
            });
        });

        let rendered = handle.render();
        assert!(rendered.contains("capacity_overallocated_windows_total 1"));
        assert!(!rendered.contains("organization"));
    }
}
