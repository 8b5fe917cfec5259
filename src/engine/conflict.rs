use uuid::Uuid;

use crate::models::{ConflictType, ResourceAllocation, ResourceConflict};

use super::overlap::DateRange;

/// Cumulative overlapping load and the allocations that pushed it over 100%.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictScan {
    pub total_allocation: f64,
    pub conflicts: Vec<ResourceConflict>,
}

/// Accumulate the load of `existing` allocations of `resource_id` that overlap
/// `candidate`, flagging each one after which the load plus
/// `candidate_percentage` exceeds 100.
///
/// Allocations are visited in `(start_date, id)` order so the flagged set does
/// not depend on the order the store returned them in.
pub fn detect(
    resource_id: Uuid,
    candidate: &DateRange,
    candidate_percentage: f64,
    existing: &[ResourceAllocation],
) -> ConflictScan {
    let mut overlapping: Vec<&ResourceAllocation> = existing
        .iter()
        .filter(|a| a.resource_id == resource_id && a.range().overlaps(candidate))
        .collect();
    overlapping.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));

    let mut scan = ConflictScan::default();
    for allocation in overlapping {
        scan.total_allocation += allocation.allocation_percentage;
        if scan.total_allocation + candidate_percentage > 100.0 {
            scan.conflicts.push(ResourceConflict::from_allocation(
                allocation,
                ConflictType::Overallocation,
            ));
        }
    }
    scan
}
