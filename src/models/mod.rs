pub mod allocation;
pub mod allocation_input;
pub mod capacity;
pub mod utilization;

pub use allocation::{Project, ResourceAllocation, DEFAULT_HOURS_PER_DAY};
pub use allocation_input::{
    AllocationMutationResponse, CreateAllocationInput, UpdateAllocationInput, UpsertProjectInput,
    ValidateAllocationInput,
};
pub use capacity::{ConflictDetails, ConflictType, ResourceConflict, ValidationResult};
pub use utilization::{
    CrossProjectEntry, OverallocatedWindow, ProjectContribution, ResourceCapacity, ResourceUtilization,
};
