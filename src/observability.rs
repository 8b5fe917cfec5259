// ── HTTP (request-driven) ───────────────────────────────────────

/// Counter: HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

// ── Allocation engine ───────────────────────────────────────────

/// Counter: allocation writes. Labels: operation, outcome.
pub const ALLOCATIONS_TOTAL: &str = "capacity_allocations_total";

/// Counter: conflicting allocations reported on rejected writes.
pub const CONFLICTS_TOTAL: &str = "capacity_conflicts_total";

/// Counter: over-committed windows reported by consistency audits. No labels.
pub const OVERALLOCATED_WINDOWS_TOTAL: &str = "capacity_overallocated_windows_total";
