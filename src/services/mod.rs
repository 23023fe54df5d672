/// Next-round slot propagation and bracket seeding.
pub mod bracket_service;
/// Dispute listing and admin arbitration.
pub mod dispute_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Ready/active handshake operations.
pub mod handshake_service;
/// Health check service.
pub mod health_service;
/// Score reporting, confirmation, and auto-confirm handling.
pub mod match_service;
/// Fire-and-forget notification dispatch.
pub mod notify;
/// Storage connection supervision and degraded-mode handling.
pub mod storage_supervisor;
