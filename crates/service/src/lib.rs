//! Service layer for trialstore
//!
//! Centralizes business logic between callers (CLI, a future serving layer)
//! and storage: record validation ahead of the write path, quality scoring,
//! and the custodial maintenance workflow.

mod error;
mod ingest_service;
mod maintenance_service;
mod quality_service;
mod search_service;

pub use error::ServiceError;
pub use ingest_service::{BatchItemOutcome, BatchOutcome, IngestService};
pub use maintenance_service::{
    start_maintenance_loop, BackupInfo, BackupKind, MaintenanceConfig, MaintenanceLog,
    MaintenanceService, MaintenanceStage, RestoreVerification, StageOutcome, StageStatus,
};
pub use quality_service::QualityService;
pub use search_service::SearchService;
