pub mod alert;
pub mod dedup;
pub mod orchestrator;

pub use alert::{deal_alert, log_deal};
pub use dedup::{DedupStore, DEFAULT_RETENTION_DAYS};
pub use orchestrator::{
    MonitorOrchestrator, OrchestratorConfig, OrchestratorError, CycleOutcome, CycleReport,
    DEFAULT_MIN_PRICE_CENTS, DEFAULT_MAINTENANCE_INTERVAL, DEFAULT_ERROR_BACKOFF,
};
