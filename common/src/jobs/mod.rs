use serde::{Deserialize, Serialize};

/// Lifecycle of a long-running background operation (tab generation,
/// registration sync, email batch). `InProgress` carries a percentage,
/// `Completed` a human-readable payload (for email batches, the JSON
/// dispatch report).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress(u32),
    Completed(String),
    Failed(String),
}
