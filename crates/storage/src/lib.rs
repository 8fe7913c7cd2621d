mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{AuditLogRecord, CriteriaRecord, RuleRecord, SnapshotRecord};
pub use traits::EligibilityStore;
