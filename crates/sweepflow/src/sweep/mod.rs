pub mod categories;
pub mod deleter;
pub mod inventory;
pub mod model;
pub mod policy;
pub mod queue;
pub mod runner;
pub mod source;

pub use deleter::CrossStoreDeleter;
pub use inventory::InventoryScanner;
pub use model::{
    Batch, CountsMapping, DeletionOutcome, Identifier, JobStatus, ScanCursor, ScanPage,
    StopReason, StoreStatus, SweepStats,
};
pub use policy::RetentionPolicy;
pub use queue::{QueueSweep, QueueSweepLimits, QueueSweepReport};
pub use runner::{SweepLimits, SweepLoop};
pub use source::{BatchSource, CacheMirror, JobQueue, Keyspace, RecordStore};
