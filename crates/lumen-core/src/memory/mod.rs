//! Memory accounting
//!
//! Per-session trackers, a pure bounds evaluator and a process-wide
//! aggregator. Accounting is a shallow heuristic and purely advisory: no
//! mutation is ever refused because a bound was exceeded.

pub mod bounds;
pub mod estimate;
pub mod global;
pub mod tracker;

pub use bounds::{BoundsCheck, DEFAULT_WARNING_THRESHOLD, MemoryBounds};
pub use estimate::ShallowSize;
pub use global::{GlobalGcReport, GlobalMemoryManager, GlobalMemoryUsage, SessionMemoryLine};
pub use tracker::{
    GcReport, MAX_SNAPSHOTS, MemorySnapshot, MemoryStats, MemoryTracker, ObjectId, ObjectKind,
};
