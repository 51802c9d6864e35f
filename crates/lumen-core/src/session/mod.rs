//! Sessions and their registry
//!
//! - `types`: session type and per-session config
//! - `profile`: feature and resource profiles per session type
//! - `core`: one session binding a state manager, a tracker and clients
//! - `registry`: the live session collection and the expiration sweep

pub mod core;
pub mod profile;
pub mod registry;
pub mod types;

pub use self::core::{Session, SessionMemoryUsage, SessionSummary};
pub use profile::{ProfileFeatures, ProfileLimits, ProfileLoader, SecurityPolicy, SessionProfile};
pub use registry::{
    DEFAULT_SWEEP_INTERVAL, DefaultBounds, MemoryReport, RegistryConfig, RegistryStats,
    SessionRegistry,
};
pub use types::{SessionConfig, SessionDefaults, SessionType};
