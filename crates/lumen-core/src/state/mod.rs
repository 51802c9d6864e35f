//! Per-session application state
//!
//! - `model`: the state document and its parts
//! - `catalog`: static subnode/field schema used for validation
//! - `store`: JSON persistence with atomic writes
//! - `manager`: the serialized, isolated state manager

pub mod catalog;
pub mod manager;
pub mod model;
pub mod store;

pub use catalog::{FieldKind, FieldSpec, SubnodeSpec, validate_field_value};
pub use manager::{DEFAULT_AUTO_SAVE_INTERVAL, IsolatedStateManager, PersistencePhase};
pub use model::{
    AppState, Category, ColorTheme, ConfirmedNode, FieldValue, FieldValues, HexColor, NodeValues,
    StateColorsUpdate, SubnodeValues, ThemeUpdate,
};
pub use store::{FileStateStore, STATE_FILE, StateStore, write_atomic};
