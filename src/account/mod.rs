//! Programmable account subsystem
//!
//! Mode-dispatched batch execution with per-item external authorization,
//! role-gated entry points, a monotonic nonce ledger, and the owner-driven
//! upgrade path. Deterministic placement lives in `crate::factory`.

pub mod batch;
pub mod dispatch;
pub mod engine;
pub mod mode;
pub mod registry;
pub mod roles;
pub mod state;
pub mod types;
pub mod upgrade;

pub use batch::{decode_batch, encode_batch, DecodingError};
pub use dispatch::{DispatchError, Dispatcher};
pub use engine::{AccountError, ExecuteError, SmartAccount};
pub use mode::{CallType, ExecType, Mode, ModeCode};
pub use registry::{AuthorizationFailure, AuthorizationRegistry};
pub use roles::{AccessError, Role, RoleSet};
pub use types::{Address, ExecutionEvent, ExecutionItem, ExecutionReceipt, ItemOutcome, Salt};
pub use upgrade::CallOrigin;
