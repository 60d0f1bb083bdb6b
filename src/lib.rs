//! Approval workflow state machine and action gating for purchase and
//! project requests.

pub mod actor;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod logging;
pub mod merge;
pub mod request;
pub mod service;
pub mod session;
pub mod status;
pub mod utils;

pub use actor::{Actor, ActorId, EffectiveRole, Role, resolve_effective_role};
pub use gate::{Action, Gate, GateDecision, gate};
pub use merge::{RequestPatch, merge};
pub use request::{RawState, Request, RequestKind};
pub use status::{Status, derive_status};
