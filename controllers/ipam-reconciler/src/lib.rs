//! IPAM Reconciler
//!
//! Keeps an IPAM service's environments, pools, blocks, allocations and
//! reserved blocks in line with a declarative desired-state document:
//! - `reconciler`: the per-entity state machine, one module per kind
//! - `strategy`: explicit versus auto allocation, and per-block create locks
//! - `controller`: whole-document plan, apply, refresh, import and destroy
//! - `state`: what has been recorded about each managed entity

pub mod config;
pub mod controller;
pub mod error;
pub mod lookup;
pub mod planner;
pub mod query;
pub mod reconciler;
pub mod report;
pub mod state;
pub mod strategy;

#[cfg(test)]
mod test_utils;

pub use controller::Controller;
pub use error::{Operation, ReconcileError};
pub use reconciler::{Action, ReconcileContext};
pub use report::{Report, ReportEntry};
pub use state::{Lifecycle, Managed, StateSnapshot};
