//! IPAM declarations
//!
//! The entity model of the IPAM reconciler: what an operator declares for
//! each resource kind, what is recorded once the service has answered, the
//! per-field schema that decides between update and replace, and the local
//! validation that runs before any remote call.

pub mod allocation;
pub mod block;
pub mod cidr;
pub mod declaration;
pub mod document;
pub mod environment;
pub mod pool;
pub mod references;
pub mod reserved_block;
pub mod schema;
pub mod validation;

pub use allocation::*;
pub use block::*;
pub use declaration::{Declaration, Fields, Observed};
pub use document::*;
pub use environment::*;
pub use pool::*;
pub use references::*;
pub use reserved_block::*;
pub use schema::*;
pub use validation::{Validate, ValidationError};
