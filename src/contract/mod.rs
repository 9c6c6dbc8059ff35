//! Contract Model
//!
//! In-memory representation of parsed API-usage contracts and the
//! process-wide registry they are loaded into.

pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{Contract, EventSym, FutureBranch, FutureExpr, Guard, PostBranch, PostEffect};
