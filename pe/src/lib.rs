//! Synchronization primitive engine
//!
//! Defines the [`PrimitiveEngine`] interface a controller forwards primitive
//! operations to, the [`ThreadExit`] liveness signal joins are built on, and
//! [`LocalEngine`], an in-memory implementation.

pub mod engine;
pub mod error;
pub mod id;
pub mod liveness;
pub mod local;

pub use engine::PrimitiveEngine;
pub use error::{EngineError, EngineResult};
pub use id::PrimitiveId;
pub use liveness::ThreadExit;
pub use local::LocalEngine;
