//! Joins across the process boundary
//!
//! Controller side: [`JoinProxyTable`] keeps one parked proxy thread per
//! accepted remote enlist. Node side: [`JoinWatchers`] releases that proxy once
//! the enlisting thread has exited.

pub mod proxy;
pub mod watcher;

pub use proxy::JoinProxyTable;
pub use watcher::JoinWatchers;
