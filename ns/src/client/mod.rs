//! Node-side client

pub mod facade;

pub use facade::NodeClient;
