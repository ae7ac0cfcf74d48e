//! Controller side: request dispatch and the TCP server

pub mod adapter;
pub mod server;

pub use adapter::ControlAdapter;
pub use server::ControlServer;
