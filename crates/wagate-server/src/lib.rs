//! wagate server library
//!
//! Exposes the pieces the binaries are built from so integration tests can
//! drive them directly: the HTTP gateway and viewer WebSocket, the sidecar
//! Session Client, configuration, logging setup and the admin relay client.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod relay;
pub mod sidecar;
