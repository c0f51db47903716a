//! End-to-end test support for the wagate gateway
//!
//! - `harness`: a real gateway on an ephemeral port, backed by a scripted
//!   session client, plus a WebSocket viewer
//! - `mocks`: canned session event scripts

pub mod harness;
pub mod mocks;
