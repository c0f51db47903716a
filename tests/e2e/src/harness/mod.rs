//! Test harness

mod server;

pub use server::{TestGateway, Viewer};
