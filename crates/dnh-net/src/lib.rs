// dnh-net: WebSocket and HTTP front ends for the DNH hub

pub mod error;
pub mod http;
pub mod server;
pub mod ws;

pub use error::Error;
pub use server::{HubAddrs, HubServer, ServerStatus};
