//! RTDL Core - command gateway and storage retention
//!
//! This crate lets remote principals drive a download engine over chat
//! transports. It handles shared-secret authorization, redelivery
//! suppression, command routing against the engine, and the retention
//! policy that keeps the download directory bounded.

mod auth;
mod command;
mod config;
mod dedup;
mod engine;
mod error;
mod format;
mod gateway;
mod netinfo;
mod retention;
mod router;
mod scheduler;
mod storage;

#[cfg(test)]
mod testing;

pub use auth::*;
pub use command::*;
pub use config::*;
pub use dedup::*;
pub use engine::*;
pub use error::*;
pub use format::*;
pub use gateway::*;
pub use netinfo::*;
pub use retention::*;
pub use router::*;
pub use scheduler::*;
pub use storage::*;
