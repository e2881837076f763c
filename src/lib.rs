//! APRS-IS injection worker.
//!
//! Consumes the raw packet firehose from a durable JetStream queue,
//! deduplicates and sanity-checks each packet, resolves its entities
//! against Postgres through a write-through Redis cache, and persists the
//! normalized records for the rest of the pipeline to read.

pub mod cache;
pub mod config;
pub mod consumer;
pub mod db;
pub mod entity_repo;
pub mod metrics;
pub mod packet;
pub mod packets_repo;
pub mod parse;
pub mod publisher;
pub mod schema;
pub mod stats;
pub mod store;
pub mod validator;
pub mod vars;
pub mod worker;

pub use packet::{AprsPacket, PacketType};
pub use store::Store;
pub use worker::Worker;
