//! Pathrate Protocol Messages
//!
//! Structured packet requests and replies exchanged with a counterparty.
//! The binary envelope these travel in belongs to the transport layer; this
//! crate only describes what a completed round trip looked like.

pub mod messages;
pub mod error;

pub use messages::*;
pub use error::ProtocolError;
