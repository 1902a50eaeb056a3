//! # game_net
//!
//! Network collaborator surface for the spawnable game framework.
//!
//! This crate provides:
//!
//! - [`network`]: the [`ServerNetwork`] / [`ClientNetwork`] capabilities the
//!   game core is handed, wrapped in a role-tagged [`NetworkHandle`].
//! - [`messages`]: replication and custom message types.
//! - [`subjects`]: NATS subject constants and builders.
//! - [`codec`]: MessagePack serialisation helpers.
//! - [`connection`]: NATS connection management and [`NetConfig`].
//! - [`nats`]: NATS-backed server and client networks.
//! - [`error`]: Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod nats;
pub mod network;
pub mod subjects;

pub use codec::{decode, encode};
pub use connection::{NatsConnection, NetConfig};
pub use error::NetError;
pub use messages::NetEvent;
pub use nats::{NatsClientNetwork, NatsServerNetwork};
pub use network::{ClientNetwork, NetworkHandle, NetworkRole, ServerNetwork};
