//! Broker directory and session lifecycle for the identityd daemon.
//!
//! A *broker* is an external identity provider the daemon delegates
//! live authentication to. This crate holds everything the daemon
//! knows about brokers at runtime:
//!
//! - [`BrokerClient`]: the opaque transport capability a broker
//!   implementation must provide (the wire protocol is not this
//!   crate's business);
//! - [`BrokerRegistry`]: the immutable, ordered directory of brokers
//!   loaded at startup from the configuration directory, with the
//!   in-process local broker always first;
//! - [`SessionIndex`]: the in-memory user→broker and session→broker
//!   tables with their locking discipline;
//! - [`Manager`]: the composition of the two that the PAM service
//!   drives: open a session, look its broker up, end it, remember a
//!   user's broker preference.
//!
//! The registry is built once and never mutated; handlers receive it
//! (inside the [`Manager`]) by reference and need no locking to read
//! it. The session index uses one reader-writer lock per table, held
//! only for the duration of a map access and never across a broker
//! call.

#![deny(unsafe_code)]

mod broker;
mod config;
mod error;
mod local;
mod manager;
mod registry;
mod session_index;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use broker::{Broker, BrokerClient, BrokerConnector, NewSessionReply};
pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult, TransportError};
pub use local::LOCAL_BROKER_ID;
pub use manager::Manager;
pub use registry::{BrokerRegistry, RegistryOptions};
pub use session_index::SessionIndex;
