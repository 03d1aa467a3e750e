//! IEC 60870-5-104 sessions over TCP.
//!
//! [`Session`] drives one connection in either role; [`Server`] accepts many
//! and fans ASDUs out to them.

pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use config::{ServerConfig, SessionConfig, DEFAULT_PORT};
pub use error::LinkError;
pub use server::Server;
pub use session::{Session, SessionEvent, SessionHandler, SessionState};
