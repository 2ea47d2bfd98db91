//! sbar Client - Binding to the status bar service
//!
//! Wraps the control socket behind a [`ServiceConnection`] that performs
//! the connect handshake and exposes every remote operation as an async
//! method. The connection tolerates the service going away: any I/O or
//! protocol failure drops the stream and leaves the connection unbound,
//! ready for the next [`ServiceConnection::bind`].
//!
//! ```rust,ignore
//! use sbar_client::ServiceConnection;
//!
//! let mut conn = ServiceConnection::new("/tmp/sbar.sock");
//! conn.bind().await?;
//! conn.toggle().await?;
//! let height = conn.height().await?;
//! conn.unbind().await;
//! ```
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside of tests.

pub mod client;
pub mod error;

pub use client::ServiceConnection;
pub use error::{ClientError, Result};
