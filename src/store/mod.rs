//! Persistence layer — libSQL-backed session and identity stores.

pub mod libsql_backend;
pub mod migrations;
pub mod session;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use session::{Session, SessionPatch, keys};
pub use traits::{Identity, IdentityStore, SessionStore};
