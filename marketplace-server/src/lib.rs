//! Marketplace engine server
//!
//! Runs the verification workflow, subscription lifecycle and admin action
//! surface over a record store, publishes committed changes on a feed, and
//! exposes everything as a JSON HTTP API.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod feed;
pub mod routes;
pub mod state;
pub mod store;
pub mod view;

pub use config::{AdminBootstrap, Config, ConfigError, DEFAULT_PROTECTED_ACCOUNT};
pub use engine::{NewService, ProfileEdit, SignUp};
pub use error::ApiError;
pub use feed::{ChangeFeed, FeedMessage, Filter, ListenerHandle, Subscription};
pub use state::AppState;
pub use store::{InMemorySessionStore, InMemoryStore, RecordStore, SessionStore, SqliteStore};
pub use view::ProfileView;
