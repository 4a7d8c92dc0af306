//! User directory service.
//!
//! [`UserDirectory`] owns the CRUD contract against a [`UserStore`] and
//! announces successful mutations on the [`EventBus`]. It knows nothing about
//! who listens.
//!
//! [`UserStore`]: roster_db::UserStore
//! [`EventBus`]: roster_events::EventBus

pub mod error;
pub mod service;

pub use error::DirectoryError;
pub use service::{DirectoryConfig, UserDirectory, DEFAULT_STORE_TIMEOUT};
