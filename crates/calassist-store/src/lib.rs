//! Credential Store: identities and their active refresh credential.
//!
//! - [`Store`] - SQLite persistence behind a single connection lock
//! - [`Identity`] / [`Credential`] - persisted records
//! - [`StoreError`] - constraint, validation and database failures

pub mod error;
pub mod model;
mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use model::{Credential, Identity, IdentityUpdate, NewCredential, NewIdentity};
pub use store::{Clock, Store};
