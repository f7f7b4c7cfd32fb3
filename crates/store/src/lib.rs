//! Transactional persistence for the checkout system.
//!
//! Provides the [`Store`] / [`StoreTx`] boundary plus an in-memory
//! implementation for tests and local runs and a PostgreSQL implementation
//! built on `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{Store, StoreTx, finish, with_timeout};
