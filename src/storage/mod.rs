//! Persistence for diagrams and agent contexts

pub mod database;

pub use database::{Database, PersistedState, PoolConfig, SharedDatabase};
