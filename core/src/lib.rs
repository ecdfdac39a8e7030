//! holders-core: insurance holder records, search, aggregates and
//! mutations over SQLite.

pub mod auth;
pub mod clock;
pub mod config;
pub mod demo;
pub mod error;
pub mod holder;
pub mod name_generator;
pub mod pool;
pub mod query;
pub mod rng;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;
