// SQLite backend
//
// - config: bb8 manager, options and pool setup
// - connection: blocking-hop wrapper around the pooled `rusqlite::Connection`
// - params: conversion from `RowValues` to `rusqlite` values
// - query: statement execution and result extraction

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteManager, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use query::build_result_set;
