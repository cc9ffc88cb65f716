//! feeder-core
//!
//! Domain types, the `Embedder` seam, error taxonomy, configuration and the
//! corpus loader shared by the indexing and retrieval crates.

pub mod config;
pub mod corpus;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;
