pub mod client;
pub mod migrate;
pub mod writer;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use neo4rs::query;
pub use writer::{GraphCounts, GraphWriter, PostingRow};
