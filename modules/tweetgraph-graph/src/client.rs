use neo4rs::{query, ConfigBuilder, Graph};
use tracing::info;

use tweetgraph_common::Config;

/// Rows pulled per round trip when streaming query results.
const FETCH_SIZE: usize = 500;

/// One cycle writes sequentially, so a small pool is plenty.
const POOL_SIZE: usize = 4;

/// Bolt connection pool shared by the migrator and the writer.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

impl GraphClient {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(FETCH_SIZE)
            .max_connections(POOL_SIZE)
            .build()?;
        let graph = Graph::connect(config).await?;
        info!(uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Connect with the `NEO4J_*` settings.
    pub async fn from_config(config: &Config) -> Result<Self, neo4rs::Error> {
        Self::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await
    }

    /// Round-trip a trivial statement; fails until the server accepts queries.
    pub async fn ping(&self) -> Result<(), neo4rs::Error> {
        self.graph.run(query("RETURN 1")).await
    }

    /// Raw access for ad-hoc reads, mostly in tests.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}
