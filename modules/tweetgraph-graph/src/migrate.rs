use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Create the lookup indexes the MERGE upserts rely on. Safe to run on every start.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    let indexes = [
        "CREATE INDEX tweet_id IF NOT EXISTS FOR (t:Tweet) ON (t.id)",
        "CREATE INDEX twitter_account_key IF NOT EXISTS FOR (a:TwitterAccount) ON (a.username, a.user_id)",
        "CREATE INDEX twitter_account_username IF NOT EXISTS FOR (a:TwitterAccount) ON (a.username)",
    ];

    for idx in &indexes {
        run_ignoring_exists(g, idx).await?;
    }
    info!("Property indexes created");

    Ok(())
}

async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
