//! Disposable Neo4j for integration tests, run in Docker through testcontainers.

use std::time::Duration;

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::GraphClient;

const IMAGE: &str = "neo4j";
const TAG: &str = "5.25.1";
const BOLT_PORT: u16 = 7687;
const PASSWORD: &str = "tweetgraph";

/// Start a community Neo4j and connect to it once Bolt answers queries.
///
/// Dropping the returned container stops it, so keep it bound until the test ends.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let container = GenericImage::new(IMAGE, TAG)
        .with_exposed_port(ContainerPort::Tcp(BOLT_PORT))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{PASSWORD}"))
        .start()
        .await
        .expect("neo4j container did not start");

    let port = container
        .get_host_port_ipv4(BOLT_PORT)
        .await
        .expect("bolt port not mapped");
    let uri = format!("bolt://127.0.0.1:{port}");

    // "Started." can be logged a moment before Bolt accepts sessions
    for _ in 0..20 {
        if let Ok(client) = GraphClient::connect(&uri, "neo4j", PASSWORD).await {
            if client.ping().await.is_ok() {
                return (container, client);
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("neo4j at {uri} never accepted queries");
}
