use thiserror::Error;

#[derive(Error, Debug)]
pub enum TweetGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ticket store error: {0}")]
    TicketStore(String),

    #[error("Content source error: {0}")]
    Source(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Cycle cancelled")]
    Cancelled,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
