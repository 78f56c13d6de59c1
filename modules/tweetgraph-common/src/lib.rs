pub mod config;
pub mod error;
pub mod types;
pub mod window;

pub use config::{Config, DeliveryMode, InBandErrorPolicy, TicketOrder, MAX_WINDOW_DAYS};
pub use error::TweetGraphError;
pub use types::*;
pub use window::{DateWindow, DayChunk, DayChunks};
