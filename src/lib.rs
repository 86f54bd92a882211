pub mod aggregate;
pub mod config;
pub mod derive;
pub mod error;
pub mod extract;
pub mod families;
pub mod frame;
pub mod game_state;
pub mod http_client;
pub mod load;
pub mod logging;
pub mod nulls;
pub mod pipeline;
pub mod reconcile;
pub mod retrieval;
pub mod schema;
pub mod season;
pub mod snapshot;
pub mod store;
pub mod validate;

pub use error::{PipelineError, Result};
