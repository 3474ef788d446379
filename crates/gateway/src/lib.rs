pub mod config;
pub mod cv_utils;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod response;
pub mod server;
pub mod state;
pub mod workspace;

pub use config::{Config, get_configuration};
pub use error::ApiError;
pub use response::{DetectionEntry, PredictResponse};
pub use server::{router, serve};
pub use state::AppState;
