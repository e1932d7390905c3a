pub mod config;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod shared;

pub use config::Config;
pub use error::AppError;
pub use fetch::{time_get, HyperTransport, Report, Transport};
pub use shared::Palette;
