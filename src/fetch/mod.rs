pub mod client;
pub mod models;

pub use client::{FetchError, Fetcher, Result};
pub use models::FetchConfig;
