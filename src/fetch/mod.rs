pub mod artifact;
pub mod client;

pub use artifact::Artifact;
pub use client::{validate_url, Fetcher, HttpFetcher};
