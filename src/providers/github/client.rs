pub mod core;
mod members;
mod pull_requests;

pub use self::core::{ClientConfig, GitHubClient};
