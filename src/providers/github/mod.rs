mod client;
mod core;

pub use self::client::ClientConfig;
pub use self::core::{CollectOptions, GitHubProvider};
