pub mod settings;
pub mod sources;

pub use settings::{GitHubSettings, Settings};
pub use sources::{load_sources_default, load_sources_from, FeedSource};
