//! Pipelines registered for the configured sources

mod feed;
mod record;

pub use feed::{day_urls, FeedPipeline};
pub use record::FilmRecord;
