//! Domain model
//!
//! - `Source` / `SourceConfig`: broadcaster identity and its resolved limits
//! - `CrawlUnit` / `CrawlQueue`: what crawl tasks fetch
//! - `Film`: the catalogued entity
//! - `Catalogue`: the deduplicated aggregate of a run

mod catalogue;
mod film;
mod source;
mod unit;

pub use catalogue::Catalogue;
pub use film::{Film, FilmKey, GeoLocation, Resolution};
pub use source::{Source, SourceConfig};
pub use unit::{CrawlQueue, CrawlTarget, CrawlUnit};
