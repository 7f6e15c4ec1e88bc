mod fetcher;

pub use fetcher::{parse_feed, FeedFetcher, FeedSource};
