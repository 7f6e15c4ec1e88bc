mod article;
mod feed_item;
mod report;

pub use article::{Article, NewArticle};
pub use feed_item::FeedItem;
pub use report::ReportEntry;
