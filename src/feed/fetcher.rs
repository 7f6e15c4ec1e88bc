use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use regex::Regex;
use reqwest::Client;

use crate::error::Result;
use crate::models::FeedItem;

/// Something that can turn a feed URL into entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Never fails: problems are logged and yield an empty list.
    async fn fetch(&self, url: &str) -> Vec<FeedItem>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("automkt/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes, url)
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Vec<FeedItem> {
        match self.try_fetch(url).await {
            Ok(items) => {
                tracing::debug!("Fetched {} entries from {}", items.len(), url);
                items
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                Vec::new()
            }
        }
    }
}

static RSS_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item(?:\s[^>]*)?>.*?</item>").expect("valid item pattern"));
static ITEM_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<item(?:\s[^>]*)?>").expect("valid item pattern"));
static ATOM_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<entry(?:\s[^>]*)?>.*?</entry>").expect("valid entry pattern")
});
static ENTRY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<entry(?:\s[^>]*)?>").expect("valid entry pattern"));
static PREFIXED_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmlns:[\w.-]+\s*=\s*"[^"]*""#).expect("valid namespace pattern")
});

/// Parses RSS/Atom/JSON Feed bytes. Entries without a link are dropped.
///
/// A document the parser rejects is salvaged entry by entry; it is only an error
/// when not a single entry can be recovered.
pub fn parse_feed(bytes: &[u8], source_url: &str) -> Result<Vec<FeedItem>> {
    let entries = match parser::parse(bytes) {
        Ok(feed) => feed.entries,
        Err(e) => {
            let recovered = recover_entries(bytes);
            if recovered.is_empty() {
                return Err(e.into());
            }
            tracing::warn!(
                "Malformed feed {} ({}); recovered {} entries",
                source_url,
                e,
                recovered.len()
            );
            recovered
        }
    };
    let total = entries.len();

    let items: Vec<FeedItem> = entries
        .into_iter()
        .filter_map(|entry| feed_item(entry, source_url))
        .collect();

    if items.len() < total {
        tracing::debug!(
            "Dropped {} entries without a link from {}",
            total - items.len(),
            source_url
        );
    }

    Ok(items)
}

fn feed_item(entry: Entry, source_url: &str) -> Option<FeedItem> {
    let link = entry
        .links
        .first()
        .map(|l| l.href.trim())
        .filter(|href| !href.is_empty())
        .map(|href| resolve_url(href, source_url))?;

    // Try summary first, then fall back to content
    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.as_str())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
        .map(plain_text)
        .unwrap_or_default();

    Some(FeedItem {
        title: entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        link,
        summary,
        published: entry.published.or(entry.updated),
        source_url: source_url.to_string(),
    })
}

/// Cuts complete `<item>`/`<entry>` blocks out of a broken document and parses each
/// inside a minimal RSS or Atom shell. Blocks that still fail are skipped.
fn recover_entries(bytes: &[u8]) -> Vec<Entry> {
    let text = String::from_utf8_lossy(bytes);

    // Prefixed namespaces (dc:, content:, media:) must be declared for blocks using them
    let namespaces: BTreeSet<&str> = PREFIXED_NAMESPACE
        .find_iter(&text)
        .map(|m| m.as_str())
        .collect();
    let namespaces = namespaces.into_iter().collect::<Vec<_>>().join(" ");

    let rss_head = format!(
        r#"<rss version="2.0" {}><channel><title>recovered</title><link>http://localhost/</link><description>recovered</description>"#,
        namespaces
    );
    let atom_head = format!(
        r#"<feed xmlns="http://www.w3.org/2005/Atom" {}><title>recovered</title><id>urn:recovered</id><updated>1970-01-01T00:00:00Z</updated>"#,
        namespaces
    );
    let shells = [
        (&*RSS_ITEM, &*ITEM_OPEN, rss_head.as_str(), "</channel></rss>"),
        (&*ATOM_ENTRY, &*ENTRY_OPEN, atom_head.as_str(), "</feed>"),
    ];

    let mut entries = Vec::new();
    for (block_pattern, open_pattern, head, tail) in shells {
        for m in block_pattern.find_iter(&text) {
            // An unterminated sibling before this block is cut off at the last opening tag
            let start = open_pattern
                .find_iter(m.as_str())
                .last()
                .map_or(0, |open| open.start());
            let document = format!("{}{}{}", head, &m.as_str()[start..], tail);

            match parser::parse(document.as_bytes()) {
                Ok(feed) => entries.extend(feed.entries),
                Err(e) => tracing::debug!("Skipping unrecoverable feed entry: {}", e),
            }
        }
    }
    entries
}

/// Converts HTML fragments to text and collapses whitespace.
fn plain_text(raw: &str) -> String {
    let text = if raw.contains('<') {
        html2text::from_read(raw.as_bytes(), 80).unwrap_or_else(|_| raw.to_string())
    } else {
        raw.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a potentially relative URL against the feed URL
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_URL: &str = "https://news.example.com/rss.xml";

    const TWO_ENTRIES_ONE_LINKLESS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example News</title>
    <link>https://news.example.com/</link>
    <description>Example</description>
    <item>
      <title>First story</title>
      <link>https://news.example.com/first</link>
      <description>First entry summary</description>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story without a link</title>
      <description>Nobody can dedup this one</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn entries_without_links_are_dropped() {
        let items = parse_feed(TWO_ENTRIES_ONE_LINKLESS.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.title, "First story");
        assert_eq!(item.link, "https://news.example.com/first");
        assert_eq!(item.summary, "First entry summary");
        assert_eq!(item.source_url, FEED_URL);
        assert!(item.published.is_some());
    }

    #[test]
    fn relative_links_resolve_against_feed_url() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>https://news.example.com/</link><description>d</description>
  <item><title>Relative</title><link>/stories/42</link></item>
</channel></rss>"#;
        let items = parse_feed(xml.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items[0].link, "https://news.example.com/stories/42");
    }

    #[test]
    fn atom_entries_are_supported() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:example:feed</id>
  <updated>2025-01-06T10:00:00Z</updated>
  <entry>
    <title>Atom story</title>
    <id>urn:example:1</id>
    <link href="https://news.example.com/atom/1"/>
    <updated>2025-01-06T10:00:00Z</updated>
    <summary>Short atom summary</summary>
  </entry>
</feed>"#;
        let items = parse_feed(xml.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom story");
        assert_eq!(items[0].link, "https://news.example.com/atom/1");
        assert!(items[0].published.is_some());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_feed(b"this is not a feed", FEED_URL).is_err());
    }

    #[test]
    fn truncated_rss_keeps_complete_items() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>t</title><link>https://news.example.com/</link><description>d</description>
    <item>
      <title>Survivor</title>
      <link>https://news.example.com/ok</link>
      <description>Still readable</description>
      <dc:creator>Reporter</dc:creator>
    </item>
    <item><title>Broken &amp entity</ti"#;

        let items = parse_feed(xml.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Survivor");
        assert_eq!(items[0].link, "https://news.example.com/ok");
        assert_eq!(items[0].summary, "Still readable");
        assert_eq!(items[0].source_url, FEED_URL);
    }

    #[test]
    fn unterminated_item_does_not_swallow_the_next_one() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
<item><title>Never closed</title>
<item><title>Good</title><link>https://news.example.com/good</link></item>
<item><title>Cut off</ti"#;

        let items = parse_feed(xml.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Good");
    }

    #[test]
    fn truncated_atom_keeps_complete_entries() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <entry>
    <title>Atom survivor</title>
    <id>urn:example:1</id>
    <link href="https://news.example.com/atom/1"/>
    <updated>2025-01-06T10:00:00Z</updated>
  </entry>
  <entry><title>Half an entry</ti"#;

        let items = parse_feed(xml.as_bytes(), FEED_URL).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom survivor");
        assert_eq!(items[0].link, "https://news.example.com/atom/1");
    }

    #[test]
    fn html_summaries_become_single_line_text() {
        let text = plain_text("<p>Hello\n   <em>there</em></p><p>world</p>");
        assert!(!text.contains('<'));
        assert!(!text.contains('\n'));
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
    }

    #[tokio::test]
    async fn unreachable_feed_yields_empty_list() {
        let fetcher = FeedFetcher::new().unwrap();
        let items = fetcher.fetch("http://127.0.0.1:9/rss.xml").await;
        assert!(items.is_empty());
    }
}
