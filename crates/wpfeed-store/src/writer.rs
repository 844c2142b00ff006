//! RSS 2.0 and Atom 1.0 serialization of a feed snapshot.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{self, Cursor, Write};
use wpfeed_core::config::SiteConfig;
use wpfeed_core::error::AppError;
use wpfeed_core::models::{FeedItem, FeedSnapshot, FeedType};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const GENERATOR: &str = concat!("wpfeed ", env!("CARGO_PKG_VERSION"));

/// Channel-level metadata written around the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: String,
    pub link: String,
    pub description: String,
    pub built_at: DateTime<Utc>,
}

impl FeedMeta {
    /// Metadata for `site`, titled after its host.
    pub fn for_site(site: &SiteConfig, built_at: DateTime<Utc>) -> Self {
        let title = if site.site_url.trim().is_empty() {
            site.name.clone()
        } else {
            site.host()
        };
        let description = if site.search_term.is_empty() {
            format!("Pages from {}", site.site_url)
        } else {
            format!("Pages from {} matching '{}'", site.site_url, site.search_term)
        };
        Self {
            title,
            link: site.site_url.clone(),
            description,
            built_at,
        }
    }
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Serializes `snapshot` in the requested format, items in snapshot order.
///
/// # Errors
///
/// Returns `AppError::PersistenceFailed` if the document cannot be built.
pub fn render(snapshot: &FeedSnapshot, feed_type: FeedType, meta: &FeedMeta) -> Result<Vec<u8>, AppError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    let written = match feed_type {
        FeedType::Rss => write_rss(&mut writer, snapshot.items(), meta),
        FeedType::Atom => write_atom(&mut writer, snapshot.items(), meta),
    };
    written.map_err(|e| AppError::PersistenceFailed(format!("failed to render {} feed: {}", feed_type, e)))?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_rss<W: Write>(writer: &mut Writer<W>, items: &[FeedItem], meta: &FeedMeta) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(writer, "title", &meta.title)?;
    text_element(writer, "link", &meta.link)?;
    text_element(writer, "description", &meta.description)?;
    text_element(writer, "lastBuildDate", &meta.built_at.to_rfc2822())?;
    text_element(writer, "generator", GENERATOR)?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        text_element(writer, "title", &item.title)?;
        if !item.link.is_empty() {
            text_element(writer, "link", &item.link)?;
        }
        text_element(writer, "description", &item.body)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&item.id)))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        text_element(writer, "pubDate", &item.updated().unwrap_or_default().to_rfc2822())?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;
    Ok(())
}

fn write_atom<W: Write>(writer: &mut Writer<W>, items: &[FeedItem], meta: &FeedMeta) -> io::Result<()> {
    let rfc3339 = |dt: DateTime<Utc>| dt.to_rfc3339_opts(SecondsFormat::Secs, true);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer.write_event(Event::Start(feed))?;

    text_element(writer, "id", &meta.link)?;
    text_element(writer, "title", &meta.title)?;
    text_element(writer, "subtitle", &meta.description)?;
    text_element(writer, "updated", &rfc3339(meta.built_at))?;
    text_element(writer, "generator", GENERATOR)?;
    let mut link = BytesStart::new("link");
    link.push_attribute(("rel", "alternate"));
    link.push_attribute(("href", meta.link.as_str()));
    writer.write_event(Event::Empty(link))?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("entry")))?;
        text_element(writer, "id", &item.id)?;
        text_element(writer, "title", &item.title)?;
        text_element(writer, "updated", &rfc3339(item.updated().unwrap_or_default()))?;
        if !item.link.is_empty() {
            let mut link = BytesStart::new("link");
            link.push_attribute(("rel", "alternate"));
            link.push_attribute(("href", item.link.as_str()));
            writer.write_event(Event::Empty(link))?;
        }

        let mut content = BytesStart::new("content");
        content.push_attribute(("type", "html"));
        writer.write_event(Event::Start(content))?;
        writer.write_event(Event::Text(BytesText::new(&item.body)))?;
        writer.write_event(Event::End(BytesEnd::new("content")))?;

        writer.write_event(Event::End(BytesEnd::new("entry")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("feed")))?;
    Ok(())
}
