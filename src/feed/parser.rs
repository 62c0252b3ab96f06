use std::collections::HashMap;

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

/// One `<item>` element of a fetched feed, as a raw field map.
///
/// Every child element of the item becomes a key in `fields`, keyed by
/// its tag name exactly as written (prefix included, e.g.
/// `content:encoded`). The Dublin Core creator/date pair is the
/// exception: it lives in the nested `dc` map under `creator`/`date`.
/// Repeated `category` elements are concatenated with `", "`.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub fields: HashMap<String, String>,
    pub dc: HashMap<String, String>,
}

impl RawItem {
    /// Convenience accessor for a top-level field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Feed documents that cannot be turned into items.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed feed XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Parses an RSS 2.0 document into raw item records, in document order.
///
/// Parsing is lenient about text content (unknown entities pass through
/// verbatim, CDATA is unwrapped) but strict about markup. When strict
/// parsing fails and the document uses a namespace prefix it never
/// declares — a common defect in hand-assembled feeds — all elements
/// carrying an undeclared prefix are stripped and parsing is retried
/// once before the error is surfaced.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>, ParseError> {
    match parse_events(xml) {
        Ok(items) => Ok(items),
        Err(err) => {
            if let Some(stripped) = strip_undeclared_prefixes(xml) {
                tracing::warn!(
                    error = %err,
                    "feed parse failed, retrying with undeclared-prefix elements stripped"
                );
                return parse_events(&stripped).map_err(ParseError::Xml);
            }
            Err(ParseError::Xml(err))
        }
    }
}

fn parse_events(xml: &str) -> Result<Vec<RawItem>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;

    let mut items = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<RawItem> = None;
    // Name of the item child element currently being read, with the
    // nesting depth of any markup inside it (nested tags are dropped,
    // their text kept).
    let mut field: Option<String> = None;
    let mut field_depth = 0usize;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if current.is_none() {
                    if name == "item" {
                        current = Some(RawItem::default());
                    }
                } else if field.is_none() {
                    field = Some(name);
                    field_depth = 0;
                    text.clear();
                } else {
                    field_depth += 1;
                }
            }
            Event::Empty(e) => {
                if current.is_some() && field.is_none() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    record_field(current.as_mut().expect("item in progress"), &name, "");
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    // Unknown entities (&nbsp; and friends) are not an
                    // error worth losing the item over; keep the raw text
                    match t.unescape() {
                        Ok(s) => text.push_str(&s),
                        Err(_) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
                    }
                }
            }
            Event::CData(t) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(item) = current.as_mut() {
                    if let Some(f) = field.clone() {
                        if field_depth > 0 {
                            field_depth -= 1;
                        } else if f == name {
                            record_field(item, &f, text.trim());
                            field = None;
                        }
                    } else if name == "item" {
                        items.push(current.take().expect("item in progress"));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn record_field(item: &mut RawItem, name: &str, value: &str) {
    match name {
        "dc:creator" => {
            item.dc.insert("creator".to_string(), value.to_string());
        }
        "dc:date" => {
            item.dc.insert("date".to_string(), value.to_string());
        }
        "category" => {
            match item.fields.get_mut("category") {
                Some(existing) if !existing.is_empty() => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                _ => {
                    item.fields.insert("category".to_string(), value.to_string());
                }
            };
        }
        _ => {
            item.fields.insert(name.to_string(), value.to_string());
        }
    }
}

static PREFIXED_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?([A-Za-z_][\w.-]*):").expect("static regex"));

/// Removes all elements that use a namespace prefix the document never
/// declares. Returns `None` when the document has no such prefix (there
/// is nothing to recover from).
fn strip_undeclared_prefixes(xml: &str) -> Option<String> {
    let mut undeclared: Vec<String> = Vec::new();
    for cap in PREFIXED_TAG.captures_iter(xml) {
        let prefix = &cap[1];
        if prefix == "xml" || undeclared.iter().any(|p| p == prefix) {
            continue;
        }
        if !xml.contains(&format!("xmlns:{}", prefix)) {
            undeclared.push(prefix.to_string());
        }
    }
    if undeclared.is_empty() {
        return None;
    }

    let mut out = xml.to_string();
    for prefix in &undeclared {
        let escaped = regex::escape(prefix);
        // Paired elements including their content, then any stragglers
        // (self-closing or mismatched open/close tags)
        let paired = Regex::new(&format!(
            r"(?is)<{p}:[\w.-]+\b[^>]*>.*?</{p}:[\w.-]+\s*>",
            p = escaped
        ))
        .ok()?;
        out = paired.replace_all(&out, "").into_owned();
        let single = Regex::new(&format!(r"(?i)</?{}:[\w.-]+\b[^>]*/?>", escaped)).ok()?;
        out = single.replace_all(&out, "").into_owned();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(items: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel>\
             <title>Example</title>{}</channel></rss>",
            items
        )
    }

    #[test]
    fn test_basic_field_extraction() {
        let xml = feed(
            "<item><title>First</title><link>http://e.com/1</link>\
             <description>Body</description>\
             <pubDate>Mon, 01 Jul 2024 10:00:00 +0000</pubDate></item>",
        );
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].field("title"), Some("First"));
        assert_eq!(items[0].field("link"), Some("http://e.com/1"));
        assert_eq!(items[0].field("description"), Some("Body"));
        assert_eq!(
            items[0].field("pubDate"),
            Some("Mon, 01 Jul 2024 10:00:00 +0000")
        );
    }

    #[test]
    fn test_document_order_preserved() {
        let xml = feed(
            "<item><title>A</title></item>\
             <item><title>B</title></item>\
             <item><title>C</title></item>",
        );
        let items = parse_feed(&xml).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.field("title").unwrap()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cdata_is_unwrapped() {
        let xml = feed("<item><title><![CDATA[Raw <b>markup</b> kept]]></title></item>");
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items[0].field("title"), Some("Raw <b>markup</b> kept"));
    }

    #[test]
    fn test_escaped_html_is_unescaped() {
        let xml = feed("<item><description>&lt;b&gt;hi&lt;/b&gt;</description></item>");
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items[0].field("description"), Some("<b>hi</b>"));
    }

    #[test]
    fn test_repeated_categories_concatenated() {
        let xml = feed(
            "<item><title>T</title>\
             <category>News</category><category>Tech</category></item>",
        );
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items[0].field("category"), Some("News, Tech"));
    }

    #[test]
    fn test_dc_fields_nested_not_flattened() {
        let xml = "<rss version=\"2.0\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
             <channel><item><title>T</title>\
             <dc:creator>Jane</dc:creator>\
             <dc:date>2024-07-01T10:00:00Z</dc:date></item></channel></rss>";
        let items = parse_feed(xml).unwrap();
        assert_eq!(items[0].dc.get("creator").map(String::as_str), Some("Jane"));
        assert_eq!(
            items[0].dc.get("date").map(String::as_str),
            Some("2024-07-01T10:00:00Z")
        );
        assert!(items[0].field("dc:creator").is_none());
    }

    #[test]
    fn test_other_prefixed_fields_keep_full_name() {
        let xml = "<rss version=\"2.0\" xmlns:content=\"http://purl.org/rss/1.0/modules/content/\">\
             <channel><item><title>T</title>\
             <content:encoded>full text</content:encoded></item></channel></rss>";
        let items = parse_feed(xml).unwrap();
        assert_eq!(items[0].field("content:encoded"), Some("full text"));
    }

    #[test]
    fn test_empty_feed_yields_no_items() {
        let items = parse_feed(&feed("")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_nested_markup_inside_field_keeps_text() {
        let xml = feed("<item><title>a <b>bold</b> end</title></item>");
        let items = parse_feed(&xml).unwrap();
        assert_eq!(items[0].field("title"), Some("a bold end"));
    }

    #[test]
    fn test_unparsable_xml_is_error() {
        assert!(parse_feed("this is not xml <at all").is_err());
    }

    #[test]
    fn test_strip_undeclared_prefix_elements() {
        let xml = "<a><media:group><media:title>x</media:title></media:group><b/></a>";
        let stripped = strip_undeclared_prefixes(xml).unwrap();
        assert_eq!(stripped, "<a><b/></a>");
    }

    #[test]
    fn test_declared_prefix_is_not_stripped() {
        let xml = "<a xmlns:dc=\"urn:dc\"><dc:creator>x</dc:creator></a>";
        assert!(strip_undeclared_prefixes(xml).is_none());
    }

    #[test]
    fn test_recovery_from_broken_undeclared_prefix_block() {
        // The media: block is malformed (mismatched close tag) AND its
        // prefix is never declared; stripping it rescues the document.
        let xml = "<rss version=\"2.0\"><channel>\
             <item><title>ok</title><link>http://e.com/1</link></item>\
             <media:group><media:title>x</title></media:group>\
             </channel></rss>";
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].field("title"), Some("ok"));
    }
}
