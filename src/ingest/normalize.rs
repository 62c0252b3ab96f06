//! Item normalization: raw feed field maps → cleaned [`NormalizedItem`]s.
//!
//! Pure text transformation — no network or persistence access. The link
//! is copied verbatim (it is the dedup key); titles and descriptions go
//! through the cleaning passes below before the rule engine and the
//! classifier see them.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::feed::RawItem;
use crate::storage::NewItem;
use crate::util::{slugify, strip_supplementary};

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Structural tags that survive description cleaning as explicit line
/// breaks or bullets. Everything else is stripped outright.
const STRUCTURAL_TAGS: [&str; 4] = ["p", "br", "li", "div"];

/// A cleaned feed entry, mutated in place by the rule engine and the
/// classifier, then either inserted or discarded.
///
/// `date` stays a string until insert time so rules can rewrite it; it
/// is parsed into a timestamp by [`NormalizedItem::into_new_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub link: String,
    pub title: String,
    pub full_title: String,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub date: String,
    pub category: Option<String>,
    pub creator: Option<String>,
    pub custom1: Option<String>,
    pub custom2: Option<String>,
    pub url_slug: String,
}

impl NormalizedItem {
    /// Convert into the insert payload, resolving the date string to a
    /// unix timestamp (falling back to `fallback_ts` when unparsable).
    pub fn into_new_item(self, fallback_ts: i64) -> NewItem {
        let date = parse_item_date(&self.date, fallback_ts);
        NewItem {
            link: self.link,
            title: self.title,
            full_title: self.full_title,
            description: self.description,
            full_description: self.full_description,
            date,
            category: self.category,
            creator: self.creator,
            custom1: self.custom1,
            custom2: self.custom2,
            url_slug: self.url_slug,
        }
    }
}

/// Builds a [`NormalizedItem`] from one raw feed entry.
pub fn normalize_item(raw: &RawItem) -> NormalizedItem {
    // The link is the dedup key: copied verbatim, never cleaned
    let link = raw.field("link").unwrap_or_default().to_string();

    let full_title = strip_supplementary(raw.field("title").unwrap_or_default()).into_owned();
    let title = clean_title(&full_title);

    let (description, full_description) = match raw.field("description") {
        Some(d) => {
            let full = strip_supplementary(d).into_owned();
            let cleaned = clean_description(&full);
            (Some(cleaned), Some(full))
        }
        None => (None, None),
    };

    // Dublin Core date wins over pubDate when both are present
    let date = raw
        .dc
        .get("date")
        .cloned()
        .or_else(|| raw.field("pubDate").map(str::to_string))
        .unwrap_or_default();

    let url_slug = slugify(&title);

    NormalizedItem {
        link,
        title,
        full_title,
        description,
        full_description,
        date,
        category: raw.field("category").filter(|c| !c.is_empty()).map(str::to_string),
        creator: raw.dc.get("creator").cloned(),
        custom1: None,
        custom2: None,
        url_slug,
    }
}

/// Resolve an item date string to a unix timestamp.
///
/// RSS 2.0 prescribes RFC 2822 dates but Dublin Core feeds carry RFC
/// 3339; both are accepted, anything else falls back to the fetch time.
pub fn parse_item_date(s: &str, fallback_ts: i64) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return fallback_ts;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.timestamp();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp();
    }
    tracing::debug!(date = %s, "unparsable item date, using fetch time");
    fallback_ts
}

static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]*>").expect("static regex"));
static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("static regex"));
static RE_TRAILING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").expect("static regex"));
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static RE_LOOSE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[+*-][ \t]*").expect("static regex"));
static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));

/// Title cleaning: tags out, entities resolved, one line.
fn clean_title(s: &str) -> String {
    let mut t = RE_ANY_TAG.replace_all(s, "").into_owned();
    t = t.replace("\r\n", "\n");
    // A leading numeric-entity marker survives feeds that escape twice;
    // collapse it into the literal tag downstream templates expect
    if t.starts_with("&#") {
        t = format!("1[sharp]{}", &t[2..]);
    }
    t = t.replace("&amp;", "&");
    t = t.replace("&laquo;", "\u{ab}").replace("&raquo;", "\u{bb}");
    let t = t.trim();
    RE_NEWLINES.replace_all(t, " ").into_owned()
}

struct StructuralTag {
    /// Matches an opening occurrence of the tag, any case.
    detect: Regex,
    /// Matches open/close/self-closing forms for sentinel marking.
    mark: Regex,
    /// Sentinel replacement, e.g. `~${1}li~` → `~li~` / `~/li~`.
    sentinel: String,
    open_marker: String,
    close_marker: String,
}

static STRUCTURAL: Lazy<Vec<StructuralTag>> = Lazy::new(|| {
    STRUCTURAL_TAGS
        .iter()
        .map(|tag| StructuralTag {
            detect: Regex::new(&format!(r"(?i)<{}[\s/>]", tag)).expect("static regex"),
            mark: Regex::new(&format!(r"(?i)<(/?){}(\s[^>]*)?/?>", tag)).expect("static regex"),
            sentinel: format!("~${{1}}{}~", tag),
            open_marker: format!("~{}~", tag),
            close_marker: format!("~/{}~", tag),
        })
        .collect()
});

/// Description cleaning.
///
/// Only the structural tags actually present in the text are allowed to
/// survive — as newline/bullet markers — so structural line breaks are
/// preserved without letting unknown markup through. The allow-listing
/// is a two-pass algorithm: allowed tags are first rewritten to `~tag~`
/// sentinels, every remaining tag is stripped, and the sentinels are
/// then resolved to their markers. The sentinel detour is what keeps the
/// blanket tag-stripper from eating the allowed tags.
fn clean_description(s: &str) -> String {
    let mut d = s.replace("\r\n", "\n");
    d = d.replace("&nbsp;", " ").replace("&#160;", " ");

    // Pass 1: mark the structural tags that exist in this text
    let present: Vec<&StructuralTag> = STRUCTURAL
        .iter()
        .filter(|t| t.detect.is_match(&d))
        .collect();
    for tag in &present {
        d = tag.mark.replace_all(&d, tag.sentinel.as_str()).into_owned();
    }

    // Pass 2: strip everything that still looks like a tag
    d = RE_ANY_TAG.replace_all(&d, "").into_owned();

    // Pass 3: resolve sentinels into explicit line structure
    for tag in &present {
        let (open, close) = match tag.open_marker.as_str() {
            "~li~" => ("\n* ", "\n"),
            _ => ("\n", "\n"),
        };
        d = d.replace(&tag.open_marker, open);
        d = d.replace(&tag.close_marker, close);
    }

    // Structural cleanup
    d = RE_TRAILING_WS.replace_all(&d, "\n").into_owned();
    d = RE_BLANK_RUNS.replace_all(&d, "\n\n").into_owned();
    d = RE_LOOSE_BULLET.replace_all(&d, "\n* ").into_owned();
    d = RE_SPACE_RUNS.replace_all(&d, " ").into_owned();
    let d = d.trim();

    if LINE_ENDING == "\n" {
        d.to_string()
    } else {
        d.replace('\n', LINE_ENDING)
    }
}
