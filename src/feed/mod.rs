//! Feed acquisition: HTTP fetching and RSS 2.0 parsing.
//!
//! The fetcher performs a single bounded GET per source (timeout plus a
//! streaming size cap). The parser turns the response body into raw item
//! field maps — one entry per `<item>` child element — which is what the
//! downstream rule engine needs to read arbitrary feed fields.

mod fetcher;
mod parser;

pub use fetcher::{fetch_text, FetchError, FetchLimits};
pub use parser::{parse_feed, ParseError, RawItem};
