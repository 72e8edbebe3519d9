//! HTTP acquisition: the fetcher and the single-page parser.
//!
//! Both are leaves of the crawl. The fetcher does network I/O and nothing
//! else; the parser is pure CPU work over one page of HTML.

pub mod http_client;
pub mod page_parser;

pub use http_client::{FollowOutcome, HttpClient, PageFetchResult};
pub use page_parser::{parse_page, try_parse_page, AssetReference, ParsedPage};
