//! Source selection and the extraction contract shared by every source.
//!
//! Each upstream site is one [`SourceKind`]. Its [`Extractor`] turns fetched
//! documents into canonical types:
//!
//! - listing pages into [`ListingEntry`] values (detail URLs plus title hints)
//! - detail pages into a [`TitleRecord`]
//! - detail pages into a chapter list, oldest first
//! - chapter pages into an ordered list of image URLs
//!
//! Extraction is synchronous and never touches the network; fetching lives
//! in [`net`](crate::net) and orchestration in [`batch`](crate::batch).
//!
//! # Examples
//!
//! ```rust
//! use hondana::source::SourceKind;
//! use hondana::net::html;
//!
//! let extractor = SourceKind::Manga.extractor();
//! let document = html::parse("<html><body></body></html>");
//! assert!(extractor.extract_listing(&document).is_empty());
//! assert!(extractor.listing_url(2).ends_with("page=2"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::net::html::IMAGE_ATTRS;
use crate::sources::{KingOfShojo, MangaKakalot, Manhwa18};
use crate::types::{Chapter, ListingEntry, TitleRecord, UNKNOWN_TITLE, is_placeholder_title};

/// Genre strings at or above this length are treated as mis-matched markup.
pub const MAX_GENRE_LEN: usize = 50;

static DECORATIVE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(logo|icon|placeholder|avatar|gravatar|banner|widget|(^|[^a-z])ads?([^a-z]|$))")
        .expect("valid decorative image regex")
});

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png|webp|gif)").expect("valid image extension regex"));

/// The upstream content providers, each with its own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// kingofshojo.com
    Shojo,
    /// manhwa18.net
    #[serde(rename = "toongod")]
    ToonGod,
    /// mangakakalot.gg
    Manga,
}

impl SourceKind {
    /// Every source, in refresh order.
    pub const ALL: [SourceKind; 3] = [SourceKind::Shojo, SourceKind::ToonGod, SourceKind::Manga];

    /// Short tag used in logs, config and cache keys.
    pub fn tag(self) -> &'static str {
        match self {
            SourceKind::Shojo => "shojo",
            SourceKind::ToonGod => "toongod",
            SourceKind::Manga => "manga",
        }
    }

    /// The extractor for this source.
    pub fn extractor(self) -> &'static dyn Extractor {
        match self {
            SourceKind::Shojo => &KingOfShojo,
            SourceKind::ToonGod => &Manhwa18,
            SourceKind::Manga => &MangaKakalot,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Other(format!("unknown source: {}", s)))
    }
}

/// Source-specific document extraction.
///
/// Implementations hold no state; one static instance per source is
/// returned by [`SourceKind::extractor`].
///
/// # Implementation Guidelines
///
/// - Prefer a non-placeholder `hinted_title` over anything found on the page
/// - Resolve relative URLs against [`base_url`](Extractor::base_url)
/// - Use `"N/A"` for missing author and cover, never an empty string
/// - Return [`Error::Parse`] only when the page lacks the fields the source
///   cannot do without; a missing title falls back to `"Unknown"`
pub trait Extractor: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Origin used to resolve relative links, with a trailing slash.
    fn base_url(&self) -> &'static str;

    /// Address of a paginated listing page (1-based).
    fn listing_url(&self, page: u32) -> String;

    /// `Referer` header sent when fetching `url` from this source.
    fn referer(&self, _url: &str) -> String {
        self.base_url().to_string()
    }

    /// Number of listing pages a full crawl walks; `None` means discover it
    /// from page 1 with [`last_page`](Extractor::last_page).
    fn full_crawl_pages(&self) -> Option<u32> {
        None
    }

    /// Highest page number advertised by a listing page's pagination.
    fn last_page(&self, _document: &Html) -> Option<u32> {
        None
    }

    /// Titles on a listing page, in page order.
    fn extract_listing(&self, document: &Html) -> Vec<ListingEntry>;

    /// The canonical record on a detail page.
    fn extract_detail(
        &self,
        document: &Html,
        url: &str,
        hinted_title: Option<&str>,
    ) -> Result<TitleRecord>;

    /// Chapter links on a detail page, oldest first.
    fn extract_chapter_list(&self, document: &Html) -> Vec<Chapter>;

    /// Content image URLs on a chapter page, in reading order.
    fn extract_chapter_images(&self, document: &Html) -> Vec<String>;
}

/// Picks the hinted title when usable, else the first usable candidate,
/// else `"Unknown"`.
pub(crate) fn resolve_title<I>(hinted_title: Option<&str>, candidates: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    if let Some(hint) = hinted_title.filter(|t| !is_placeholder_title(t)) {
        return hint.trim().to_string();
    }
    candidates
        .into_iter()
        .flatten()
        .map(|t| crate::net::html::collapse_whitespace(&t))
        .find(|t| !is_placeholder_title(t))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

/// Trims, drops empty and overlong entries, and removes duplicates while
/// keeping first-seen order.
pub(crate) fn clean_genres<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty() && g.len() < MAX_GENRE_LEN)
        .filter(|g| seen.insert(g.clone()))
        .collect()
}

/// Splits a delimited list of names, trimming and dropping empties.
pub(crate) fn split_names(text: &str, delimiter: char) -> Vec<String> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `true` for logos, icons, ads and similar non-content images.
///
/// Only the file name is inspected so path segments such as `uploads`
/// do not trigger the `ad` pattern.
pub fn is_decorative_image(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    DECORATIVE_IMAGE.is_match(file_name)
}

/// `true` if the URL names a raster image by extension.
pub fn has_image_extension(url: &str) -> bool {
    IMAGE_EXTENSION.is_match(url)
}

/// `true` for inline `data:image` URIs.
pub(crate) fn is_inline_image(url: &str) -> bool {
    url.contains("data:image")
}

/// The first lazy-load attribute on `img` holding a real (non-inline) URL.
pub(crate) fn image_source(img: ElementRef<'_>) -> Option<String> {
    IMAGE_ATTRS.iter().find_map(|attr| {
        img.value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty() && !is_inline_image(v))
            .map(String::from)
    })
}
