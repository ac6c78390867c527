use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::warn;

use crate::error::Result;
use crate::net::html;
use crate::source::{
    Extractor, SourceKind, clean_genres, has_image_extension, image_source, is_decorative_image,
    resolve_title,
};
use crate::types::{Chapter, ListingEntry, TitleRecord, UNKNOWN_TITLE, today};

const BASE_URL: &str = "https://manhwa18.net/";

/// Listing pages walked by a full crawl.
const FULL_CRAWL_PAGES: u32 = 62;

const COVER_SELECTORS: &str =
    r#".series-cover img, .thumb img, .poster img, img[itemprop="image"]"#;
const AUTHOR_SELECTORS: &str =
    r#"[itemprop="author"] a, .author-content a, .author a, .creator a, [data-author] a"#;
const GENRE_SELECTORS: &str =
    r#".genres-content a, .series-genres a, .item-genres a, a[href*="/genre/"]"#;
const UPDATED_SELECTORS: &str =
    ".time-since, .updated, [data-time], .update-date, .last-update, .chapter-time";

/// Arrays of image URLs embedded in reader scripts.
static SCRIPT_IMAGES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\["http[^"]+\.(jpg|jpeg|png|webp|gif)"(?:, ?"[^"]+")*\]"#)
        .expect("valid script image regex")
});

/// manhwa18.net extractor
pub struct Manhwa18;

impl Manhwa18 {
    fn parse_listing_item(item: ElementRef) -> Option<ListingEntry> {
        let link = html::find(item, r#"a[href*="/manga/"][title]"#)
            .or_else(|| html::find(item, r#"a[href*="/manga/"]"#))?;
        let href = link.value().attr("href")?;

        let title = link
            .value()
            .attr("title")
            .map(html::collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| html::text_of(link));
        if title.is_empty() {
            return None;
        }

        let cover_image_url = html::find(item, "[data-bg], [data-src], img")
            .and_then(|el| html::first_attr(el, &["data-bg", "data-src", "src"]))
            .map(|value| html::resolve_url(BASE_URL, &html::css_url(&value)));

        Some(ListingEntry {
            title,
            url: html::resolve_url(BASE_URL, href),
            cover_image_url,
        })
    }

    fn cover(document: &Html) -> Option<String> {
        html::select_attr(document, ".img-in-ratio", "style")
            .filter(|style| style.contains("url("))
            .map(|style| html::css_url(&style))
            .or_else(|| html::select_first(document, COVER_SELECTORS).and_then(image_source))
            .map(|src| html::resolve_url(BASE_URL, &src))
    }

    fn updated(document: &Html) -> Option<String> {
        let element = html::select_first(document, UPDATED_SELECTORS)?;
        html::find(element, "time[datetime]")
            .and_then(|time| time.value().attr("datetime"))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .or_else(|| Some(html::text_of(element)).filter(|t| !t.is_empty()))
    }

    /// Image URLs listed in inline script arrays, in script order.
    fn script_images(document: &Html) -> Vec<String> {
        let scripts = html::select_all(document, "script")
            .into_iter()
            .map(|s| s.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");

        SCRIPT_IMAGES
            .find_iter(&scripts)
            .filter_map(|m| serde_json::from_str::<Vec<String>>(m.as_str()).ok())
            .flatten()
            .filter(|url| url.starts_with("http"))
            .collect()
    }
}

impl Extractor for Manhwa18 {
    fn kind(&self) -> SourceKind {
        SourceKind::ToonGod
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> String {
        format!("{}genre/adult?sort=update&page={}", BASE_URL, page)
    }

    /// The detail page's own origin; the site rejects foreign referers.
    fn referer(&self, url: &str) -> String {
        html::origin_of(url)
            .map(|origin| format!("{}/", origin))
            .unwrap_or_else(|| BASE_URL.to_string())
    }

    fn full_crawl_pages(&self) -> Option<u32> {
        Some(FULL_CRAWL_PAGES)
    }

    fn extract_listing(&self, document: &Html) -> Vec<ListingEntry> {
        html::parse_items(document, ".thumb-item-flow", Self::parse_listing_item)
    }

    fn extract_detail(
        &self,
        document: &Html,
        url: &str,
        hinted_title: Option<&str>,
    ) -> Result<TitleRecord> {
        let title = resolve_title(
            hinted_title,
            [
                html::select_first(document, ".series-name")
                    .and_then(|name| html::child_elements(name).into_iter().next())
                    .map(html::text_of),
                html::select_text(document, ".series-name"),
                html::select_attr(document, ".series-title a[title]", "title"),
            ],
        );
        if title == UNKNOWN_TITLE {
            warn!(source = "toongod", url, "No title found on detail page");
        }

        let mut record = TitleRecord::new(title, url);

        if let Some(cover) = Self::cover(document) {
            record.cover_image_url = cover;
        }
        if let Some(author) =
            html::select_text(document, AUTHOR_SELECTORS).filter(|a| !a.is_empty())
        {
            record.author = html::collapse_whitespace(&author);
        }
        record.genres = clean_genres(
            html::select_all(document, GENRE_SELECTORS)
                .into_iter()
                .map(html::text_of),
        );
        record.updated = Self::updated(document).unwrap_or_else(today);

        Ok(record)
    }

    fn extract_chapter_list(&self, document: &Html) -> Vec<Chapter> {
        let Some(list) = html::select_first(document, ".list-chapters") else {
            return Vec::new();
        };

        let mut chapters: Vec<Chapter> = html::child_elements(list)
            .into_iter()
            .filter_map(|item| {
                let href = item.value().attr("href")?;
                let title = item.value().attr("title")?;
                Some(Chapter {
                    title: html::collapse_whitespace(title),
                    url: html::resolve_url(BASE_URL, href),
                })
            })
            .collect();
        // Newest first on the page
        chapters.reverse();
        chapters
    }

    fn extract_chapter_images(&self, document: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut images: Vec<String> = html::select_first(document, "#chapter-content")
            .map(|content| html::find_all(content, "img"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(image_source)
            .filter(|src| !is_decorative_image(src))
            .map(|src| html::resolve_url(BASE_URL, &src))
            .filter(|src| seen.insert(src.clone()))
            .collect();

        if images.is_empty() {
            images = Self::script_images(document)
                .into_iter()
                .filter(|src| seen.insert(src.clone()))
                .collect();
        }

        if images.is_empty() {
            images = html::select_all(document, "img")
                .into_iter()
                .filter_map(image_source)
                .filter(|src| has_image_extension(src) && !is_decorative_image(src))
                .map(|src| html::resolve_url(BASE_URL, &src))
                .filter(|src| seen.insert(src.clone()))
                .collect();
        }

        images
    }
}
