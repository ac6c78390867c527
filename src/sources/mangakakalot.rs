use scraper::{ElementRef, Html};
use std::collections::HashSet;
use url::Url;

use crate::error::Result;
use crate::net::html;
use crate::source::{
    Extractor, SourceKind, clean_genres, has_image_extension, image_source, is_decorative_image,
    resolve_title, split_names,
};
use crate::types::{Chapter, ListingEntry, TitleRecord};

const BASE_URL: &str = "https://www.mangakakalot.gg/";

/// Images and covers are served relative to the legacy domain.
const IMAGE_BASE_URL: &str = "https://mangakakalot.com/";

// Children of `.manga-info-text`
const NAMES_ITEM: usize = 0;
const AUTHOR_ITEM: usize = 1;
const UPDATED_ITEM: usize = 3;
const GENRES_ITEM: usize = 6;

/// mangakakalot.gg extractor
pub struct MangaKakalot;

impl MangaKakalot {
    fn parse_listing_item(item: ElementRef) -> Option<ListingEntry> {
        let link = html::child_elements(item).into_iter().next()?;
        let href = link.value().attr("href")?;

        let title = link
            .value()
            .attr("title")
            .map(html::collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| html::text_of(link));

        let cover_image_url = html::child_elements(link)
            .into_iter()
            .next()
            .and_then(|img| html::first_attr(img, &["data-src", "src"]))
            .map(|src| html::resolve_url(IMAGE_BASE_URL, &src));

        Some(ListingEntry {
            title,
            url: html::resolve_url(BASE_URL, href),
            cover_image_url,
        })
    }

    /// Item text with its `Label : ` prefix removed.
    fn labelled(item: Option<&ElementRef>, label: &str) -> Option<String> {
        item.map(|el| html::text_of(*el))
            .map(|text| text.replace(label, "").trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

impl Extractor for MangaKakalot {
    fn kind(&self) -> SourceKind {
        SourceKind::Manga
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> String {
        format!("{}manga-list/latest-manga?page={}", BASE_URL, page)
    }

    fn last_page(&self, document: &Html) -> Option<u32> {
        let href = html::select_attr(document, ".page_last", "href")?;
        let url = Url::parse(&html::resolve_url(BASE_URL, &href)).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
            .filter(|page| *page > 0)
    }

    fn extract_listing(&self, document: &Html) -> Vec<ListingEntry> {
        html::parse_items(document, ".list-comic-item-wrap", Self::parse_listing_item)
    }

    fn extract_detail(
        &self,
        document: &Html,
        url: &str,
        hinted_title: Option<&str>,
    ) -> Result<TitleRecord> {
        let items = html::select_first(document, ".manga-info-text")
            .map(html::child_elements)
            .unwrap_or_default();
        let names = items
            .get(NAMES_ITEM)
            .map(|el| html::child_elements(*el))
            .unwrap_or_default();

        let title = resolve_title(hinted_title, [names.first().map(|el| html::text_of(*el))]);
        let mut record = TitleRecord::new(title, url);

        if let Some(cover) = html::select_first(document, ".manga-info-pic")
            .and_then(|pic| html::child_elements(pic).into_iter().next())
            .and_then(image_source)
        {
            record.cover_image_url = html::resolve_url(BASE_URL, &cover);
        }

        record.alternatives = Self::labelled(names.get(1), "Alternative :")
            .map(|text| split_names(&text, ';'))
            .unwrap_or_default();
        if let Some(author) = Self::labelled(items.get(AUTHOR_ITEM), "Author(s) :") {
            record.author = author;
        }
        if let Some(updated) = Self::labelled(items.get(UPDATED_ITEM), "Last updated :") {
            record.updated = updated;
        }
        record.genres = items
            .get(GENRES_ITEM)
            .map(|el| clean_genres(html::find_all(*el, "a").into_iter().map(html::text_of)))
            .unwrap_or_default();

        Ok(record)
    }

    fn extract_chapter_list(&self, document: &Html) -> Vec<Chapter> {
        let mut chapters: Vec<Chapter> = html::select_all(document, ".row")
            .into_iter()
            .filter_map(|row| {
                let cell = html::child_elements(row).into_iter().next()?;
                let link = html::child_elements(cell).into_iter().next()?;
                let href = link.value().attr("href")?;
                Some(Chapter {
                    title: html::text_of(link),
                    url: html::resolve_url(IMAGE_BASE_URL, href),
                })
            })
            .collect();
        // Newest first on the page
        chapters.reverse();
        chapters
    }

    fn extract_chapter_images(&self, document: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        html::select_first(document, ".container-chapter-reader")
            .map(html::child_elements)
            .unwrap_or_default()
            .into_iter()
            .filter_map(image_source)
            .filter(|src| has_image_extension(src) && !is_decorative_image(src))
            .map(|src| html::resolve_url(IMAGE_BASE_URL, &src))
            .filter(|src| seen.insert(src.clone()))
            .collect()
    }
}
