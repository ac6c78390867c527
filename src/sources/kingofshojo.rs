use scraper::{ElementRef, Html};

use crate::error::{Error, Result};
use crate::net::html::{self, IMAGE_ATTRS};
use crate::source::{
    Extractor, SourceKind, clean_genres, image_source, is_decorative_image, resolve_title,
    split_names,
};
use crate::types::{Chapter, ListingEntry, NOT_AVAILABLE, TitleRecord};

const BASE_URL: &str = "https://kingofshojo.com/";

/// Listing pages walked by a full crawl.
const FULL_CRAWL_PAGES: u32 = 98;

// Positions inside the detail info table
const ALT_ROW: usize = 0;
const AUTHOR_ROW: usize = 4;
const UPDATED_ROW: usize = 8;

/// kingofshojo.com extractor
pub struct KingOfShojo;

impl KingOfShojo {
    fn parse_listing_item(item: ElementRef) -> Option<ListingEntry> {
        let link = html::find(item, "a")?;
        let href = link.value().attr("href")?;
        let title = html::find(item, ".tt, .series-title, .title")
            .map(html::text_of)
            .filter(|t| !t.is_empty())
            .or_else(|| link.value().attr("title").map(html::collapse_whitespace))
            .unwrap_or_else(|| "Unknown Title".to_string());
        let cover_image_url = html::find(item, "img")
            .and_then(|img| html::first_attr(img, &IMAGE_ATTRS))
            .map(|src| html::resolve_url(BASE_URL, &src));

        Some(ListingEntry {
            title,
            url: html::resolve_url(BASE_URL, href),
            cover_image_url,
        })
    }

    /// Text of the second cell of row `row` in the info table.
    fn info_cell<'a>(rows: &[ElementRef<'a>], row: usize) -> Option<ElementRef<'a>> {
        rows.get(row)
            .and_then(|r| html::find_all(*r, "td").into_iter().nth(1))
    }

    fn parse_chapter(item: ElementRef) -> Option<Chapter> {
        let link = html::find(item, "div.chbox div.eph-num a")
            .or_else(|| html::find(item, "div.eph-num a"))
            .or_else(|| html::find(item, "a"))?;
        let href = link.value().attr("href")?;

        let title = html::find(link, "span.chapternum")
            .or_else(|| html::find(link, "span"))
            .map(html::text_of)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                format!("Chapter {}", item.value().attr("data-num").unwrap_or("?"))
            });

        Some(Chapter {
            title,
            url: html::resolve_url(BASE_URL, href),
        })
    }
}

impl Extractor for KingOfShojo {
    fn kind(&self) -> SourceKind {
        SourceKind::Shojo
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn listing_url(&self, page: u32) -> String {
        format!("{}page/{}/", BASE_URL, page)
    }

    fn full_crawl_pages(&self) -> Option<u32> {
        Some(FULL_CRAWL_PAGES)
    }

    fn extract_listing(&self, document: &Html) -> Vec<ListingEntry> {
        html::parse_items(document, "div.bs.styletere.stylefiv", Self::parse_listing_item)
    }

    fn extract_detail(
        &self,
        document: &Html,
        url: &str,
        hinted_title: Option<&str>,
    ) -> Result<TitleRecord> {
        let table = html::select_first(document, ".infotable")
            .ok_or_else(|| Error::parse(url, "info table not found"))?;
        let rows = html::find_all(table, "tr");

        let title = resolve_title(
            hinted_title,
            [html::select_text(document, ".entry-title")],
        );
        let mut record = TitleRecord::new(title, url);

        if let Some(author) = Self::info_cell(&rows, AUTHOR_ROW)
            .map(html::text_of)
            .filter(|a| !a.is_empty())
        {
            record.author = author;
        }

        record.alternatives = Self::info_cell(&rows, ALT_ROW)
            .map(|cell| split_names(&html::text_of(cell), ','))
            .unwrap_or_default();

        record.updated = Self::info_cell(&rows, UPDATED_ROW)
            .and_then(|cell| html::find(cell, "time[datetime]"))
            .and_then(|time| time.value().attr("datetime"))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        record.genres = html::select_first(
            document,
            ".seriestugenre, .manga-tags, .seriestumeta .genres",
        )
        .map(|container| {
            clean_genres(
                html::find_all(container, "a, span")
                    .into_iter()
                    .map(html::text_of),
            )
        })
        .unwrap_or_default();

        if let Some(cover) = html::select_first(document, ".thumb img")
            .and_then(|img| html::first_attr(img, &IMAGE_ATTRS))
        {
            record.cover_image_url = html::resolve_url(BASE_URL, &cover);
        }

        Ok(record)
    }

    fn extract_chapter_list(&self, document: &Html) -> Vec<Chapter> {
        let Some(list) = html::select_first(document, "#chapterlist") else {
            return Vec::new();
        };

        let mut chapters: Vec<Chapter> = html::find_all(list, "ul.clstyle li, li[data-num]")
            .into_iter()
            .filter_map(Self::parse_chapter)
            .collect();
        // Newest first on the page
        chapters.reverse();
        chapters
    }

    fn extract_chapter_images(&self, document: &Html) -> Vec<String> {
        let Some(reader) = html::select_first(document, "#readerarea") else {
            return Vec::new();
        };

        // Images live in the reader's first wrapper; fall back to any img in the reader
        let mut candidates: Vec<ElementRef> = html::child_elements(reader)
            .first()
            .map(|wrapper| html::find_all(*wrapper, "img"))
            .unwrap_or_default();
        if candidates.is_empty() {
            candidates = html::find_all(reader, "img");
        }

        candidates
            .into_iter()
            .filter_map(image_source)
            .filter(|src| !is_decorative_image(src))
            .map(|src| html::resolve_url(BASE_URL, &src))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="listupd">
            <div class="bs styletere stylefiv">
                <div class="bsx">
                    <a href="https://kingofshojo.com/manga/ocean-king/" title="Ocean King">
                        <img src="https://kingofshojo.com/covers/ocean.jpg">
                        <div class="tt"> Ocean King </div>
                    </a>
                </div>
            </div>
            <div class="bs styletere stylefiv">
                <div class="bsx">
                    <a href="/manga/quiet-garden/">
                        <img data-src="/covers/garden.jpg">
                    </a>
                </div>
            </div>
            <div class="bs other"><a href="/manga/ignored/">Ignored</a></div>
        </div>
    "#;

    const DETAIL: &str = r#"
        <h1 class="entry-title">Ocean King</h1>
        <div class="thumb"><img src="https://kingofshojo.com/covers/ocean.jpg"></div>
        <table class="infotable"><tbody>
            <tr><td>Alternative</td><td>Sea Monarch, Lord of Tides ,</td></tr>
            <tr><td>Status</td><td>Ongoing</td></tr>
            <tr><td>Type</td><td>Manhwa</td></tr>
            <tr><td>Released</td><td>2021</td></tr>
            <tr><td>Author</td><td> Han Ji </td></tr>
            <tr><td>Artist</td><td>Kim</td></tr>
            <tr><td>Serialization</td><td>-</td></tr>
            <tr><td>Posted By</td><td>admin</td></tr>
            <tr><td>Updated On</td><td><time datetime="2024-05-01T10:00:00+00:00">May 1</time></td></tr>
        </tbody></table>
        <div class="seriestugenre"><a>Action</a><a>Fantasy</a><a>Action</a></div>
        <div id="chapterlist"><ul class="clstyle">
            <li data-num="2"><div class="chbox"><div class="eph-num">
                <a href="/ocean-king-chapter-2/"><span class="chapternum">Chapter 2</span></a>
            </div></div></li>
            <li data-num="1"><div class="chbox"><div class="eph-num">
                <a href="/ocean-king-chapter-1/"></a>
            </div></div></li>
        </ul></div>
    "#;

    #[test]
    fn test_listing_entries_with_title_fallback() {
        let entries = KingOfShojo.extract_listing(&html::parse(LISTING));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Ocean King");
        assert_eq!(entries[0].url, "https://kingofshojo.com/manga/ocean-king/");
        assert_eq!(entries[1].title, "Unknown Title");
        assert_eq!(entries[1].url, "https://kingofshojo.com/manga/quiet-garden/");
        assert_eq!(
            entries[1].cover_image_url.as_deref(),
            Some("https://kingofshojo.com/covers/garden.jpg")
        );
    }

    #[test]
    fn test_detail_reads_info_table_positions() {
        let url = "https://kingofshojo.com/manga/ocean-king/";
        let record = KingOfShojo
            .extract_detail(&html::parse(DETAIL), url, None)
            .unwrap();

        assert_eq!(record.title, "Ocean King");
        assert_eq!(record.url, url);
        assert_eq!(record.author, "Han Ji");
        assert_eq!(record.alternatives, vec!["Sea Monarch", "Lord of Tides"]);
        assert_eq!(record.updated, "2024-05-01T10:00:00+00:00");
        assert_eq!(record.genres, vec!["Action", "Fantasy"]);
        assert_eq!(record.cover_image_url, "https://kingofshojo.com/covers/ocean.jpg");
    }

    #[test]
    fn test_detail_prefers_hint_and_requires_info_table() {
        let doc = html::parse(DETAIL);
        let record = KingOfShojo
            .extract_detail(&doc, "https://kingofshojo.com/x/", Some("Hinted"))
            .unwrap();
        assert_eq!(record.title, "Hinted");

        let bare = html::parse(r#"<h1 class="entry-title">Orphan</h1>"#);
        let err = KingOfShojo
            .extract_detail(&bare, "https://kingofshojo.com/orphan/", None)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_chapters_oldest_first() {
        let chapters = KingOfShojo.extract_chapter_list(&html::parse(DETAIL));
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 1");
        assert_eq!(chapters[0].url, "https://kingofshojo.com/ocean-king-chapter-1/");
        assert_eq!(chapters[1].title, "Chapter 2");
    }

    #[test]
    fn test_chapter_title_ignores_spans_outside_link() {
        let doc = html::parse(
            r#"<div id="chapterlist"><ul class="clstyle">
                <li data-num="7"><div class="chbox"><div class="eph-num">
                    <a href="/ocean-king-chapter-7/"></a>
                    <span class="chapterdate">May 1, 2024</span>
                </div></div></li>
            </ul></div>"#,
        );
        let chapters = KingOfShojo.extract_chapter_list(&doc);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Chapter 7");
        assert_eq!(chapters[0].url, "https://kingofshojo.com/ocean-king-chapter-7/");
    }

    #[test]
    fn test_chapter_images_skip_inline_and_decorative() {
        let doc = html::parse(
            r#"<div id="readerarea"><p>
                <img src="data:image/gif;base64,AAAA" data-lazy-src="/pages/01.jpg">
                <img src="data:image/gif;base64,AAAA">
                <img src="https://cdn.test/pages/02.jpg">
                <img src="https://cdn.test/site-logo.png">
            </p></div>"#,
        );
        let images = KingOfShojo.extract_chapter_images(&doc);
        assert_eq!(
            images,
            vec![
                "https://kingofshojo.com/pages/01.jpg",
                "https://cdn.test/pages/02.jpg"
            ]
        );
    }

    #[test]
    fn test_listing_url() {
        assert_eq!(KingOfShojo.listing_url(3), "https://kingofshojo.com/page/3/");
        assert_eq!(KingOfShojo.full_crawl_pages(), Some(98));
    }
}
