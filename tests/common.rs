//! Common test utilities and fixtures
//!
//! A scripted transport and small HTML fixtures for every source, shared by
//! the pipeline tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hondana::Error;
use hondana::config::{BatchConfig, FetchConfig};
use hondana::net::{FetchedDocument, HttpClient, Transport};
use hondana::prelude::*;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, REFERER};

pub const SHOJO_DETAIL: &str = "https://kingofshojo.com/manga/ocean-king/";
pub const TOONGOD_DETAIL: &str = "https://manhwa18.net/manga/night-shift";
pub const MANGA_GARDEN: &str = "https://www.mangakakalot.gg/manga/quiet-garden";
pub const MANGA_HARBOR: &str = "https://www.mangakakalot.gg/manga/harbor-lights";
/// Listed on the manga listing page but never served.
pub const MANGA_MISSING: &str = "https://www.mangakakalot.gg/manga/lost-signal";

/// Serves fixed pages and answers 404 for anything else.
#[derive(Default)]
pub struct SiteTransport {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

#[allow(dead_code)]
impl SiteTransport {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Mutex::new(pages),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.pages.lock().insert(url.to_string(), body.to_string());
    }

    /// Requested URLs in order.
    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    /// The referer sent with the first request for `url`.
    pub fn referer_for(&self, url: &str) -> Option<String> {
        self.requests
            .lock()
            .iter()
            .find(|(requested, _)| requested == url)
            .and_then(|(_, referer)| referer.clone())
    }
}

#[async_trait]
impl Transport for SiteTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        _timeout: Duration,
    ) -> hondana::Result<FetchedDocument> {
        let referer = headers
            .get(REFERER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        self.requests.lock().push((url.to_string(), referer));

        self.pages
            .lock()
            .get(url)
            .map(|body| FetchedDocument {
                url: url.to_string(),
                status: 200,
                body: body.clone(),
            })
            .ok_or(Error::Status { status: 404 })
    }
}

/// An orchestrator that never sleeps and tries every URL once.
pub fn orchestrator(transport: Arc<SiteTransport>) -> BatchOrchestrator {
    let fetch = FetchConfig {
        max_attempts: 1,
        base_delay_ms: 0,
        ..FetchConfig::default()
    };
    let batch = BatchConfig {
        chunk_size: 2,
        chunk_pause_ms: 0,
        page_pause_ms: 0,
    };
    BatchOrchestrator::new(HttpClient::with_transport(transport, &fetch), batch)
}

/// Page 1 of every source plus the detail pages it links to.
pub fn site() -> HashMap<String, String> {
    HashMap::from([
        (SourceKind::Shojo.extractor().listing_url(1), SHOJO_LISTING.to_string()),
        (SHOJO_DETAIL.to_string(), SHOJO_DETAIL_PAGE.to_string()),
        (SourceKind::ToonGod.extractor().listing_url(1), TOONGOD_LISTING.to_string()),
        (TOONGOD_DETAIL.to_string(), TOONGOD_DETAIL_PAGE.to_string()),
        (SourceKind::Manga.extractor().listing_url(1), MANGA_LISTING.to_string()),
        (MANGA_GARDEN.to_string(), MANGA_GARDEN_PAGE.to_string()),
        (MANGA_HARBOR.to_string(), MANGA_HARBOR_PAGE.to_string()),
    ])
}

pub const SHOJO_LISTING: &str = r#"
    <div class="listupd">
        <div class="bs styletere stylefiv"><div class="bsx">
            <a href="https://kingofshojo.com/manga/ocean-king/" title="Ocean King">
                <img src="https://kingofshojo.com/covers/ocean.jpg">
            </a>
        </div></div>
    </div>
"#;

pub const SHOJO_DETAIL_PAGE: &str = r#"
    <h1 class="entry-title">Ocean King</h1>
    <table class="infotable"><tbody>
        <tr><td>Alternative</td><td>Sea Monarch</td></tr>
        <tr><td>Status</td><td>Ongoing</td></tr>
        <tr><td>Type</td><td>Manhwa</td></tr>
        <tr><td>Released</td><td>2021</td></tr>
        <tr><td>Author</td><td>Han Ji</td></tr>
        <tr><td>Artist</td><td>Kim</td></tr>
        <tr><td>Serialization</td><td>-</td></tr>
        <tr><td>Posted By</td><td>admin</td></tr>
        <tr><td>Updated On</td><td><time datetime="2024-05-01">May 1</time></td></tr>
    </tbody></table>
    <div class="seriestugenre"><a>Action</a><a>Fantasy</a></div>
    <div id="chapterlist"><ul class="clstyle">
        <li data-num="2"><a href="https://kingofshojo.com/ocean-king-chapter-2/"><span class="chapternum">Chapter 2</span></a></li>
        <li data-num="1"><a href="https://kingofshojo.com/ocean-king-chapter-1/"><span class="chapternum">Chapter 1</span></a></li>
    </ul></div>
"#;

pub const TOONGOD_LISTING: &str = r#"
    <div class="thumb-item-flow">
        <div class="thumb-wrapper"><a href="https://manhwa18.net/manga/night-shift" title="Night Shift">
            <div class="img-in-ratio" data-bg="https://manhwa18.net/covers/night.jpg"></div>
        </a></div>
    </div>
"#;

pub const TOONGOD_DETAIL_PAGE: &str = r#"
    <span class="series-name"><a href="https://manhwa18.net/manga/night-shift">Night Shift</a></span>
    <div class="genres-content"><a href="https://manhwa18.net/genre/drama">Drama</a></div>
"#;

pub const MANGA_LISTING: &str = r#"
    <div class="list-comic-item-wrap"><a href="https://www.mangakakalot.gg/manga/quiet-garden" title="Quiet Garden"><img src="/covers/garden.jpg"></a></div>
    <div class="list-comic-item-wrap"><a href="https://www.mangakakalot.gg/manga/harbor-lights" title="Harbor Lights"><img src="/covers/harbor.jpg"></a></div>
    <div class="list-comic-item-wrap"><a href="https://www.mangakakalot.gg/manga/lost-signal" title="Lost Signal"><img src="/covers/lost.jpg"></a></div>
"#;

pub const MANGA_GARDEN_PAGE: &str = r##"
    <ul class="manga-info-text">
        <li><h1>Quiet Garden</h1><h2>Alternative : Still Garden</h2></li>
        <li>Author(s) : Mori Aki</li>
        <li>Status : Ongoing</li>
        <li>Last updated : Jan-05-2025</li>
        <li>TransGroup : -</li>
        <li>View : 10</li>
        <li>Genres : <a href="#">Slice of Life</a></li>
    </ul>
"##;

pub const MANGA_HARBOR_PAGE: &str = r#"
    <ul class="manga-info-text">
        <li><h1>Harbor Lights</h1></li>
        <li>Author(s) : Sato Ren</li>
    </ul>
"#;
