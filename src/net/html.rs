//! HTML parsing utilities for source extractors.
//!
//! Thin wrappers over the `scraper` crate for CSS selector-based extraction,
//! plus the URL and attribute fallbacks every source needs: lazy-load image
//! attributes, CSS `background-image` URLs and relative URL resolution.
//!
//! # Examples
//!
//! ```rust
//! use hondana::net::html;
//!
//! let document = html::parse(r#"
//!     <div class="info">
//!         <h1 class="title">Ocean King</h1>
//!         <img data-src="/covers/ocean.jpg">
//!     </div>
//! "#);
//! let title = html::select_text(&document, ".title").unwrap();
//! assert_eq!(title, "Ocean King");
//! ```

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Attributes that may carry an image URL, in lookup order.
pub const IMAGE_ATTRS: [&str; 4] = ["src", "data-src", "data-lazy-src", "data-original"];

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(['"]?([^'")]+)['"]?\)"#).expect("valid css url regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Parses an HTML document from a string.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Extracts text content from the first element matching a CSS selector.
///
/// Returns `None` if nothing matches or the selector is invalid.
///
/// ```rust
/// use hondana::net::html;
///
/// let document = html::parse(r#"<h1 class="title"> Ocean King </h1>"#);
/// assert_eq!(html::select_text(&document, ".title"), Some("Ocean King".to_string()));
/// ```
pub fn select_text(html: &Html, selector: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    })
}

/// Extracts an attribute value from the first element matching a CSS selector.
pub fn select_attr(html: &Html, selector: &str, attr: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr).map(String::from))
    })
}

/// Returns the first element matching a CSS selector.
pub fn select_first<'a>(html: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| html.select(&sel).next())
}

/// Returns every element matching a CSS selector.
pub fn select_all<'a>(html: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .map(|sel| html.select(&sel).collect())
        .unwrap_or_default()
}

/// Returns the first descendant of `element` matching a CSS selector.
pub fn find<'a>(element: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| element.select(&sel).next())
}

/// Returns every descendant of `element` matching a CSS selector.
pub fn find_all<'a>(element: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .map(|sel| element.select(&sel).collect())
        .unwrap_or_default()
}

/// Direct element children of `element`, skipping text nodes.
pub fn child_elements(element: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap).collect()
}

/// Text content with runs of whitespace collapsed to one space.
pub fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapses whitespace runs to a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// The first non-empty value among `attrs`, in order.
///
/// ```rust
/// use hondana::net::html::{self, IMAGE_ATTRS};
///
/// let document = html::parse(r#"<img src="" data-lazy-src="/p1.jpg">"#);
/// let img = html::select_first(&document, "img").unwrap();
/// assert_eq!(html::first_attr(img, &IMAGE_ATTRS), Some("/p1.jpg".to_string()));
/// ```
pub fn first_attr(element: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    attrs.iter().find_map(|attr| {
        element
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    })
}

/// Pulls the URL out of a CSS `url(...)` expression, or returns the input unchanged.
pub fn css_url(value: &str) -> String {
    CSS_URL
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Resolves `href` against `base`, leaving absolute URLs untouched.
///
/// ```rust
/// use hondana::net::html::resolve_url;
///
/// assert_eq!(
///     resolve_url("https://example.com/", "/manga/ocean-king"),
///     "https://example.com/manga/ocean-king"
/// );
/// assert_eq!(resolve_url("https://example.com/", "https://cdn.test/a.jpg"), "https://cdn.test/a.jpg");
/// ```
pub fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Scheme and host of a URL (`https://host`), used as a referer.
pub fn origin_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .filter(|origin| origin != "null")
}

/// Parses repeated items from a document in parallel using rayon.
///
/// Each element matching `selector` is serialized and re-parsed as a
/// fragment so the work can move across threads; `parser` receives the
/// item element itself. Items for which `parser` returns `None` are
/// dropped, and document order is preserved.
pub fn parse_items<T, F>(html: &Html, selector: &str, parser: F) -> Vec<T>
where
    T: Send,
    F: Fn(ElementRef) -> Option<T> + Sync,
{
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            // ElementRef is not Send; hand rayon owned HTML strings instead
            let elements: Vec<String> = html.select(&sel).map(|el| el.html()).collect();

            elements
                .into_par_iter()
                .filter_map(|html_str| {
                    let doc = Html::parse_fragment(&html_str);
                    let item = doc
                        .root_element()
                        .children()
                        .find_map(ElementRef::wrap)?;
                    parser(item)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attr_skips_empty_values() {
        let doc = parse(r#"<img src=" " data-src="a.jpg" data-original="b.jpg">"#);
        let img = select_first(&doc, "img").unwrap();
        assert_eq!(first_attr(img, &IMAGE_ATTRS), Some("a.jpg".to_string()));
    }

    #[test]
    fn test_css_url_extraction() {
        assert_eq!(
            css_url("background-image: url('https://cdn.test/c.jpg')"),
            "https://cdn.test/c.jpg"
        );
        assert_eq!(css_url("url(/c.png)"), "/c.png");
        assert_eq!(css_url("plain.jpg"), "plain.jpg");
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://manhwa18.net/manga/x"),
            Some("https://manhwa18.net".to_string())
        );
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn test_parse_items_preserves_order() {
        let doc = parse(
            r#"<ul>
                <li class="item"><a href="/1">One</a></li>
                <li class="item"><a href="/2">Two</a></li>
                <li class="item"><span>no link</span></li>
                <li class="item"><a href="/3">Three</a></li>
            </ul>"#,
        );
        let items = parse_items(&doc, "li.item", |el| {
            find(el, "a").and_then(|a| a.value().attr("href").map(String::from))
        });
        assert_eq!(items, vec!["/1", "/2", "/3"]);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Chapter \n\t 12  "), "Chapter 12");
    }
}
