//! Extractor implementations, one per [`SourceKind`](crate::source::SourceKind).
//!
//! # Available Sources
//!
//! - [`KingOfShojo`] - kingofshojo.com, a WordPress manga theme with an info table
//! - [`Manhwa18`] - manhwa18.net, lazy-loaded covers and script-embedded chapter images
//! - [`MangaKakalot`] - mangakakalot.gg, positional detail markup and discoverable pagination
//!
//! All three are unit structs; obtain them through
//! [`SourceKind::extractor`](crate::source::SourceKind::extractor).

pub mod kingofshojo;
pub mod mangakakalot;
pub mod manhwa18;

pub use kingofshojo::KingOfShojo;
pub use mangakakalot::MangaKakalot;
pub use manhwa18::Manhwa18;
