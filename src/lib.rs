//! # rtl-epub
//!
//! Converts EPUB ebooks exported from a word processor into a right-to-left
//! reading layout for scripts such as Hebrew and Arabic.
//!
//! ## What a conversion does
//!
//! - Rewrites every `.html`/`.xhtml` content document: strips the editor's
//!   styling attributes, drops empty paragraphs and bare `<span>` wrappers,
//!   swaps the document stylesheet for an RTL one and sets `dir="rtl"` on the
//!   root element
//! - Sets `page-progression-direction="rtl"` on the package spine and marks a
//!   lone image as the cover
//! - Repackages everything else byte-for-byte
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use rtl_epub::{convert, ConvertOptions};
//!
//! let written = convert(
//!     Path::new("book.epub"),
//!     Some(Path::new("book-rtl.epub")),
//!     &ConvertOptions::default(),
//! )?;
//! println!("Output saved to {}", written.display());
//! # Ok::<(), rtl_epub::Error>(())
//! ```
//!
//! The two transforms are also usable on their own:
//!
//! ```
//! use rtl_epub::rewrite_html;
//!
//! let html = rewrite_html(r#"<html><body><p class="c1">שלום</p><p></p></body></html>"#);
//! assert_eq!(html, r#"<html dir="rtl"><body><p>שלום</p></body></html>"#);
//! ```

pub mod convert;
pub mod epub;
pub mod error;
pub mod transform;

pub use convert::{ConvertOptions, DEFAULT_MANIFEST_PATH, convert};
pub use epub::patch_manifest;
pub use error::{Error, Result};
pub use transform::css::RTL_STYLESHEET;
pub use transform::html::{MarkupRewriter, rewrite_html};
