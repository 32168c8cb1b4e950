//! Content transforms for right-to-left conversion
//!
//! - Tag: lossless markup tokenizing
//! - CSS: the injected RTL stylesheet
//! - HTML: the per-document rewrite rules

pub mod css;
pub mod html;
pub mod tag;
