//! The stylesheet injected into every rewritten content document.

/// Right-to-left stylesheet for documents exported from a word processor.
///
/// Sets right-to-left direction with slightly tightened letter spacing on
/// every element, centers titles and headings, justifies paragraphs without
/// hyphenation, centers images within the viewport, and breaks pages before
/// top-level headings and after horizontal rules.
pub const RTL_STYLESHEET: &str = "
* { direction: rtl; -epub-text-align-last: right; letter-spacing: -0.03rem; }
.title, .subtitle, h1, h2, h3 { text-align: center; }
.title, h1 { font-size: 1.8em; page-break-before: always; }
.subtitle, h2 { font-size: 1.4em; }
h3 { font-size: 1.2em; }
h1, h2, h3, p { margin: 0 0 0.2em; }
p { text-align: justify; -epub-hyphens: none; }
img { display: block; max-width: 100%; max-height: 100%; margin: 0 auto; }
hr { page-break-after: always; }
";

/// Append a complete `<style>` element holding `css` to `out`.
pub fn write_style_element(out: &mut String, css: &str) {
    out.reserve(css.len() + 15);
    out.push_str("<style>");
    out.push_str(css);
    out.push_str("</style>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_forces_rtl() {
        assert!(RTL_STYLESHEET.contains("direction: rtl"));
        assert!(RTL_STYLESHEET.contains("page-break-before: always"));
        assert!(!RTL_STYLESHEET.contains('<'));
    }

    #[test]
    fn test_write_style_element() {
        let mut out = String::from("<head>");
        write_style_element(&mut out, "p{}");
        assert_eq!(out, "<head><style>p{}</style>");
    }
}
