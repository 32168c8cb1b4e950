//! Right-to-left rewriting of HTML/XHTML content documents
//!
//! Applies, in a single tokenizer pass:
//! - Removal of editor styling attributes (`class`, `dir`, `alt`, `title`, `style`)
//! - Removal of bare `<span>` wrappers left behind by the attribute removal
//! - Removal of empty paragraphs
//! - Replacement of the document stylesheet with [`RTL_STYLESHEET`]
//! - `dir="rtl"` on the root `<html>` element
//!
//! The pass is total: malformed markup is copied through unchanged.

use std::borrow::Cow;

use super::css::{RTL_STYLESHEET, write_style_element};
use super::tag::{Tag, TagKind, Token, Tokenizer};

/// Attributes removed from every tag.
const STRIPPED_ATTRIBUTES: &[&str] = &["class", "dir", "alt", "title", "style"];

/// Attribute added to the root element.
const ROOT_DIRECTION: &str = r#"dir="rtl""#;

fn is_stripped(name: &str) -> bool {
    STRIPPED_ATTRIBUTES
        .iter()
        .any(|attr| name.eq_ignore_ascii_case(attr))
}

/// Rewrites content documents for right-to-left rendering.
///
/// # Example
///
/// ```
/// use rtl_epub::MarkupRewriter;
///
/// let rewriter = MarkupRewriter::new().with_stylesheet("p { margin: 0; }");
/// let html = rewriter.rewrite(r#"<html><head><style>.c1{}</style></head><body><p class="c1">שלום</p><p></p></body></html>"#);
/// assert_eq!(
///     html,
///     r#"<html dir="rtl"><head><style>p { margin: 0; }</style></head><body><p>שלום</p></body></html>"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRewriter {
    stylesheet: Cow<'static, str>,
    inject_missing_style: bool,
}

impl Default for MarkupRewriter {
    fn default() -> Self {
        Self {
            stylesheet: Cow::Borrowed(RTL_STYLESHEET),
            inject_missing_style: true,
        }
    }
}

impl MarkupRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the injected stylesheet.
    pub fn with_stylesheet(mut self, css: impl Into<Cow<'static, str>>) -> Self {
        self.stylesheet = css.into();
        self
    }

    /// Whether documents without a `<style>` element get one inserted before
    /// `</head>`. Enabled by default.
    pub fn with_style_injection(mut self, enabled: bool) -> Self {
        self.inject_missing_style = enabled;
        self
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn injects_missing_style(&self) -> bool {
        self.inject_missing_style
    }

    /// Rewrite one document. Never fails; rules that find nothing to change
    /// leave the text as is.
    pub fn rewrite(&self, html: &str) -> String {
        RewritePass::new(self, html.len()).run(html)
    }
}

/// Rewrite `html` with the default [`MarkupRewriter`].
pub fn rewrite_html(html: &str) -> String {
    MarkupRewriter::default().rewrite(html)
}

/// An open `<p>` whose removal is still undecided.
struct OpenParagraph {
    /// Output offset of the start tag.
    start: usize,
    /// No attributes survived and nothing but whitespace has been written since.
    empty: bool,
}

struct RewritePass<'r> {
    rewriter: &'r MarkupRewriter,
    out: String,
    paragraphs: Vec<OpenParagraph>,
    /// One entry per open `<span>`; `true` when its start tag was dropped.
    spans: Vec<bool>,
    style_written: bool,
    /// Inside a `<style>` element being replaced.
    in_style: bool,
    root_patched: bool,
}

impl<'r> RewritePass<'r> {
    fn new(rewriter: &'r MarkupRewriter, capacity: usize) -> Self {
        Self {
            rewriter,
            out: String::with_capacity(capacity + rewriter.stylesheet.len()),
            paragraphs: Vec::new(),
            spans: Vec::new(),
            style_written: false,
            in_style: false,
            root_patched: false,
        }
    }

    fn run(mut self, html: &str) -> String {
        for token in Tokenizer::new(html) {
            if self.in_style {
                if let Token::Tag(tag) = &token
                    && tag.kind() == TagKind::Close
                    && tag.is("style")
                {
                    self.in_style = false;
                }
                continue;
            }

            match token {
                Token::Text(text) => {
                    if !text.chars().all(char::is_whitespace) {
                        self.mark_content();
                    }
                    self.out.push_str(text);
                }
                Token::Opaque(raw) => {
                    self.mark_content();
                    self.out.push_str(raw);
                }
                Token::Tag(tag) => self.tag(&tag),
            }
        }
        self.out
    }

    fn tag(&mut self, tag: &Tag<'_>) {
        let bare = !tag.has_attributes_except(is_stripped);

        match tag.kind() {
            // Without an end tag there is no element to replace; the start
            // tag and its body pass through.
            TagKind::Open if tag.is_unclosed() => {}
            TagKind::Open | TagKind::SelfClosing if tag.is("style") => {
                self.in_style = tag.kind() == TagKind::Open;
                if !self.style_written {
                    self.mark_content();
                    self.write_stylesheet();
                }
                return;
            }
            TagKind::Open if tag.is("span") => {
                self.spans.push(bare);
                if bare {
                    return;
                }
            }
            TagKind::SelfClosing if tag.is("span") && bare => return,
            TagKind::Close if tag.is("span") => {
                // Unbalanced end tags go too.
                if self.spans.pop().unwrap_or(true) {
                    return;
                }
            }
            TagKind::Open if tag.is("p") => {
                self.paragraphs.push(OpenParagraph {
                    start: self.out.len(),
                    empty: bare,
                });
                tag.write_filtered(&mut self.out, is_stripped, None);
                return;
            }
            TagKind::SelfClosing if tag.is("p") && bare => return,
            TagKind::Close if tag.is("p") => {
                if let Some(paragraph) = self.paragraphs.pop()
                    && paragraph.empty
                {
                    self.out.truncate(paragraph.start);
                    return;
                }
            }
            _ => {}
        }

        self.mark_content();

        if !self.root_patched && tag.is("html") && tag.kind() != TagKind::Close {
            self.root_patched = true;
            tag.write_filtered(&mut self.out, is_stripped, Some(ROOT_DIRECTION));
            return;
        }

        if tag.kind() == TagKind::Close
            && tag.is("head")
            && !self.style_written
            && self.rewriter.inject_missing_style
        {
            self.write_stylesheet();
        }

        tag.write_filtered(&mut self.out, is_stripped, None);
    }

    /// Something other than whitespace landed inside the innermost paragraph.
    fn mark_content(&mut self) {
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.empty = false;
        }
    }

    fn write_stylesheet(&mut self) {
        write_style_element(&mut self.out, &self.rewriter.stylesheet);
        self.style_written = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rewrite_without_css(html: &str) -> String {
        MarkupRewriter::new()
            .with_stylesheet("")
            .with_style_injection(false)
            .rewrite(html)
    }

    #[test]
    fn test_strips_editor_attributes() {
        let html = r#"<body><p class="c1" dir="ltr" style="color: red">a</p><img alt="x" title="y" src="i.png"/></body>"#;
        assert_eq!(
            rewrite_without_css(html),
            r#"<body><p>a</p><img src="i.png"/></body>"#
        );
    }

    #[test]
    fn test_keeps_unrelated_attributes() {
        let html = r#"<a href="ch2.xhtml#h.1" id="x" class="c3">link</a>"#;
        assert_eq!(
            rewrite_without_css(html),
            r#"<a href="ch2.xhtml#h.1" id="x">link</a>"#
        );
    }

    #[test]
    fn test_attribute_text_outside_tags_untouched() {
        let html = r#"<p>write class="x" in code</p>"#;
        assert_eq!(rewrite_without_css(html), html);
    }

    #[test]
    fn test_removes_empty_paragraphs() {
        let html = "<body><p>a</p><p></p><p> \n\t</p><p class=\"c2\"></p><p/></body>";
        assert_eq!(rewrite_without_css(html), "<body><p>a</p></body>");
    }

    #[test]
    fn test_nbsp_only_paragraph_is_empty() {
        assert_eq!(rewrite_without_css("<p>\u{a0}</p>x"), "x");
    }

    #[test]
    fn test_keeps_paragraph_with_id() {
        let html = r#"<p id="anchor"></p>"#;
        assert_eq!(rewrite_without_css(html), html);
    }

    #[test]
    fn test_paragraph_with_child_element_kept() {
        let html = "<p><br/></p>";
        assert_eq!(rewrite_without_css(html), html);
    }

    #[test]
    fn test_nested_empty_paragraphs_collapse() {
        assert_eq!(rewrite_without_css("a<p> <p></p> </p>b"), "ab");
    }

    #[test]
    fn test_removes_bare_spans() {
        let html = r#"<p><span class="c4">Hello</span> <span style="x">world</span></p>"#;
        assert_eq!(rewrite_without_css(html), "<p>Hello world</p>");
    }

    #[test]
    fn test_keeps_attributed_span_balanced() {
        let html = r#"<p><span id="n1"><span class="c">x</span></span></p>"#;
        assert_eq!(
            rewrite_without_css(html),
            r#"<p><span id="n1">x</span></p>"#
        );
    }

    #[test]
    fn test_paragraph_of_empty_spans_removed() {
        assert_eq!(
            rewrite_without_css(r#"<p class="c0"><span class="c1"></span></p>"#),
            ""
        );
    }

    #[test]
    fn test_replaces_style_block() {
        let rewriter = MarkupRewriter::new().with_stylesheet("p{}");
        let html = r#"<head><style type="text/css">.c1 { color: #000 } p > span {}</style></head>"#;
        assert_eq!(rewriter.rewrite(html), "<head><style>p{}</style></head>");
    }

    #[test]
    fn test_later_style_blocks_removed() {
        let rewriter = MarkupRewriter::new().with_stylesheet("p{}");
        let html = "<head><style>a</style><style>b</style></head>";
        assert_eq!(rewriter.rewrite(html), "<head><style>p{}</style></head>");
    }

    #[test]
    fn test_unclosed_style_keeps_rest_of_document() {
        let html = "<html><head><style>.c1{}</head><body><p>Important text</p></body></html>";
        assert_eq!(
            rewrite_html(html),
            r#"<html dir="rtl"><head><style>.c1{}</head><body><p>Important text</p></body></html>"#
        );
    }

    #[test]
    fn test_injects_style_when_missing() {
        let rewriter = MarkupRewriter::new().with_stylesheet("p{}");
        assert_eq!(
            rewriter.rewrite("<head><title>t</title></head>"),
            "<head><title>t</title><style>p{}</style></head>"
        );
    }

    #[test]
    fn test_builder_settings() {
        let rewriter = MarkupRewriter::new();
        assert_eq!(rewriter.stylesheet(), RTL_STYLESHEET);
        assert!(rewriter.injects_missing_style());

        let custom = rewriter.with_stylesheet("p{}").with_style_injection(false);
        assert_eq!(custom.stylesheet(), "p{}");
        assert!(!custom.injects_missing_style());
    }

    #[test]
    fn test_no_injection_when_disabled() {
        let rewriter = MarkupRewriter::new().with_style_injection(false);
        let html = "<head><title>t</title></head>";
        assert_eq!(rewriter.rewrite(html), html);
    }

    #[test]
    fn test_no_head_no_injection() {
        let html = "<p>x</p>";
        assert_eq!(rewrite_html(html), html);
    }

    #[test]
    fn test_adds_dir_to_root() {
        let html = r#"<?xml version="1.0" encoding="UTF-8"?><html xmlns="http://www.w3.org/1999/xhtml" dir="ltr"><body/></html>"#;
        assert_eq!(
            rewrite_without_css(html),
            r#"<?xml version="1.0" encoding="UTF-8"?><html xmlns="http://www.w3.org/1999/xhtml" dir="rtl"><body/></html>"#
        );
    }

    #[test]
    fn test_only_first_root_patched() {
        assert_eq!(
            rewrite_without_css("<html></html><html></html>"),
            r#"<html dir="rtl"></html><html></html>"#
        );
    }

    #[test]
    fn test_comments_untouched() {
        let html = r#"<!-- <p class="x"></p> --><p>a</p>"#;
        assert_eq!(rewrite_without_css(html), html);
    }

    #[test]
    fn test_google_docs_document() {
        let html = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><meta content="text/html; charset=UTF-8" http-equiv="content-type"/>"#,
            r#"<style type="text/css">.c0{direction:ltr}.c2{font-size:11pt}</style></head>"#,
            r#"<body class="c3 doc-content"><p class="c0 title" id="h.1"><span class="c2">כותרת</span></p>"#,
            r#"<p class="c0"><span class="c2"></span></p><p class="c0"><span class="c2">טקסט</span></p></body></html>"#,
        );

        let rewritten = rewrite_html(html);

        assert!(rewritten.contains(r#"<html xmlns="http://www.w3.org/1999/xhtml" dir="rtl">"#));
        assert!(rewritten.contains(&format!("<style>{RTL_STYLESHEET}</style>")));
        assert!(rewritten.contains(r#"<body><p id="h.1">כותרת</p><p>טקסט</p></body>"#));
        assert!(!rewritten.contains("class="));
        assert!(!rewritten.contains("<span"));
    }

    #[test]
    fn test_google_docs_export_document() {
        let html = r#"<html><body><p class="x">Hi</p><p></p></body></html>"#;
        assert_eq!(
            rewrite_html(html),
            r#"<html dir="rtl"><body><p>Hi</p></body></html>"#
        );
    }

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "<html>",
            r#"<html lang="he" dir="ltr">"#,
            "</html>",
            "<head>",
            "</head>",
            r#"<style type="text/css">.c1{color:red}</style>"#,
            "<style>.c5{}",
            "<body>",
            "</body>",
            "<p>",
            r#"<p class="c1">"#,
            r#"<p id="a" style="x">"#,
            "</p>",
            "<p/>",
            "<span>",
            r#"<span class="c2">"#,
            r#"<span lang="ar">"#,
            "</span>",
            r#"<img alt="a" title="t" src="i.png"/>"#,
            r#"<a href="x.xhtml" class="c3">"#,
            "</a>",
            "<br/>",
            "<!-- note -->",
            "שלום",
            "text",
            " ",
            "\n",
        ])
    }

    fn document() -> impl Strategy<Value = String> {
        prop::collection::vec(fragment(), 0..40).prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(html in document()) {
            let once = rewrite_html(&html);
            let twice = rewrite_html(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_no_stripped_attribute_survives(html in document()) {
            let rewritten = rewrite_html(&html);
            let mut root_dirs = 0;
            for token in Tokenizer::new(&rewritten) {
                if let Token::Tag(tag) = token {
                    for name in tag.attribute_names() {
                        if name == "dir" && tag.is("html") {
                            root_dirs += 1;
                            continue;
                        }
                        prop_assert!(!is_stripped(name), "{} survived in {}", name, tag.raw());
                    }
                }
            }
            prop_assert!(root_dirs <= 1);
        }

        #[test]
        fn prop_style_block_is_sole_stylesheet(before in document(), after in document()) {
            // A start tag with no end tag after it is not a stylesheet.
            let after = after.replace("<style>.c5{}", "");
            let html = format!("{before}<style>.c9{{}}</style>{after}");
            let rewritten = rewrite_html(&html);
            prop_assert_eq!(rewritten.matches("<style").count(), 1);
            let block = format!("<style>{}</style>", RTL_STYLESHEET);
            prop_assert!(rewritten.contains(&block));
        }
    }
}
