//! Lossless markup tokenizer.
//!
//! Splits HTML/XHTML text into text runs, opaque markup (comments, CDATA
//! sections, doctypes, processing instructions) and tags. Concatenating the
//! raw slice of every token reproduces the input exactly, so a rewrite pass
//! only changes the bytes it means to change.
//!
//! Tokenizing never fails: a `<` that does not start well-formed markup is
//! returned as text.

use memchr::memmem;

/// Elements whose body is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name .../>`
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    /// Comments, CDATA, doctypes and processing instructions.
    Opaque(&'a str),
    Tag(Tag<'a>),
}

/// Byte ranges of one attribute within a tag's raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttrSpan {
    /// Start of the whitespace preceding the attribute name.
    start: usize,
    name_start: usize,
    name_end: usize,
    /// One past the end of the value (or the name, for valueless attributes).
    end: usize,
}

/// A single start, end or empty-element tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    raw: &'a str,
    name: &'a str,
    kind: TagKind,
    attrs: Vec<AttrSpan>,
    /// Offset just past the name or last attribute, before the closing `>` or `/>`.
    head_end: usize,
    /// Raw-text start tag with no matching end tag; its body runs to the end
    /// of input.
    unclosed: bool,
}

impl<'a> Tag<'a> {
    /// Parse a tag at the start of `s`. Returns `None` when `s` does not begin
    /// with a complete tag.
    pub(crate) fn parse(s: &'a str) -> Option<Self> {
        let b = s.as_bytes();
        let closing = b.get(1) == Some(&b'/');
        let mut i = if closing { 2 } else { 1 };

        if !b.get(i)?.is_ascii_alphabetic() {
            return None;
        }

        let name_start = i;
        while i < b.len() && !is_name_end(b[i]) {
            i += 1;
        }
        let name = &s[name_start..i];
        let mut head_end = i;
        let mut attrs = Vec::new();

        loop {
            let ws_start = i;
            while i < b.len() && b[i].is_ascii_whitespace() {
                i += 1;
            }

            match *b.get(i)? {
                b'>' => {
                    let kind = if closing { TagKind::Close } else { TagKind::Open };
                    return Some(Self::new(&s[..=i], name, kind, attrs, head_end));
                }
                b'/' if b.get(i + 1) == Some(&b'>') => {
                    let kind = if closing {
                        TagKind::Close
                    } else {
                        TagKind::SelfClosing
                    };
                    return Some(Self::new(&s[..i + 2], name, kind, attrs, head_end));
                }
                b'/' | b'=' => {
                    // Stray byte between attributes; kept verbatim.
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let attr_name_start = i;
            while i < b.len() && !is_name_end(b[i]) && b[i] != b'=' {
                i += 1;
            }
            let attr_name_end = i;

            let mut j = i;
            while j < b.len() && b[j].is_ascii_whitespace() {
                j += 1;
            }
            if b.get(j) == Some(&b'=') {
                j += 1;
                while j < b.len() && b[j].is_ascii_whitespace() {
                    j += 1;
                }
                let quote = *b.get(j)?;
                if quote == b'"' || quote == b'\'' {
                    let close = memchr::memchr(quote, &b[j + 1..])?;
                    i = j + 1 + close + 1;
                } else {
                    while j < b.len() && !b[j].is_ascii_whitespace() && b[j] != b'>' {
                        j += 1;
                    }
                    i = j;
                }
            }

            attrs.push(AttrSpan {
                start: ws_start,
                name_start: attr_name_start,
                name_end: attr_name_end,
                end: i,
            });
            head_end = i;
        }
    }

    fn new(
        raw: &'a str,
        name: &'a str,
        kind: TagKind,
        attrs: Vec<AttrSpan>,
        head_end: usize,
    ) -> Self {
        Self {
            raw,
            name,
            kind,
            attrs,
            head_end,
            unclosed: false,
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// Whether this is a `<style>` or `<script>` start tag that is never closed.
    pub fn is_unclosed(&self) -> bool {
        self.unclosed
    }

    /// Case-insensitive element name test.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Attribute names in document order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        let raw = self.raw;
        self.attrs
            .iter()
            .map(move |attr| &raw[attr.name_start..attr.name_end])
    }

    /// Whether any attribute survives the `drop` predicate.
    pub fn has_attributes_except(&self, drop: impl Fn(&str) -> bool) -> bool {
        self.attribute_names().any(|name| !drop(name))
    }

    /// Append this tag to `out`, omitting every attribute whose name matches
    /// `drop` (with its leading whitespace) and appending `extra` as a
    /// pre-rendered attribute after the last one. Everything else is copied
    /// byte-for-byte.
    pub fn write_filtered(
        &self,
        out: &mut String,
        drop: impl Fn(&str) -> bool,
        extra: Option<&str>,
    ) {
        let mut cursor = 0;

        for attr in &self.attrs {
            if drop(&self.raw[attr.name_start..attr.name_end]) {
                out.push_str(&self.raw[cursor..attr.start]);
                cursor = attr.end;
            }
        }

        if let Some(extra) = extra {
            out.push_str(&self.raw[cursor..self.head_end]);
            out.push(' ');
            out.push_str(extra);
            cursor = self.head_end;
        }

        out.push_str(&self.raw[cursor..]);
    }

    /// Append this tag to `out` with `name="value"` set. An existing attribute
    /// with exactly that name is rewritten where it stands; otherwise the new
    /// one goes after the last attribute. All other bytes are copied as is.
    pub fn write_with_attribute(&self, out: &mut String, name: &str, value: &str) {
        let (start, end) = self
            .attrs
            .iter()
            .find(|attr| &self.raw[attr.name_start..attr.name_end] == name)
            .map_or((self.head_end, self.head_end), |attr| {
                (attr.name_start, attr.end)
            });

        out.push_str(&self.raw[..start]);
        if start == end {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
        out.push_str(&self.raw[end..]);
    }
}

#[inline]
fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

/// Iterator over the [`Token`]s of a markup document.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after a raw-text element's start tag; its body is the next token.
    raw_text: Option<&'a str>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text: None,
        }
    }

    fn advance_to(&mut self, end: usize) -> &'a str {
        let slice = &self.input[self.pos..end];
        self.pos = end;
        slice
    }

    /// Offset of `</name` closing the current raw-text element.
    fn raw_text_end(&self, name: &str) -> Option<usize> {
        let bytes = self.input.as_bytes();
        for offset in memmem::find_iter(&bytes[self.pos..], b"</") {
            let start = self.pos + offset;
            let name_end = start + 2 + name.len();
            let Some(candidate) = bytes.get(start + 2..name_end) else {
                break;
            };
            if candidate.eq_ignore_ascii_case(name.as_bytes())
                && bytes.get(name_end).is_none_or(|&b| is_name_end(b))
            {
                return Some(start);
            }
        }
        None
    }

    /// End offset of a construct starting at `self.pos` that is terminated by
    /// `terminator`, searched from `skip` bytes in. Unterminated constructs run
    /// to the end of input.
    fn terminated_by(&self, skip: usize, terminator: &[u8]) -> usize {
        let rest = &self.input.as_bytes()[self.pos..];
        memmem::find(&rest[skip..], terminator)
            .map_or(self.input.len(), |i| self.pos + skip + i + terminator.len())
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some(name) = self.raw_text.take() {
            let end = self.raw_text_end(name).unwrap_or(self.input.len());
            if end > self.pos {
                return Some(Token::Text(self.advance_to(end)));
            }
        }

        let rest = &self.input.as_bytes()[self.pos..];

        if rest[0] != b'<' {
            let end = memchr::memchr(b'<', rest).map_or(self.input.len(), |i| self.pos + i);
            return Some(Token::Text(self.advance_to(end)));
        }

        if rest.starts_with(b"<!--") {
            let end = self.terminated_by(4, b"-->");
            return Some(Token::Opaque(self.advance_to(end)));
        }
        if rest.starts_with(b"<![CDATA[") {
            let end = self.terminated_by(9, b"]]>");
            return Some(Token::Opaque(self.advance_to(end)));
        }
        if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
            let end = self.terminated_by(2, b">");
            return Some(Token::Opaque(self.advance_to(end)));
        }

        if let Some(mut tag) = Tag::parse(&self.input[self.pos..]) {
            self.pos += tag.raw.len();
            if tag.kind == TagKind::Open && RAW_TEXT_ELEMENTS.iter().any(|n| tag.is(n)) {
                tag.unclosed = self.raw_text_end(tag.name).is_none();
                self.raw_text = Some(tag.name);
            }
            return Some(Token::Tag(tag));
        }

        // A `<` that does not begin markup is literal text.
        let end = memchr::memchr(b'<', &rest[1..]).map_or(self.input.len(), |i| self.pos + 1 + i);
        Some(Token::Text(self.advance_to(end)))
    }
}
