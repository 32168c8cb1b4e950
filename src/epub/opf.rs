//! Package document (OPF) patching.
//!
//! The document is streamed through quick-xml twice: a survey pass that
//! checks well-formedness and counts image items, then a rewrite pass that
//! copies every event verbatim except the two elements it patches.

use memchr::memmem;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::transform::tag::Tag;

const UTF8_BOM: &str = "\u{feff}";

/// Set `page-progression-direction="rtl"` on the first `<spine>` and, when
/// the manifest lists exactly one item whose `media-type` contains `image`,
/// mark that item with `properties="cover-image"`.
///
/// A manifest without a spine is patched for the cover only. Anything else in
/// the document is written back as it was read.
///
/// # Example
///
/// ```
/// use rtl_epub::patch_manifest;
///
/// let opf = r#"<package><manifest><item id="i" href="i.png" media-type="image/png"/></manifest><spine/></package>"#;
/// assert_eq!(
///     patch_manifest(opf)?,
///     r#"<package><manifest><item id="i" href="i.png" media-type="image/png" properties="cover-image"/></manifest><spine page-progression-direction="rtl"/></package>"#
/// );
/// # Ok::<(), rtl_epub::Error>(())
/// ```
pub fn patch_manifest(opf: &str) -> Result<String> {
    let (bom, body) = match opf.strip_prefix(UTF8_BOM) {
        Some(rest) => (UTF8_BOM, rest),
        None => ("", opf),
    };

    let survey = survey(body)?;
    let mut patcher = Patcher {
        spine_patched: false,
        mark_cover: survey.image_items == 1,
    };

    let mut reader = Reader::from_str(body);
    let mut writer = Writer::new(Vec::with_capacity(body.len() + 64));

    loop {
        let event = match reader.read_event().map_err(|e| malformed(&reader, e))? {
            Event::Eof => break,
            Event::Start(e) => Event::Start(patcher.element(e)?),
            Event::Empty(e) => Event::Empty(patcher.element(e)?),
            other => other,
        };
        writer.write_event(event)?;
    }

    let written = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::ManifestMalformed(e.to_string()))?;

    let mut patched = String::with_capacity(bom.len() + written.len());
    patched.push_str(bom);
    patched.push_str(&written);
    Ok(patched)
}

/// What the rewrite pass needs to know before it starts writing.
struct Survey {
    image_items: usize,
}

fn survey(body: &str) -> Result<Survey> {
    let mut reader = Reader::from_str(body);
    let mut depth = 0usize;
    let mut roots = 0usize;
    let mut image_items = 0usize;

    loop {
        match reader.read_event().map_err(|e| malformed(&reader, e))? {
            Event::Start(e) => {
                check_attributes(&e)?;
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
                if is_image_item(&e) {
                    image_items += 1;
                }
            }
            Event::Empty(e) => {
                check_attributes(&e)?;
                if depth == 0 {
                    roots += 1;
                }
                if is_image_item(&e) {
                    image_items += 1;
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::ManifestMalformed("end tag without matching start tag".into())
                })?;
            }
            Event::Text(text) if depth == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(Error::ManifestMalformed(
                        "text outside the root element".into(),
                    ));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::ManifestMalformed(format!(
            "{depth} element(s) left unclosed"
        )));
    }
    if roots != 1 {
        return Err(Error::ManifestMalformed(format!(
            "expected one root element, found {roots}"
        )));
    }

    Ok(Survey { image_items })
}

struct Patcher {
    spine_patched: bool,
    mark_cover: bool,
}

impl Patcher {
    fn element<'a>(&mut self, e: BytesStart<'a>) -> Result<BytesStart<'a>> {
        if !self.spine_patched && e.local_name().as_ref() == b"spine" {
            self.spine_patched = true;
            return with_attribute(&e, "page-progression-direction", "rtl");
        }
        if self.mark_cover && is_image_item(&e) {
            return with_attribute(&e, "properties", "cover-image");
        }
        Ok(e)
    }
}

/// Case-sensitive substring test on `media-type`.
fn is_image_item(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == b"item"
        && e.attributes().flatten().any(|attr| {
            attr.key.as_ref() == b"media-type" && memmem::find(&attr.value, b"image").is_some()
        })
}

fn check_attributes(e: &BytesStart<'_>) -> Result<()> {
    for attr in e.attributes() {
        attr.map_err(|err| Error::ManifestMalformed(err.to_string()))?;
    }
    Ok(())
}

/// Copy of `e` with `key` set to `value`, replacing an existing value in
/// place or appending the attribute after the others. The rest of the start
/// tag keeps its original bytes.
fn with_attribute(e: &BytesStart<'_>, key: &str, value: &str) -> Result<BytesStart<'static>> {
    let content =
        std::str::from_utf8(e).map_err(|err| Error::ManifestMalformed(err.to_string()))?;
    let raw = format!("<{content}>");
    let tag = Tag::parse(&raw)
        .ok_or_else(|| Error::ManifestMalformed(format!("unreadable start tag {raw}")))?;

    let mut patched = String::with_capacity(raw.len() + key.len() + value.len() + 4);
    tag.write_with_attribute(&mut patched, key, value);

    // Strip the `<` and `>` again; the writer adds them back.
    let inner = patched[1..patched.len() - 1].to_owned();
    Ok(BytesStart::from_content(inner, e.name().as_ref().len()))
}

fn malformed(reader: &Reader<&[u8]>, err: quick_xml::Error) -> Error {
    Error::ManifestMalformed(format!("{err} (at byte {})", reader.buffer_position()))
}
