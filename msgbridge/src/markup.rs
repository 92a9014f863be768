//! Markup helpers for the host UI's HTML-like message format.
//!
//! Inbound text is escaped before display; outbound text is stripped of
//! UI-added tags and unescaped before it goes to the protocol. Embedded
//! images are referenced from outgoing markup as `<img id="N">`.

use std::sync::LazyLock;

use regex::Regex;

use crate::host::ImageHandle;

#[allow(clippy::expect_used)]
static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*").expect("image tag pattern is valid"));

#[allow(clippy::expect_used)]
static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)id\s*=\s*"(\d+)""#).expect("id attribute pattern is valid")
});

#[allow(clippy::expect_used)]
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));

#[allow(clippy::expect_used)]
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Longest entity name (between `&` and `;`) that [`unescape`] recognizes.
const MAX_ENTITY_LEN: usize = 10;

/// Escape text for safe display as markup.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode character entities. Unknown entities are left untouched.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN + 1)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Remove all tags; line breaks become newlines. Entities are kept.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    let with_newlines = LINE_BREAK.replace_all(text, "\n");
    ANY_TAG.replace_all(&with_newlines, "").into_owned()
}

/// Strip tags and decode entities, producing the plain text a user typed.
#[must_use]
pub fn to_plain_text(text: &str) -> String {
    unescape(&strip_tags(text))
}

/// Inline image markup for an image-store handle.
#[must_use]
pub fn image_tag(handle: ImageHandle) -> String {
    format!("<img id=\"{handle}\">")
}

/// An `<img>` tag found in outgoing markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// The referenced image-store handle, if the tag names a valid one.
    pub handle: Option<ImageHandle>,
}

/// Find the last `<img>` tag in `text` and the image-store handle it names.
///
/// Tag and attribute names match case-insensitively. A tag without an `id`
/// attribute, or with id `0`, yields an image without a handle.
#[must_use]
pub fn find_embedded_image(text: &str) -> Option<EmbeddedImage> {
    let tag = IMG_TAG.find_iter(text).last()?;
    let handle = ID_ATTR
        .captures_iter(tag.as_str())
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse::<u32>().ok())
        .filter(|&id| id > 0)
        .map(ImageHandle::new);
    Some(EmbeddedImage { handle })
}
