//! Content-type detection for static assets.

/// How many leading bytes are inspected when sniffing.
const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Byte signatures checked in order against the start of the content.
const SIGNATURES: &[(&[u8], &str)] = &[
  (b"%PDF-", "application/pdf"),
  (b"\x89PNG\r\n\x1a\n", "image/png"),
  (b"\xff\xd8\xff", "image/jpeg"),
  (b"GIF87a", "image/gif"),
  (b"GIF89a", "image/gif"),
  (b"PK\x03\x04", "application/zip"),
  (b"\x1f\x8b\x08", "application/x-gzip"),
  (b"wOFF", "font/woff"),
  (b"wOF2", "font/woff2"),
  (b"\x00asm", "application/wasm"),
];

/// Tags that mark the start of an HTML document.
const HTML_TAGS: &[&[u8]] = &[
  b"<!DOCTYPE HTML", b"<HTML", b"<HEAD", b"<SCRIPT", b"<IFRAME", b"<H1", b"<DIV", b"<FONT", b"<TABLE", b"<A",
  b"<STYLE", b"<TITLE", b"<B", b"<BODY", b"<BR", b"<P", b"<!--",
];

/// The content type for `path`, by extension first and by content second.
pub fn content_type(path: &str, data: &[u8]) -> String {
  match mime_guess::from_path(path).first_raw() {
    Some(mime) if needs_charset(mime) => format!("{mime}; charset=utf-8"),
    Some(mime) => mime.to_string(),
    None => sniff(data).to_string(),
  }
}

fn needs_charset(mime: &str) -> bool {
  mime.starts_with("text/") || mime == "application/javascript" || mime == "application/json"
}

/// Guesses a content type from the leading bytes.
///
/// Never returns an empty string: unknown binary data is
/// `application/octet-stream`.
pub fn sniff(data: &[u8]) -> &'static str {
  let data = &data[..data.len().min(SNIFF_LEN)];

  let trimmed = trim_leading_whitespace(data);
  for tag in HTML_TAGS {
    if is_html_tag(trimmed, tag) {
      return "text/html; charset=utf-8";
    }
  }
  if trimmed.starts_with(b"<?xml") {
    return "text/xml; charset=utf-8";
  }

  for &(signature, mime) in SIGNATURES {
    if data.starts_with(signature) {
      return mime;
    }
  }
  if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
    return "image/webp";
  }

  if data.iter().any(|&b| is_binary(b)) {
    OCTET_STREAM
  } else {
    TEXT_PLAIN
  }
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
  let start = data
    .iter()
    .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
    .unwrap_or(data.len());
  &data[start..]
}

/// Case-insensitive tag match, which must be followed by a space or `>`.
fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
  if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
    return false;
  }
  // comments need no terminator
  tag == b"<!--" || matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary(byte: u8) -> bool {
  matches!(byte, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extension_wins() {
    assert_eq!(content_type("public/site.css", b""), "text/css; charset=utf-8");
    assert_eq!(content_type("public/logo.png", b"not really"), "image/png");
  }

  #[test]
  fn test_sniff_when_extension_unknown() {
    assert_eq!(content_type("LICENSE", b"plain words"), TEXT_PLAIN);
    assert_eq!(content_type("page", b"  <!doctype html><html>"), "text/html; charset=utf-8");
    assert_eq!(content_type("blob", b"\x89PNG\r\n\x1a\n...."), "image/png");
    assert_eq!(content_type("blob", b"\x00\x01\x02"), OCTET_STREAM);
  }

  #[test]
  fn test_sniff_html_needs_terminator() {
    assert_eq!(sniff(b"<p>hello</p>"), "text/html; charset=utf-8");
    assert_eq!(sniff(b"<pre-formatted"), TEXT_PLAIN);
    assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
    assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
  }

  #[test]
  fn test_empty_content_is_text() {
    assert_eq!(sniff(b""), TEXT_PLAIN);
  }
}
