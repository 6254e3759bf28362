//! MIME type detection from file content.
//!
//! Content sniffing looks at the first 512 bytes only. When the content
//! is not recognized and not text, the file name's extension decides.

use super::value::{MimeType, Name};

/// Number of leading bytes considered when sniffing.
const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// Exact byte signatures at offset 0.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"Rar!\x1a\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1a\x07\x01\x00", "application/x-rar-compressed"),
    (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"fLaC", "audio/flac"),
    (b"\x1aE\xdf\xa3", "video/webm"),
    (b"\x00asm", "application/wasm"),
    (b"\xef\xbb\xbf", TEXT_UTF8),
    (b"\xfe\xff", "text/plain; charset=utf-16be"),
    (b"\xff\xfe", "text/plain; charset=utf-16le"),
];

/// Case-insensitive HTML openers, matched after leading whitespace and
/// required to be followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Detect the MIME type of a file from its content, falling back to the
/// extension of `name`.
pub fn detect(name: &Name, content: &[u8]) -> MimeType {
    let sniffed = sniff(content);
    if sniffed != OCTET_STREAM {
        return known(sniffed);
    }

    mime_guess::from_path(name.as_str())
        .first()
        .and_then(|guess| MimeType::new(guess.essence_str()).ok())
        .unwrap_or_else(|| known(OCTET_STREAM))
}

/// Sniff the content alone.
pub fn sniff(content: &[u8]) -> &'static str {
    let data = &content[..content.len().min(SNIFF_LEN)];

    for &(signature, mime) in SIGNATURES {
        if data.starts_with(signature) {
            return mime;
        }
    }
    if is_riff(data, b"WEBP") {
        return "image/webp";
    }
    if is_riff(data, b"WAVE") {
        return "audio/wave";
    }
    if is_riff(data, b"AVI ") {
        return "video/avi";
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" && &data[8..11] == b"mp4" {
        return "video/mp4";
    }

    let trimmed = skip_whitespace(data);
    if HTML_TAGS.iter().any(|tag| html_tag_matches(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if data.iter().any(|&b| is_binary_byte(b)) {
        OCTET_STREAM
    } else {
        TEXT_UTF8
    }
}

fn known(mime: &'static str) -> MimeType {
    MimeType::from_static(mime)
}

fn is_riff(data: &[u8], format: &[u8; 4]) -> bool {
    data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == format
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn html_tag_matches(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> Name {
        Name::new(value).unwrap()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(detect(&name("a.txt"), b"hello").as_str(), TEXT_UTF8);
        assert_eq!(detect(&name("empty"), b"").as_str(), TEXT_UTF8);
        assert_eq!(
            detect(&name("jp.txt"), "こんにちは".as_bytes()).as_str(),
            TEXT_UTF8
        );
    }

    #[test]
    fn test_signatures() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), "application/pdf");
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n\x00\x00"), "image/png");
        assert_eq!(sniff(b"\xff\xd8\xff\xe0\x00\x10JFIF"), "image/jpeg");
        assert_eq!(sniff(b"GIF89a\x01\x00"), "image/gif");
        assert_eq!(sniff(b"PK\x03\x04\x14\x00"), "application/zip");
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_markup() {
        assert_eq!(
            sniff(b"  <!doctype html><html></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(sniff(b"<b"), TEXT_UTF8);
        assert_eq!(
            sniff(b"\n<!DOCTYPE HTML>\n<html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(sniff(b"<html lang=\"en\">"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
    }

    #[test]
    fn test_binary_falls_back_to_extension() {
        let content = [0u8, 1, 2, 3, 4, 5];
        assert_eq!(sniff(&content), OCTET_STREAM);
        assert_eq!(detect(&name("doc.pdf"), &content).as_str(), "application/pdf");
        assert_eq!(detect(&name("blob"), &content).as_str(), OCTET_STREAM);
    }

    #[test]
    fn test_only_prefix_is_sniffed() {
        let mut content = vec![b'a'; SNIFF_LEN];
        content.push(0);
        assert_eq!(sniff(&content), TEXT_UTF8);
    }
}
