//! `multipart/form-data` body parser.
//!
//! The payload is buffered while it streams in and split into parts only when
//! the message is complete. A body is either fully parsed or rejected as
//! malformed; partial results are never handed out.

use std::fs::File;
use std::io::{self, Read, Seek, Write};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use memchr::memmem;
use mime::Mime;
use tracing::trace;

use crate::ensure;
use crate::protocol::body::BodyParser;
use crate::protocol::ParseError;

const MAX_PART_HEADERS: usize = 16;

/// Parses a `multipart/form-data` body split by `boundary`.
#[derive(Debug)]
pub struct FormDataParser {
    boundary: String,
    buffer: Option<BytesMut>,
    fields: Vec<FormField>,
}

/// One entry of a multipart body, in submission order.
#[derive(Debug)]
pub enum FormField {
    Inline(FormValue),
    File(FormFile),
}

/// An inline form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValue {
    pub name: String,
    pub content: Bytes,
}

/// An uploaded file, spooled into an anonymous temporary file.
///
/// The temporary file is removed by the OS once the handle is dropped.
#[derive(Debug)]
pub struct FormFile {
    pub name: String,
    pub filename: String,
    pub content_type: Option<Mime>,
    size: u64,
    file: File,
}

impl FormDataParser {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), buffer: Some(BytesMut::new()), fields: Vec::new() }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Consumes the parser and returns the parsed fields.
    pub fn into_fields(self) -> Vec<FormField> {
        self.fields
    }

    fn parse_part(&mut self, part: Bytes) -> Result<(), ParseError> {
        let separator = memmem::find(&part, b"\r\n\r\n")
            .ok_or_else(|| ParseError::malformed_body("multipart part has no header block"))?;

        let headers = parse_part_headers(&part[..separator])?;
        let content = part.slice(separator + 4..);

        let disposition = headers
            .get(http::header::CONTENT_DISPOSITION)
            .ok_or_else(|| ParseError::malformed_body("multipart part misses content-disposition"))?;
        let disposition = disposition
            .to_str()
            .map_err(|_| ParseError::malformed_body("content-disposition is not visible ascii"))?;
        let disposition = ContentDisposition::parse(disposition);

        if !disposition.kind.eq_ignore_ascii_case("form-data") {
            trace!(disposition = %disposition.kind, "skip multipart part");
            return Ok(());
        }

        let Some(name) = disposition.param("name") else {
            return Ok(());
        };

        let field = match disposition.param("filename") {
            Some(filename) => {
                let content_type = headers
                    .get(http::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<Mime>().ok());
                FormField::File(FormFile::spool(name, filename, content_type, &content)?)
            }
            None => FormField::Inline(FormValue { name: name.to_string(), content }),
        };

        self.fields.push(field);
        Ok(())
    }
}

impl BodyParser for FormDataParser {
    #[inline]
    fn feed(&mut self, data: &[u8]) {
        if let Some(buffer) = &mut self.buffer {
            buffer.extend_from_slice(data);
        }
    }

    fn process(&mut self) -> Result<(), ParseError> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(());
        };
        let buffer = buffer.freeze();

        let terminal = format!("--{}--\r\n", self.boundary);
        ensure!(buffer.ends_with(terminal.as_bytes()), ParseError::malformed_body("missing terminal multipart boundary"));

        let content = buffer.slice(..buffer.len() - terminal.len());
        let delimiter = format!("--{}\r\n", self.boundary);

        let mut start = 0;
        let mut parts = Vec::new();
        for position in memmem::find_iter(&content, delimiter.as_bytes()) {
            parts.push(content.slice(start..position));
            start = position + delimiter.len();
        }
        parts.push(content.slice(start..));

        for part in parts {
            let part = if part.ends_with(b"\r\n") { part.slice(..part.len() - 2) } else { part };
            if part.is_empty() {
                continue;
            }
            self.parse_part(part)?;
        }

        trace!(fields = self.fields.len(), "parsed multipart body");
        Ok(())
    }
}

impl FormField {
    pub fn name(&self) -> &str {
        match self {
            FormField::Inline(value) => &value.name,
            FormField::File(file) => &file.name,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FormField::File(_))
    }
}

impl FormFile {
    fn spool(name: &str, filename: &str, content_type: Option<Mime>, content: &[u8]) -> Result<Self, ParseError> {
        let mut file = tempfile::tempfile().map_err(ParseError::io)?;
        file.write_all(content).map_err(ParseError::io)?;
        file.rewind().map_err(ParseError::io)?;

        Ok(Self {
            name: name.to_string(),
            filename: filename.to_string(),
            content_type,
            size: content.len() as u64,
            file,
        })
    }

    /// Size of the uploaded content in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads the whole uploaded content.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut content = Vec::with_capacity(self.size as usize);
        self.file.rewind()?;
        self.file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Hands out the temporary file, positioned at the start of the content.
    pub fn into_file(self) -> File {
        self.file
    }
}

fn parse_part_headers(head: &[u8]) -> Result<HeaderMap, ParseError> {
    // httparse expects the blank line that closes a header block
    let mut block = Vec::with_capacity(head.len() + 4);
    block.extend_from_slice(head);
    block.extend_from_slice(b"\r\n\r\n");

    let mut parsed = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];

    let status = httparse::parse_headers(&block, &mut parsed)
        .map_err(|e| ParseError::malformed_body(format!("invalid multipart part header: {e}")))?;

    let httparse::Status::Complete((_, parsed)) = status else {
        return Err(ParseError::malformed_body("incomplete multipart part header"));
    };

    let mut header_map = HeaderMap::with_capacity(parsed.len());
    for header in parsed {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::malformed_body)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::malformed_body)?;
        header_map.append(name, value);
    }
    Ok(header_map)
}

/// A parsed `content-disposition` value: `form-data; name="a"; filename="b.txt"`
#[derive(Debug)]
struct ContentDisposition {
    kind: String,
    params: Vec<(String, String)>,
}

impl ContentDisposition {
    fn parse(value: &str) -> Self {
        let (kind, mut rest) = value.split_once(';').unwrap_or((value, ""));
        let mut params = Vec::new();

        loop {
            rest = rest.trim_start_matches([' ', '\t', ';']);
            if rest.is_empty() {
                break;
            }

            let Some((key, tail)) = rest.split_once('=') else {
                break;
            };
            let key = key.trim().to_ascii_lowercase();
            let tail = tail.trim_start();

            let (param_value, remain) = if let Some(quoted) = tail.strip_prefix('"') {
                unquote(quoted)
            } else {
                let end = tail.find(';').unwrap_or(tail.len());
                (tail[..end].trim().to_string(), &tail[end..])
            };

            params.push((key, param_value));
            rest = remain;
        }

        Self { kind: kind.trim().to_string(), params }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

/// Reads a quoted string up to its closing quote, handling backslash escapes.
fn unquote(quoted: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return (value, &quoted[index + 1..]),
            c => value.push(c),
        }
    }
    (value, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn crlf(text: &str) -> Vec<u8> {
        text.replace('\n', "\r\n").into_bytes()
    }

    fn parse(boundary: &str, body: &[u8]) -> Result<Vec<FormField>, ParseError> {
        let mut parser = FormDataParser::new(boundary);
        // feed in small pieces, the way payload chunks arrive
        for chunk in body.chunks(7) {
            parser.feed(chunk);
        }
        parser.process()?;
        Ok(parser.into_fields())
    }

    #[test]
    fn parse_inline_and_file_fields() {
        let body = crlf(indoc! {r#"
            --XyZ
            Content-Disposition: form-data; name="title"

            hello world
            --XyZ
            Content-Disposition: form-data; name="upload"; filename="notes.txt"
            Content-Type: text/plain

            line one
            line two
            --XyZ
            Content-Disposition: form-data; name="empty"


            --XyZ--
        "#});

        let mut fields = parse("XyZ", &body).unwrap();
        assert_eq!(fields.len(), 3);

        match &fields[0] {
            FormField::Inline(value) => {
                assert_eq!(value.name, "title");
                assert_eq!(&value.content[..], b"hello world");
            }
            other => panic!("expected inline field, got {other:?}"),
        }

        match &mut fields[1] {
            FormField::File(file) => {
                assert_eq!(file.name, "upload");
                assert_eq!(file.filename, "notes.txt");
                assert_eq!(file.content_type, Some(mime::TEXT_PLAIN));
                assert_eq!(file.size(), 18);
                assert_eq!(file.read_to_vec().unwrap(), b"line one\r\nline two");
            }
            other => panic!("expected file field, got {other:?}"),
        }

        assert_eq!(fields[2].name(), "empty");
        assert!(!fields[2].is_file());
    }

    #[test]
    fn content_may_contain_blank_lines() {
        let body = crlf(indoc! {r#"
            --b
            Content-Disposition: form-data; name="text"

            first

            second
            --b--
        "#});

        let fields = parse("b", &body).unwrap();
        match &fields[0] {
            FormField::Inline(value) => assert_eq!(&value.content[..], b"first\r\n\r\nsecond"),
            other => panic!("expected inline field, got {other:?}"),
        }
    }

    #[test]
    fn missing_terminal_boundary_is_malformed() {
        let body = crlf(indoc! {r#"
            --b
            Content-Disposition: form-data; name="a"

            1
            --b
        "#});

        let error = parse("b", &body).unwrap_err();
        assert!(error.is_malformed_body());
    }

    #[test]
    fn part_without_header_block_is_malformed() {
        let body = crlf("--b\nno header separator here\n--b--\n");
        assert!(parse("b", &body).unwrap_err().is_malformed_body());
    }

    #[test]
    fn part_without_content_disposition_is_malformed() {
        let body = crlf(indoc! {r#"
            --b
            Content-Type: text/plain

            data
            --b--
        "#});
        assert!(parse("b", &body).unwrap_err().is_malformed_body());
    }

    #[test]
    fn skip_non_form_data_and_unnamed_parts() {
        let body = crlf(indoc! {r#"
            --b
            Content-Disposition: attachment; name="a"

            skipped
            --b
            Content-Disposition: form-data

            unnamed
            --b
            Content-Disposition: form-data; name="kept"

            value
            --b--
        "#});

        let fields = parse("b", &body).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name(), "kept");
    }

    #[test]
    fn content_disposition_params() {
        let disposition = ContentDisposition::parse(r#"form-data; name="a;b"; filename="say \"hi\".txt"; size=12"#);
        assert_eq!(disposition.kind, "form-data");
        assert_eq!(disposition.param("name"), Some("a;b"));
        assert_eq!(disposition.param("filename"), Some(r#"say "hi".txt"#));
        assert_eq!(disposition.param("size"), Some("12"));
        assert_eq!(disposition.param("missing"), None);
    }

    #[test]
    fn process_twice_is_noop() {
        let body = crlf("--b\nContent-Disposition: form-data; name=\"a\"\n\n1\n--b--\n");
        let mut parser = FormDataParser::new("b");
        parser.feed(&body);
        parser.process().unwrap();
        parser.process().unwrap();
        assert_eq!(parser.into_fields().len(), 1);
    }
}
