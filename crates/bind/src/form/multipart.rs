//! A binary-safe `multipart/form-data` parser over an already collected body.

use crate::form::{FormData, FormError};
use crate::request::UploadPart;
use bytes::Bytes;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

pub(crate) fn parse(body: &Bytes, boundary: &str, max_fields: usize) -> Result<FormData, FormError> {
    let delimiter = [b"--", boundary.as_bytes()].concat();
    let next_delimiter = [CRLF, &delimiter].concat();

    let mut pos = find(body, &delimiter, 0).ok_or_else(|| FormError::malformed("missing opening boundary"))?;
    pos += delimiter.len();

    let mut form = FormData::default();
    let mut count = 0usize;
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        if !rest.starts_with(CRLF) {
            return Err(FormError::malformed("boundary is not followed by a line break"));
        }
        let start = pos + CRLF.len();
        let end = find(body, &next_delimiter, start).ok_or_else(|| FormError::malformed("missing closing boundary"))?;

        count += 1;
        if count > max_fields {
            return Err(FormError::TooManyFields(max_fields));
        }
        read_part(body, start, end, &mut form)?;
        pos = end + next_delimiter.len();
    }
}

fn read_part(body: &Bytes, start: usize, end: usize, form: &mut FormData) -> Result<(), FormError> {
    let part = &body[start..end];
    let (head, content_start) = match find(part, HEADER_END, 0) {
        Some(i) => (&part[..i], start + i + HEADER_END.len()),
        // a part may end right after its headers
        None if part.ends_with(CRLF) => (&part[..part.len() - CRLF.len()], end),
        None => return Err(FormError::malformed("part headers are not terminated")),
    };
    let head = std::str::from_utf8(head).map_err(|_| FormError::malformed("part headers are not valid UTF-8"))?;

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("content-disposition") {
            for param in split_params(value).into_iter().skip(1) {
                match param.trim().split_once('=') {
                    Some(("name", v)) => name = Some(unquote(v)),
                    Some(("filename", v)) => filename = Some(unquote(v)),
                    _ => {}
                }
            }
        } else if key.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or_else(|| FormError::malformed("part has no name"))?;
    let content = body.slice(content_start.min(end)..end);
    match filename {
        Some(filename) => form.files.push(UploadPart::from_bytes(name, filename, content_type, content)),
        None => {
            let text = String::from_utf8(content.to_vec()).map_err(|_| FormError::malformed(format!("field `{name}` is not valid UTF-8")))?;
            form.fields.push((name, text));
        }
    }
    Ok(())
}

/// Splits header parameters on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..].windows(needle.len()).position(|window| window == needle).map(|i| i + from)
}
