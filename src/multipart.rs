//! Minimal `multipart/form-data` reader for the form input mapper.

use bytes::Bytes;

use crate::{Error, Result};

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Part {
    /// The part's content as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Extract the boundary from a `multipart/form-data` content type.
pub fn parse_boundary(content_type: &str) -> Result<String> {
    if !content_type
        .to_ascii_lowercase()
        .starts_with(crate::response::content_type::FORM)
    {
        return Err(Error::Input(format!(
            "Expected multipart/form-data, got {content_type:?}"
        )));
    }
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| unquote(value).to_string())
        })
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| Error::Input("Multipart body has no boundary".to_string()))
}

/// Split `body` into parts delimited by `boundary`.
pub fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();
    let mut pos = find(body, &delimiter, 0).ok_or_else(truncated)?;

    loop {
        let after = pos + delimiter.len();
        if body.get(after..after + 2) == Some(b"--") {
            break;
        }
        if body.get(after..after + 2) != Some(b"\r\n") {
            return Err(Error::Input("Malformed multipart boundary".to_string()));
        }
        let (headers, data_start) = part_headers(body, after + 2)?;

        let disposition = headers
            .iter()
            .find(|(name, _)| name == "content-disposition")
            .map(|(_, value)| value.as_str())
            .ok_or_else(|| Error::Input("Multipart part has no Content-Disposition".to_string()))?;
        let (name, filename) = content_disposition(disposition)?;
        let content_type = headers
            .iter()
            .find(|(name, _)| name == "content-type")
            .map(|(_, value)| value.clone());

        let next = find(body, &delimiter, data_start).ok_or_else(truncated)?;
        let data_end = if next >= data_start + 2 && &body[next - 2..next] == b"\r\n" {
            next - 2
        } else {
            next
        };

        parts.push(Part {
            name,
            filename,
            content_type,
            data: body.slice(data_start..data_end),
        });
        pos = next;
    }

    Ok(parts)
}

fn truncated() -> Error {
    Error::Input("Multipart body ended unexpectedly".to_string())
}

fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| start + i)
}

fn part_headers(body: &[u8], start: usize) -> Result<(Vec<(String, String)>, usize)> {
    let mut headers = Vec::new();
    let mut pos = start;
    loop {
        let end = find(body, b"\r\n", pos).ok_or_else(truncated)?;
        let line = &body[pos..end];
        if line.is_empty() {
            return Ok((headers, end + 2));
        }
        let line = std::str::from_utf8(line)
            .map_err(|_| Error::Input("Invalid UTF-8 in multipart header".to_string()))?;
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
        pos = end + 2;
    }
}

fn content_disposition(value: &str) -> Result<(String, Option<String>)> {
    let mut name = None;
    let mut filename = None;
    for param in value.split(';').map(str::trim) {
        match param.split_once('=') {
            Some((key, v)) if key.eq_ignore_ascii_case("name") => name = Some(unquote(v).to_string()),
            Some((key, v)) if key.eq_ignore_ascii_case("filename") => {
                filename = Some(unquote(v).to_string())
            }
            _ => {}
        }
    }
    let name =
        name.ok_or_else(|| Error::Input("Multipart part has no name parameter".to_string()))?;
    Ok((name, filename))
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}
