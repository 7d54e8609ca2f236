//! HTTP response writing.
//!
//! Turns a [`Reply`] into a `tiny_http` response. Files honour
//! `If-Modified-Since` (304), `Range` (206/416) and `HEAD`.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::UNIX_EPOCH;

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::files::ServedFile;
use super::router::Reply;
use crate::utils::date::DateTimeUtc;
use crate::utils::html;
use crate::utils::mime::types::{HTML, PLAIN};

/// Write `reply` to the client and return the status code sent.
///
/// `origin` is the `Access-Control-Allow-Origin` value; empty omits it.
pub fn respond(request: Request, reply: Reply, origin: &str) -> Result<u16> {
    let mut headers = Vec::new();
    if !origin.is_empty() {
        push_header(&mut headers, "Access-Control-Allow-Origin", origin);
    }

    match reply {
        Reply::Html(body) => send_body(request, 200, HTML, body.into_bytes(), headers),
        Reply::File(file) => respond_file(request, file, headers),
        Reply::Redirect(location) => {
            push_header(&mut headers, "Location", &location);
            let body = format!("<a href=\"{}\">See Other</a>.\n", html::escape_attr(&location));
            send_body(request, 303, HTML, body.into_bytes(), headers)
        }
        Reply::Empty => send_body(request, 200, PLAIN, Vec::new(), headers),
        Reply::Timeout => send_body(request, 408, PLAIN, Vec::new(), headers),
        Reply::Failure(message) => send_text(request, 500, &message, headers),
        Reply::NotFound(message) => send_text(request, 404, &message, headers),
        Reply::Unavailable => send_text(request, 503, "503 Service Unavailable", headers),
    }
}

/// Respond with a file, honouring conditional and range requests.
fn respond_file(request: Request, served: ServedFile, mut headers: Vec<Header>) -> Result<u16> {
    let modified = served
        .modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    push_header(&mut headers, "Content-Type", served.content_type);
    push_header(&mut headers, "Accept-Ranges", "bytes");
    if let Some(secs) = modified {
        push_header(
            &mut headers,
            "Last-Modified",
            &DateTimeUtc::from_unix(secs).to_rfc2822(),
        );
    }

    if let (Some(secs), Some(since)) = (modified, if_modified_since(&request))
        && secs <= since
    {
        return send(request, Response::empty(StatusCode(304)), headers, 304);
    }

    if is_head_request(&request) {
        let response = Response::new(
            StatusCode(200),
            Vec::new(),
            io::empty(),
            Some(served.len as usize),
            None,
        );
        return send(request, response, headers, 200);
    }

    if let Some(range) = header_value(&request, "range") {
        return respond_range(request, served, &range, headers);
    }

    let len = served.len as usize;
    let response = Response::new(StatusCode(200), Vec::new(), served.file, Some(len), None);
    send(request, response, headers, 200)
}

/// Handle a `Range: bytes=...` request (media seeking, resumable fetches).
fn respond_range(
    request: Request,
    served: ServedFile,
    range: &str,
    mut headers: Vec<Header>,
) -> Result<u16> {
    let size = served.len;
    let Some((start, end)) = parse_range(range, size) else {
        push_header(&mut headers, "Content-Range", &format!("bytes */{size}"));
        return send_body(request, 416, PLAIN, Vec::new(), headers);
    };

    let length = end - start + 1;
    let mut file = served.file;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    push_header(
        &mut headers,
        "Content-Range",
        &format!("bytes {start}-{end}/{size}"),
    );
    let response = Response::new(StatusCode(206), Vec::new(), reader, Some(length as usize), None);
    send(request, response, headers, 206)
}

/// Parse a single `bytes=start-end` range into inclusive offsets.
///
/// Returns `None` for unsatisfiable or malformed ranges.
fn parse_range(range: &str, size: u64) -> Option<(u64, u64)> {
    let spec = range.trim().strip_prefix("bytes=")?;
    // Only the first range of a multi-range request is honoured
    let spec = spec.split(',').next()?.trim();
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    if size == 0 {
        return None;
    }
    let last = size - 1;

    match (start.is_empty(), end.is_empty()) {
        // "-500": last 500 bytes
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            Some((size.saturating_sub(suffix), last))
        }
        // "500-": from offset to the end
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            (start <= last).then_some((start, last))
        }
        // "0-499"
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            (start <= end && start <= last).then_some((start, end.min(last)))
        }
        (true, true) => None,
    }
}

fn if_modified_since(request: &Request) -> Option<u64> {
    header_value(request, "if-modified-since")
        .and_then(|value| DateTimeUtc::parse_http(value.trim()))
        .map(DateTimeUtc::to_unix)
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.to_string())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_text(request: Request, status: u16, message: &str, headers: Vec<Header>) -> Result<u16> {
    send_body(request, status, PLAIN, format!("{message}\n").into_bytes(), headers)
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    mut headers: Vec<Header>,
) -> Result<u16> {
    push_header(&mut headers, "Content-Type", content_type);
    send(request, Response::from_data(body), headers, status)
}

fn send<R: Read>(
    request: Request,
    mut response: Response<R>,
    headers: Vec<Header>,
    status: u16,
) -> Result<u16> {
    for header in headers {
        response.add_header(header);
    }
    request.respond(response.with_status_code(StatusCode(status)))?;
    Ok(status)
}

/// Append a header; non-ASCII values and values with control bytes are dropped.
fn push_header(headers: &mut Vec<Header>, key: &str, value: &str) {
    if value.bytes().any(|b| b.is_ascii_control()) {
        return;
    }
    if let Ok(header) = Header::from_bytes(key.as_bytes(), value.as_bytes()) {
        headers.push(header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_explicit() {
        assert_eq!(parse_range("bytes=0-499", 1000), Some((0, 499)));
        assert_eq!(parse_range("bytes=500-999", 1000), Some((500, 999)));
        assert_eq!(parse_range("bytes=900-5000", 1000), Some((900, 999)));
    }

    #[test]
    fn test_parse_range_open_and_suffix() {
        assert_eq!(parse_range("bytes=100-", 1000), Some((100, 999)));
        assert_eq!(parse_range("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_range("bytes=-5000", 1000), Some((0, 999)));
    }

    #[test]
    fn test_parse_range_first_of_many() {
        assert_eq!(parse_range("bytes=0-9, 20-29", 100), Some((0, 9)));
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("bytes=1000-", 1000), None);
        assert_eq!(parse_range("bytes=5-1", 1000), None);
        assert_eq!(parse_range("bytes=-0", 1000), None);
        assert_eq!(parse_range("bytes=0-10", 0), None);
    }

    #[test]
    fn test_parse_range_malformed() {
        assert_eq!(parse_range("items=0-1", 1000), None);
        assert_eq!(parse_range("bytes=abc-def", 1000), None);
        assert_eq!(parse_range("bytes=-", 1000), None);
        assert_eq!(parse_range("bytes=10", 1000), None);
    }

    #[test]
    fn test_push_header_drops_invalid() {
        let mut headers = Vec::new();
        push_header(&mut headers, "Access-Control-Allow-Origin", "*");
        push_header(&mut headers, "Location", "/spx/a\r\nSet-Cookie: x/index.html");
        push_header(&mut headers, "X-Name", "café");
        assert_eq!(headers.len(), 1);
    }
}
