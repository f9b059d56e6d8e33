/*
 *  http.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Shared HTTP client setup and bounded body reads
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use flate2::read::GzDecoder;
use reqwest::{header, Client, Response};
use std::io::Read;
use std::time::Duration;

use crate::error::FetchError;

pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// One client per collaborator; a request never outlives `timeout`.
pub fn build_client(connect_timeout: Duration, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
    headers.insert("Accept", header::HeaderValue::from_static("application/json"));
    headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));
    headers.insert("Connection", header::HeaderValue::from_static("close"));

    Client::builder()
        .connect_timeout(connect_timeout)
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Read at most `limit` bytes of body. Anything larger is abandoned
/// whole, the caller never sees a truncated document.
pub async fn read_bounded(mut response: Response, limit: usize) -> Result<String, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::PayloadTooLarge { size: len as usize, limit });
        }
    }
    let mut raw: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if raw.len() + chunk.len() > limit {
            return Err(FetchError::PayloadTooLarge { size: raw.len() + chunk.len(), limit });
        }
        raw.extend_from_slice(&chunk);
    }
    decode_body(&raw, limit)
}

/// Gunzip when the body is a gzip stream, plain text otherwise.
pub fn decode_body(raw: &[u8], limit: usize) -> Result<String, FetchError> {
    if raw.starts_with(&[0x1f, 0x8b]) {
        let mut decoded = String::new();
        let mut decoder = GzDecoder::new(raw).take(limit as u64 + 1);
        if decoder.read_to_string(&mut decoded).is_ok() {
            if decoded.len() > limit {
                return Err(FetchError::PayloadTooLarge { size: decoded.len(), limit });
            }
            return Ok(decoded);
        }
    }
    Ok(String::from_utf8_lossy(raw).to_string())
}

/// One-shot HTTP server for tests: answers the first connection with
/// `response` verbatim and returns the base URL.
#[cfg(test)]
pub(crate) async fn serve_once(response: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(&response).await;
            let _ = sock.shutdown().await;
        }
    });
    format!("http://{addr}")
}

/// Canned response with a Content-Length header.
#[cfg(test)]
pub(crate) fn canned(status: u16, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}
