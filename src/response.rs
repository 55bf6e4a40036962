//! # HTTP 响应
//!
//! 响应在内存中完整构建后一次性序列化：状态行与所有标头只写一次，并且严格位于响应体之前。

use crate::param::*;

use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    headers: Vec<(String, String)>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            headers: Vec::new(),
            content: None,
        }
    }

    /// 已在缓冲区中渲染完成的 HTML 页面。
    pub fn from_html(code: u16, body: Bytes) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some("text/html;charset=utf-8".to_string());
        response.set_content(body);
        response
    }

    /// 只包含状态码原因短语的纯文本响应，不暴露任何内部细节。
    pub fn from_status_code(code: u16) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        let body = format!("{}\n", response.information);
        response.content_type = Some("text/plain;charset=utf-8".to_string());
        response.set_content(Bytes::from(body));
        response
    }

    /// 静态文件。图片和字体已经是压缩格式，标记为不再压缩。
    pub fn from_file(mime: &str, body: Bytes) -> Self {
        let mut response = Self::new();
        response.set_code(200);
        response.content_type = Some(mime.to_string());
        response.set_content(body);
        response
    }

    pub fn redirect(location: &str, code: u16) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.add_header("Location", location);
        response
    }

    pub fn response_400() -> Self {
        Self::from_status_code(400)
    }

    pub fn response_404() -> Self {
        Self::from_status_code(404)
    }

    pub fn response_405(allow: Vec<HttpRequestMethod>) -> Self {
        let mut response = Self::from_status_code(405);
        response.allow = Some(allow);
        response
    }

    pub fn response_500() -> Self {
        Self::from_status_code(500)
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match status_text(code) {
            Some(text) => text.to_string(),
            None => {
                error!("状态码{}没有对应的原因短语", code);
                String::new()
            }
        };
        self
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 同名标头已存在时覆盖。
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.add_header(name, value)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str, max_age_secs: u64) -> &mut Self {
        let cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            name, value, max_age_secs
        );
        self.add_header("Set-Cookie", &cookie)
    }

    fn set_content(&mut self, body: Bytes) {
        self.content_length = body.len() as u64;
        self.content = Some(body);
    }

    /// 按客户端支持的编码压缩响应体。压缩失败时保留原始内容。
    pub fn compress(&mut self, accept_encoding: &[HttpEncoding], id: u128) -> &mut Self {
        let content = match &self.content {
            Some(c) if !c.is_empty() && self.content_encoding.is_none() => c.clone(),
            _ => return self,
        };
        if self.content_type.as_deref().is_some_and(already_compressed) {
            debug!("[ID{}]{:?}不需要再压缩", id, self.content_type);
            return self;
        }
        let encoding = decide_encoding(accept_encoding);
        if encoding.is_none() {
            debug!("[ID{}]客户端不接受压缩", id);
            return self;
        }
        match compress(&content, encoding) {
            Ok(compressed) => {
                debug!("[ID{}]{:?}: {} -> {} bytes", id, encoding, content.len(), compressed.len());
                self.content_encoding = encoding;
                self.set_content(Bytes::from(compressed));
            }
            Err(e) => {
                warn!("[ID{}]压缩失败，原样发送：{}", id, e);
            }
        }
        self
    }

    /// HEAD 请求：保留 Content-Length，丢弃响应体。
    pub fn strip_body(&mut self) -> &mut Self {
        self.content = None;
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "HTTP/{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length, CRLF));
        header.push_str(&["Date: ", &format_date(&self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        if let Some(a) = &self.allow {
            let allow_str = a
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            header.push_str(&["Allow: ", &allow_str, CRLF].concat());
        }
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(CRLF);
        let body: &[u8] = match &self.content {
            Some(c) => c,
            None => b"",
        };
        [header.as_bytes(), body].concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: &[u8], mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        None => Ok(data.to_vec()),
    }
}

fn already_compressed(mime: &str) -> bool {
    (mime.starts_with("image/") && mime != "image/svg+xml") || mime.starts_with("font/")
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}
