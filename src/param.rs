// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数
//!
//! 片段服务器实际会发出的状态码、附加在每个响应上的安全标头，
//! 静态文件的 MIME 表，以及请求解析用到的方法、版本和压缩编码枚举。

use std::{collections::HashMap, fmt};

use lazy_static::lazy_static;

pub const SERVER_NAME: &str = "snippetserver";

pub const CRLF: &str = "\r\n";

/// 会话 Cookie 名
pub const SESSION_COOKIE: &str = "session";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// 服务器会用到的状态码与原因短语（RFC 9110）
const REASON_PHRASES: &[(u16, &str)] = &[
    (200, "OK"),
    (303, "See Other"),
    (400, "Bad Request"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (413, "Content Too Large"),
    (422, "Unprocessable Content"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (505, "HTTP Version Not Supported"),
];

lazy_static! {
    pub static ref STATUS_CODES: HashMap<u16, &'static str> =
        REASON_PHRASES.iter().copied().collect();

    /// 由中间件附加到每一个响应上。
    pub static ref SECURE_HEADERS: Vec<(&'static str, &'static str)> = vec![
        (
            "Content-Security-Policy",
            "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
        ),
        ("Referrer-Policy", "origin-when-cross-origin"),
        ("X-Content-Type-Options", "nosniff"),
        ("X-Frame-Options", "deny"),
        ("X-XSS-Protection", "0"),
    ];

    /// 静态文件扩展名（小写）到 MIME 类型
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = [
        ("css", "text/css;charset=utf-8"),
        ("js", "text/javascript;charset=utf-8"),
        ("html", "text/html;charset=utf-8"),
        ("txt", "text/plain;charset=utf-8"),
        ("json", "application/json"),
        ("svg", "image/svg+xml"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("ico", "image/x-icon"),
        ("webp", "image/webp"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
    ]
    .into_iter()
    .collect();
}

/// 未知扩展名按二进制流处理
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// 未知状态码返回 `None`。
pub fn status_text(code: u16) -> Option<&'static str> {
    STATUS_CODES.get(&code).copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

impl HttpVersion {
    /// 请求行中的版本标识，大小写不敏感。
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "HTTP/1.0" => Some(Self::V1_0),
            "HTTP/1.1" => Some(Self::V1_1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
        }
    }
}

/// 路由表只用到这三种方法，其余方法在解析时即被拒绝。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Post,
}

impl HttpRequestMethod {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    Gzip,
    Deflate,
}

impl HttpEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HttpEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
