// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求解析
//!
//! 把连接上读到的一段完整字节（请求头 + 按 Content-Length 截取的请求体）
//! 变成 `Request`。片段服务器只关心路由、表单、会话 Cookie 和压缩协商，
//! 其余标头直接忽略。

use crate::{exception::Exception, param::*};
use log::error;

/// 请求头与请求体之间的空行
const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 不含查询串
    path: String,
    query: Option<String>,
    version: HttpVersion,
    user_agent: String,
    /// 客户端可接受的压缩方式，顺序同标头
    accept_encoding: Vec<HttpEncoding>,
    content_type: Option<String>,
    /// 小写
    connection: Option<String>,
    cookies: Vec<(String, String)>,
    body: Vec<u8>,
}

/// 缓冲区里已有完整请求头时，返回整条请求（头 + 体）的总字节数。
///
/// 连接循环用它决定还要不要继续读，以及是否超过大小上限。声明的长度大到
/// 无法相加时取 `usize::MAX`，必然超过上限。按第一个 Content-Length 计算，
/// 与之冲突的重复标头由 `Request::try_from` 拒绝。
pub fn expected_length(buffer: &[u8]) -> Option<usize> {
    let header_end = find_header_end(buffer)?;
    let head = String::from_utf8_lossy(&buffer[..header_end]);
    let content_length = head
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(
        (header_end + HEADER_END.len())
            .checked_add(content_length)
            .unwrap_or(usize::MAX),
    )
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
}

/// 请求行拆出的三部分
struct RequestLine {
    method: HttpRequestMethod,
    target: String,
    version: HttpVersion,
}

fn parse_request_line(line: &str, id: u128) -> Result<RequestLine, Exception> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() < 3 {
        error!("[ID{}]请求行无法识别：{}", id, line);
        return Err(Exception::MalformedRequest(line.to_string()));
    }
    let method = HttpRequestMethod::from_token(parts[0]).ok_or_else(|| {
        error!("[ID{}]拒绝请求方法{}", id, parts[0]);
        Exception::UnsupportedRequestMethod
    })?;
    let last = parts[parts.len() - 1];
    let version = HttpVersion::from_token(last).ok_or_else(|| {
        error!("[ID{}]拒绝协议版本{}", id, last);
        Exception::UnsupportedHttpVersion
    })?;
    // 目标中夹带空格时按原样拼回
    let target = parts[1..parts.len() - 1].join(" ");
    Ok(RequestLine {
        method,
        target,
        version,
    })
}

/// 逐行收集关心的标头
#[derive(Default)]
struct Headers {
    user_agent: String,
    accept_encoding: Vec<HttpEncoding>,
    content_type: Option<String>,
    content_length: Option<usize>,
    connection: Option<String>,
    cookies: Vec<(String, String)>,
}

impl Headers {
    fn collect<'a>(lines: impl Iterator<Item = &'a str>, id: u128) -> Result<Self, Exception> {
        let mut headers = Self::default();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "user-agent" => headers.user_agent = value.to_string(),
                "content-type" => headers.content_type = Some(value.to_string()),
                "connection" => headers.connection = Some(value.to_ascii_lowercase()),
                "content-length" => {
                    let length = value.parse::<usize>().map_err(|_| {
                        error!("[ID{}]Content-Length不是数字：{}", id, value);
                        Exception::MalformedRequest(line.to_string())
                    })?;
                    // 重复的 Content-Length 必须一致，否则无法确定请求边界
                    if headers.content_length.is_some_and(|first| first != length) {
                        error!("[ID{}]Content-Length前后不一致：{:?}与{}", id, headers.content_length, length);
                        return Err(Exception::MalformedRequest(line.to_string()));
                    }
                    headers.content_length = Some(length);
                }
                "cookie" => headers.cookies.extend(value.split(';').filter_map(|pair| {
                    pair.split_once('=')
                        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                })),
                // 只看第一条，出现关键字即认为支持
                "accept-encoding" if headers.accept_encoding.is_empty() => {
                    for encoding in [HttpEncoding::Gzip, HttpEncoding::Deflate] {
                        if value.contains(encoding.as_str()) {
                            headers.accept_encoding.push(encoding);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(headers)
    }
}

impl Request {
    /// `buffer` 是连接循环切出的一条请求，`id` 只用于日志。
    ///
    /// 请求行或标头不合法时返回对应的 `Exception`，由调用方换成 4xx/5xx 状态响应。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head_bytes, rest) = match find_header_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + HEADER_END.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };
        let head = std::str::from_utf8(head_bytes).map_err(|_| {
            error!("[ID{}]请求头不是合法的UTF-8", id);
            Exception::RequestIsNotUtf8
        })?;

        let mut lines = head.split(CRLF);
        let line = parse_request_line(lines.next().unwrap_or_default(), id)?;
        let headers = Headers::collect(lines, id)?;

        let (path, query) = match line.target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (line.target, None),
        };

        // 多出的字节属于下一条请求，不足时保留已读到的部分
        let body_len = headers.content_length.unwrap_or(0).min(rest.len());

        Ok(Self {
            method: line.method,
            path,
            query,
            version: line.version,
            user_agent: headers.user_agent,
            accept_encoding: headers.accept_encoding,
            content_type: headers.content_type,
            connection: headers.connection,
            cookies: headers.cookies,
            body: rest[..body_len].to_vec(),
        })
    }
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// 同名 Cookie 取第一个
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// HTTP/1.1 默认复用连接，HTTP/1.0 需要 `Connection: keep-alive`
    pub fn keep_alive(&self) -> bool {
        match (self.version, self.connection.as_deref()) {
            (_, Some("close")) => false,
            (HttpVersion::V1_1, _) => true,
            (HttpVersion::V1_0, Some("keep-alive")) => true,
            (HttpVersion::V1_0, _) => false,
        }
    }
}
