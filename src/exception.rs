// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器在启动与请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 分类
//! - **请求层**：报文无法解析、方法或协议版本不受支持。
//! - **模板层**：启动期的模板构建失败（致命），以及渲染期的模板缺失或执行失败。
//! - **表单层**：可恢复的表单解码错误，以及不可恢复的解码器配置错误。
//! - **存储层**：记录不存在或存储后端失败。
//! - **静态文件**：路径非法或文件不存在。
//!
//! 表单校验失败不属于异常，它由 `validator` 模块累积后直接展示给用户。

use thiserror::Error;

/// 服务器处理过程中发生的异常类型。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 请求行或标头格式错误。
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    /// 客户端使用了服务器不支持的 HTTP 方法。
    #[error("Unsupported request method")]
    UnsupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 请求体超过配置允许的大小。
    #[error("Payload too large ({0} bytes)")]
    PayloadTooLarge(usize),

    /// 模板构建失败。启动期致命错误，服务器不得开始接受请求。
    #[error("Failed to build template '{source_name}': {reason}")]
    Build { source_name: String, reason: String },
    /// 请求的页面不在模板缓存中。这是编程或配置错误，不是合法的用户路径。
    #[error("The template {0} does not exist")]
    TemplateNotFound(String),
    /// 模板在缓冲区中执行失败，例如引用了载荷中不存在的字段。
    #[error("Failed to execute template '{page}': {reason}")]
    TemplateExecution { page: String, reason: String },

    /// 提交的表单无法解码。可恢复，对应 `400 Bad Request`。
    #[error("Failed to decode form field '{field}': {reason}")]
    FormDecode { field: String, reason: String },
    /// 解码目标声明有误。属于编程错误，终止整个请求。
    #[error("Invalid form decoder target: {0}")]
    InvalidDecoder(String),

    /// 存储中没有匹配的记录。对应 `404 Not Found`。
    #[error("No matching record found")]
    NoRecord,
    /// 存储后端失败。
    #[error("Storage failure: {0}")]
    Storage(String),

    /// 静态文件路径含有 `..`、绝对路径等非法成分，或者解析后逃出了静态目录。
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
}

use Exception::*;

impl Exception {
    /// 判断异常是否为不可恢复的编程错误。
    ///
    /// 这类异常由最外层的请求边界统一转换为关闭连接的 500 响应。
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, InvalidDecoder(_))
    }

    /// 异常对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest(_) | FormDecode { .. } | InvalidPath(_) => 400,
            NoRecord | FileNotFound(_) => 404,
            PayloadTooLarge(_) => 413,
            UnsupportedRequestMethod => 501,
            UnsupportedHttpVersion => 505,
            Build { .. }
            | TemplateNotFound(_)
            | TemplateExecution { .. }
            | InvalidDecoder(_)
            | Storage(_) => 500,
        }
    }
}
