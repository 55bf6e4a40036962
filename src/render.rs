//! # 渲染器
//!
//! 渲染分两步：先在缓存中查找页面，再把渲染单元执行到内存缓冲区。
//! 两步都成功后才交给调用方写出状态码、标头和响应体；任何一步失败时，
//! 调用方尚未收到任何字节，可以把整个响应降级为统一的 500。

use bytes::Bytes;
use log::debug;
use serde::Serialize;

use crate::{cache::TemplateCache, exception::Exception, response::Response};

/// 一次成功渲染的结果：状态码与完整的响应体。
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub status: u16,
    pub body: Bytes,
}

impl Rendered {
    pub fn into_response(self) -> Response {
        Response::from_html(self.status, self.body)
    }
}

/// 在缓冲区中渲染页面。
///
/// - 页面不在缓存中：`Exception::TemplateNotFound`；
/// - 执行失败（载荷缺少字段、模板函数出错等）：`Exception::TemplateExecution`。
pub fn render<T: Serialize>(
    cache: &TemplateCache,
    page: &str,
    status: u16,
    data: &T,
) -> Result<Rendered, Exception> {
    let unit = cache
        .get(page)
        .ok_or_else(|| Exception::TemplateNotFound(page.to_string()))?;
    let buffer = unit.execute(data)?;
    debug!("页面{}渲染完成，{} bytes", page, buffer.len());
    Ok(Rendered {
        status,
        body: Bytes::from(buffer),
    })
}
