// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板数据与模板函数
//!
//! - [`TemplateData`]：传给每一次渲染调用的载荷。序列化后始终包含
//!   `current_year`、`snippet`、`snippets`、`form`、`flash` 五个键，缺省值为 `null`
//!   或空列表。模板引用了其它键时，在严格模式下会得到渲染期错误。
//! - [`FunctionRegistry`]：模板中可调用的纯函数表，启动时构造一次，之后只读。

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Local};
use serde_derive::Serialize;
use serde_json::Value;

use crate::{forms::SnippetCreateForm, models::Snippet};

/// 模板函数签名：接收已求值的参数，返回一个 JSON 值或错误描述。
pub type TemplateFunc = fn(&[Value]) -> Result<Value, String>;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub form: Option<SnippetCreateForm>,
    pub flash: Option<String>,
}

impl TemplateData {
    pub fn new(flash: Option<String>) -> Self {
        Self {
            current_year: Local::now().year(),
            snippet: None,
            snippets: Vec::new(),
            form: None,
            flash,
        }
    }
}

/// 模板函数表。名称到函数的映射按名称排序，保证每个渲染单元的注册顺序一致。
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, TemplateFunc>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 服务器默认使用的函数表。
    pub fn default_functions() -> Self {
        let mut registry = Self::new();
        registry.register("humanDate", human_date_func);
        registry
    }

    pub fn register(&mut self, name: &str, func: TemplateFunc) {
        self.functions.insert(name.to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<TemplateFunc> {
        self.functions.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TemplateFunc)> {
        self.functions.iter().map(|(name, func)| (name.as_str(), *func))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// 把时间格式化为 `17 May 2023 at 09:30` 的形式（24 小时制）。
pub fn human_date(t: &DateTime<Local>) -> String {
    t.format("%d %b %Y at %H:%M").to_string()
}

// 时间在载荷中序列化为 RFC 3339 字符串，按其自带的时区偏移格式化
fn human_date_func(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Null] => Ok(Value::String(String::new())),
        [Value::String(s)] => {
            let t = DateTime::parse_from_rfc3339(s)
                .map_err(|e| format!("humanDate: 无法解析时间'{}'：{}", s, e))?;
            Ok(Value::String(t.format("%d %b %Y at %H:%M").to_string()))
        }
        [other] => Err(format!("humanDate: 参数必须是时间字符串，实际为{}", other)),
        _ => Err(format!("humanDate: 需要1个参数，实际为{}个", args.len())),
    }
}
