//! # 表单模型
//!
//! 提交的 `application/x-www-form-urlencoded` 请求体先被解码为 [`FormValues`]，
//! 再通过 [`FromForm`] 转换为具体的表单类型。表单类型持有自己的 `Validator`，
//! 校验规则由表单自己声明。
//!
//! 解码失败分两类：
//! - 提交的数据有问题（无法解析的数字、错误的内容类型），返回 `Exception::FormDecode`，
//!   以 400 响应结束本次请求；
//! - 表单类型本身声明有误（字段名为空或重复），返回 `Exception::InvalidDecoder`，
//!   属于编程错误，由最外层的请求边界终止请求。

use std::collections::HashSet;
use std::str::FromStr;

use serde::ser::{SerializeMap, Serializer};
use serde_derive::Serialize;
use url::form_urlencoded;

use crate::{
    exception::Exception,
    param::FORM_CONTENT_TYPE,
    request::Request,
    validator::{max_chars, not_blank, permitted_value, run_checks, Validated, Validator},
};

/// 解码后的表单键值对，保留提交顺序，同名键可以出现多次。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    pub fn parse(body: &[u8]) -> Self {
        Self {
            pairs: form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    /// 同名键的第一个值。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 缺失的键解码为空字符串。
    pub fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// 缺失或为空的键解码为 `T::default()`，无法解析时返回 `FormDecode`。
    pub fn parsed<T>(&self, key: &str) -> Result<T, Exception>
    where
        T: FromStr + Default,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None | Some("") => Ok(T::default()),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| Exception::FormDecode {
                field: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// 可以从提交的表单构造的类型。
pub trait FromForm: Sized {
    /// 该类型读取的字段名。
    const FIELDS: &'static [&'static str];

    fn from_form(values: &FormValues) -> Result<Self, Exception>;
}

/// 校验解码目标的声明。
pub fn check_decoder<T: FromForm>() -> Result<(), Exception> {
    let mut seen = HashSet::new();
    for field in T::FIELDS {
        if field.is_empty() {
            return Err(Exception::InvalidDecoder("字段名不能为空".to_string()));
        }
        if !seen.insert(*field) {
            return Err(Exception::InvalidDecoder(format!("字段名{}重复", field)));
        }
    }
    Ok(())
}

/// 把 POST 请求体解码为表单类型。
pub fn decode_post_form<T: FromForm>(request: &Request) -> Result<T, Exception> {
    check_decoder::<T>()?;
    let content_type = request.content_type().unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        return Err(Exception::FormDecode {
            field: "Content-Type".to_string(),
            reason: format!("不支持的内容类型：{}", content_type),
        });
    }
    let values = FormValues::parse(request.body());
    T::from_form(&values)
}

/// 创建片段的表单。
///
/// 序列化后的 `errors` 对每个声明的字段都给出一个列表（可能为空），
/// 模板可以直接遍历 `form.errors.title` 而不必担心键不存在。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    pub expires: i64,
    #[serde(rename = "errors", serialize_with = "serialize_errors")]
    validator: Validator,
}

impl SnippetCreateForm {
    /// 创建页面的初始表单。
    pub fn new() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::new(),
        }
    }

    /// 运行全部字段约束，返回表单是否有效。每次调用都从空的错误集开始。
    pub fn validate(&mut self) -> bool {
        self.validator = Validator::new();
        let title_not_blank = not_blank(&self.title);
        let title_short = max_chars(&self.title, 100);
        let content_not_blank = not_blank(&self.content);
        let expires_permitted = permitted_value(&self.expires, &[1, 7, 365]);
        run_checks(
            self,
            &[
                (title_not_blank, "title", "This field cannot be blank"),
                (
                    title_short,
                    "title",
                    "This field cannot be more than 100 characters long",
                ),
                (content_not_blank, "content", "This field cannot be blank"),
                (
                    expires_permitted,
                    "expires",
                    "This field must equal 1, 7, or 365",
                ),
            ],
        )
    }
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        Self::new()
    }
}

impl FromForm for SnippetCreateForm {
    const FIELDS: &'static [&'static str] = &["title", "content", "expires"];

    fn from_form(values: &FormValues) -> Result<Self, Exception> {
        Ok(Self {
            title: values.string("title"),
            content: values.string("content"),
            expires: values.parsed("expires")?,
            validator: Validator::new(),
        })
    }
}

impl Validated for SnippetCreateForm {
    fn validator(&self) -> &Validator {
        &self.validator
    }

    fn validator_mut(&mut self) -> &mut Validator {
        &mut self.validator
    }
}

fn serialize_errors<S: Serializer>(validator: &Validator, serializer: S) -> Result<S::Ok, S::Error> {
    let fields = SnippetCreateForm::FIELDS;
    let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
    for field in fields {
        map.serialize_entry(field, validator.field_errors(field))?;
    }
    map.serialize_entry("non_field", validator.non_field_errors())?;
    map.end()
}
