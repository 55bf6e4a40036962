// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单校验模块
//!
//! `Validator` 是一个按请求创建的错误累加器，记录：
//! - 字段错误：字段名到有序错误消息列表的映射；
//! - 通用错误：不属于任何单一字段的有序错误消息列表。
//!
//! 表单类型通过持有一个 `Validator` 并实现 [`Validated`] 访问器来获得校验能力，
//! 校验规则则是一组互不依赖的纯函数谓词，由调用方求值后交给累加器。

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Serialize;

lazy_static! {
    /// 常用的电子邮件地址格式（WHATWG 推荐写法）。
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .unwrap();
}

/// 单次校验过程中累积的错误。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validator {
    field_errors: HashMap<String, Vec<String>>,
    non_field_errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 条件不成立时，把消息追加到该字段的错误列表末尾。
    pub fn check_field(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_field_error(field, message);
        }
    }

    pub fn add_field_error(&mut self, field: &str, message: &str) {
        self.field_errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    /// 两类错误都为空时才算通过。
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// 某个字段的错误消息，没有记录时返回空切片。
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.field_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }
}

/// 访问器约定：任何持有 `Validator` 的表单类型都可以借此使用统一的校验接口。
pub trait Validated {
    fn validator(&self) -> &Validator;

    fn validator_mut(&mut self) -> &mut Validator;

    fn check_field(&mut self, ok: bool, field: &str, message: &str) {
        self.validator_mut().check_field(ok, field, message);
    }

    fn add_non_field_error(&mut self, message: &str) {
        self.validator_mut().add_non_field_error(message);
    }

    fn valid(&self) -> bool {
        self.validator().valid()
    }

    fn field_errors(&self, field: &str) -> &[String] {
        self.validator().field_errors(field)
    }
}

/// 一条已求值的字段约束：(条件, 字段名, 失败消息)。
pub type Check<'a> = (bool, &'a str, &'a str);

/// 依次应用一组约束，返回应用后表单是否有效。
pub fn run_checks<F: Validated + ?Sized>(form: &mut F, checks: &[Check<'_>]) -> bool {
    for &(ok, field, message) in checks {
        form.check_field(ok, field, message);
    }
    form.valid()
}

// --- 谓词 ---

/// 去掉首尾空白后非空。
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// 按 Unicode 标量值计数，不超过上限。
pub fn max_chars(value: &str, limit: usize) -> bool {
    value.chars().count() <= limit
}

/// 按 Unicode 标量值计数，不少于下限。
pub fn min_chars(value: &str, limit: usize) -> bool {
    value.chars().count() >= limit
}

/// 值等于候选列表中的任意一个。
pub fn permitted_value<T: PartialEq>(value: &T, allowed: &[T]) -> bool {
    allowed.iter().any(|candidate| candidate == value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LoginForm {
        email: String,
        validator: Validator,
    }

    impl Validated for LoginForm {
        fn validator(&self) -> &Validator {
            &self.validator
        }

        fn validator_mut(&mut self) -> &mut Validator {
            &mut self.validator
        }
    }

    #[test]
    fn test_new_validator_is_valid() {
        let v = Validator::new();
        assert!(v.valid());
        assert!(v.field_errors("title").is_empty());
        assert!(v.non_field_errors().is_empty());
    }

    #[test]
    fn test_check_field_true_is_noop() {
        let mut v = Validator::new();
        v.check_field(true, "title", "never shown");
        assert!(v.valid());
    }

    #[test]
    fn test_field_errors_accumulate_in_order() {
        let mut v = Validator::new();
        v.check_field(false, "title", "first");
        v.check_field(false, "title", "second");
        v.check_field(false, "content", "other");
        assert!(!v.valid());
        assert_eq!(v.field_errors("title"), ["first", "second"]);
        assert_eq!(v.field_errors("content"), ["other"]);
    }

    #[test]
    fn test_non_field_error_invalidates() {
        let mut v = Validator::new();
        v.add_non_field_error("Email or password is incorrect");
        v.add_non_field_error("Try again");
        assert!(!v.valid());
        assert_eq!(v.non_field_errors(), ["Email or password is incorrect", "Try again"]);
    }

    #[test]
    fn test_not_blank() {
        assert!(!not_blank(""));
        assert!(!not_blank("   "));
        assert!(!not_blank("\t\n"));
        assert!(not_blank("a"));
        assert!(not_blank("  a  "));
    }

    #[test]
    fn test_max_chars() {
        assert!(max_chars(&"x".repeat(100), 100));
        assert!(!max_chars(&"x".repeat(101), 100));
        assert!(max_chars("", 0));
        // 多字节字符按字符计数
        assert!(max_chars("日本語", 3));
        assert!(!max_chars("日本語", 2));
    }

    #[test]
    fn test_min_chars() {
        assert!(min_chars("password", 8));
        assert!(!min_chars("pass", 8));
        assert!(min_chars("日本語", 3));
    }

    #[test]
    fn test_permitted_value() {
        assert!(permitted_value(&7, &[1, 7, 365]));
        assert!(!permitted_value(&30, &[1, 7, 365]));
        assert!(permitted_value(&"b", &["a", "b"]));
        assert!(!permitted_value(&1, &[]));
    }

    #[test]
    fn test_matches_email() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(!matches("alice@", &EMAIL_RX));
        assert!(!matches("", &EMAIL_RX));
    }

    #[test]
    fn test_accessor_contract() {
        let mut form = LoginForm {
            email: "bob".to_string(),
            validator: Validator::new(),
        };
        let email_ok = matches(&form.email, &EMAIL_RX);
        let valid = run_checks(
            &mut form,
            &[
                (not_blank("bob"), "email", "This field cannot be blank"),
                (email_ok, "email", "This field must be a valid email address"),
            ],
        );
        assert!(!valid);
        assert_eq!(
            form.field_errors("email"),
            ["This field must be a valid email address"]
        );
    }
}
