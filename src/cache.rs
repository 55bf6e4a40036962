// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板缓存
//!
//! 启动时把「基础布局 + 全部片段 + 单个页面」编译成一个个渲染单元（[`RenderUnit`]），
//! 以页面名为键存入 [`TemplateCache`]。缓存构建完成后只读，可以放进 `Arc`
//! 在所有连接任务之间无锁共享。
//!
//! ## 组合方式
//! 每个渲染单元是一个独立的 Handlebars 注册表（严格模式，HTML 转义）：
//! - 基础布局注册为局部模板 `base`；
//! - 每个片段以其名称注册为局部模板，例如 `{{> nav}}`；
//! - 模板函数表中的每个函数注册为 helper；
//! - 页面内容被包裹为 `{{#> base}}...{{/base}}`，页面通过内联局部模板
//!   （`{{#*inline "main"}}`）填充布局中预留的位置。
//!
//! 任何源文件缺失、无法读取或语法错误都会返回 `Exception::Build`，
//! 调用方必须在开始监听之前终止进程。

use std::{
    collections::{HashMap, HashSet},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, RenderErrorReason,
    ScopedJson,
};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::Config,
    exception::Exception,
    templates::{FunctionRegistry, TemplateFunc},
};

/// 基础布局在每个渲染单元中的局部模板名
pub const BASE_PARTIAL: &str = "base";

/// 一份模板源：名称与原始文本。
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

/// 模板源的读取接口。
pub trait TemplateSource {
    fn base_layout(&self) -> Result<SourceFile, Exception>;

    /// 所有片段，顺序无关。
    fn partials(&self) -> Result<Vec<SourceFile>, Exception>;

    /// 所有页面，名称即缓存键。
    fn pages(&self) -> Result<Vec<SourceFile>, Exception>;
}

/// 从磁盘读取模板源。
///
/// 名称取文件名并去掉模板后缀，例如 `pages/home.tmpl.html` 的键为 `home`。
/// 片段目录不存在时视为没有片段；页面目录不存在则是构建错误。
#[derive(Debug, Clone)]
pub struct FsTemplateSource {
    base_layout: PathBuf,
    partials_dir: PathBuf,
    pages_dir: PathBuf,
    suffix: String,
}

impl FsTemplateSource {
    pub fn new(base_layout: &Path, partials_dir: &Path, pages_dir: &Path, suffix: &str) -> Self {
        Self {
            base_layout: base_layout.to_path_buf(),
            partials_dir: partials_dir.to_path_buf(),
            pages_dir: pages_dir.to_path_buf(),
            suffix: suffix.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.base_layout_path(),
            &config.partials_path(),
            &config.pages_path(),
            config.template_suffix(),
        )
    }

    fn read(&self, path: &Path) -> Result<SourceFile, Exception> {
        let text = fs::read_to_string(path).map_err(|e| build_error(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| build_error(path, "文件名不是合法的 UTF-8"))?;
        let name = file_name.strip_suffix(&self.suffix).unwrap_or(file_name);
        Ok(SourceFile::new(name, &text))
    }

    // 按文件名排序，保证两次构建的读取顺序一致
    fn read_dir(&self, dir: &Path, required: bool) -> Result<Vec<SourceFile>, Exception> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound && !required => {
                debug!("模板目录{}不存在，跳过", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(build_error(dir, e)),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| build_error(dir, e))?.path();
            let matched = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(&self.suffix));
            if matched && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| self.read(p)).collect()
    }
}

impl TemplateSource for FsTemplateSource {
    fn base_layout(&self) -> Result<SourceFile, Exception> {
        self.read(&self.base_layout)
    }

    fn partials(&self) -> Result<Vec<SourceFile>, Exception> {
        self.read_dir(&self.partials_dir, false)
    }

    fn pages(&self) -> Result<Vec<SourceFile>, Exception> {
        self.read_dir(&self.pages_dir, true)
    }
}

/// 内存中的模板源，用于测试和内嵌模板。
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateSource {
    base: Option<String>,
    partials: Vec<SourceFile>,
    pages: Vec<SourceFile>,
}

impl MemoryTemplateSource {
    pub fn new(base: &str) -> Self {
        Self {
            base: Some(base.to_string()),
            ..Default::default()
        }
    }

    /// 没有基础布局的模板源，构建时必然失败。
    pub fn without_base() -> Self {
        Self::default()
    }

    pub fn with_partial(mut self, name: &str, text: &str) -> Self {
        self.partials.push(SourceFile::new(name, text));
        self
    }

    pub fn with_page(mut self, name: &str, text: &str) -> Self {
        self.pages.push(SourceFile::new(name, text));
        self
    }
}

impl TemplateSource for MemoryTemplateSource {
    fn base_layout(&self) -> Result<SourceFile, Exception> {
        match &self.base {
            Some(text) => Ok(SourceFile::new(BASE_PARTIAL, text)),
            None => Err(Exception::Build {
                source_name: BASE_PARTIAL.to_string(),
                reason: "基础布局不存在".to_string(),
            }),
        }
    }

    fn partials(&self) -> Result<Vec<SourceFile>, Exception> {
        Ok(self.partials.clone())
    }

    fn pages(&self) -> Result<Vec<SourceFile>, Exception> {
        Ok(self.pages.clone())
    }
}

fn build_error(path: &Path, reason: impl ToString) -> Exception {
    Exception::Build {
        source_name: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// 把函数表中的纯函数桥接为 Handlebars helper。
struct FunctionHelper {
    func: TemplateFunc,
}

impl HelperDef for FunctionHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        match (self.func)(&args) {
            Ok(value) => Ok(ScopedJson::Derived(value)),
            Err(reason) => Err(RenderErrorReason::Other(reason).into()),
        }
    }
}

/// 一个页面编译后的渲染单元，构建后不可变。
pub struct RenderUnit {
    page: String,
    registry: Handlebars<'static>,
}

impl RenderUnit {
    fn compose(
        base: &SourceFile,
        partials: &[SourceFile],
        page: &SourceFile,
        functions: &FunctionRegistry,
    ) -> Result<Self, Exception> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        for (name, func) in functions.iter() {
            registry.register_helper(name, Box::new(FunctionHelper { func }));
        }
        registry
            .register_partial(BASE_PARTIAL, &base.text)
            .map_err(|e| template_error(&base.name, e))?;
        for partial in partials {
            registry
                .register_partial(&partial.name, &partial.text)
                .map_err(|e| template_error(&partial.name, e))?;
        }
        let composed = format!("{{{{#> {}}}}}{}{{{{/{}}}}}", BASE_PARTIAL, page.text, BASE_PARTIAL);
        registry
            .register_template_string(&page.name, composed)
            .map_err(|e| template_error(&page.name, e))?;
        Ok(Self {
            page: page.name.clone(),
            registry,
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// 在内存中执行渲染单元，返回完整输出。任何执行期错误都不会产生部分输出。
    pub fn execute<T: Serialize>(&self, data: &T) -> Result<String, Exception> {
        self.registry
            .render(&self.page, data)
            .map_err(|e| Exception::TemplateExecution {
                page: self.page.clone(),
                reason: e.to_string(),
            })
    }
}

fn template_error(name: &str, e: impl ToString) -> Exception {
    Exception::Build {
        source_name: name.to_string(),
        reason: e.to_string(),
    }
}

/// 页面名到渲染单元的只读映射。
///
/// 没有任何插入或删除方法：查询时存在的键，必然从构建时起就存在。
pub struct TemplateCache {
    units: HashMap<String, RenderUnit>,
}

impl TemplateCache {
    /// 读取模板源并编译所有页面。任何一个源出错，整个构建失败。
    pub fn build(source: &dyn TemplateSource, functions: &FunctionRegistry) -> Result<Self, Exception> {
        let base = source.base_layout()?;
        let partials = source.partials()?;
        let pages = source.pages()?;

        let mut partial_names = HashSet::new();
        for partial in &partials {
            if partial.name == BASE_PARTIAL {
                return Err(template_error(&partial.name, "片段名与基础布局冲突"));
            }
            if !partial_names.insert(partial.name.as_str()) {
                return Err(template_error(&partial.name, "片段名重复"));
            }
        }

        let mut units = HashMap::new();
        for page in &pages {
            if units.contains_key(&page.name) {
                return Err(template_error(&page.name, "页面名重复"));
            }
            let unit = RenderUnit::compose(&base, &partials, page, functions)?;
            debug!("页面模板{}编译完成", page.name);
            units.insert(page.name.clone(), unit);
        }
        info!(
            "模板缓存构建完成：{}个页面，{}个片段，{}个模板函数",
            units.len(),
            partials.len(),
            functions.len()
        );
        Ok(Self { units })
    }

    pub fn get(&self, page: &str) -> Option<&RenderUnit> {
        self.units.get(page)
    }

    pub fn contains(&self, page: &str) -> bool {
        self.units.contains_key(page)
    }

    /// 所有页面名，按字典序排列。
    pub fn pages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
