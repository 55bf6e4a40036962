// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件
//!
//! `/static/` 前缀下的请求映射到静态目录中的文件。路径中出现 `..`、
//! 绝对路径或符号链接指向目录之外时一律按非法路径处理（400），
//! 目录和不存在的文件都是 404，不提供目录列表。

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use log::{debug, error};

use crate::{
    config::Config,
    exception::Exception,
    param::{DEFAULT_MIME, MIME_TYPES},
    response::Response,
};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.static_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `relative` 是去掉 `/static/` 之后的部分，返回磁盘上的文件路径。
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, Exception> {
        if relative.contains('\0') || relative.contains('\\') {
            return Err(Exception::InvalidPath(relative.to_string()));
        }
        let relative_path = Path::new(relative);
        for component in relative_path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Exception::InvalidPath(relative.to_string()));
                }
            }
        }

        let full = self.root.join(relative_path);
        if !full.is_file() {
            return Err(Exception::FileNotFound(relative.to_string()));
        }
        // 符号链接可能指向静态目录之外
        let not_found = |_: io::Error| Exception::FileNotFound(relative.to_string());
        let canonical_root = self.root.canonicalize().map_err(not_found)?;
        let canonical = full.canonicalize().map_err(not_found)?;
        if !canonical.starts_with(&canonical_root) {
            return Err(Exception::InvalidPath(relative.to_string()));
        }
        Ok(canonical)
    }

    pub fn serve(&self, relative: &str, id: u128) -> Result<Response, Exception> {
        let path = self.resolve(relative)?;
        let mime = mime_for(&path);
        debug!("[ID{}]静态文件{}，类型{}", id, path.display(), mime);
        let content = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Exception::FileNotFound(relative.to_string()),
            _ => {
                error!("[ID{}]读取{}失败：{}", id, path.display(), e);
                Exception::Storage(e.to_string())
            }
        })?;
        Ok(Response::from_file(mime, Bytes::from(content)))
    }
}

impl Default for StaticFiles {
    fn default() -> Self {
        Self::from_config(&Config::new())
    }
}

fn mime_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .and_then(|e| MIME_TYPES.get(e.as_str()).copied())
        .unwrap_or(DEFAULT_MIME)
}
