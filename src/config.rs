use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_ui_root")]
    ui_root: String,
    #[serde(default = "default_base_layout")]
    base_layout: String,
    #[serde(default = "default_partials_dir")]
    partials_dir: String,
    #[serde(default = "default_pages_dir")]
    pages_dir: String,
    #[serde(default = "default_template_suffix")]
    template_suffix: String,
    #[serde(default = "default_static_dir")]
    static_dir: String,
    #[serde(default = "default_session_lifetime_secs")]
    session_lifetime_secs: u64,
    #[serde(default = "default_max_request_bytes")]
    max_request_bytes: usize,
    #[serde(default = "default_compression")]
    compression: bool,
}

fn default_port() -> u16 {
    4000
}

fn default_local() -> bool {
    true
}

fn default_ui_root() -> String {
    "ui/html".to_string()
}

fn default_base_layout() -> String {
    "base.tmpl.html".to_string()
}

fn default_partials_dir() -> String {
    "partials".to_string()
}

fn default_pages_dir() -> String {
    "pages".to_string()
}

fn default_template_suffix() -> String {
    ".tmpl.html".to_string()
}

fn default_static_dir() -> String {
    "ui/static".to_string()
}

fn default_session_lifetime_secs() -> u64 {
    43200 // 12h
}

fn default_max_request_bytes() -> usize {
    65536 // 64KB
}

fn default_compression() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            local: default_local(),
            worker_threads: 0,
            ui_root: default_ui_root(),
            base_layout: default_base_layout(),
            partials_dir: default_partials_dir(),
            pages_dir: default_pages_dir(),
            template_suffix: default_template_suffix(),
            static_dir: default_static_dir(),
            session_lifetime_secs: default_session_lifetime_secs(),
            max_request_bytes: default_max_request_bytes(),
            compression: default_compression(),
        }
    }

    // 读取失败或解析失败时都退回默认配置，不阻止启动
    pub fn from_toml(filename: &str) -> Self {
        let mut str_val = String::new();
        let read = File::open(filename).and_then(|mut file| file.read_to_string(&mut str_val));
        let mut raw_config = match read {
            Ok(_) => Self::from_toml_str(&str_val),
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.max_request_bytes == 0 {
            warn!("max_request_bytes被设置为0，这将拒绝所有请求，因此该值将被改为65536。");
            raw_config.max_request_bytes = default_max_request_bytes();
        }
        raw_config
    }

    pub fn from_toml_str(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn ui_root(&self) -> &str {
        &self.ui_root
    }

    pub fn base_layout_path(&self) -> PathBuf {
        PathBuf::from(&self.ui_root).join(&self.base_layout)
    }

    pub fn partials_path(&self) -> PathBuf {
        PathBuf::from(&self.ui_root).join(&self.partials_dir)
    }

    pub fn pages_path(&self) -> PathBuf {
        PathBuf::from(&self.ui_root).join(&self.pages_dir)
    }

    pub fn template_suffix(&self) -> &str {
        &self.template_suffix
    }

    /// 与 `ui_root` 无关，相对于工作目录
    pub fn static_path(&self) -> PathBuf {
        PathBuf::from(&self.static_dir)
    }

    pub fn session_lifetime_secs(&self) -> u64 {
        self.session_lifetime_secs
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn compression(&self) -> bool {
        self.compression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.port(), 4000);
        assert!(config.local());
        assert_eq!(config.template_suffix(), ".tmpl.html");
        assert_eq!(config.base_layout_path(), PathBuf::from("ui/html/base.tmpl.html"));
        assert_eq!(config.pages_path(), PathBuf::from("ui/html/pages"));
        assert_eq!(config.static_path(), PathBuf::from("ui/static"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("port = 8080\nui_root = \"site\"\n");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.partials_path(), PathBuf::from("site/partials"));
        assert_eq!(config.static_path(), PathBuf::from("ui/static"));
        assert_eq!(config.session_lifetime_secs(), 43200);
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        let config = Config::from_toml_str("port = \"not a number\"");
        assert_eq!(config.port(), 4000);
    }

    #[test]
    fn test_shipped_development_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/development.toml");
        let config = Config::from_toml(path);
        assert_eq!(config.port(), 4000);
        assert!(config.compression());
        assert_eq!(config.max_request_bytes(), 65536);
        assert_eq!(config.worker_threads(), num_cpus::get());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::from_toml("config/does-not-exist.toml");
        assert_eq!(config.port(), 4000);
        assert!(config.worker_threads() > 0);
    }
}
