// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 片段服务器
//!
//! 启动顺序：日志 → 配置 → 模板缓存 → 存储 → 监听端口 → 主事件循环。
//! 模板缓存构建失败时进程在监听端口之前以非零状态退出。

use snippetserver::{
    app::Application,
    cache::{FsTemplateSource, TemplateCache},
    config::Config,
    exception::Exception,
    models::{MemorySnippetStore, SnippetStore},
    request::{self, Request},
    response::Response,
    templates::FunctionRegistry,
};

use log::{debug, error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    time::timeout,
};

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    process,
    sync::Arc,
    time::Duration,
};

const DEFAULT_CONFIG: &str = "config/development.toml";
const LOG_CONFIG: &str = "config/log4rs.yaml";

/// 长连接空闲超过该时长即关闭
const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 4096;

fn main() {
    // 1. 日志：优先使用 YAML 配置，读取失败时退回控制台输出
    init_logging();

    // 2. 配置：第一个命令行参数可以覆盖配置文件路径
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = Config::from_toml(&config_path);
    info!("配置文件{}已载入", config_path);
    info!("ui root: {}，静态目录: {}", config.ui_root(), config.static_path().display());

    // 3. 模板缓存：任何构建错误都是致命的
    let source = FsTemplateSource::from_config(&config);
    let templates = match TemplateCache::build(&source, &FunctionRegistry::default_functions()) {
        Ok(templates) => templates,
        Err(e) => {
            error!("模板缓存构建失败：{}", e);
            process::exit(1);
        }
    };
    info!("模板缓存构建完成，共{}个页面：{:?}", templates.len(), templates.pages());

    // 4. 存储与应用上下文
    let snippets: Arc<dyn SnippetStore> = Arc::new(MemorySnippetStore::new());
    let app = Arc::new(Application::from_config(&config, templates, snippets));

    // 5. 异步运行时：工作线程数由配置决定
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads().max(1))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };
    runtime.block_on(serve(config, app));
}

fn init_logging() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match config.map(log4rs::init_config) {
        Ok(Ok(_)) => warn!("无法读取{}，使用默认的控制台日志配置", LOG_CONFIG),
        Ok(Err(e)) => eprintln!("无法初始化日志系统：{}", e),
        Err(e) => eprintln!("默认日志配置无效：{}", e),
    }
}

/// # 主事件循环
///
/// 持续接收新连接并交给 Tokio 线程池处理，收到 Ctrl-C 后退出。
async fn serve(config: Config, app: Arc<Application>) {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            process::exit(1);
        }
    };
    info!("服务端在{}上监听Socket连接", socket);

    let max_request_bytes = config.max_request_bytes();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut id: u128 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("收到停机信号，共接受{}个连接，正在退出...", id);
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    debug!("[ID{}]TCP连接已建立：{}", id, remote);
                    let app = Arc::clone(&app);
                    tokio::spawn(handle_connection(stream, remote, id, app, max_request_bytes));
                    id += 1;
                }
                Err(e) => warn!("接受连接失败：{}", e),
            }
        }
    }
}

/// # 连接处理器
///
/// 读取完整的请求（请求头 + Content-Length 指定的请求体），交给应用处理并写回响应。
/// 长连接上循环处理后续请求。
async fn handle_connection(
    mut stream: TcpStream,
    remote: SocketAddr,
    id: u128,
    app: Arc<Application>,
    max_request_bytes: usize,
) {
    let remote = remote.to_string();
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        // 1. 读取一个完整请求，多余的字节留给下一个请求
        let total = loop {
            let expected = request::expected_length(&buffer);
            let too_large = match expected {
                Some(total) => total > max_request_bytes,
                None => buffer.len() > max_request_bytes,
            };
            if too_large {
                let e = Exception::PayloadTooLarge(max_request_bytes);
                warn!("[ID{}]{}", id, e);
                let mut response = Response::from_status_code(e.status_code());
                response.set_header("Connection", "close");
                write_response(&mut stream, &response, id).await;
                return;
            }
            if let Some(total) = expected {
                if buffer.len() >= total {
                    break total;
                }
            }
            match timeout(KEEP_ALIVE_TIMEOUT, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    debug!("[ID{}]客户端关闭连接", id);
                    return;
                }
                Ok(Ok(n)) => buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                    return;
                }
                Err(_) => {
                    debug!("[ID{}]连接空闲超时", id);
                    return;
                }
            }
        };
        let raw: Vec<u8> = buffer.drain(..total).collect();

        // 2. 解析请求：无法解析时回复对应的状态码并关闭连接
        let request = match Request::try_from(&raw, id) {
            Ok(request) => request,
            Err(e) => {
                warn!("[ID{}]解析HTTP请求失败: {}", id, e);
                let mut response = Response::from_status_code(e.status_code());
                response.set_header("Connection", "close");
                write_response(&mut stream, &response, id).await;
                return;
            }
        };
        debug!("[ID{}]成功解析HTTP请求", id);

        // 3. 交给应用处理
        let mut response = app.handle(&request, id, &remote);
        let keep_alive = request.keep_alive() && response.header("Connection") != Some("close");
        if !keep_alive {
            response.set_header("Connection", "close");
        }

        // 4. 写回响应
        if !write_response(&mut stream, &response, id).await || !keep_alive {
            return;
        }
    }
}

async fn write_response(stream: &mut TcpStream, response: &Response, id: u128) -> bool {
    let bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return false;
    }
    let _ = stream.flush().await;
    true
}
