// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用上下文
//!
//! `Application` 持有所有请求共享的依赖：只读的模板缓存、静态文件目录、片段存储与会话存储。
//! 它在启动时构造一次，随后以 `Arc` 的形式交给每个连接任务，进程退出时才销毁。
//!
//! 请求处理链（由外到内）：
//! 1. 恢复边界：不可恢复的编程错误转换为关闭连接的 500；
//! 2. 请求日志；
//! 3. 安全标头；
//! 4. 路由与处理器。

use std::{backtrace::Backtrace, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    assets::StaticFiles,
    cache::TemplateCache,
    config::Config,
    exception::Exception,
    forms::{decode_post_form, SnippetCreateForm},
    models::SnippetStore,
    param::{HttpRequestMethod, SECURE_HEADERS, SESSION_COOKIE},
    render::render,
    request::Request,
    response::Response,
    session::SessionStore,
    templates::TemplateData,
};

pub const HOME_PAGE: &str = "home";
pub const VIEW_PAGE: &str = "view";
pub const CREATE_PAGE: &str = "create";

const CREATED_FLASH: &str = "Snippet successfully created!";

pub struct Application {
    templates: Arc<TemplateCache>,
    snippets: Arc<dyn SnippetStore>,
    sessions: Arc<SessionStore>,
    assets: StaticFiles,
    compression: bool,
}

impl Application {
    pub fn new(
        templates: Arc<TemplateCache>,
        snippets: Arc<dyn SnippetStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            templates,
            snippets,
            sessions,
            assets: StaticFiles::default(),
            compression: false,
        }
    }

    pub fn with_static_files(mut self, assets: StaticFiles) -> Self {
        self.assets = assets;
        self
    }

    pub fn from_config(
        config: &Config,
        templates: TemplateCache,
        snippets: Arc<dyn SnippetStore>,
    ) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(config.session_lifetime_secs()));
        let mut app = Self::new(Arc::new(templates), snippets, Arc::new(sessions))
            .with_static_files(StaticFiles::from_config(config));
        app.compression = config.compression();
        app
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// 处理一个完整的请求，总是返回一个可以直接写出的响应。
    pub fn handle(&self, request: &Request, id: u128, remote: &str) -> Response {
        // 请求日志
        info!(
            "[ID{}] {} - HTTP/{} {} {}",
            id,
            remote,
            request.version(),
            request.method(),
            request.path()
        );

        let mut response = self.recover(self.route(request, id), id);

        // 安全标头
        for (name, value) in SECURE_HEADERS.iter() {
            response.set_header(name, value);
        }

        if self.compression {
            response.compress(request.accept_encoding(), id);
        }
        if request.method() == HttpRequestMethod::Head {
            response.strip_body();
        }
        response
    }

    /// 恢复边界：把处理器返回的错误转换为响应。
    ///
    /// 不可恢复的错误表示代码缺陷，除 500 外还要求关闭连接。
    pub fn recover(&self, result: Result<Response, Exception>, id: u128) -> Response {
        match result {
            Ok(response) => response,
            Err(e) if e.is_unrecoverable() => {
                let mut response = self.server_error(&e, id);
                response.set_header("Connection", "close");
                response
            }
            Err(e) if e.status_code() >= 500 => self.server_error(&e, id),
            Err(e) => self.client_error(&e, id),
        }
    }

    fn route(&self, request: &Request, id: u128) -> Result<Response, Exception> {
        use HttpRequestMethod::*;

        let path = request.path();
        let method = request.method();
        if path == "/" {
            return match method {
                Get | Head => self.home(request, id),
                Post => Ok(Response::response_405(vec![Get, Head])),
            };
        }
        if path == "/snippet/create" {
            return match method {
                Get | Head => self.snippet_create(request, id),
                Post => self.snippet_create_post(request, id),
            };
        }
        if let Some(raw_id) = path.strip_prefix("/snippet/view/") {
            return match method {
                Get | Head => self.snippet_view(request, raw_id, id),
                Post => Ok(Response::response_405(vec![Get, Head])),
            };
        }
        if let Some(relative) = path.strip_prefix("/static/") {
            return match method {
                Get | Head => self.assets.serve(relative, id),
                Post => Ok(Response::response_405(vec![Get, Head])),
            };
        }
        debug!("[ID{}]没有匹配{}的路由", id, path);
        Ok(Response::response_404())
    }

    // --- 处理器 ---

    fn home(&self, request: &Request, id: u128) -> Result<Response, Exception> {
        let snippets = self.snippets.latest()?;
        let mut data = self.new_template_data(request);
        data.snippets = snippets;
        Ok(self.render(HOME_PAGE, 200, &data, id))
    }

    fn snippet_view(&self, request: &Request, raw_id: &str, id: u128) -> Result<Response, Exception> {
        let snippet_id = match raw_id.parse::<u64>() {
            Ok(n) if n >= 1 => n,
            _ => return Ok(Response::response_404()),
        };
        let snippet = self.snippets.get(snippet_id)?;
        let mut data = self.new_template_data(request);
        data.snippet = Some(snippet);
        Ok(self.render(VIEW_PAGE, 200, &data, id))
    }

    fn snippet_create(&self, request: &Request, id: u128) -> Result<Response, Exception> {
        let mut data = self.new_template_data(request);
        data.form = Some(SnippetCreateForm::new());
        Ok(self.render(CREATE_PAGE, 200, &data, id))
    }

    fn snippet_create_post(&self, request: &Request, id: u128) -> Result<Response, Exception> {
        let mut form: SnippetCreateForm = decode_post_form(request)?;

        if !form.validate() {
            debug!("[ID{}]表单校验未通过，重新渲染创建页面", id);
            let mut data = self.new_template_data(request);
            data.form = Some(form);
            return Ok(self.render(CREATE_PAGE, 422, &data, id));
        }

        let snippet_id = self
            .snippets
            .insert(&form.title, &form.content, form.expires)?;

        let cookie = request.cookie(SESSION_COOKIE);
        let token = self.sessions.put_flash(cookie, CREATED_FLASH);

        let mut response = Response::redirect(&format!("/snippet/view/{}", snippet_id), 303);
        if cookie != Some(token.as_str()) {
            response.set_cookie(SESSION_COOKIE, &token, self.sessions.lifetime().as_secs());
        }
        Ok(response)
    }

    // --- 辅助函数 ---

    fn new_template_data(&self, request: &Request) -> TemplateData {
        TemplateData::new(self.sessions.pop_flash(request.cookie(SESSION_COOKIE)))
    }

    /// 在缓冲区中渲染页面；失败时整个响应降级为 500，不写出任何部分内容。
    pub fn render<T: Serialize>(&self, page: &str, status: u16, data: &T, id: u128) -> Response {
        match render(&self.templates, page, status, data) {
            Ok(rendered) => rendered.into_response(),
            Err(e) => self.server_error(&e, id),
        }
    }

    /// 记录完整错误与调用栈，向客户端只返回固定的 500 文本。
    pub fn server_error(&self, err: &Exception, id: u128) -> Response {
        let trace = Backtrace::force_capture();
        error!("[ID{}]{}\n{}", id, err, trace);
        Response::response_500()
    }

    pub fn client_error(&self, err: &Exception, id: u128) -> Response {
        warn!("[ID{}]{}", id, err);
        Response::from_status_code(err.status_code())
    }
}
