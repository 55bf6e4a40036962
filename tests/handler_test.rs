//! 通过 `Application::handle` 的处理器级测试，使用随仓库发布的 ui 模板。

use std::{path::Path, sync::Arc, time::Duration};

use mockall::mock;

use snippetserver::{
    app::Application,
    assets::StaticFiles,
    cache::{FsTemplateSource, TemplateCache},
    config::Config,
    exception::Exception,
    models::{MemorySnippetStore, Snippet, SnippetStore},
    param::{HttpEncoding, SECURE_HEADERS},
    request::Request,
    response::Response,
    session::SessionStore,
    templates::FunctionRegistry,
};

mock! {
    pub Store {}

    impl SnippetStore for Store {
        fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<u64, Exception>;
        fn get(&self, id: u64) -> Result<Snippet, Exception>;
        fn latest(&self) -> Result<Vec<Snippet>, Exception>;
    }
}

fn templates() -> TemplateCache {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("ui").join("html");
    let source = FsTemplateSource::new(
        &root.join("base.tmpl.html"),
        &root.join("partials"),
        &root.join("pages"),
        ".tmpl.html",
    );
    TemplateCache::build(&source, &FunctionRegistry::default_functions()).unwrap()
}

fn app_with(store: Arc<dyn SnippetStore>) -> Application {
    let static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("ui").join("static");
    Application::new(
        Arc::new(templates()),
        store,
        Arc::new(SessionStore::new(Duration::from_secs(600))),
    )
    .with_static_files(StaticFiles::new(static_dir))
}

fn parse(raw: &str) -> Request {
    Request::try_from(raw.as_bytes(), 0).unwrap()
}

fn get(path: &str, cookie: Option<&str>) -> Request {
    let cookie = cookie
        .map(|c| format!("Cookie: {}\r\n", c))
        .unwrap_or_default();
    parse(&format!("GET {} HTTP/1.1\r\nHost: localhost\r\n{}\r\n", path, cookie))
}

fn post_form(body: &str) -> Request {
    parse(&format!(
        "POST /snippet/create HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    ))
}

fn body(response: &Response) -> String {
    response
        .content()
        .map(|c| String::from_utf8_lossy(c).to_string())
        .unwrap_or_default()
}

#[test]
fn test_create_then_view_shows_flash_once() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));

    let created = app.handle(
        &post_form("title=O+snail&content=Climb+Mount+Fuji&expires=7"),
        1,
        "127.0.0.1",
    );
    assert_eq!(created.status_code(), 303);
    let location = created.header("Location").unwrap().to_string();
    assert_eq!(location, "/snippet/view/1");
    let cookie = created
        .header("Set-Cookie")
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();

    let viewed = app.handle(&get(&location, Some(&cookie)), 2, "127.0.0.1");
    assert_eq!(viewed.status_code(), 200);
    let page = body(&viewed);
    assert!(page.contains("Snippet successfully created!"));
    assert!(page.contains("<strong>O snail</strong>"));

    let again = app.handle(&get(&location, Some(&cookie)), 3, "127.0.0.1");
    assert!(!body(&again).contains("Snippet successfully created!"));

    let home = app.handle(&get("/", None), 4, "127.0.0.1");
    assert!(body(&home).contains("<a href='/snippet/view/1'>O snail</a>"));
}

#[test]
fn test_invalid_submission_is_redisplayed() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    let response = app.handle(&post_form("title=&content=kept&expires=30"), 1, "127.0.0.1");

    assert_eq!(response.status_code(), 422);
    let page = body(&response);
    assert!(page.contains("This field cannot be blank"));
    assert!(page.contains("This field must equal 1, 7, or 365"));
    assert!(page.contains("<textarea name='content'>kept</textarea>"));
    assert_eq!(response.header("Set-Cookie"), None);
}

#[test]
fn test_create_page_defaults() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    let response = app.handle(&get("/snippet/create", None), 1, "127.0.0.1");
    assert_eq!(response.status_code(), 200);
    assert!(body(&response).contains("value='365' checked"));
}

#[test]
fn test_wrong_content_type_is_bad_request() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    let request = parse(
        "POST /snippet/create HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
    );
    let response = app.handle(&request, 1, "127.0.0.1");
    assert_eq!(response.status_code(), 400);
    assert_eq!(body(&response), "Bad Request\n");
}

#[test]
fn test_unknown_routes_and_methods() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));

    let missing = app.handle(&get("/snippets", None), 1, "127.0.0.1");
    assert_eq!(missing.status_code(), 404);

    let wrong = app.handle(
        &parse("POST /snippet/view/1 HTTP/1.1\r\nContent-Length: 0\r\n\r\n"),
        2,
        "127.0.0.1",
    );
    assert_eq!(wrong.status_code(), 405);
    assert!(String::from_utf8_lossy(&wrong.as_bytes()).contains("Allow: GET, HEAD\r\n"));
}

#[test]
fn test_view_unknown_snippet() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    let response = app.handle(&get("/snippet/view/42", None), 1, "127.0.0.1");
    assert_eq!(response.status_code(), 404);
    assert_eq!(body(&response), "Not Found\n");
}

#[test]
fn test_storage_failure_hides_details() {
    let mut store = MockStore::new();
    store
        .expect_get()
        .returning(|_| Err(Exception::Storage("disk on fire at /var/db".to_string())));
    let app = app_with(Arc::new(store));

    let response = app.handle(&get("/snippet/view/1", None), 1, "127.0.0.1");
    assert_eq!(response.status_code(), 500);
    let raw = String::from_utf8_lossy(&response.as_bytes()).to_string();
    assert!(!raw.contains("/var/db"));
    assert!(raw.ends_with("Internal Server Error\n"));
}

#[test]
fn test_insert_failure_is_500() {
    let mut store = MockStore::new();
    store
        .expect_insert()
        .times(1)
        .returning(|_, _, _| Err(Exception::Storage("read-only".to_string())));
    let app = app_with(Arc::new(store));

    let response = app.handle(&post_form("title=a&content=b&expires=1"), 1, "127.0.0.1");
    assert_eq!(response.status_code(), 500);
}

#[test]
fn test_secure_headers_on_errors_too() {
    let mut store = MockStore::new();
    store
        .expect_latest()
        .returning(|| Err(Exception::Storage("down".to_string())));
    let app = app_with(Arc::new(store));

    let response = app.handle(&get("/", None), 1, "127.0.0.1");
    assert_eq!(response.status_code(), 500);
    for (name, value) in SECURE_HEADERS.iter() {
        assert_eq!(response.header(name), Some(*value));
    }
}

#[test]
fn test_compression_from_config() {
    let config = Config::from_toml_str("compression = true");
    let app = Application::from_config(&config, templates(), Arc::new(MemorySnippetStore::new()));

    let request = parse("GET / HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n");
    let response = app.handle(&request, 1, "127.0.0.1");
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.content_encoding(), Some(HttpEncoding::Gzip));

    let config = Config::from_toml_str("compression = false");
    let app = Application::from_config(&config, templates(), Arc::new(MemorySnippetStore::new()));
    let response = app.handle(&request, 2, "127.0.0.1");
    assert_eq!(response.content_encoding(), None);
}

#[test]
fn test_stylesheet_served_and_linked() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));

    let home = app.handle(&get("/", None), 1, "127.0.0.1");
    assert!(body(&home).contains("<link rel='stylesheet' href='/static/css/main.css'>"));

    let css = app.handle(&get("/static/css/main.css", None), 2, "127.0.0.1");
    assert_eq!(css.status_code(), 200);
    let raw = String::from_utf8_lossy(&css.as_bytes()).to_string();
    assert!(raw.contains("Content-Type: text/css;charset=utf-8\r\n"));
    assert!(body(&css).contains("div.flash"));
    assert_eq!(css.header("X-Content-Type-Options"), Some("nosniff"));

    let head = app.handle(&parse("HEAD /static/css/main.css HTTP/1.1\r\n\r\n"), 3, "127.0.0.1");
    assert_eq!(head.status_code(), 200);
    assert!(head.content().is_none());
    assert_eq!(head.content_length(), css.content_length());
}

#[test]
fn test_static_paths_outside_dir_are_rejected() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    for path in [
        "/static/../../config/development.toml",
        "/static/css/../../html/base.tmpl.html",
        "/static//etc/passwd",
    ] {
        let response = app.handle(&get(path, None), 1, "127.0.0.1");
        assert_eq!(response.status_code(), 400, "{}", path);
        assert_eq!(body(&response), "Bad Request\n");
    }
}

#[test]
fn test_static_missing_files_and_directories() {
    let app = app_with(Arc::new(MemorySnippetStore::new()));
    for path in ["/static/css/print.css", "/static/css/", "/static/"] {
        let response = app.handle(&get(path, None), 1, "127.0.0.1");
        assert_eq!(response.status_code(), 404, "{}", path);
        assert_eq!(body(&response), "Not Found\n");
    }

    let post = parse("POST /static/css/main.css HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert_eq!(app.handle(&post, 2, "127.0.0.1").status_code(), 405);
}
