pub mod app;
pub mod assets;
pub mod cache;
pub mod config;
pub mod exception;
pub mod forms;
pub mod models;
pub mod param;
pub mod render;
pub mod request;
pub mod response;
pub mod session;
pub mod templates;
pub mod validator;

pub use app::Application;
pub use assets::StaticFiles;
pub use cache::{FsTemplateSource, MemoryTemplateSource, TemplateCache, TemplateSource};
pub use config::Config;
pub use exception::Exception;
pub use forms::{decode_post_form, FormValues, FromForm, SnippetCreateForm};
pub use models::{MemorySnippetStore, Snippet, SnippetStore};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use render::{render, Rendered};
pub use request::Request;
pub use response::Response;
pub use session::SessionStore;
pub use templates::{FunctionRegistry, TemplateData};
pub use validator::{Validated, Validator};
