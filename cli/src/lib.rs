pub mod config;
pub mod error;
pub mod http;
pub mod shell;

pub use error::{Result, ShellError};
pub use http::ReqwestExecutor;
pub use shell::{render_text, Shell, StoredImage, UploadReport};
