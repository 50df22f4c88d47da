//! Embedded static resources for kittens.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Dev server resources (livereload.js, 404 page)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{LIVERELOAD_JS, LivereloadVars};
//!
//! let js = LIVERELOAD_JS.render(&LivereloadVars { reload_port: 8081 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// URL the injected script tag points at.
    pub const LIVERELOAD_PATH: &str = "/livereload.js";

    /// Variables for livereload.js.
    pub struct LivereloadVars {
        pub reload_port: u16,
    }

    impl TemplateVars for LivereloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__KITTENS_RELOAD_PORT__", &self.reload_port.to_string())
        }
    }

    /// Live reload client with WebSocket port injection.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));

    /// Variables for the not-found page.
    pub struct NotFoundVars {
        pub path: String,
    }

    impl TemplateVars for NotFoundVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__PATH__", &html_escape(&self.path))
        }
    }

    /// 404 page.
    pub const NOT_FOUND_HTML: Template<NotFoundVars> = Template::new(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>404 Not Found</title></head>\n<body>\n<h1>404 Not Found</h1>\n<p><code>__PATH__</code> does not exist.</p>\n</body>\n</html>\n",
    );

    fn html_escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}
