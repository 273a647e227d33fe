//! Embedded static resources.
//!
//! # Usage
//!
//! ```ignore
//! use embed::{INDEX_HTML, IndexVars};
//!
//! let html = INDEX_HTML.render(&IndexVars { ws_port: 35729 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

/// Variables for index.html template.
pub struct IndexVars {
    pub ws_port: u16,
}

impl TemplateVars for IndexVars {
    fn apply(&self, content: &str) -> String {
        content.replace("__WS_PORT__", &self.ws_port.to_string())
    }
}

/// Preview page served at `/`.
pub const INDEX_HTML: Template<IndexVars> = Template::new(include_str!("index.html"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_injects_port() {
        let html = INDEX_HTML.render(&IndexVars { ws_port: 4242 });
        assert!(html.contains("4242"));
        assert!(!html.contains("__WS_PORT__"));
    }
}
