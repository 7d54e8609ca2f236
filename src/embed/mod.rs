//! Embedded pages served by the router.
//!
//! - `serve::LANDING_HTML` - package input form (`/`)
//! - `serve::RUN_HTML` - loader for a built package (`/spx/{pkg}/index.html`)
//!
//! ```ignore
//! use embed::serve::{LANDING_HTML, LandingVars};
//!
//! let html = LANDING_HTML.render(&LandingVars { pkg: config.sample.clone() });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};
    use crate::utils::html;

    /// Variables for landing.html.
    pub struct LandingVars {
        /// Package pre-filled in the input box.
        pub pkg: String,
    }

    impl TemplateVars for LandingVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__PKG__", &html::escape_attr(&self.pkg))
        }
    }

    /// Variables for run.html.
    pub struct RunVars {
        /// Program arguments handed to the module (`go.argv`).
        pub argv: Vec<String>,
        /// Absolute URL of the compiled module.
        pub wasm_url: String,
    }

    impl TemplateVars for RunVars {
        fn apply(&self, content: &str) -> String {
            let argv = html::script_json(&self.argv).unwrap_or_else(|_| "[]".into());
            let wasm_url = html::script_json(&self.wasm_url).unwrap_or_else(|_| "\"\"".into());
            content
                .replace("__ARGV__", &argv)
                .replace("__WASM_URL__", &wasm_url)
        }
    }

    /// Landing page template.
    pub const LANDING_HTML: Template<LandingVars> =
        Template::new(include_str!("serve/landing.html"));

    /// Run page template; relative URLs resolve under `/spx/{pkg}/`.
    pub const RUN_HTML: Template<RunVars> = Template::new(include_str!("serve/run.html"));
}

#[cfg(test)]
mod tests {
    use super::serve::*;

    #[test]
    fn test_landing_prefills_sample() {
        let html = LANDING_HTML.render(&LandingVars {
            pkg: "github.com/goplus/FlappyCalf".into(),
        });
        assert!(html.contains(r#"value="github.com/goplus/FlappyCalf""#));
        assert!(!html.contains("__PKG__"));
    }

    #[test]
    fn test_landing_escapes_attribute() {
        let html = LANDING_HTML.render(&LandingVars {
            pkg: r#""><script>alert(1)</script>"#.into(),
        });
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_run_page_interpolation() {
        let html = RUN_HTML.render(&RunVars {
            argv: vec!["github.com/goplus/FlappyCalf".into()],
            wasm_url: "/wasm/github.com/goplus/FlappyCalf/ab-1.wasm".into(),
        });
        assert!(html.contains(r#"go.argv = ["github.com/goplus/FlappyCalf"];"#));
        assert!(html.contains(r#"fetch("/wasm/github.com/goplus/FlappyCalf/ab-1.wasm")"#));
        assert!(html.contains(r#"<script src="wasm_exec.js"></script>"#));
        assert!(html.contains("fetch('_wait')"));
        assert!(!html.contains("__ARGV__"));
        assert!(!html.contains("__WASM_URL__"));
    }

    #[test]
    fn test_run_page_argv_cannot_break_script() {
        let html = RUN_HTML.render(&RunVars {
            argv: vec!["x</script><script>alert(1)//".into()],
            wasm_url: "/wasm/x/a.wasm".into(),
        });
        assert!(!html.contains("x</script>"));
    }

    #[test]
    fn test_templates_carry_placeholders() {
        assert!(LANDING_HTML.content().contains("__PKG__"));
        assert!(RUN_HTML.content().contains("__ARGV__"));
    }
}
