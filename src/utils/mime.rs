//! Content types for what the server streams.
//!
//! Run pages and the runtime shim, compiled artifacts, and the resources a
//! spx game ships next to its sources (sprites, sounds, fonts, JSON configs).

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const WASM: &str = "application/wasm";
    pub const OCTET_STREAM: &str = "application/octet-stream";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";

    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const OGG: &str = "audio/ogg";

    pub const TTF: &str = "font/ttf";
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
}

/// `Content-Type` for a file, by extension. Unknown types are sent as bytes.
pub fn from_path(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str());
    match ext.map(str::to_ascii_lowercase).as_deref() {
        Some("html" | "htm") => types::HTML,
        Some("txt") => types::PLAIN,
        Some("css") => types::CSS,
        Some("js" | "mjs") => types::JAVASCRIPT,
        Some("json") => types::JSON,
        Some("wasm") => types::WASM,

        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("svg") => types::SVG,

        Some("mp3") => types::MP3,
        Some("wav") => types::WAV,
        Some("ogg" | "oga") => types::OGG,

        Some("ttf") => types::TTF,
        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,

        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_resources() {
        assert_eq!(from_path(Path::new("res/index.json")), types::JSON);
        assert_eq!(from_path(Path::new("res/sprites/Calf/0.png")), types::PNG);
        assert_eq!(from_path(Path::new("res/sounds/hit.WAV")), types::WAV);
        assert_eq!(from_path(Path::new("res/fonts/pixel.ttf")), types::TTF);
    }

    #[test]
    fn test_wasm_artifact_and_shim() {
        assert_eq!(
            from_path(Path::new("9f86d081884c7d65-1700000000.wasm")),
            types::WASM
        );
        assert_eq!(from_path(Path::new("wasm_exec.js")), types::JAVASCRIPT);
    }

    #[test]
    fn test_unknown_is_octet_stream() {
        assert_eq!(from_path(Path::new("main.spx")), types::OCTET_STREAM);
        assert_eq!(from_path(Path::new("Makefile")), types::OCTET_STREAM);
    }
}
