// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! # Content Renderers
//!
//! Pure conversions of a stored document into its export formats:
//!
//! | Format   | Module       | Input                           |
//! |----------|--------------|---------------------------------|
//! | Markdown | [`markdown`] | markdown as-is, HTML converted  |
//! | PDF      | [`pdf`]      | styled HTML laid out on A4      |
//! | DOCX     | [`docx`]     | HTML DOM walk                   |
//! | RTF      | [`rtf`]      | regex-driven HTML conversion    |
//!
//! Renderers never read the clock or the environment. The export timestamp
//! and the directory that `/static/` image references resolve against are
//! passed in through [`RenderContext`], so output is a function of input.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{ContentType, Document};

pub mod docx;
pub mod image;
pub mod markdown;
pub mod pdf;
mod pdf_writer;
pub mod rtf;

/// Timestamp format used in document headers and footers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error type for rendering a single document into a single format.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("HTML layout failed: {0}")]
    Layout(String),

    #[error("DOCX packaging failed: {0}")]
    Docx(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Export formats of a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[serde(alias = "md")]
    Markdown,
    Pdf,
    #[serde(alias = "word")]
    Docx,
    Rtf,
}

impl DocumentFormat {
    /// Every format, in the order an export renders them.
    pub const ALL: [DocumentFormat; 4] = [
        DocumentFormat::Markdown,
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Rtf,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "md",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Rtf => "rtf",
        }
    }

    /// MIME type for HTTP responses.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "text/markdown; charset=utf-8",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Rtf => "application/rtf",
        }
    }
}

/// Inputs shared by all renderers that are not part of the document.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Directory that `/static/...` references resolve against.
    pub static_root: PathBuf,
    /// Timestamp printed in the "Exported on" footer.
    pub exported_at: DateTime<Utc>,
}

impl RenderContext {
    pub fn new(static_root: impl Into<PathBuf>, exported_at: DateTime<Utc>) -> Self {
        Self {
            static_root: static_root.into(),
            exported_at,
        }
    }

    pub(crate) fn exported_on(&self) -> String {
        format!("Exported on {}", self.exported_at.format(TIMESTAMP_FORMAT))
    }
}

/// Render `document` into `format`.
pub fn render(
    format: DocumentFormat,
    document: &Document,
    organization: Option<&str>,
    ctx: &RenderContext,
) -> RenderResult<Vec<u8>> {
    match format {
        DocumentFormat::Markdown => Ok(markdown::render(document).into_bytes()),
        DocumentFormat::Pdf => pdf::render(document, organization, ctx),
        DocumentFormat::Docx => docx::render(document, organization, ctx),
        DocumentFormat::Rtf => Ok(rtf::render(document, organization, ctx).into_bytes()),
    }
}

/// The document body as HTML.
///
/// Markdown is converted with tables and strikethrough enabled; HTML bodies
/// are returned unchanged.
pub fn content_html(document: &Document) -> String {
    match document.content_type {
        ContentType::Html => document.body().to_string(),
        ContentType::Markdown => markdown_to_html(document.body()),
    }
}

pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Header timestamp, or `N/A` when absent.
pub(crate) fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Resolve an image `src` to a readable file inside `static_root`.
///
/// `/static/...` resolves under `static_root`, and `file://` URLs are accepted
/// only when they point inside it. Anything that resolves elsewhere (absolute
/// paths, `..` segments, symlinks) yields `None`, as do data URLs, remote URLs
/// and missing files.
pub fn resolve_image(src: &str, static_root: &Path) -> Option<PathBuf> {
    let candidate = if let Some(relative) = src.strip_prefix("/static/") {
        static_root.join(relative)
    } else if let Some(path) = src.strip_prefix("file://") {
        PathBuf::from(path)
    } else {
        return None;
    };

    let root = static_root.canonicalize().ok()?;
    let resolved = candidate.canonicalize().ok()?;
    (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn extensions_are_stable() {
        let exts: Vec<_> = DocumentFormat::ALL.iter().map(|f| f.extension()).collect();
        assert_eq!(exts, vec!["md", "pdf", "docx", "rtf"]);
    }

    #[test]
    fn format_parses_from_query_values() {
        let parse = |s: &str| serde_json::from_value::<DocumentFormat>(serde_json::json!(s));
        assert_eq!(parse("pdf").unwrap(), DocumentFormat::Pdf);
        assert_eq!(parse("md").unwrap(), DocumentFormat::Markdown);
        assert_eq!(parse("word").unwrap(), DocumentFormat::Docx);
        assert!(parse("odt").is_err());
    }

    #[test]
    fn markdown_body_becomes_html() {
        let html = content_html(&doc(ContentType::Markdown, "# Title\n\n**bold**"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn html_body_is_unchanged() {
        let body = "<p>Hi <b>there</b></p>";
        assert_eq!(content_html(&doc(ContentType::Html, body)), body);
    }

    #[test]
    fn missing_timestamp_prints_na() {
        assert_eq!(format_timestamp(None), "N/A");
    }

    #[test]
    fn resolve_image_handles_static_and_rejects_others() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("uploads")).unwrap();
        std::fs::write(temp.path().join("uploads/logo.jpg"), b"x").unwrap();

        let logo = temp.path().join("uploads/logo.jpg").canonicalize().unwrap();
        assert_eq!(resolve_image("/static/uploads/logo.jpg", temp.path()), Some(logo.clone()));
        let url = format!("file://{}/uploads/logo.jpg", temp.path().display());
        assert_eq!(resolve_image(&url, temp.path()), Some(logo));
        assert!(resolve_image("/static/uploads/missing.jpg", temp.path()).is_none());
        assert!(resolve_image("/static/../etc/passwd", temp.path()).is_none());
        assert!(resolve_image("data:image/png;base64,AAAA", temp.path()).is_none());
        assert!(resolve_image("https://example.com/a.png", temp.path()).is_none());
    }

    #[test]
    fn resolve_image_stays_inside_the_static_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let static_root = temp.path().join("static");
        std::fs::create_dir_all(&static_root).unwrap();
        let private = temp.path().join("private.png");
        std::fs::write(&private, b"x").unwrap();

        let absolute = private.display().to_string();
        assert!(resolve_image(&absolute, &static_root).is_none());
        assert!(resolve_image(&format!("file://{absolute}"), &static_root).is_none());
        assert!(resolve_image("/static/../private.png", &static_root).is_none());
        let dotted = format!("file://{}/../private.png", static_root.display());
        assert!(resolve_image(&dotted, &static_root).is_none());
    }
}
