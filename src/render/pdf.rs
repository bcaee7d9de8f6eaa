// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! PDF export.
//!
//! The document is first wrapped in a styled HTML page (header block, content,
//! "Exported on" footer), then that page is laid out on A4 by walking its DOM.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::image::{self, ImageKind};
use super::pdf_writer::{Align, Font, PdfWriter, Rgb, TextStyle};
use super::{content_html, format_timestamp, resolve_image, RenderContext, RenderError, RenderResult};
use crate::storage::Document;

static STATIC_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<img\b[^>]*\bsrc=["'])/static/"#).expect("valid static src regex")
});

const STYLESHEET: &str = r#"
@page { size: A4; margin: 2cm; }
body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
h1 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
h2 { color: #34495e; margin-top: 30px; }
h3 { color: #555; }
code { background-color: #f4f4f4; padding: 2px 5px; border-radius: 3px; font-family: 'Courier New', monospace; }
pre { background-color: #f4f4f4; padding: 15px; border-radius: 5px; overflow-x: auto; }
table { border-collapse: collapse; width: 100%; margin: 20px 0; }
th, td { border: 1px solid #ddd; padding: 12px; text-align: left; }
th { background-color: #3498db; color: white; }
img { max-width: 100%; height: auto; }
.header { margin-bottom: 30px; padding-bottom: 20px; border-bottom: 2px solid #ecf0f1; }
.footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #ecf0f1; font-size: 0.9em; color: #7f8c8d; text-align: center; }
"#;

/// The styled HTML page that gets laid out.
pub fn html_document(document: &Document, organization: Option<&str>, ctx: &RenderContext) -> String {
    let static_url = format!("${{1}}file://{}/", ctx.static_root.display());
    let content = STATIC_SRC.replace_all(&content_html(document), static_url.as_str()).into_owned();

    let organization = organization
        .map(|name| {
            format!(
                "<p><strong>Organization:</strong> {}</p>",
                html_escape::encode_text(name)
            )
        })
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>{STYLESHEET}</style>\n</head>\n<body>\n\
         <div class=\"header\">\n<h1>{title}</h1>\n{organization}\n\
         <p><strong>Created:</strong> {created}</p>\n\
         <p><strong>Last Updated:</strong> {updated}</p>\n</div>\n\
         <div class=\"content\">\n{content}\n</div>\n\
         <div class=\"footer\">\n<p>{exported}</p>\n</div>\n</body>\n</html>\n",
        title = html_escape::encode_text(&document.title),
        created = format_timestamp(document.created_at),
        updated = format_timestamp(document.updated_at),
        exported = ctx.exported_on(),
    )
}

/// Complete PDF for `document`.
pub fn render(document: &Document, organization: Option<&str>, ctx: &RenderContext) -> RenderResult<Vec<u8>> {
    let page = Html::parse_document(&html_document(document, organization, ctx));
    let body_selector =
        Selector::parse("body").map_err(|e| RenderError::Layout(format!("{e:?}")))?;
    let body = page
        .select(&body_selector)
        .next()
        .ok_or_else(|| RenderError::Layout("styled page has no body".to_string()))?;

    let mut layout = Layout::new(ctx, &document.title);
    layout.children(body);
    layout.flush();
    Ok(layout.pdf.finish())
}

// =============================================================================
// DOM Layout
// =============================================================================

fn body_style() -> TextStyle {
    TextStyle {
        font: Font::Regular,
        size: 11.0,
        color: Rgb::hex(0x333333),
        align: Align::Left,
        indent: 0.0,
    }
}

fn heading_style(level: u8) -> TextStyle {
    let (size, color) = match level {
        1 => (20.0, 0x2C3E50),
        2 => (16.0, 0x34495E),
        3 => (14.0, 0x555555),
        _ => (12.0, 0x333333),
    };
    TextStyle {
        font: Font::Bold,
        size,
        color: Rgb::hex(color),
        ..body_style()
    }
}

struct Layout<'a> {
    ctx: &'a RenderContext,
    pdf: PdfWriter,
    pending: String,
    style: TextStyle,
    /// List marker for the next flushed paragraph
    marker: Option<String>,
    list_depth: usize,
}

impl<'a> Layout<'a> {
    fn new(ctx: &'a RenderContext, title: &str) -> Self {
        Self {
            ctx,
            pdf: PdfWriter::new(title),
            pending: String::new(),
            style: body_style(),
            marker: None,
            list_depth: 0,
        }
    }

    fn flush(&mut self) {
        let text = collapse(&std::mem::take(&mut self.pending));
        let text = text.trim();
        let marker = self.marker.take();
        if text.is_empty() && marker.is_none() {
            return;
        }
        let line = match marker {
            Some(marker) => format!("{marker} {text}"),
            None => text.to_string(),
        };
        self.pdf.paragraph(&line, self.style);
        self.pdf.space(self.style.size * 0.4);
    }

    fn children(&mut self, parent: ElementRef<'_>) {
        for child in parent.children() {
            if let Some(element) = ElementRef::wrap(child) {
                self.element(element);
            } else if let Some(text) = child.value().as_text() {
                self.pending.push_str(text);
            }
        }
    }

    /// Lay out children with a temporary style.
    fn styled(&mut self, parent: ElementRef<'_>, style: TextStyle) {
        self.flush();
        let saved = std::mem::replace(&mut self.style, style);
        self.children(parent);
        self.flush();
        self.style = saved;
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                let level = name.as_bytes()[1] - b'0';
                self.pdf.space(if level <= 2 { 10.0 } else { 6.0 });
                self.pending = element.text().collect();
                let saved = std::mem::replace(&mut self.style, heading_style(level));
                self.flush();
                self.style = saved;
                if level == 1 {
                    self.pdf.rule(Rgb::hex(0x3498DB), 2.0);
                    self.pdf.space(6.0);
                }
            }
            "p" => {
                self.flush();
                self.children(element);
                self.flush();
            }
            "br" => self.flush(),
            "ul" | "ol" => self.list(element, name == "ol"),
            "pre" => {
                self.flush();
                self.pdf.preformatted(&element.text().collect::<String>(), 9.0);
                self.pdf.space(8.0);
            }
            "table" => {
                self.flush();
                self.table(element);
            }
            "img" => {
                self.flush();
                self.image(element.value().attr("src").unwrap_or_default());
            }
            "blockquote" => {
                let style = TextStyle {
                    font: Font::Italic,
                    indent: self.style.indent + 20.0,
                    color: Rgb::hex(0x555555),
                    ..self.style
                };
                self.styled(element, style);
            }
            "hr" => {
                self.flush();
                self.pdf.rule(Rgb::hex(0xDDDDDD), 1.0);
            }
            "div" => match element.value().attr("class") {
                Some("header") => {
                    self.styled(element, self.style);
                    self.pdf.rule(Rgb::hex(0xECF0F1), 2.0);
                    self.pdf.space(16.0);
                }
                Some("footer") => {
                    self.flush();
                    self.pdf.space(16.0);
                    self.pdf.rule(Rgb::hex(0xECF0F1), 1.0);
                    self.pdf.space(8.0);
                    let style = TextStyle {
                        size: 10.0,
                        color: Rgb::hex(0x7F8C8D),
                        align: Align::Center,
                        ..body_style()
                    };
                    self.styled(element, style);
                }
                _ => self.styled(element, self.style),
            },
            "section" | "article" | "main" | "header" | "footer" | "li" | "dl" | "dt" | "dd"
            | "figure" | "figcaption" => self.styled(element, self.style),
            "script" | "style" | "head" | "title" | "meta" | "link" => {}
            _ => self.children(element),
        }
    }

    fn list(&mut self, list: ElementRef<'_>, ordered: bool) {
        self.flush();
        self.list_depth += 1;
        let style = TextStyle {
            indent: 18.0 * self.list_depth as f32,
            ..self.style
        };
        let saved = std::mem::replace(&mut self.style, style);

        let items = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "li");
        for (index, item) in items.enumerate() {
            self.marker = Some(if ordered {
                format!("{}.", index + 1)
            } else {
                "•".to_string()
            });
            self.children(item);
            self.flush();
        }

        self.style = saved;
        self.list_depth -= 1;
    }

    fn table(&mut self, table: ElementRef<'_>) {
        let rows: Vec<(Vec<String>, bool)> = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "tr")
            .map(|row| {
                let cells: Vec<ElementRef<'_>> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| matches!(el.value().name(), "td" | "th"))
                    .collect();
                let header = !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th");
                let texts = cells
                    .iter()
                    .map(|c| collapse(&c.text().collect::<String>()).trim().to_string())
                    .collect();
                (texts, header)
            })
            .collect();

        let columns = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(0);
        for (cells, header) in &rows {
            self.pdf.table_row(cells, columns, *header);
        }
        self.pdf.space(12.0);
    }

    fn image(&mut self, src: &str) {
        if let Some(path) = resolve_image(src, &self.ctx.static_root) {
            if let Ok(bytes) = std::fs::read(&path) {
                if let Some(info) = image::inspect(&bytes).filter(|i| i.kind == ImageKind::Jpeg) {
                    self.pdf.jpeg(bytes, info);
                    self.pdf.space(8.0);
                    return;
                }
            }
        }

        // Report the reference as written in the document.
        let shown = src
            .strip_prefix("file://")
            .and_then(|path| {
                path.strip_prefix(&format!("{}/", self.ctx.static_root.display()))
            })
            .map(|rest| format!("/static/{rest}"))
            .unwrap_or_else(|| src.to_string());
        let style = TextStyle {
            font: Font::Italic,
            ..self.style
        };
        self.pdf.paragraph(&format!("[Image: {shown}]"), style);
        self.pdf.space(4.0);
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::image::fixtures::{tiny_jpeg, tiny_png};
    use crate::render::test_support::{ctx, doc};
    use crate::storage::ContentType;

    #[test]
    fn styled_page_has_header_content_and_footer() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(ContentType::Markdown, "Body **text**");
        let html = html_document(&document, Some("Acme & Co"), &ctx(temp.path()));

        assert!(html.contains("<h1>Handbook</h1>"));
        assert!(html.contains("<strong>Organization:</strong> Acme &amp; Co"));
        assert!(html.contains("<strong>Created:</strong> 2026-01-02 03:04:05"));
        assert!(html.contains("<strong>Last Updated:</strong> N/A"));
        assert!(html.contains("<strong>text</strong>"));
        assert!(html.contains("<p>Exported on 2026-02-01 12:00:00</p>"));
        assert!(html.contains("size: A4"));
    }

    #[test]
    fn static_images_point_at_the_static_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(ContentType::Html, "<img src=\"/static/uploads/a.jpg\">");
        let html = html_document(&document, None, &ctx(temp.path()));

        let expected = format!("src=\"file://{}/uploads/a.jpg\"", temp.path().display());
        assert!(html.contains(&expected), "{html}");
        assert!(!html.contains("Organization"));
    }

    #[test]
    fn renders_a_pdf_with_text_content() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(
            ContentType::Markdown,
            "# Setup\n\n- one\n- two\n\n```\ncode line\n```\n\n| A | B |\n|---|---|\n| 1 | 2 |\n",
        );
        let bytes = render(&document, Some("Acme"), &ctx(temp.path())).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-"));
        assert!(text.contains("(Handbook) Tj"));
        assert!(text.contains("(Organization: Acme) Tj"));
        assert!(text.contains("(Setup) Tj"));
        assert!(text.contains("(\\225 one) Tj"));
        assert!(text.contains("(code line) Tj"));
        assert!(text.contains("(A) Tj"));
        assert!(text.contains("(Exported on 2026-02-01 12:00:00) Tj"));
    }

    #[test]
    fn jpegs_embed_and_other_images_become_placeholders() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.jpg"), tiny_jpeg()).unwrap();
        std::fs::write(temp.path().join("b.png"), tiny_png()).unwrap();
        let document = doc(
            ContentType::Html,
            "<p><img src=\"/static/a.jpg\"></p><p><img src=\"/static/b.png\"></p>\
             <img src=\"https://cdn.test/c.gif\">",
        );
        let bytes = render(&document, None, &ctx(temp.path())).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.contains("/Filter /DCTDecode"));
        assert!(text.contains("/Im1 Do"));
        assert!(text.contains("([Image: /static/b.png]) Tj"));
        assert!(text.contains("([Image: https://cdn.test/c.gif]) Tj"));
    }

    #[test]
    fn empty_body_still_renders() {
        let temp = tempfile::TempDir::new().unwrap();
        let bytes = render(&doc(ContentType::Html, ""), None, &ctx(temp.path())).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("(Handbook) Tj"));
    }
}
