// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Word (DOCX) export.
//!
//! The HTML body is parsed into a DOM and walked element by element. Block
//! elements become paragraphs, lists and tables; inline formatting is carried
//! down the walk so nested `<strong><em>` keeps both. Local images are
//! embedded, everything else degrades to an italic `[Image: src]` marker.

use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, AlignmentType, BreakType, Docx, Hyperlink, HyperlinkType, IndentLevel,
    Level, LevelJc, LevelText, NumberFormat, Numbering, NumberingId, Paragraph, Pic, Run,
    RunFonts, Start, Style, StyleType, Table, TableCell, TableRow,
};
use scraper::{ElementRef, Html};

use super::{content_html, format_timestamp, image, resolve_image, RenderContext, RenderError, RenderResult};
use crate::storage::Document;

const BULLET_ABSTRACT_ID: usize = 1;
const DECIMAL_ABSTRACT_ID: usize = 2;
const BULLET_NUMBERING_ID: usize = 1;
const MAX_LIST_DEPTH: usize = 4;

/// EMU per pixel at 96 dpi.
const EMU_PER_PX: u64 = 9_525;
const EMU_PER_INCH: u64 = 914_400;

const CODE_FONT: &str = "Courier New";

/// Inline formatting inherited from enclosing elements.
#[derive(Debug, Clone, Copy, Default)]
struct Inline {
    bold: bool,
    italic: bool,
    underline: bool,
    code: bool,
}

impl Inline {
    fn run(self, text: &str) -> Run {
        let mut run = Run::new().add_text(text);
        if self.bold {
            run = run.bold();
        }
        if self.italic {
            run = run.italic();
        }
        if self.underline {
            run = run.underline("single");
        }
        if self.code {
            run = run
                .fonts(RunFonts::new().ascii(CODE_FONT).hi_ansi(CODE_FONT))
                .size(20);
        }
        run
    }
}

/// A paragraph under construction.
struct Line {
    paragraph: Paragraph,
    empty: bool,
}

impl Line {
    fn new(paragraph: Paragraph) -> Self {
        Self {
            paragraph,
            empty: true,
        }
    }

    fn run(mut self, run: Run) -> Self {
        self.paragraph = self.paragraph.add_run(run);
        self.empty = false;
        self
    }

    fn link(mut self, link: Hyperlink) -> Self {
        self.paragraph = self.paragraph.add_hyperlink(link);
        self.empty = false;
        self
    }
}

enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Accumulates blocks while walking the DOM.
struct Builder<'a> {
    ctx: &'a RenderContext,
    blocks: Vec<Block>,
    /// Numbering instances created for ordered lists
    ordered_lists: Vec<usize>,
}

impl<'a> Builder<'a> {
    fn new(ctx: &'a RenderContext) -> Self {
        Self {
            ctx,
            blocks: Vec::new(),
            ordered_lists: Vec::new(),
        }
    }

    fn push(&mut self, paragraph: Paragraph) {
        self.blocks.push(Block::Paragraph(paragraph));
    }

    // ========== Block Elements ==========

    fn children(&mut self, parent: ElementRef<'_>) {
        for child in parent.children() {
            if let Some(element) = ElementRef::wrap(child) {
                self.element(element);
            } else if let Some(text) = child.value().as_text() {
                let text = collapse(text);
                let text = text.trim();
                if !text.is_empty() {
                    self.push(Paragraph::new().add_run(Run::new().add_text(text)));
                }
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let text = collapse(&element.text().collect::<String>());
                let style = format!("Heading{}", &name[1..]);
                self.push(
                    Paragraph::new()
                        .style(&style)
                        .add_run(Run::new().add_text(text.trim())),
                );
            }
            "p" => {
                let line = self.inline_children(Line::new(Paragraph::new()), element, Inline::default());
                self.push(line.paragraph);
            }
            "ul" => self.list(element, false, 0),
            "ol" => self.list(element, true, 0),
            "img" => self.block_image(element),
            "table" => self.table(element),
            "blockquote" => {
                let line = self.inline_children(
                    Line::new(Paragraph::new().style("Quote")),
                    element,
                    Inline::default(),
                );
                self.push(line.paragraph);
            }
            "pre" => {
                let text = element.text().collect::<String>();
                let mut run = Run::new()
                    .fonts(RunFonts::new().ascii(CODE_FONT).hi_ansi(CODE_FONT))
                    .size(20);
                for (i, line) in text.trim_end_matches('\n').split('\n').enumerate() {
                    if i > 0 {
                        run = run.add_break(BreakType::TextWrapping);
                    }
                    run = run.add_text(line);
                }
                self.push(Paragraph::new().style("Code").add_run(run));
            }
            "br" | "hr" => self.push(Paragraph::new()),
            "script" | "style" | "head" | "title" | "meta" | "link" => {}
            "span" if !has_block_children(element) => {
                let line = self.inline_children(Line::new(Paragraph::new()), element, Inline::default());
                self.push(line.paragraph);
            }
            "div" | "section" | "article" | "main" | "header" | "footer" | "body" | "html"
            | "span" => self.children(element),
            _ => {
                if !element.text().collect::<String>().trim().is_empty() {
                    let line =
                        self.inline_children(Line::new(Paragraph::new()), element, Inline::default());
                    self.push(line.paragraph);
                }
            }
        }
    }

    fn list(&mut self, list: ElementRef<'_>, ordered: bool, depth: usize) {
        // Each ordered list restarts at 1, so it gets its own instance.
        let numbering_id = if ordered {
            let id = BULLET_NUMBERING_ID + 1 + self.ordered_lists.len();
            self.ordered_lists.push(id);
            id
        } else {
            BULLET_NUMBERING_ID
        };
        let level = depth.min(MAX_LIST_DEPTH - 1);

        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                continue;
            }
            let mut line = Line::new(
                Paragraph::new().numbering(NumberingId::new(numbering_id), IndentLevel::new(level)),
            );
            let mut nested = Vec::new();
            for child in item.children() {
                match ElementRef::wrap(child) {
                    Some(el) if matches!(el.value().name(), "ul" | "ol") => nested.push(el),
                    Some(el) => line = self.inline_element(line, el, Inline::default()),
                    None => {
                        if let Some(text) = child.value().as_text() {
                            line = inline_text(line, text, Inline::default());
                        }
                    }
                }
            }
            self.push(line.paragraph);
            for sublist in nested {
                self.list(sublist, sublist.value().name() == "ol", depth + 1);
            }
        }
    }

    fn table(&mut self, table: ElementRef<'_>) {
        let rows: Vec<Vec<ElementRef<'_>>> = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "tr")
            .map(|row| {
                row.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| matches!(el.value().name(), "td" | "th"))
                    .collect()
            })
            .collect();

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        let mut table_rows = Vec::with_capacity(rows.len());
        for cells in &rows {
            let mut table_cells = Vec::with_capacity(columns);
            for col in 0..columns {
                let paragraph = match cells.get(col) {
                    Some(cell) => {
                        let fmt = Inline {
                            bold: cell.value().name() == "th",
                            ..Inline::default()
                        };
                        self.inline_children(Line::new(Paragraph::new()), *cell, fmt)
                            .paragraph
                    }
                    None => Paragraph::new(),
                };
                table_cells.push(TableCell::new().add_paragraph(paragraph));
            }
            table_rows.push(TableRow::new(table_cells));
        }
        self.blocks.push(Block::Table(Table::new(table_rows)));
    }

    fn block_image(&mut self, element: ElementRef<'_>) {
        let Some(src) = element.value().attr("src").filter(|s| !s.is_empty()) else {
            return;
        };
        let paragraph = match self.picture(src, 6) {
            Some(pic) => Paragraph::new()
                .align(AlignmentType::Center)
                .add_run(Run::new().add_image(pic)),
            None => Paragraph::new().add_run(image_placeholder(src)),
        };
        self.push(paragraph);
    }

    // ========== Inline Elements ==========

    fn inline_children(&self, mut line: Line, parent: ElementRef<'_>, fmt: Inline) -> Line {
        for child in parent.children() {
            if let Some(element) = ElementRef::wrap(child) {
                line = self.inline_element(line, element, fmt);
            } else if let Some(text) = child.value().as_text() {
                line = inline_text(line, text, fmt);
            }
        }
        line
    }

    fn inline_element(&self, line: Line, element: ElementRef<'_>, fmt: Inline) -> Line {
        match element.value().name() {
            "strong" | "b" => self.inline_children(line, element, Inline { bold: true, ..fmt }),
            "em" | "i" => self.inline_children(line, element, Inline { italic: true, ..fmt }),
            "u" => self.inline_children(line, element, Inline { underline: true, ..fmt }),
            "code" => self.inline_children(line, element, Inline { code: true, ..fmt }),
            "a" => {
                let text = collapse(&element.text().collect::<String>());
                match element.value().attr("href").filter(|href| !href.is_empty()) {
                    Some(href) => {
                        let run = fmt.run(&text).color("0563C1").underline("single");
                        line.link(Hyperlink::new(href, HyperlinkType::External).add_run(run))
                    }
                    None => line.run(fmt.run(&text)),
                }
            }
            "img" => match element.value().attr("src").filter(|s| !s.is_empty()) {
                Some(src) => match self.picture(src, 4) {
                    Some(pic) => line.run(Run::new().add_image(pic)),
                    None => line.run(image_placeholder(src)),
                },
                None => line,
            },
            "br" => line.run(Run::new().add_break(BreakType::TextWrapping)),
            "script" | "style" => line,
            _ => self.inline_children(line, element, fmt),
        }
    }

    /// Load a local image scaled to at most `max_inches` wide.
    fn picture(&self, src: &str, max_inches: u64) -> Option<Pic> {
        let path = resolve_image(src, &self.ctx.static_root)?;
        let bytes = std::fs::read(&path).ok()?;
        let info = image::inspect(&bytes)?;

        let max_width = max_inches * EMU_PER_INCH;
        let mut width = u64::from(info.width) * EMU_PER_PX;
        let mut height = u64::from(info.height) * EMU_PER_PX;
        if width > max_width {
            height = height * max_width / width;
            width = max_width;
        }

        let width = u32::try_from(width).ok()?;
        let height = u32::try_from(height.max(1)).ok()?;
        Some(Pic::new_with_dimensions(bytes, info.width, info.height).size(width, height))
    }
}

fn inline_text(line: Line, text: &str, fmt: Inline) -> Line {
    let text = collapse(text);
    if text.trim().is_empty() && line.empty {
        return line;
    }
    line.run(fmt.run(&text))
}

fn image_placeholder(src: &str) -> Run {
    Run::new().add_text(format!("[Image: {src}]")).italic()
}

fn has_block_children(element: ElementRef<'_>) -> bool {
    element.children().filter_map(ElementRef::wrap).any(|child| {
        matches!(
            child.value().name(),
            "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "table"
        )
    })
}

/// Collapse whitespace runs to single spaces, as HTML rendering does.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn labelled(label: &str, value: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(label).bold())
        .add_run(Run::new().add_text(value))
}

fn with_styles(mut docx: Docx) -> Docx {
    let heading_sizes = [32, 28, 26, 24, 22, 22];
    for (i, size) in heading_sizes.into_iter().enumerate() {
        let level = i + 1;
        docx = docx.add_style(
            Style::new(format!("Heading{level}"), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .size(size)
                .bold(),
        );
    }
    docx.add_style(
        Style::new("Quote", StyleType::Paragraph)
            .name("Quote")
            .italic()
            .color("555555"),
    )
    .add_style(Style::new("Code", StyleType::Paragraph).name("Code").size(20))
}

fn with_numbering(mut docx: Docx, ordered_lists: &[usize]) -> Docx {
    let mut bullets = AbstractNumbering::new(BULLET_ABSTRACT_ID);
    let mut decimals = AbstractNumbering::new(DECIMAL_ABSTRACT_ID);
    for level in 0..MAX_LIST_DEPTH {
        bullets = bullets.add_level(Level::new(
            level,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        ));
        decimals = decimals.add_level(Level::new(
            level,
            Start::new(1),
            NumberFormat::new("decimal"),
            LevelText::new(format!("%{}.", level + 1)),
            LevelJc::new("left"),
        ));
    }

    docx = docx
        .add_abstract_numbering(bullets)
        .add_abstract_numbering(decimals)
        .add_numbering(Numbering::new(BULLET_NUMBERING_ID, BULLET_ABSTRACT_ID));
    for id in ordered_lists {
        docx = docx.add_numbering(Numbering::new(*id, DECIMAL_ABSTRACT_ID));
    }
    docx
}

/// Complete DOCX package for `document`.
pub fn render(
    document: &Document,
    organization: Option<&str>,
    ctx: &RenderContext,
) -> RenderResult<Vec<u8>> {
    let html = content_html(document);
    let fragment = Html::parse_fragment(&html);

    let mut builder = Builder::new(ctx);
    builder.children(fragment.root_element());

    let mut docx = Docx::new()
        .default_fonts(RunFonts::new().ascii("Arial").hi_ansi("Arial"))
        .default_size(22);
    docx = with_styles(docx);
    docx = with_numbering(docx, &builder.ordered_lists);

    // Header
    docx = docx.add_paragraph(
        Paragraph::new()
            .style("Heading1")
            .add_run(Run::new().add_text(&document.title)),
    );
    if let Some(name) = organization {
        docx = docx.add_paragraph(labelled("Organization: ", name));
    }
    docx = docx
        .add_paragraph(labelled("Created: ", &format_timestamp(document.created_at)))
        .add_paragraph(labelled("Last Updated: ", &format_timestamp(document.updated_at)))
        .add_paragraph(Paragraph::new());

    for block in builder.blocks {
        docx = match block {
            Block::Paragraph(paragraph) => docx.add_paragraph(paragraph),
            Block::Table(table) => docx.add_table(table),
        };
    }

    // Footer
    docx = docx.add_paragraph(Paragraph::new()).add_paragraph(
        Paragraph::new().align(AlignmentType::Center).add_run(
            Run::new()
                .add_text(ctx.exported_on())
                .size(18)
                .color("7F7F7F"),
        ),
    );

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| RenderError::Docx(e.to_string()))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::image::fixtures::tiny_jpeg;
    use crate::render::test_support::{ctx, doc};
    use crate::storage::ContentType;
    use std::io::Read;

    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn produces_a_docx_package_with_header_and_footer() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(ContentType::Markdown, "# Intro\n\nHello **world**");
        let bytes = render(&document, Some("Acme"), &ctx(temp.path())).unwrap();

        assert!(bytes.starts_with(b"PK"));
        let xml = document_xml(&bytes);
        assert!(xml.contains("Handbook"));
        assert!(xml.contains("Organization: "));
        assert!(xml.contains("Acme"));
        assert!(xml.contains("Intro"));
        assert!(xml.contains("world"));
        assert!(xml.contains("Exported on 2026-02-01 12:00:00"));
    }

    #[test]
    fn html_lists_tables_and_links_render() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(
            ContentType::Html,
            "<ul><li>first</li><li>second<ol><li>nested</li></ol></li></ul>\
             <table><tr><th>Host</th><th>Port</th></tr><tr><td>db</td></tr></table>\
             <p>See <a href=\"https://docs.test\">the docs</a></p>\
             <section><div>deep text</div></section><custom>odd tag</custom>",
        );
        let xml = document_xml(&render(&document, None, &ctx(temp.path())).unwrap());

        for needle in [
            "first", "second", "nested", "Host", "Port", "db", "the docs", "deep text", "odd tag",
        ] {
            assert!(xml.contains(needle), "missing {needle}");
        }
        assert!(xml.contains("w:numPr"));
        assert!(xml.contains("w:tbl"));
        assert!(xml.contains("w:hyperlink"));
    }

    #[test]
    fn missing_images_become_placeholders() {
        let temp = tempfile::TempDir::new().unwrap();
        let document = doc(ContentType::Html, "<img src=\"/static/nope.png\">");
        let xml = document_xml(&render(&document, None, &ctx(temp.path())).unwrap());
        assert!(xml.contains("[Image: /static/nope.png]"));
    }

    #[test]
    fn local_images_are_embedded() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("pic.jpg"), tiny_jpeg()).unwrap();
        let document = doc(ContentType::Html, "<p><img src=\"/static/pic.jpg\"></p>");
        let xml = document_xml(&render(&document, None, &ctx(temp.path())).unwrap());

        assert!(!xml.contains("[Image:"));
        assert!(xml.contains("w:drawing"));
    }

    #[test]
    fn images_outside_the_static_root_are_not_embedded() {
        let temp = tempfile::TempDir::new().unwrap();
        let static_root = temp.path().join("static");
        std::fs::create_dir_all(&static_root).unwrap();
        let outside = temp.path().join("secret.jpg");
        std::fs::write(&outside, tiny_jpeg()).unwrap();

        let src = format!("file://{}", outside.display());
        let document = doc(ContentType::Html, &format!("<p><img src=\"{src}\"></p>"));
        let xml = document_xml(&render(&document, None, &ctx(&static_root)).unwrap());

        assert!(xml.contains(&format!("[Image: {src}]")));
        assert!(!xml.contains("w:drawing"));
    }

    #[test]
    fn collapse_normalizes_whitespace() {
        assert_eq!(collapse("a \n\t b"), "a b");
        assert_eq!(collapse("  x  "), " x ");
    }
}
