// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Minimal PDF 1.4 writer.
//!
//! Lays out flowing text on A4 pages using the standard Type 1 fonts, so no
//! font files are embedded. Text is WinAnsi encoded; characters outside it are
//! replaced with `?`. JPEG images are embedded as-is with `DCTDecode`.

use std::fmt::Write as _;

use super::image::ImageInfo;

pub(crate) const PAGE_WIDTH: f32 = 595.0;
pub(crate) const PAGE_HEIGHT: f32 = 842.0;
/// 2cm
pub(crate) const MARGIN: f32 = 57.0;
pub(crate) const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const LINE_SPACING: f32 = 1.4;
const CELL_PADDING: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Font {
    Regular,
    Bold,
    Italic,
    Mono,
}

impl Font {
    const ALL: [Font; 4] = [Font::Regular, Font::Bold, Font::Italic, Font::Mono];

    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
            Font::Mono => "F4",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
            Font::Mono => "Courier",
        }
    }

    /// Approximate advance width in em.
    fn char_width(self, ch: char) -> f32 {
        match self {
            Font::Mono => 0.6,
            _ => {
                let base = match ch {
                    ' ' | 'i' | 'j' | 'l' | 't' | 'f' | 'I' | '.' | ',' | ';' | ':' | '\'' | '!'
                    | '|' => 0.28,
                    'm' | 'w' | 'M' | 'W' => 0.83,
                    'A'..='Z' => 0.67,
                    '0'..='9' => 0.556,
                    _ => 0.52,
                };
                if self == Font::Bold {
                    base * 1.07
                } else {
                    base
                }
            }
        }
    }

    fn text_width(self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.char_width(ch)).sum::<f32>() * size
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub(crate) fn hex(value: u32) -> Self {
        Rgb(
            ((value >> 16) & 0xFF) as f32 / 255.0,
            ((value >> 8) & 0xFF) as f32 / 255.0,
            (value & 0xFF) as f32 / 255.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TextStyle {
    pub font: Font,
    pub size: f32,
    pub color: Rgb,
    pub align: Align,
    pub indent: f32,
}

struct ImageObject {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    components: u8,
}

/// Flowing layout onto A4 pages, serialized by [`PdfWriter::finish`].
pub(crate) struct PdfWriter {
    title: String,
    pages: Vec<String>,
    current: String,
    y: f32,
    images: Vec<ImageObject>,
}

impl PdfWriter {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: Vec::new(),
            current: String::new(),
            y: PAGE_HEIGHT - MARGIN,
            images: Vec::new(),
        }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Reserve `height` points, breaking the page if it doesn't fit.
    fn reserve(&mut self, height: f32) {
        let at_top = self.y >= PAGE_HEIGHT - MARGIN;
        if self.y - height < MARGIN && !at_top {
            self.new_page();
        }
    }

    pub(crate) fn space(&mut self, points: f32) {
        self.y -= points;
        if self.y < MARGIN {
            self.new_page();
        }
    }

    /// Word-wrapped paragraph.
    pub(crate) fn paragraph(&mut self, text: &str, style: TextStyle) {
        let width = CONTENT_WIDTH - style.indent;
        let leading = style.size * LINE_SPACING;
        for line in wrap(text, style.font, style.size, width) {
            self.reserve(leading);
            self.y -= leading;
            let x = match style.align {
                Align::Left => MARGIN + style.indent,
                Align::Center => {
                    MARGIN + (CONTENT_WIDTH - style.font.text_width(&line, style.size)) / 2.0
                }
            };
            self.text_at(&line, x, self.y + style.size * 0.3, style);
        }
    }

    /// Monospaced block on a grey background, line breaks kept.
    pub(crate) fn preformatted(&mut self, text: &str, size: f32) {
        let style = TextStyle {
            font: Font::Mono,
            size,
            color: Rgb::hex(0x333333),
            align: Align::Left,
            indent: CELL_PADDING,
        };
        let leading = size * LINE_SPACING;
        let width = CONTENT_WIDTH - 2.0 * CELL_PADDING;

        let mut lines = Vec::new();
        for raw in text.trim_end_matches('\n').split('\n') {
            let raw = raw.replace('\t', "    ");
            if raw.is_empty() {
                lines.push(String::new());
            } else {
                lines.extend(wrap_chars(&raw, Font::Mono, size, width));
            }
        }

        for line in lines {
            self.reserve(leading);
            let _ = writeln!(
                self.current,
                "q 0.957 0.957 0.957 rg {:.2} {:.2} {:.2} {:.2} re f Q",
                MARGIN,
                self.y - leading,
                CONTENT_WIDTH,
                leading
            );
            self.y -= leading;
            self.text_at(&line, MARGIN + CELL_PADDING, self.y + size * 0.3, style);
        }
    }

    /// Horizontal line across the content width.
    pub(crate) fn rule(&mut self, color: Rgb, thickness: f32) {
        self.reserve(thickness + 4.0);
        self.y -= 4.0;
        let _ = writeln!(
            self.current,
            "q {:.3} {:.3} {:.3} RG {:.2} w {:.2} {:.2} m {:.2} {:.2} l S Q",
            color.0,
            color.1,
            color.2,
            thickness,
            MARGIN,
            self.y,
            MARGIN + CONTENT_WIDTH,
            self.y
        );
        self.y -= thickness;
    }

    /// Table row with equal-width bordered cells.
    pub(crate) fn table_row(&mut self, cells: &[String], columns: usize, header: bool) {
        if columns == 0 {
            return;
        }
        let size = 10.0;
        let leading = size * LINE_SPACING;
        let column_width = CONTENT_WIDTH / columns as f32;
        let font = if header { Font::Bold } else { Font::Regular };

        let wrapped: Vec<Vec<String>> = (0..columns)
            .map(|i| {
                let text = cells.get(i).map(String::as_str).unwrap_or("");
                wrap(text, font, size, column_width - 2.0 * CELL_PADDING)
            })
            .collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let height = lines as f32 * leading + 2.0 * CELL_PADDING;

        self.reserve(height);
        let top = self.y;
        let bottom = top - height;

        if header {
            let fill = Rgb::hex(0x3498DB);
            let _ = writeln!(
                self.current,
                "q {:.3} {:.3} {:.3} rg {:.2} {:.2} {:.2} {:.2} re f Q",
                fill.0, fill.1, fill.2, MARGIN, bottom, CONTENT_WIDTH, height
            );
        }

        let border = Rgb::hex(0xDDDDDD);
        for col in 0..columns {
            let x = MARGIN + col as f32 * column_width;
            let _ = writeln!(
                self.current,
                "q {:.3} {:.3} {:.3} RG 0.5 w {:.2} {:.2} {:.2} {:.2} re S Q",
                border.0, border.1, border.2, x, bottom, column_width, height
            );

            let style = TextStyle {
                font,
                size,
                color: if header { Rgb(1.0, 1.0, 1.0) } else { Rgb::hex(0x333333) },
                align: Align::Left,
                indent: 0.0,
            };
            for (i, line) in wrapped[col].iter().enumerate() {
                let baseline = top - CELL_PADDING - (i as f32 + 1.0) * leading + size * 0.3;
                self.text_at(line, x + CELL_PADDING, baseline, style);
            }
        }
        self.y = bottom;
    }

    /// Embed a JPEG, scaled down to the content width.
    pub(crate) fn jpeg(&mut self, bytes: Vec<u8>, info: ImageInfo) {
        // 96 dpi pixels to points
        let mut width = info.width as f32 * 0.75;
        let mut height = info.height as f32 * 0.75;
        if width > CONTENT_WIDTH {
            height *= CONTENT_WIDTH / width;
            width = CONTENT_WIDTH;
        }
        let max_height = PAGE_HEIGHT - 2.0 * MARGIN;
        if height > max_height {
            width *= max_height / height;
            height = max_height;
        }

        self.images.push(ImageObject {
            bytes,
            width: info.width,
            height: info.height,
            components: info.components,
        });
        let name = self.images.len();

        self.reserve(height);
        self.y -= height;
        let _ = writeln!(
            self.current,
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im{} Do Q",
            width, height, MARGIN, self.y, name
        );
    }

    fn text_at(&mut self, text: &str, x: f32, y: f32, style: TextStyle) {
        if text.is_empty() {
            return;
        }
        let _ = writeln!(
            self.current,
            "BT /{} {:.1} Tf {:.3} {:.3} {:.3} rg {:.2} {:.2} Td ({}) Tj ET",
            style.font.resource(),
            style.size,
            style.color.0,
            style.color.1,
            style.color.2,
            x,
            y,
            encode_text(text)
        );
    }

    /// Serialize the document.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.new_page();

        // Object numbering: catalog, pages, info, fonts, images, then a
        // (content, page) pair per page.
        let font_base = 4;
        let image_base = font_base + Font::ALL.len();
        let page_base = image_base + self.images.len();
        let object_count = page_base + 2 * self.pages.len();

        let mut objects: Vec<Vec<u8>> = Vec::with_capacity(object_count);

        objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());

        let kids: Vec<String> = (0..self.pages.len())
            .map(|i| format!("{} 0 R", page_base + 2 * i + 1))
            .collect();
        objects.push(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                self.pages.len()
            )
            .into_bytes(),
        );

        objects.push(
            format!(
                "<< /Title ({}) /Producer (InfoGarden) >>",
                encode_text(&self.title)
            )
            .into_bytes(),
        );

        for font in Font::ALL {
            objects.push(
                format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    font.base_font()
                )
                .into_bytes(),
            );
        }

        for image in &self.images {
            let color_space = match image.components {
                1 => "/DeviceGray",
                4 => "/DeviceCMYK /Decode [1 0 1 0 1 0 1 0]",
                _ => "/DeviceRGB",
            };
            let mut object = format!(
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} \
                 /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
                image.width,
                image.height,
                color_space,
                image.bytes.len()
            )
            .into_bytes();
            object.extend_from_slice(&image.bytes);
            object.extend_from_slice(b"\nendstream");
            objects.push(object);
        }

        let fonts: String = Font::ALL
            .iter()
            .enumerate()
            .map(|(i, font)| format!("/{} {} 0 R ", font.resource(), font_base + i))
            .collect();
        let xobjects: String = (0..self.images.len())
            .map(|i| format!("/Im{} {} 0 R ", i + 1, image_base + i))
            .collect();

        for (i, content) in self.pages.iter().enumerate() {
            let content_id = page_base + 2 * i;
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(content.as_bytes());
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);

            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << {fonts}>> /XObject << {xobjects}>> >> \
                     /Contents {content_id} 0 R >>"
                )
                .into_bytes(),
            );
        }

        let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(object);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref = out.len();
        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(table, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            table,
            "trailer\n<< /Size {} /Root 1 0 R /Info 3 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        );
        out.extend_from_slice(table.as_bytes());
        out
    }
}

/// Greedy word wrap. Words wider than a line are split by character.
pub(crate) fn wrap(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let space = font.char_width(' ') * size;
    let mut current_width = 0.0;

    for word in text.split_whitespace() {
        let word_width = font.text_width(word, size);
        if word_width > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut pieces = wrap_chars(word, font, size, width);
            if let Some(last) = pieces.pop() {
                lines.extend(pieces);
                current_width = font.text_width(&last, size);
                current = last;
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + space + word_width <= width {
            current.push(' ');
            current.push_str(word);
            current_width += space + word_width;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
            current_width = word_width;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn wrap_chars(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;
    for ch in text.chars() {
        let w = font.char_width(ch) * size;
        if current_width + w > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        current.push(ch);
        current_width += w;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Literal string body in WinAnsi encoding.
pub(crate) fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => match win_ansi(ch) {
                Some(byte) => {
                    let _ = write!(out, "\\{byte:03o}");
                }
                None => out.push('?'),
            },
        }
    }
    out
}

fn win_ansi(ch: char) -> Option<u8> {
    match ch {
        '\u{A0}'..='\u{FF}' => u8::try_from(u32::from(ch)).ok(),
        '€' => Some(0x80),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        '™' => Some(0x99),
        _ => None,
    }
}
