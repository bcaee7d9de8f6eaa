// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! RTF export.
//!
//! The HTML body is split into tags and text. Text is entity-decoded and
//! RTF-escaped first; tags are then rewritten into control groups. Doing it in
//! that order keeps inserted control words from being escaped and keeps
//! escaped `<`/`>` out of the tag patterns.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use super::{content_html, format_timestamp, RenderContext};
use crate::storage::Document;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static PRE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<pre\b").expect("valid pre regex"));

static PRE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^</pre\s*>").expect("valid pre regex"));

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>")
        .expect("valid script regex")
});

/// Tag rewrite rules, applied in order after text has been escaped.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)<h1\b[^>]*>(.*?)</h1>", r"\par\par {\b\fs32 ${1}}\par "),
        (r"(?i)<h2\b[^>]*>(.*?)</h2>", r"\par\par {\b\fs28 ${1}}\par "),
        (r"(?i)<h3\b[^>]*>(.*?)</h3>", r"\par {\b\fs24 ${1}}\par "),
        (r"(?i)<h[456]\b[^>]*>(.*?)</h[456]>", r"\par {\b ${1}}\par "),
        (r"(?i)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)>", r"{\b ${1}}"),
        (r"(?i)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)>", r"{\i ${1}}"),
        (r"(?i)<u\b[^>]*>(.*?)</u>", r"{\ul ${1}}"),
        (
            r"(?i)<pre\b[^>]*>\s*<code\b[^>]*>(.*?)</code>\s*</pre>",
            r"\par {\f1\fs20 ${1}}\par ",
        ),
        (r"(?i)<pre\b[^>]*>(.*?)</pre>", r"\par {\f1\fs20 ${1}}\par "),
        (r"(?i)<code\b[^>]*>(.*?)</code>", r"{\f1 ${1}}"),
        (r"(?i)<p\b[^>]*>(.*?)</p>", r"\par ${1}\par "),
        (r"(?i)<br\b[^>]*>", r"\line "),
        (r"(?i)<[uo]l\b[^>]*>", ""),
        (r"(?i)</[uo]l>", r"\par "),
        (r"(?i)<li\b[^>]*>(.*?)</li>", r"\par \bullet  ${1}"),
        (r"(?i)<blockquote\b[^>]*>(.*?)</blockquote>", r"\par {\i ${1}}\par "),
        (r"<[^>]+>", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid rtf conversion regex"),
            replacement,
        )
    })
    .collect()
});

/// Escape text for inclusion in an RTF body.
///
/// Backslash and braces are escaped, angle brackets become hex escapes and
/// non-ASCII characters become `\uN?` (UTF-16, signed). With `keep_newlines`
/// a newline becomes `\line`, otherwise it collapses to a space.
pub fn escape_rtf(text: &str, keep_newlines: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str(r"\\"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '<' => out.push_str(r"\'3c"),
            '>' => out.push_str(r"\'3e"),
            '\r' => {}
            '\n' if keep_newlines => out.push_str(r"\line "),
            '\n' => out.push(' '),
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, r"\u{}?", *unit as i16);
                }
            }
        }
    }
    out
}

/// Convert an HTML fragment into an RTF body fragment.
pub fn html_to_rtf(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let html = SCRIPT_STYLE.replace_all(html, "");

    // Escape every text run between tags, leaving the tags untouched.
    let mut escaped = String::with_capacity(html.len());
    let mut in_pre = false;
    let mut last = 0;
    for tag in TAG.find_iter(&html) {
        push_text(&mut escaped, &html[last..tag.start()], in_pre);
        let tag_text = tag.as_str();
        if PRE_OPEN.is_match(tag_text) {
            in_pre = true;
        } else if PRE_CLOSE.is_match(tag_text) {
            in_pre = false;
        }
        escaped.push_str(tag_text);
        last = tag.end();
    }
    push_text(&mut escaped, &html[last..], in_pre);

    let mut rtf = escaped;
    for (pattern, replacement) in RULES.iter() {
        rtf = pattern.replace_all(&rtf, *replacement).into_owned();
    }
    rtf
}

fn push_text(out: &mut String, raw: &str, in_pre: bool) {
    // Whitespace between block tags carries no content.
    if !in_pre && raw.trim().is_empty() && raw.contains('\n') {
        return;
    }
    let decoded = html_escape::decode_html_entities(raw);
    out.push_str(&escape_rtf(&decoded, in_pre));
}

/// Complete RTF document for `document`.
pub fn render(document: &Document, organization: Option<&str>, ctx: &RenderContext) -> String {
    let body = html_to_rtf(&content_html(document));

    let mut rtf = String::with_capacity(body.len() + 512);
    rtf.push_str("{\\rtf1\\ansi\\deff0\n");
    rtf.push_str("{\\fonttbl{\\f0 Times New Roman;}{\\f1 Courier New;}}\n");
    rtf.push_str("\\f0\\fs24\n\n");
    let _ = writeln!(rtf, "{{\\b {}}}\\par\\par", escape_rtf(&document.title, false));

    if let Some(name) = organization {
        let _ = write!(rtf, "Organization: {}\\par ", escape_rtf(name, false));
    }
    let _ = write!(rtf, "Created: {}\\par ", format_timestamp(document.created_at));
    let _ = write!(
        rtf,
        "Last Updated: {}\\par\\par ",
        format_timestamp(document.updated_at)
    );

    rtf.push_str(&body);
    let _ = write!(rtf, "\\par\\par\\par {}\\par}}", ctx.exported_on());
    rtf
}
