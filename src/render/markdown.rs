// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 InfoGarden

//! Markdown export.
//!
//! Markdown bodies are exported verbatim. HTML bodies go through a
//! best-effort regex conversion; it is not an HTML parser and makes no
//! attempt at round-tripping.

use std::sync::LazyLock;

use regex::Regex;

use crate::storage::{ContentType, Document};

/// Ordered rewrite rules. Patterns without `(?s)` stay on one line.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?is)<script\b[^>]*>.*?</script>", ""),
        (r"(?is)<style\b[^>]*>.*?</style>", ""),
        // Headings
        (r"(?i)<h1\b[^>]*>(.*?)</h1>", "# ${1}\n\n"),
        (r"(?i)<h2\b[^>]*>(.*?)</h2>", "## ${1}\n\n"),
        (r"(?i)<h3\b[^>]*>(.*?)</h3>", "### ${1}\n\n"),
        (r"(?i)<h4\b[^>]*>(.*?)</h4>", "#### ${1}\n\n"),
        (r"(?i)<h5\b[^>]*>(.*?)</h5>", "##### ${1}\n\n"),
        (r"(?i)<h6\b[^>]*>(.*?)</h6>", "###### ${1}\n\n"),
        // Emphasis
        (r"(?i)<strong\b[^>]*>(.*?)</strong>", "**${1}**"),
        (r"(?i)<b\b[^>]*>(.*?)</b>", "**${1}**"),
        (r"(?i)<em\b[^>]*>(.*?)</em>", "*${1}*"),
        (r"(?i)<i\b[^>]*>(.*?)</i>", "*${1}*"),
        // Links and images
        (
            r#"(?i)<a\b[^>]*href=["']([^"']*)["'][^>]*>(.*?)</a>"#,
            "[${2}](${1})",
        ),
        (
            r#"(?i)<img\b[^>]*src=["']([^"']*)["'][^>]*alt=["']([^"']*)["'][^>]*>"#,
            "![${2}](${1})",
        ),
        (r#"(?i)<img\b[^>]*src=["']([^"']*)["'][^>]*>"#, "![](${1})"),
        // Lists
        (r"(?i)<[uo]l\b[^>]*>", ""),
        (r"(?i)</[uo]l>", "\n"),
        (r"(?i)<li\b[^>]*>(.*?)</li>", "- ${1}\n"),
        // Paragraphs and breaks
        (r"(?i)<p\b[^>]*>(.*?)</p>", "${1}\n\n"),
        (r"(?i)<br\b[^>]*>", "\n"),
        // Code
        (
            r"(?is)<pre\b[^>]*>\s*<code\b[^>]*>(.*?)</code>\s*</pre>",
            "```\n${1}\n```\n\n",
        ),
        (r"(?i)<code\b[^>]*>(.*?)</code>", "`${1}`"),
        (r"(?is)<blockquote\b[^>]*>\s*(.*?)\s*</blockquote>", "> ${1}\n\n"),
        // Anything left
        (r"<[^>]+>", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid markdown conversion regex"),
            replacement,
        )
    })
    .collect()
});

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));

/// Markdown text for `document`.
pub fn render(document: &Document) -> String {
    match document.content_type {
        ContentType::Markdown => document.body().to_string(),
        ContentType::Html => html_to_markdown(document.body()),
    }
}

/// Convert an HTML fragment into approximate Markdown.
pub fn html_to_markdown(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut text = html.to_string();
    for (pattern, replacement) in RULES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    let decoded = html_escape::decode_html_entities(&text);
    BLANK_RUNS
        .replace_all(&decoded, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::doc;

    #[test]
    fn markdown_is_identity() {
        let body = "# Title\n\n<b>kept</b> as written";
        assert_eq!(render(&doc(ContentType::Markdown, body)), body);
    }

    #[test]
    fn converts_headings_and_emphasis() {
        let md = html_to_markdown("<h2 class=\"x\">Setup</h2><p>Use <strong>care</strong> and <em>caution</em>.</p>");
        assert_eq!(md, "## Setup\n\nUse **care** and *caution*.");
    }

    #[test]
    fn bold_rule_does_not_eat_other_b_tags() {
        let md = html_to_markdown("<blockquote>quoted</blockquote><p>a<br>b</p>");
        assert_eq!(md, "> quoted\n\na\nb");
    }

    #[test]
    fn converts_links_images_and_lists() {
        let md = html_to_markdown(
            "<ul><li>one</li><li><a href=\"https://x.test\">two</a></li></ul>\
             <img src=\"/static/a.png\" alt=\"diagram\"><img src='b.png'>",
        );
        assert!(md.contains("- one\n- [two](https://x.test)\n"));
        assert!(md.contains("![diagram](/static/a.png)"));
        assert!(md.contains("![](b.png)"));
    }

    #[test]
    fn converts_code_blocks() {
        let md = html_to_markdown("<pre><code>let x = 1;\nlet y = 2;</code></pre><p><code>inline</code></p>");
        assert!(md.starts_with("```\nlet x = 1;\nlet y = 2;\n```"));
        assert!(md.ends_with("`inline`"));
    }

    #[test]
    fn strips_scripts_unknown_tags_and_decodes_entities() {
        let md = html_to_markdown(
            "<script>alert(1)</script><style>p{}</style><div>Tom &amp; Jerry &lt;3</div>\n\n\n\n<span>end</span>",
        );
        assert_eq!(md, "Tom & Jerry <3\n\nend");
    }

    #[test]
    fn empty_html_is_empty() {
        assert_eq!(html_to_markdown(""), "");
        assert_eq!(render(&doc(ContentType::Html, "")), "");
    }
}
