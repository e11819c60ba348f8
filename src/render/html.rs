use super::{ Block, Document, HeadingStyle, Inline, ListItem };

pub fn to_html(doc: &Document) -> String {
    let mut out = String::from("<div class=\"report\">");
    for block in &doc.blocks {
        write_block(block, &mut out);
    }
    out.push_str("</div>");
    out
}

fn write_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { style, children } => {
            let (tag, class) = match style {
                HeadingStyle::Banner => ("h1", "report-banner"),
                HeadingStyle::H1 => ("h1", "heading-1"),
                HeadingStyle::H2 => ("h2", "heading-2"),
                HeadingStyle::H3 => ("h3", "heading-3"),
            };
            out.push_str(&format!("<{} class=\"{}\">", tag, class));
            write_inlines(children, out);
            out.push_str(&format!("</{}>", tag));
        }
        Block::Paragraph { children } => {
            out.push_str("<p class=\"paragraph\">");
            write_inlines(children, out);
            out.push_str("</p>");
        }
        Block::Section { kind, label, children } => {
            out.push_str(&format!("<p class=\"section {}\">", kind.css_class()));
            if let Some(label) = label {
                out.push_str("<span class=\"section-label\">");
                out.push_str(&escape(label));
                out.push_str("</span> ");
            }
            write_inlines(children, out);
            out.push_str("</p>");
        }
        Block::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            out.push_str(&format!("<{} class=\"list\">", tag));
            for item in items {
                write_item(item, out);
            }
            out.push_str(&format!("</{}>", tag));
        }
        Block::CodeBlock { language, code } => {
            match language {
                Some(lang) => out.push_str(
                    &format!("<pre class=\"code-block\"><code class=\"language-{}\">", escape(lang))
                ),
                None => out.push_str("<pre class=\"code-block\"><code>"),
            }
            out.push_str(&escape(code));
            out.push_str("</code></pre>");
        }
        Block::BlockQuote { blocks } => {
            out.push_str("<blockquote class=\"quote\">");
            for b in blocks {
                write_block(b, out);
            }
            out.push_str("</blockquote>");
        }
        Block::Table { header, rows } => {
            out.push_str("<table class=\"table\"><thead><tr>");
            for cell in header {
                out.push_str("<th>");
                write_inlines(cell, out);
                out.push_str("</th>");
            }
            out.push_str("</tr></thead><tbody>");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str("<td>");
                    write_inlines(cell, out);
                    out.push_str("</td>");
                }
                out.push_str("</tr>");
            }
            out.push_str("</tbody></table>");
        }
        Block::Rule => out.push_str("<hr class=\"rule\"/>"),
    }
}

fn write_item(item: &ListItem, out: &mut String) {
    out.push_str("<li class=\"list-item\"><span class=\"marker\">");
    out.push_str(&escape(&item.marker));
    out.push_str("</span><span class=\"item-body\">");
    // tight items hold a single paragraph; render it without the <p> wrapper
    match item.blocks.as_slice() {
        [Block::Paragraph { children }] => write_inlines(children, out),
        blocks => {
            for b in blocks {
                write_block(b, out);
            }
        }
    }
    out.push_str("</span></li>");
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { text } => out.push_str(&escape(text)),
            Inline::Code { code } => {
                out.push_str("<code class=\"inline-code\">");
                out.push_str(&escape(code));
                out.push_str("</code>");
            }
            Inline::Emphasis { children } => {
                out.push_str("<em>");
                write_inlines(children, out);
                out.push_str("</em>");
            }
            Inline::Strong { children } => {
                out.push_str("<strong class=\"strong\">");
                write_inlines(children, out);
                out.push_str("</strong>");
            }
            Inline::Strikethrough { children } => {
                out.push_str("<del>");
                write_inlines(children, out);
                out.push_str("</del>");
            }
            Inline::Link { href, children } => {
                let href = safe_url(href);
                out.push_str(
                    &format!(
                        "<a class=\"link\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                        escape(href)
                    )
                );
                write_inlines(children, out);
                out.push_str("</a>");
            }
            Inline::Image { src, alt } => {
                out.push_str(
                    &format!("<img src=\"{}\" alt=\"{}\"/>", escape(safe_url(src)), escape(alt))
                );
            }
            Inline::SoftBreak => out.push('\n'),
            Inline::HardBreak => out.push_str("<br/>"),
            Inline::ScoreCallout { score, confidence } => {
                out.push_str(
                    &format!(
                        "<strong class=\"score-callout\"><span class=\"score-title\">Overall Trust Score</span><span class=\"score-value {}\">{}/10</span></strong>",
                        confidence.css_class(),
                        score
                    )
                );
            }
            Inline::LevelBadge { level, label } => {
                let class = level.map(|l| l.css_class()).unwrap_or("level-default");
                out.push_str(
                    &format!(
                        "<strong class=\"level-badge {}\">Trust Level: {}</strong>",
                        class,
                        escape(label)
                    )
                );
            }
        }
    }
}

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative URLs and the allowed schemes pass through; anything else,
/// `javascript:` included, becomes `#`.
pub fn safe_url(url: &str) -> &str {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return "#";
    }
    let colon = match trimmed.find(':') {
        Some(pos) => pos,
        None => {
            return trimmed;
        }
    };
    // a path, query or fragment before the colon means there is no scheme
    if trimmed[..colon].contains(['/', '?', '#']) {
        return trimmed;
    }
    let scheme: String = trimmed[..colon]
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if SAFE_SCHEMES.contains(&scheme.as_str()) {
        trimmed
    } else {
        "#"
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::safe_url;
    use crate::render::render;

    #[test]
    fn unsafe_link_schemes_are_neutralised() {
        let html = render("[click](javascript:alert(document.cookie))").to_html();
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));

        let html = render("![x](data:text/html;base64,AAAA)").to_html();
        assert!(html.contains("<img src=\"#\""));
    }

    #[test]
    fn safe_urls_pass_through() {
        assert_eq!(safe_url("https://example.com/a?b=c"), "https://example.com/a?b=c");
        assert_eq!(safe_url("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(safe_url("mailto:team@example.com"), "mailto:team@example.com");
        assert_eq!(safe_url("/reports/eth"), "/reports/eth");
        assert_eq!(safe_url("#section"), "#section");
        assert_eq!(safe_url("docs/a:b"), "docs/a:b");
        assert_eq!(safe_url("JavaScript:alert(1)"), "#");
        assert_eq!(safe_url("vbscript:x"), "#");
        assert_eq!(safe_url(""), "#");
    }

    #[test]
    fn score_callout_markup() {
        let html = render("**Overall Trust Score: 8.5/10**").to_html();
        assert!(html.contains("<span class=\"score-value score-high\">8.5/10</span>"));
    }

    #[test]
    fn level_badges_use_level_class() {
        assert!(render("**Trust Level: LOW**").to_html().contains("level-badge level-low"));
        assert!(render("**Trust Level: maybe**").to_html().contains("level-badge level-default"));
    }

    #[test]
    fn text_is_escaped() {
        let html = render("a <script>alert('x')</script> & b").to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn list_items_carry_bullet() {
        let html = render("- ✅ audited").to_html();
        assert!(html.contains("<span class=\"marker\">•</span><span class=\"item-body\">✅ audited</span>"));
    }

    #[test]
    fn links_open_in_new_tab() {
        let html = render("[docs](https://example.com)").to_html();
        assert!(html.contains("href=\"https://example.com\" target=\"_blank\""));
    }
}
