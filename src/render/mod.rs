pub mod fields;
pub mod html;

use pulldown_cmark::{ CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag };
use serde::Serialize;

use self::fields::{ ScoreConfidence, SectionKind, StrongField, TrustLevel };

const REPORT_TITLE_BOLD: &str = "**DECRYPTIFY TRUST SCORE REPORT**";
const REPORT_TITLE_HEADING: &str = "# DECRYPTIFY TRUST SCORE REPORT";
pub const LIST_MARKER: &str = "•";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStyle {
    Banner,
    H1,
    H2,
    H3,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Code { code: String },
    Emphasis { children: Vec<Inline> },
    Strong { children: Vec<Inline> },
    Strikethrough { children: Vec<Inline> },
    Link { href: String, children: Vec<Inline> },
    Image { src: String, alt: String },
    SoftBreak,
    HardBreak,
    ScoreCallout { score: f64, confidence: ScoreConfidence },
    LevelBadge { level: Option<TrustLevel>, label: String },
}

impl Inline {
    fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListItem {
    pub marker: String,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { style: HeadingStyle, children: Vec<Inline> },
    Paragraph { children: Vec<Inline> },
    Section { kind: SectionKind, label: Option<String>, children: Vec<Inline> },
    List { ordered: bool, items: Vec<ListItem> },
    CodeBlock { language: Option<String>, code: String },
    BlockQuote { blocks: Vec<Block> },
    Table { header: Vec<Vec<Inline>>, rows: Vec<Vec<Vec<Inline>>> },
    Rule,
}

/// Visual tree for one assistant message.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn score_callouts(&self) -> Vec<(f64, ScoreConfidence)> {
        let mut found = Vec::new();
        for block in &self.blocks {
            collect_callouts_block(block, &mut found);
        }
        found
    }

    pub fn to_html(&self) -> String {
        html::to_html(self)
    }
}

fn collect_callouts_block(block: &Block, out: &mut Vec<(f64, ScoreConfidence)>) {
    match block {
        | Block::Heading { children, .. }
        | Block::Paragraph { children }
        | Block::Section { children, .. } => collect_callouts_inline(children, out),
        Block::List { items, .. } => {
            for item in items {
                for b in &item.blocks {
                    collect_callouts_block(b, out);
                }
            }
        }
        Block::BlockQuote { blocks } => {
            for b in blocks {
                collect_callouts_block(b, out);
            }
        }
        Block::Table { header, rows } => {
            for cell in header.iter().chain(rows.iter().flatten()) {
                collect_callouts_inline(cell, out);
            }
        }
        Block::CodeBlock { .. } | Block::Rule => {}
    }
}

fn collect_callouts_inline(inlines: &[Inline], out: &mut Vec<(f64, ScoreConfidence)>) {
    for inline in inlines {
        match inline {
            Inline::ScoreCallout { score, confidence } => out.push((*score, *confidence)),
            | Inline::Emphasis { children }
            | Inline::Strong { children }
            | Inline::Strikethrough { children }
            | Inline::Link { children, .. } => collect_callouts_inline(children, out),
            _ => {}
        }
    }
}

/// Plain text of an inline run, the same string the label patterns match on.
pub fn flatten(inlines: &[Inline]) -> String {
    let mut out = String::new();
    flatten_into(inlines, &mut out);
    out
}

fn flatten_into(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { text } => out.push_str(text),
            Inline::Code { code } => out.push_str(code),
            | Inline::Emphasis { children }
            | Inline::Strong { children }
            | Inline::Strikethrough { children }
            | Inline::Link { children, .. } => flatten_into(children, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::ScoreCallout { score, .. } => {
                out.push_str(&format!("{} {}/10", fields::SCORE_LABEL, score));
            }
            Inline::LevelBadge { label, .. } => {
                out.push_str(&format!("{} {}", fields::LEVEL_LABEL, label));
            }
        }
    }
}

fn preprocess(text: &str) -> String {
    text.replace(REPORT_TITLE_BOLD, REPORT_TITLE_HEADING)
}

/// Renders one assistant message. Pure: the same text always yields the same
/// tree, and unrecognised constructs fall back to their default node.
pub fn render(text: &str) -> Document {
    let source = preprocess(text);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut builder = TreeBuilder {
        events: Parser::new_ext(&source, options),
    };
    Document {
        blocks: builder.blocks(),
    }
}

struct TreeBuilder<'a> {
    events: Parser<'a>,
}

impl<'a> TreeBuilder<'a> {
    /// Reads blocks until the enclosing container ends. Inline content that
    /// appears directly in a container (tight list items) becomes a paragraph.
    fn blocks(&mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut pending: Vec<Inline> = Vec::new();

        while let Some(event) = self.events.next() {
            match event {
                Event::End(_) => break,
                Event::Start(tag) if is_block_tag(&tag) => {
                    flush_pending(&mut pending, &mut blocks);
                    self.block(tag, &mut blocks);
                }
                Event::Rule => {
                    flush_pending(&mut pending, &mut blocks);
                    blocks.push(Block::Rule);
                }
                other => self.inline_event(other, &mut pending),
            }
        }

        flush_pending(&mut pending, &mut blocks);
        blocks
    }

    fn block(&mut self, tag: Tag<'a>, blocks: &mut Vec<Block>) {
        match tag {
            Tag::Paragraph => {
                let children = self.inlines();
                blocks.push(paragraph_block(children));
            }
            Tag::Heading { level, .. } => {
                let children = self.inlines();
                let style = if fields::is_banner_heading(&flatten(&children)) {
                    HeadingStyle::Banner
                } else {
                    match level {
                        HeadingLevel::H1 => HeadingStyle::H1,
                        HeadingLevel::H2 => HeadingStyle::H2,
                        _ => HeadingStyle::H3,
                    }
                };
                blocks.push(Block::Heading { style, children });
            }
            Tag::BlockQuote { .. } => {
                let inner = self.blocks();
                blocks.push(Block::BlockQuote { blocks: inner });
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let lang = info.split_whitespace().next().unwrap_or("").to_string();
                        if lang.is_empty() { None } else { Some(lang) }
                    }
                    CodeBlockKind::Indented => None,
                };
                let code = self.raw_text();
                blocks.push(Block::CodeBlock { language, code });
            }
            Tag::HtmlBlock => {
                let raw = self.raw_text();
                blocks.push(Block::Paragraph { children: vec![Inline::text(raw)] });
            }
            Tag::List(start) => {
                let items = self.list_items(start);
                blocks.push(Block::List { ordered: start.is_some(), items });
            }
            Tag::Table { .. } => {
                let (header, rows) = self.table();
                blocks.push(Block::Table { header, rows });
            }
            _ => {
                let inner = self.blocks();
                blocks.extend(inner);
            }
        }
    }

    fn list_items(&mut self, start: Option<u64>) -> Vec<ListItem> {
        let mut items = Vec::new();
        let mut number = start;
        while let Some(event) = self.events.next() {
            match event {
                Event::Start(Tag::Item) => {
                    let marker = match number {
                        Some(n) => {
                            number = Some(n + 1);
                            format!("{}.", n)
                        }
                        None => LIST_MARKER.to_string(),
                    };
                    let blocks = self.blocks();
                    items.push(ListItem { marker, blocks });
                }
                Event::End(_) => break,
                _ => {}
            }
        }
        items
    }

    fn table(&mut self) -> (Vec<Vec<Inline>>, Vec<Vec<Vec<Inline>>>) {
        let mut header = Vec::new();
        let mut rows = Vec::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::Start(Tag::TableHead) => {
                    header = self.table_row();
                }
                Event::Start(Tag::TableRow) => rows.push(self.table_row()),
                Event::End(_) => break,
                _ => {}
            }
        }
        (header, rows)
    }

    fn table_row(&mut self) -> Vec<Vec<Inline>> {
        let mut cells = Vec::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::Start(Tag::TableCell) => cells.push(self.inlines()),
                Event::End(_) => break,
                _ => {}
            }
        }
        cells
    }

    /// Concatenated text up to the end of a literal block.
    fn raw_text(&mut self) -> String {
        let mut out = String::new();
        while let Some(event) = self.events.next() {
            match event {
                Event::End(_) => break,
                | Event::Text(text)
                | Event::Html(text)
                | Event::InlineHtml(text)
                | Event::Code(text) => out.push_str(&text),
                Event::SoftBreak | Event::HardBreak => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    fn inlines(&mut self) -> Vec<Inline> {
        let mut out = Vec::new();
        while let Some(event) = self.events.next() {
            if let Event::End(_) = event {
                break;
            }
            self.inline_event(event, &mut out);
        }
        out
    }

    fn inline_event(&mut self, event: Event<'a>, out: &mut Vec<Inline>) {
        match event {
            Event::Text(text) => push_text(out, &text),
            Event::Code(code) => out.push(Inline::Code { code: code.to_string() }),
            | Event::InlineMath(math)
            | Event::DisplayMath(math) => out.push(Inline::Code { code: math.to_string() }),
            Event::Html(html) | Event::InlineHtml(html) => push_text(out, &html),
            Event::FootnoteReference(name) => push_text(out, &format!("[{}]", name)),
            Event::SoftBreak => out.push(Inline::SoftBreak),
            Event::HardBreak => out.push(Inline::HardBreak),
            Event::TaskListMarker(checked) => {
                push_text(out, if checked { "[x] " } else { "[ ] " });
            }
            Event::Rule => push_text(out, "---"),
            Event::Start(tag) => self.inline_tag(tag, out),
            _ => {}
        }
    }

    fn inline_tag(&mut self, tag: Tag<'a>, out: &mut Vec<Inline>) {
        match tag {
            Tag::Emphasis => {
                let children = self.inlines();
                out.push(Inline::Emphasis { children });
            }
            Tag::Strong => {
                let children = self.inlines();
                out.push(strong_inline(children));
            }
            Tag::Strikethrough => {
                let children = self.inlines();
                out.push(Inline::Strikethrough { children });
            }
            Tag::Link { dest_url, .. } => {
                let children = self.inlines();
                out.push(Inline::Link { href: dest_url.to_string(), children });
            }
            Tag::Image { dest_url, .. } => {
                let alt = flatten(&self.inlines());
                out.push(Inline::Image { src: dest_url.to_string(), alt });
            }
            _ => {
                let children = self.inlines();
                out.extend(children);
            }
        }
    }
}

fn is_block_tag(tag: &Tag<'_>) -> bool {
    !matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text { text: last }) = out.last_mut() {
        last.push_str(text);
        return;
    }
    out.push(Inline::text(text));
}

fn flush_pending(pending: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
    if !pending.is_empty() {
        blocks.push(paragraph_block(std::mem::take(pending)));
    }
}

fn strong_inline(children: Vec<Inline>) -> Inline {
    match fields::classify_strong(&flatten(&children)) {
        Some(StrongField::Score { score, confidence }) => Inline::ScoreCallout { score, confidence },
        Some(StrongField::Level { level, label }) => Inline::LevelBadge { level, label },
        None => Inline::Strong { children },
    }
}

fn paragraph_block(children: Vec<Inline>) -> Block {
    match fields::classify_paragraph(&flatten(&children)) {
        Some(kind) => {
            let label = kind.label();
            let children = match label {
                Some(label) => strip_label(children, label),
                None => children,
            };
            Block::Section {
                kind,
                label: label.map(|l| l.to_string()),
                children,
            }
        }
        None => Block::Paragraph { children },
    }
}

/// Removes the first occurrence of `label` from the top-level text runs. If
/// the label sits inside nested formatting the children are left untouched.
fn strip_label(mut children: Vec<Inline>, label: &str) -> Vec<Inline> {
    let found = children.iter().enumerate().find_map(|(idx, inline)| match inline {
        Inline::Text { text } => text.find(label).map(|pos| (idx, pos)),
        _ => None,
    });
    let Some((idx, pos)) = found else {
        return children;
    };

    let remaining = match &children[idx] {
        Inline::Text { text } => {
            format!("{}{}", &text[..pos], &text[pos + label.len()..]).trim_start().to_string()
        }
        _ => return children,
    };
    if remaining.is_empty() {
        children.remove(idx);
        trim_leading(&mut children);
    } else {
        children[idx] = Inline::text(remaining);
    }
    children
}

fn trim_leading(children: &mut Vec<Inline>) {
    while let Some(Inline::SoftBreak | Inline::HardBreak) = children.first() {
        children.remove(0);
    }
    if let Some(Inline::Text { text }) = children.first_mut() {
        *text = text.trim_start().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = "**DECRYPTIFY TRUST SCORE REPORT**

## Project: Bitcoin

**Overall Trust Score: 8.5/10**

**Trust Level: HIGH**

Key Findings: long track record

- ✅ Audited by CertiK
- Market Cap: $1.2T

Red Flags Detected: none

Recommendation: Suitable for long-term holding.

---

DISCLAIMER: This analysis is for informational purposes only.
";

    #[test]
    fn report_title_becomes_banner() {
        let doc = render(SAMPLE_REPORT);
        assert_eq!(
            doc.blocks[0],
            Block::Heading {
                style: HeadingStyle::Banner,
                children: vec![Inline::text("DECRYPTIFY TRUST SCORE REPORT")],
            }
        );
        assert!(matches!(doc.blocks[1], Block::Heading { style: HeadingStyle::H2, .. }));
    }

    #[test]
    fn score_and_level_become_callouts() {
        let doc = render(SAMPLE_REPORT);
        assert_eq!(
            doc.blocks[2],
            Block::Paragraph {
                children: vec![Inline::ScoreCallout {
                    score: 8.5,
                    confidence: ScoreConfidence::High,
                }],
            }
        );
        assert_eq!(
            doc.blocks[3],
            Block::Paragraph {
                children: vec![Inline::LevelBadge {
                    level: Some(TrustLevel::High),
                    label: "HIGH".to_string(),
                }],
            }
        );
    }

    #[test]
    fn score_styles_follow_thresholds() {
        let low = render("**Overall Trust Score: 4/10**");
        assert_eq!(low.score_callouts(), vec![(4.0, ScoreConfidence::Low)]);
        let medium = render("**Overall Trust Score: 6/10**");
        assert_eq!(medium.score_callouts(), vec![(6.0, ScoreConfidence::Medium)]);
    }

    #[test]
    fn every_score_occurrence_is_rendered_in_place() {
        let doc = render(
            "**Overall Trust Score: 8/10**\n\ntext\n\n**Overall Trust Score: 3.5/10**"
        );
        assert_eq!(
            doc.score_callouts(),
            vec![(8.0, ScoreConfidence::High), (3.5, ScoreConfidence::Low)]
        );
        assert_eq!(doc.blocks.len(), 3);
    }

    #[test]
    fn out_of_range_score_is_not_clamped() {
        let doc = render("**Overall Trust Score: 14/10**");
        assert_eq!(doc.score_callouts(), vec![(14.0, ScoreConfidence::High)]);
    }

    #[test]
    fn unknown_level_gets_default_badge() {
        let doc = render("**Trust Level: UNRATED**");
        assert_eq!(
            doc.blocks[0],
            Block::Paragraph {
                children: vec![Inline::LevelBadge { level: None, label: "UNRATED".to_string() }],
            }
        );
    }

    #[test]
    fn sections_are_classified() {
        let doc = render(SAMPLE_REPORT);
        let kinds: Vec<SectionKind> = doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Section { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::KeyFindings,
                SectionKind::RedFlags,
                SectionKind::Recommendation,
                SectionKind::Disclaimer
            ]
        );
    }

    #[test]
    fn recommendation_label_is_split_from_text() {
        let doc = render("Recommendation: Suitable for long-term holding.");
        assert_eq!(
            doc.blocks[0],
            Block::Section {
                kind: SectionKind::Recommendation,
                label: Some("Recommendation:".to_string()),
                children: vec![Inline::text("Suitable for long-term holding.")],
            }
        );
    }

    #[test]
    fn section_keeps_its_text() {
        let doc = render("Key Findings: long track record");
        assert_eq!(
            doc.blocks[0],
            Block::Section {
                kind: SectionKind::KeyFindings,
                label: None,
                children: vec![Inline::text("Key Findings: long track record")],
            }
        );
    }

    #[test]
    fn list_items_get_bullet_marker() {
        let doc = render("- first\n- second");
        match &doc.blocks[0] {
            Block::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].marker, LIST_MARKER);
                assert_eq!(
                    items[1].blocks,
                    vec![Block::Paragraph { children: vec![Inline::text("second")] }]
                );
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn ordered_lists_keep_numbers() {
        let doc = render("3. c\n4. d");
        match &doc.blocks[0] {
            Block::List { ordered, items } => {
                assert!(ordered);
                assert_eq!(items[0].marker, "3.");
                assert_eq!(items[1].marker, "4.");
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn deep_headings_fall_back_to_h3() {
        let doc = render("##### Deep");
        assert!(matches!(doc.blocks[0], Block::Heading { style: HeadingStyle::H3, .. }));
    }

    #[test]
    fn default_constructs_render() {
        let doc = render(
            "```rust\nfn main() {}\n```\n\n> quoted\n\n[site](https://example.com) and `code`\n\n***"
        );
        assert_eq!(
            doc.blocks[0],
            Block::CodeBlock { language: Some("rust".into()), code: "fn main() {}\n".into() }
        );
        assert!(matches!(doc.blocks[1], Block::BlockQuote { .. }));
        match &doc.blocks[2] {
            Block::Paragraph { children } => {
                assert!(matches!(&children[0], Inline::Link { href, .. } if href == "https://example.com"));
                assert!(children.contains(&Inline::Code { code: "code".into() }));
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
        assert_eq!(doc.blocks[3], Block::Rule);
    }

    #[test]
    fn plain_markdown_has_no_fields() {
        let doc = render("Just a *friendly* answer about **staking**.");
        assert!(doc.score_callouts().is_empty());
        assert_eq!(flatten(match &doc.blocks[0] {
            Block::Paragraph { children } => children,
            other => panic!("expected paragraph, got {:?}", other),
        }), "Just a friendly answer about staking.");
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render(SAMPLE_REPORT), render(SAMPLE_REPORT));
        assert_eq!(render(SAMPLE_REPORT).to_html(), render(SAMPLE_REPORT).to_html());
    }

    #[test]
    fn empty_input_renders_empty_document() {
        assert!(render("").is_empty());
    }
}
