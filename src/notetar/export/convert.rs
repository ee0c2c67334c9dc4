//! # Content Conversion
//!
//! Text notes are stored as HTML. Depending on the export format their
//! content is written as:
//!
//! | Format     | Output                                  |
//! |------------|-----------------------------------------|
//! | `html`     | HTML, re-indented for readability       |
//! | `markdown` | Markdown converted from the HTML        |
//! | `raw`      | The stored bytes, untouched             |
//!
//! Every other note type (code, images, files, ...) is always written
//! verbatim.
//!
//! Conversion sits behind [`ContentConverter`] so callers can plug in a
//! different HTML toolchain. [`DefaultConverter`] uses a small tag-aware
//! indenter for HTML and `htmd` for Markdown, then normalises the Markdown
//! with pulldown-cmark so the output is stable across converter quirks.

use pulldown_cmark::{Options, Parser};
use pulldown_cmark_to_cmark::cmark;

use super::ExportFormat;
use crate::error::{NotetarError, Result};
use crate::model::{Note, NoteType};

pub trait ContentConverter {
    fn pretty_print_html(&self, html: &str) -> String;

    fn html_to_markdown(&self, html: &str) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverter;

impl ContentConverter for DefaultConverter {
    fn pretty_print_html(&self, html: &str) -> String {
        pretty_print_html(html)
    }

    fn html_to_markdown(&self, html: &str) -> Result<String> {
        let markdown =
            htmd::convert(html).map_err(|e| NotetarError::Conversion(e.to_string()))?;
        normalize_markdown(&markdown)
    }
}

/// Content bytes to write for `note` under `format`.
pub fn prepare_content<C: ContentConverter + ?Sized>(
    converter: &C,
    note: Note,
    format: ExportFormat,
) -> Result<Vec<u8>> {
    if note.note_type != NoteType::Text {
        return Ok(note.content);
    }
    match format {
        ExportFormat::Html => Ok(converter
            .pretty_print_html(&note.content_as_text())
            .into_bytes()),
        ExportFormat::Markdown => Ok(converter
            .html_to_markdown(&note.content_as_text())?
            .into_bytes()),
        ExportFormat::Raw => Ok(note.content),
    }
}

/// Round-trip Markdown through pulldown-cmark for canonical formatting.
pub fn normalize_markdown(markdown: &str) -> Result<String> {
    let parser = Parser::new_ext(markdown, Options::all());
    let mut output = String::new();
    cmark(parser, &mut output).map_err(|e| NotetarError::Conversion(e.to_string()))?;
    Ok(output)
}

const INDENT: &str = "  ";

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is not markup and is copied as written.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea"];

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    /// Body of a raw text element, up to its closing tag.
    RawText(&'a str),
    Tag {
        raw: &'a str,
        name: String,
        closing: bool,
        void: bool,
    },
}

impl Token<'_> {
    fn raw(&self) -> &str {
        match self {
            Token::Text(raw) | Token::RawText(raw) | Token::Tag { raw, .. } => raw,
        }
    }
}

fn tag_end(s: &str) -> Option<usize> {
    if s.starts_with("<!--") {
        return s.find("-->").map(|i| i + 3);
    }
    let mut quote = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn parse_tag(raw: &str) -> Token<'_> {
    if raw.starts_with("<!") || raw.starts_with("<?") {
        return Token::Tag {
            raw,
            name: "!".to_string(),
            closing: false,
            void: true,
        };
    }
    let inner = raw.strip_prefix('<').unwrap_or(raw);
    let inner = inner.strip_suffix('>').unwrap_or(inner);
    let closing = inner.starts_with('/');
    let name: String = inner
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() || !raw.ends_with('>') {
        return Token::Text(raw);
    }
    let void = inner.ends_with('/') || VOID_TAGS.contains(&name.as_str());
    Token::Tag {
        raw,
        name,
        closing,
        void,
    }
}

/// Length of raw text before `</name`, matched case-insensitively.
fn raw_text_end(rest: &str, name: &str) -> usize {
    let closing = format!("</{}", name);
    rest.to_ascii_lowercase()
        .find(&closing)
        .unwrap_or(rest.len())
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let end = tag_end(rest).unwrap_or(rest.len());
                let tag = parse_tag(&rest[..end]);
                rest = &rest[end..];
                let raw_text_len = match &tag {
                    Token::Tag {
                        name,
                        closing: false,
                        void: false,
                        ..
                    } if RAW_TEXT_TAGS.contains(&name.as_str()) => {
                        Some(raw_text_end(rest, name))
                    }
                    _ => None,
                };
                tokens.push(tag);
                if let Some(len) = raw_text_len.filter(|&len| len > 0) {
                    tokens.push(Token::RawText(&rest[..len]));
                    rest = &rest[len..];
                }
            }
            Some(i) => {
                tokens.push(Token::Text(&rest[..i]));
                rest = &rest[i..];
            }
            None => {
                tokens.push(Token::Text(rest));
                rest = "";
            }
        }
    }
    tokens
}

#[derive(Default)]
struct HtmlPrinter {
    out: String,
    line: String,
    depth: usize,
    // nesting of <pre>; content inside is copied verbatim
    pre_depth: usize,
}

impl HtmlPrinter {
    fn push(&mut self, token: Token<'_>) {
        if self.pre_depth > 0 {
            self.line.push_str(token.raw());
            if let Token::Tag { name, closing, .. } = &token {
                if name == "pre" {
                    if *closing {
                        self.pre_depth -= 1;
                    } else {
                        self.pre_depth += 1;
                    }
                }
            }
            if self.pre_depth == 0 {
                let line = std::mem::take(&mut self.line);
                self.emit(&line);
            }
            return;
        }

        match token {
            Token::Text(text) => self.push_collapsed(text),
            Token::RawText(text) => self.line.push_str(text),
            Token::Tag {
                raw, name, closing, ..
            } if name == "pre" && !closing => {
                self.flush();
                self.line.push_str(raw);
                self.pre_depth = 1;
            }
            Token::Tag {
                raw,
                name,
                closing,
                void,
            } => {
                let is_block = name == "!" || BLOCK_TAGS.contains(&name.as_str());
                if !is_block {
                    self.line.push_str(raw);
                } else if void {
                    self.flush();
                    self.emit(raw);
                } else if closing {
                    self.flush();
                    self.depth = self.depth.saturating_sub(1);
                    self.emit(raw);
                } else {
                    self.flush();
                    self.emit(raw);
                    self.depth += 1;
                }
            }
        }
    }

    fn push_collapsed(&mut self, text: &str) {
        let mut last_space = self.line.is_empty() || self.line.ends_with(' ');
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    self.line.push(' ');
                    last_space = true;
                }
            } else {
                self.line.push(c);
                last_space = false;
            }
        }
    }

    fn flush(&mut self) {
        let line = std::mem::take(&mut self.line);
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            self.emit(trimmed);
        }
    }

    fn emit(&mut self, s: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        if self.pre_depth > 0 {
            let line = std::mem::take(&mut self.line);
            self.emit(&line);
        }
        self.flush();
        self.out
    }
}

/// Re-indent HTML: block elements on their own lines, two spaces per level.
pub fn pretty_print_html(html: &str) -> String {
    let mut printer = HtmlPrinter::default();
    for token in tokenize(html) {
        printer.push(token);
    }
    printer.finish()
}
