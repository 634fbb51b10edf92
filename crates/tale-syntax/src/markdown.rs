//! Prose conversion through pulldown-cmark.
//!
//! Inline directives are swapped for private-use placeholders before the
//! Markdown parser sees the text, so their labels and attributes are never
//! mistaken for emphasis or links. Placeholders in prose come back as text
//! directives; inside code spans, code blocks and HTML they are restored to
//! their source text.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use serde_json::{Map, Value};

use crate::node::{DirectiveKind, DirectiveNode, Node};
use crate::scanner::{TokenKind, parse_directive, scan};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// An inline directive hidden behind a placeholder.
struct Protected {
    raw: String,
    node: DirectiveNode,
}

/// Parse a block of prose into nodes.
pub(crate) fn prose_to_nodes(text: &str) -> Vec<Node> {
    let (masked, protected) = protect(text);
    Converter::new(&protected).run(&masked)
}

fn protect(text: &str) -> (String, Vec<Protected>) {
    let mut masked = String::with_capacity(text.len());
    let mut protected = Vec::new();
    for token in scan(text) {
        let header = (token.kind == TokenKind::Leaf)
            .then(|| parse_directive(&token))
            .flatten()
            .filter(|header| header.terminated);
        let Some(header) = header else {
            masked.push_str(token.value);
            continue;
        };
        masked.push(OPEN);
        masked.push_str(&protected.len().to_string());
        masked.push(CLOSE);
        protected.push(Protected {
            raw: token.value.to_owned(),
            node: DirectiveNode {
                kind: DirectiveKind::Text,
                name: header.name,
                attributes: header.attributes,
                label: header.label,
                children: Vec::new(),
            },
        });
    }
    (masked, protected)
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

enum FrameKind {
    Element {
        tag: &'static str,
        props: Map<String, Value>,
    },
    /// Children are hoisted into the parent (`HtmlBlock`).
    Transparent,
    /// Children are dropped (front matter).
    Discard,
}

struct Frame {
    kind: FrameKind,
    children: Vec<Node>,
}

struct Converter<'p> {
    protected: &'p [Protected],
    stack: Vec<Frame>,
    code_depth: usize,
    in_table_head: bool,
}

impl<'p> Converter<'p> {
    fn new(protected: &'p [Protected]) -> Self {
        Self {
            protected,
            stack: vec![Frame {
                kind: FrameKind::Transparent,
                children: Vec::new(),
            }],
            code_depth: 0,
            in_table_head: false,
        }
    }

    fn run(mut self, text: &str) -> Vec<Node> {
        for event in Parser::new_ext(text, options()) {
            self.event(event);
        }
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack.pop().map(|frame| frame.children).unwrap_or_default()
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(_) => self.close(),
            Event::Text(text) => {
                if self.code_depth > 0 {
                    let restored = self.restore(&text);
                    self.push_text(&restored);
                } else {
                    self.push_prose(&text);
                }
            }
            Event::Code(code) => {
                let restored = self.restore(&code);
                self.push(Node::element("code", vec![Node::text(restored)]));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let value = self.restore(&html);
                self.push(Node::Html { value });
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                let restored = self.restore(&math);
                self.push_text(&restored);
            }
            Event::FootnoteReference(label) => self.push_text(&format!("[^{label}]")),
            Event::SoftBreak => self.push_text("\n"),
            Event::HardBreak => self.push(Node::element("br", Vec::new())),
            Event::Rule => self.push(Node::element("hr", Vec::new())),
            Event::TaskListMarker(checked) => {
                let mut props = Map::new();
                props.insert("type".to_owned(), Value::from("checkbox"));
                props.insert("checked".to_owned(), Value::Bool(checked));
                props.insert("disabled".to_owned(), Value::Bool(true));
                self.push(Node::Element {
                    tag: "input".to_owned(),
                    props,
                    children: Vec::new(),
                });
            }
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        let mut props = Map::new();
        let tag = match tag {
            Tag::Paragraph => "p",
            Tag::Heading { level, id, .. } => {
                if let Some(id) = id {
                    props.insert("id".to_owned(), Value::from(id.to_string()));
                }
                heading_tag(level)
            }
            Tag::BlockQuote(kind) => {
                if let Some(kind) = kind {
                    let kind = format!("{kind:?}").to_lowercase();
                    props.insert("kind".to_owned(), Value::from(kind));
                }
                "blockquote"
            }
            Tag::CodeBlock(kind) => {
                self.code_depth += 1;
                if let CodeBlockKind::Fenced(info) = kind
                    && let Some(lang) = info.split_whitespace().next()
                {
                    props.insert("lang".to_owned(), Value::from(lang));
                }
                "pre"
            }
            Tag::HtmlBlock => return self.start(FrameKind::Transparent),
            Tag::MetadataBlock(_) => return self.start(FrameKind::Discard),
            Tag::List(Some(start)) => {
                if start != 1 {
                    props.insert("start".to_owned(), Value::from(start));
                }
                "ol"
            }
            Tag::List(None) => "ul",
            Tag::Item => "li",
            Tag::FootnoteDefinition(label) => {
                props.insert("id".to_owned(), Value::from(format!("fn-{label}")));
                "div"
            }
            Tag::DefinitionList => "dl",
            Tag::DefinitionListTitle => "dt",
            Tag::DefinitionListDefinition => "dd",
            Tag::Table(_) => "table",
            Tag::TableHead => {
                self.in_table_head = true;
                "thead"
            }
            Tag::TableRow => "tr",
            Tag::TableCell => {
                if self.in_table_head {
                    "th"
                } else {
                    "td"
                }
            }
            Tag::Emphasis => "em",
            Tag::Strong => "strong",
            Tag::Strikethrough => "del",
            Tag::Superscript => "sup",
            Tag::Subscript => "sub",
            Tag::Link {
                dest_url, title, ..
            } => {
                props.insert("href".to_owned(), Value::from(dest_url.to_string()));
                if !title.is_empty() {
                    props.insert("title".to_owned(), Value::from(title.to_string()));
                }
                "a"
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                props.insert("src".to_owned(), Value::from(dest_url.to_string()));
                if !title.is_empty() {
                    props.insert("title".to_owned(), Value::from(title.to_string()));
                }
                "img"
            }
        };
        self.start(FrameKind::Element { tag, props });
    }

    fn start(&mut self, kind: FrameKind) {
        self.stack.push(Frame {
            kind,
            children: Vec::new(),
        });
    }

    fn close(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame.kind {
            FrameKind::Element { tag, props } => {
                match tag {
                    "pre" => self.code_depth = self.code_depth.saturating_sub(1),
                    "thead" => self.in_table_head = false,
                    _ => {}
                }
                self.push(Node::Element {
                    tag: tag.to_owned(),
                    props,
                    children: frame.children,
                });
            }
            FrameKind::Transparent => {
                for child in frame.children {
                    self.push(child);
                }
            }
            FrameKind::Discard => {}
        }
    }

    fn children(&mut self) -> &mut Vec<Node> {
        let last = self.stack.len() - 1;
        &mut self.stack[last].children
    }

    fn push(&mut self, node: Node) {
        if let Node::Text { value } = &node {
            self.push_text(value);
            return;
        }
        self.children().push(node);
    }

    /// Append text, merging with a preceding text node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = self.children();
        if let Some(Node::Text { value }) = children.last_mut() {
            value.push_str(text);
        } else {
            children.push(Node::text(text));
        }
    }

    /// Append prose, turning placeholders into directive nodes.
    fn push_prose(&mut self, text: &str) {
        let mut rest = text;
        while let Some(open) = rest.find(OPEN) {
            self.push_text(&rest[..open]);
            let after = &rest[open + OPEN.len_utf8()..];
            match self.placeholder(after) {
                Some((node, consumed)) => {
                    self.children().push(Node::Directive(node));
                    rest = &after[consumed..];
                }
                None => {
                    self.push_text(&rest[open..open + OPEN.len_utf8()]);
                    rest = after;
                }
            }
        }
        self.push_text(rest);
    }

    /// Resolve a placeholder body (`N` + close marker) at the start of `s`.
    fn placeholder(&self, s: &str) -> Option<(DirectiveNode, usize)> {
        let close = s.find(CLOSE)?;
        let index: usize = s[..close].parse().ok()?;
        let protected = self.protected.get(index)?;
        Some((protected.node.clone(), close + CLOSE.len_utf8()))
    }

    /// Replace placeholders with the source text they stand for.
    fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find(OPEN) {
            out.push_str(&rest[..open]);
            let after = &rest[open + OPEN.len_utf8()..];
            let raw = after.find(CLOSE).and_then(|close| {
                let index: usize = after[..close].parse().ok()?;
                let protected = self.protected.get(index)?;
                Some((protected.raw.as_str(), close + CLOSE.len_utf8()))
            });
            match raw {
                Some((raw, consumed)) => {
                    out.push_str(raw);
                    rest = &after[consumed..];
                }
                None => {
                    out.push(OPEN);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_directive_becomes_text_directive() {
        let nodes = prose_to_nodes("You have :show[gold] coins.");
        let Node::Element { tag, children, .. } = &nodes[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(tag, "p");
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], Node::text("You have "));
        let directive = children[1].as_directive().unwrap();
        assert_eq!(directive.kind, DirectiveKind::Text);
        assert_eq!(directive.name, "show");
        assert_eq!(directive.label.as_deref(), Some("gold"));
        assert_eq!(children[2], Node::text(" coins."));
    }

    #[test]
    fn test_label_markup_not_interpreted() {
        let nodes = prose_to_nodes("Say :say[*not emphasis*]{a=\"[x](y)\"}");
        let directive = nodes[0].children()[1].as_directive().unwrap();
        assert_eq!(directive.label.as_deref(), Some("*not emphasis*"));
        assert_eq!(directive.attr("a"), Some("[x](y)"));
    }

    #[test]
    fn test_directive_in_code_span_restored() {
        let nodes = prose_to_nodes("Type `:set[gold]` to cheat.");
        let code = &nodes[0].children()[1];
        assert_eq!(code, &Node::element("code", vec![Node::text(":set[gold]")]));
    }

    #[test]
    fn test_fenced_code_keeps_source() {
        let nodes = prose_to_nodes("```md\n:show[x]\n```");
        let Node::Element { tag, props, children } = &nodes[0] else {
            panic!("expected pre");
        };
        assert_eq!(tag, "pre");
        assert_eq!(props["lang"], Value::from("md"));
        assert_eq!(children, &vec![Node::text(":show[x]\n")]);
    }

    #[test]
    fn test_markdown_structure() {
        let nodes = prose_to_nodes("## Title\n\n- **bold** item\n\n[link](/next \"Next\")");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].text_content(), "Title");
        let Node::Element { tag, .. } = &nodes[1] else {
            panic!("expected list");
        };
        assert_eq!(tag, "ul");
        let Node::Element { props, .. } = &nodes[2].children()[0] else {
            panic!("expected link");
        };
        assert_eq!(props["href"], Value::from("/next"));
        assert_eq!(props["title"], Value::from("Next"));
    }
}
