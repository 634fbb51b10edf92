//! Directive-aware document builder.
//!
//! A line pass picks out container fences and block-level leaf directives;
//! everything between them is prose and goes through [`crate::markdown`].

use crate::fence::FenceTracker;
use crate::markdown::prose_to_nodes;
use crate::node::{DirectiveKind, DirectiveNode, Node};
use crate::scanner::{DirectiveHeader, TokenKind, parse_header, scan};

/// A parsed passage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Top-level nodes.
    pub children: Vec<Node>,
    /// Structural problems found while parsing (stray or unclosed fences).
    pub warnings: Vec<String>,
}

/// An open container and the prose collected inside it.
struct Frame<'a> {
    header: Option<DirectiveHeader>,
    line: usize,
    prose: Vec<&'a str>,
    children: Vec<Node>,
}

impl<'a> Frame<'a> {
    fn new(header: Option<DirectiveHeader>, line: usize) -> Self {
        Self {
            header,
            line,
            prose: Vec::new(),
            children: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if self.prose.iter().all(|line| line.trim().is_empty()) {
            self.prose.clear();
            return;
        }
        let text = self.prose.join("\n");
        self.prose.clear();
        self.children.extend(prose_to_nodes(&text));
    }

    fn fence_len(&self) -> usize {
        self.header.as_ref().map_or(0, |h| h.colons)
    }

    /// Whether the frame ends in an `else`/`case`/`default` branch, whose
    /// closing fence also closes the frame.
    fn ends_with_branch(&self) -> bool {
        self.prose.iter().all(|line| line.trim().is_empty())
            && self.children.last().is_some_and(|node| {
                node.as_directive().is_some_and(|d| {
                    d.kind == DirectiveKind::Container
                        && matches!(d.name.as_str(), "else" | "case" | "default")
                })
            })
    }
}

/// Parse passage text into a node tree.
///
/// `:::name[label]{attrs}` on its own line (indented at most three columns)
/// opens a container; a line of colons at least as long as the innermost
/// open fence closes it. Shorter colon lines are prose. Lines holding only
/// `::name` directives become leaf nodes. Code fences are opaque.
///
/// # Example
///
/// ```
/// use tale_syntax::{DirectiveKind, parse_document};
///
/// let doc = parse_document(":::if[gold > 1]\nRich!\n:::");
/// let directive = doc.children[0].as_directive().unwrap();
/// assert_eq!(directive.kind, DirectiveKind::Container);
/// assert_eq!(directive.label.as_deref(), Some("gold > 1"));
/// assert_eq!(directive.text_content(), "Rich!");
/// assert!(doc.warnings.is_empty());
/// ```
#[must_use]
pub fn parse_document(text: &str) -> Document {
    let mut stack = vec![Frame::new(None, 0)];
    let mut warnings = Vec::new();
    let mut fence = FenceTracker::new();

    for (index, raw_line) in text.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let line_no = index + 1;

        if fence.in_fence() {
            fence.update(line);
            push_prose(&mut stack, line);
            continue;
        }

        if indent_width(line) <= 3 {
            let trimmed = line.trim();
            if let Some(colons) = closing_fence(trimmed) {
                let innermost = stack.last().map_or(0, Frame::fence_len);
                if stack.len() > 1 && colons >= innermost {
                    close_top(&mut stack);
                } else {
                    if stack.len() == 1 {
                        warnings.push(format!(
                            "line {line_no}: stray {trimmed} with no opening directive"
                        ));
                    }
                    push_prose(&mut stack, line);
                }
                continue;
            }
            if let Some(header) = container_opening(trimmed) {
                if let Some(top) = stack.last_mut() {
                    top.flush();
                }
                stack.push(Frame::new(Some(header), line_no));
                continue;
            }
            if let Some(leaves) = leaf_line(trimmed) {
                if let Some(top) = stack.last_mut() {
                    top.flush();
                    top.children.extend(leaves);
                }
                continue;
            }
        }

        fence.update(line);
        push_prose(&mut stack, line);
    }

    while stack.len() > 1 {
        if let Some(frame) = stack.last()
            && let Some(header) = &frame.header
            && !frame.ends_with_branch()
        {
            warnings.push(format!(
                "line {}: unclosed container directive :::{} (missing closing :::)",
                frame.line, header.name
            ));
        }
        close_top(&mut stack);
    }

    let mut root = stack.pop().unwrap_or_else(|| Frame::new(None, 0));
    root.flush();
    for warning in &warnings {
        tracing::debug!(%warning, "directive structure");
    }
    Document {
        children: root.children,
        warnings,
    }
}

fn push_prose<'a>(stack: &mut [Frame<'a>], line: &'a str) {
    if let Some(top) = stack.last_mut() {
        top.prose.push(line);
    }
}

fn close_top(stack: &mut Vec<Frame<'_>>) {
    let Some(mut frame) = stack.pop() else {
        return;
    };
    frame.flush();
    let Some(header) = frame.header else {
        return;
    };
    let node = Node::Directive(DirectiveNode {
        kind: DirectiveKind::Container,
        name: header.name,
        attributes: header.attributes,
        label: header.label,
        children: frame.children,
    });
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Columns of leading whitespace, with tabs stopping every four columns.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Colon count of a line made only of three or more colons.
fn closing_fence(trimmed: &str) -> Option<usize> {
    (trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b':')).then_some(trimmed.len())
}

fn container_opening(trimmed: &str) -> Option<DirectiveHeader> {
    let (header, len) = parse_header(trimmed)?;
    (header.colons >= 3 && header.terminated && trimmed[len..].trim().is_empty())
        .then_some(header)
}

/// Leaf nodes for a line holding only `::name` directives.
fn leaf_line(trimmed: &str) -> Option<Vec<Node>> {
    if !trimmed.starts_with("::") || trimmed.starts_with(":::") {
        return None;
    }
    let mut leaves = Vec::new();
    for token in scan(trimmed) {
        match token.kind {
            TokenKind::Text if token.value.trim().is_empty() => {}
            TokenKind::Leaf => {
                let (header, _) = parse_header(token.value)?;
                if header.colons != 2 || !header.terminated {
                    return None;
                }
                leaves.push(Node::Directive(DirectiveNode {
                    kind: DirectiveKind::Leaf,
                    name: header.name,
                    attributes: header.attributes,
                    label: header.label,
                    children: Vec::new(),
                }));
            }
            _ => return None,
        }
    }
    Some(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn directive(node: &Node) -> &DirectiveNode {
        node.as_directive().unwrap()
    }

    #[test]
    fn test_nested_containers() {
        let doc = parse_document("::::outer\n:::inner\nbody\n:::\nafter\n::::");
        assert!(doc.warnings.is_empty());
        let outer = directive(&doc.children[0]);
        assert_eq!(outer.name, "outer");
        assert_eq!(outer.children.len(), 2);
        assert_eq!(directive(&outer.children[0]).name, "inner");
        assert_eq!(outer.children[1].text_content(), "after");
    }

    #[test]
    fn test_if_else_shape() {
        let doc = parse_document(":::if[health > 5]\nhigh\n:::else\nlow\n:::");
        let node = directive(&doc.children[0]);
        assert_eq!(node.name, "if");
        assert_eq!(node.children[0].text_content(), "high");
        let otherwise = directive(&node.children[1]);
        assert_eq!(otherwise.name, "else");
        assert_eq!(otherwise.text_content(), "low");
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_branch_followed_by_text_still_warns() {
        let doc = parse_document(":::switch[n]
:::case[1]
one
:::
tail");
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("unclosed container directive :::switch"));

        let doc = parse_document(":::switch[n]
:::case[1]
one
:::
:::default
none
:::");
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_shorter_fence_is_prose() {
        let doc = parse_document("::::box\n:::\n::::");
        let node = directive(&doc.children[0]);
        assert_eq!(node.text_content(), ":::");
    }

    #[test]
    fn test_stray_close_warns() {
        let doc = parse_document("text\n:::");
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.children[0].text_content(), "text\n:::");
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("stray :::"));
    }

    #[test]
    fn test_leaf_line() {
        let doc = parse_document("::set{key=a value=1} ::set{key=b value=2}\nDone.");
        assert_eq!(doc.children.len(), 3);
        assert_eq!(directive(&doc.children[0]).kind, DirectiveKind::Leaf);
        assert_eq!(directive(&doc.children[1]).attr("key"), Some("b"));
        assert_eq!(doc.children[2].text_content(), "Done.");
    }

    #[test]
    fn test_fenced_code_is_opaque() {
        let doc = parse_document("```\n:::if[x]\n```\n:::note\nhi\n:::");
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[0].text_content(), ":::if[x]\n");
        assert_eq!(directive(&doc.children[1]).name, "note");
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_deeply_indented_opening_is_prose() {
        let doc = parse_document("    :::note");
        assert!(doc.children[0].as_directive().is_none());
    }

    #[test]
    fn test_crlf_lines() {
        let doc = parse_document(":::note\r\nhi\r\n:::\r\n");
        assert_eq!(directive(&doc.children[0]).text_content(), "hi");
        assert!(doc.warnings.is_empty());
    }
}
