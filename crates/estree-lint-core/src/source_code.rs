//! Source code model: raw text plus a validated syntax tree, answering
//! structural queries for rules.
//!
//! The model is immutable after construction. Comment attachment is a pure
//! function of the tree and is computed once, lazily, behind a `OnceLock`,
//! so a model can be shared read-only across runs and threads.

use crate::ast::{Ast, Comment, Node, NodeId, NodeKind, NodeType, SourceLocation, Span, Token};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Contract violations detected when constructing a [`SourceCode`].
///
/// Callers match on the kind, not the message text. The checks are
/// independent and run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceCodeError {
    /// The parse result carries no token stream.
    #[error("AST is missing the tokens array")]
    MissingTokens,

    /// The parse result carries no comment stream.
    #[error("AST is missing the comments array")]
    MissingComments,

    /// The parse result carries no location information.
    #[error("AST is missing location information")]
    MissingLocation,

    /// The parse result carries no range information.
    #[error("AST is missing range information")]
    MissingRange,
}

/// Leading and trailing comments attached to one node.
#[derive(Debug, Default, PartialEq)]
pub struct Comments<'a> {
    /// Comments positioned before the node, in source order.
    pub leading: Vec<&'a Comment>,
    /// Comments positioned after the node, in source order.
    pub trailing: Vec<&'a Comment>,
}

/// Comment indices per node, computed once per model.
#[derive(Debug, Default)]
struct CommentMap {
    leading: HashMap<NodeId, Vec<usize>>,
    trailing: HashMap<NodeId, Vec<usize>>,
}

/// Raw source text bound to its validated syntax tree.
#[derive(Debug)]
pub struct SourceCode {
    text: String,
    lines: Vec<String>,
    ast: Ast,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    span: Span,
    loc: SourceLocation,
    attachment: OnceLock<CommentMap>,
}

impl SourceCode {
    /// Binds `text` to its parse result.
    ///
    /// # Errors
    ///
    /// Fails when the parse result omits the token stream, the comment
    /// stream, location information or range information; each omission
    /// has its own [`SourceCodeError`] kind.
    pub fn new(text: impl Into<String>, mut ast: Ast) -> Result<Self, SourceCodeError> {
        let tokens = ast.tokens.take().ok_or(SourceCodeError::MissingTokens)?;
        let comments = ast.comments.take().ok_or(SourceCodeError::MissingComments)?;
        let loc = ast.loc.take().ok_or(SourceCodeError::MissingLocation)?;
        let span = ast.span.take().ok_or(SourceCodeError::MissingRange)?;

        let text = text.into();
        let lines = split_lines(&text);
        debug!(lines = lines.len(), comments = comments.len(), "source code model constructed");

        Ok(Self {
            text,
            lines,
            ast,
            tokens,
            comments,
            span,
            loc,
            attachment: OnceLock::new(),
        })
    }

    /// The raw source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The source split on line terminators (`\r\n`, `\r` or `\n`),
    /// terminators not retained. Index `n` holds line `n + 1`.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The validated syntax tree.
    #[must_use]
    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// The token stream.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The comment stream.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Byte range of the whole program.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    /// Line/column range of the whole program.
    #[must_use]
    pub fn loc(&self) -> SourceLocation {
        self.loc
    }

    /// Text for `node`, padded by up to `before`/`after` characters clamped
    /// to the text bounds. With no node, the whole text.
    #[must_use]
    pub fn get_text(&self, node: Option<&Node>, before: usize, after: usize) -> &str {
        match node {
            Some(node) => {
                let start = node.span.start.saturating_sub(before);
                let end = node.span.end.saturating_add(after).min(self.text.len());
                self.text.get(start..end).unwrap_or("")
            }
            None => &self.text,
        }
    }

    /// Byte offset of a 1-indexed line and 0-indexed column, clamped to the
    /// text bounds.
    #[must_use]
    pub fn offset_for(&self, line: usize, column: usize) -> usize {
        if line == 0 {
            return 0;
        }
        let mut offset = 0;
        for (i, content) in self.lines.iter().enumerate() {
            if i + 1 == line {
                return (offset + column).min(self.text.len());
            }
            offset += content.len() + 1;
        }
        self.text.len()
    }

    /// The comments attached to `node`.
    ///
    /// The `Program` node never receives comments; they belong to its
    /// statements. Attachment is positional: a comment leads the outermost
    /// node starting at the next covered position, and trails the outermost
    /// node ending just before it only when no following node claims it as
    /// leading. Each comment is attached at most once per role.
    #[must_use]
    pub fn get_comments(&self, node: NodeId) -> Comments<'_> {
        if node == self.ast.root() {
            return Comments::default();
        }
        let map = self.attachment();
        Comments {
            leading: self.resolve(map.leading.get(&node)),
            trailing: self.resolve(map.trailing.get(&node)),
        }
    }

    /// Resolves the documentation comment describing a function-like node.
    ///
    /// A `FunctionDeclaration` looks at its own directly preceding comment,
    /// or its export wrapper's when exported. A `FunctionExpression` or
    /// arrow resolves only from a named binding position (declarator
    /// initializer, property value or assignment right-hand side); call
    /// positions and named function expressions never resolve. Only the
    /// closest preceding comment counts, and it must be a block comment
    /// whose body starts with `*`.
    #[must_use]
    pub fn get_jsdoc_comment(&self, node: NodeId) -> Option<&Comment> {
        let current = self.ast.node(node);
        match &current.kind {
            NodeKind::FunctionDeclaration { .. } => {
                if !self.leading_of(node).is_empty() {
                    return self.doc_from_leading(node);
                }
                // No comment directly precedes the declaration; an export
                // wrapper's preceding comment still describes it.
                match current.parent {
                    Some(parent) if is_export_wrapper(&self.ast.node(parent).kind) => {
                        self.doc_from_leading(parent)
                    }
                    _ => None,
                }
            }
            NodeKind::FunctionExpression { id: Some(_), .. } => None,
            NodeKind::FunctionExpression { .. } | NodeKind::ArrowFunctionExpression { .. } => {
                let parent = current.parent?;
                if !is_binding_position(&self.ast.node(parent).kind, node) {
                    return None;
                }
                // The preceding comment may sit on an enclosing node (the
                // outermost-claim rule), so climb until one is found. The
                // search never escapes the enclosing function or the root.
                let mut cursor = parent;
                loop {
                    if cursor == self.ast.root() {
                        return None;
                    }
                    if !self.leading_of(cursor).is_empty() {
                        break;
                    }
                    let climbed = self.ast.node(cursor);
                    if climbed.node_type().is_function() {
                        break;
                    }
                    cursor = climbed.parent?;
                }
                if self.ast.node(cursor).node_type() == NodeType::FunctionDeclaration {
                    return None;
                }
                self.doc_from_leading(cursor)
            }
            _ => None,
        }
    }

    fn resolve(&self, indices: Option<&Vec<usize>>) -> Vec<&Comment> {
        indices
            .map(|indices| indices.iter().map(|&i| &self.comments[i]).collect())
            .unwrap_or_default()
    }

    fn leading_of(&self, node: NodeId) -> &[usize] {
        self.attachment()
            .leading
            .get(&node)
            .map_or(&[], Vec::as_slice)
    }

    /// The closest leading comment, if it qualifies as documentation.
    fn doc_from_leading(&self, node: NodeId) -> Option<&Comment> {
        let &closest = self.leading_of(node).last()?;
        let comment = &self.comments[closest];
        comment.is_doc().then_some(comment)
    }

    fn attachment(&self) -> &CommentMap {
        self.attachment.get_or_init(|| self.compute_attachment())
    }

    fn compute_attachment(&self) -> CommentMap {
        use std::cmp::Reverse;

        let mut map = CommentMap::default();
        let root = self.ast.root();

        for (index, comment) in self.comments.iter().enumerate() {
            // Leading: the closest node starting after the comment; ties on
            // the start position go to the outermost node (largest span,
            // then smallest depth). Leading claims win over trailing.
            let leading = self
                .ast
                .nodes()
                .filter(|&(id, node)| id != root && node.span.start >= comment.span.end)
                .min_by_key(|&(id, node)| {
                    (node.span.start, Reverse(node.span.end), self.ast.depth(id))
                });
            if let Some((id, _)) = leading {
                map.leading.entry(id).or_default().push(index);
                continue;
            }

            // Trailing: the closest node ending before the comment; ties on
            // the end position go to the outermost node.
            let trailing = self
                .ast
                .nodes()
                .filter(|&(id, node)| id != root && node.span.end <= comment.span.start)
                .min_by_key(|&(id, node)| {
                    (Reverse(node.span.end), node.span.start, self.ast.depth(id))
                });
            if let Some((id, _)) = trailing {
                map.trailing.entry(id).or_default().push(index);
            }
        }

        map
    }
}

fn is_export_wrapper(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::ExportNamedDeclaration { .. } | NodeKind::ExportDefaultDeclaration { .. }
    )
}

/// Whether `child` sits in a named binding position under `parent`.
fn is_binding_position(parent: &NodeKind, child: NodeId) -> bool {
    match parent {
        NodeKind::VariableDeclarator { init, .. } => *init == Some(child),
        NodeKind::Property { value, .. } => *value == child,
        NodeKind::AssignmentExpression { right, .. } => *right == child,
        _ => false,
    }
}

/// Splits on `\r\n`, `\r` or `\n` without retaining terminators.
fn split_lines(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(text[start..i].to_string());
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(text[start..i].to_string());
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(text[start..].to_string());
    lines
}
