//! Syntax tree contract shared by the source code model and the linter.
//!
//! Parsers are external collaborators: they assemble an [`Ast`] through
//! [`AstBuilder`], which stores nodes in an arena and wires parent
//! back-references when the tree is finished. Nodes refer to their children
//! by [`NodeId`], so ownership stays a strict tree while upward lookups
//! remain cheap index chases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A position in source text. Lines are 1-indexed, columns are 0-indexed
/// byte offsets from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed line number.
    pub line: usize,
    /// 0-indexed column.
    pub column: usize,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Computes the position of a byte offset within `text`.
    ///
    /// Recognizes `\r\n`, `\r` and `\n` as line terminators.
    #[must_use]
    pub fn of(text: &str, offset: usize) -> Self {
        let bytes = text.as_bytes();
        let mut line = 1;
        let mut line_start = 0;
        let mut i = 0;
        while i < offset && i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line += 1;
                    i += 1;
                    line_start = i;
                }
                b'\r' => {
                    line += 1;
                    i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                    line_start = i;
                }
                _ => i += 1,
            }
        }
        Self {
            line,
            column: offset.saturating_sub(line_start),
        }
    }
}

/// A half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Creates a span.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Start and end positions of a node, token or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Position of the first character.
    pub start: Position,
    /// Position one past the last character.
    pub end: Position,
}

impl SourceLocation {
    /// Creates a location from explicit positions.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Computes the location covering `span` within `text`.
    #[must_use]
    pub fn spanning(text: &str, span: Span) -> Self {
        Self {
            start: Position::of(text, span.start),
            end: Position::of(text, span.end),
        }
    }
}

/// Lexical class of a token, as reported by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A reserved word (`var`, `function`, ...).
    Keyword,
    /// An identifier.
    Identifier,
    /// Punctuation (`=`, `;`, `(`, ...).
    Punctuator,
    /// A numeric literal.
    Numeric,
    /// A string literal.
    String,
    /// A boolean literal.
    Boolean,
    /// The `null` literal.
    Null,
    /// A regular expression literal.
    RegularExpression,
}

/// A lexer token. Produced once by the parser, read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Lexical class.
    pub kind: TokenKind,
    /// Raw token text.
    pub value: String,
    /// Byte range of the token.
    pub span: Span,
    /// Line/column range of the token.
    pub loc: SourceLocation,
}

/// Comment style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    /// A `//` comment running to the end of the line.
    Line,
    /// A `/* ... */` comment.
    Block,
}

/// A source comment. The value excludes the comment delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment style.
    pub kind: CommentKind,
    /// Comment body without delimiters.
    pub value: String,
    /// Byte range including delimiters.
    pub span: Span,
    /// Line/column range including delimiters.
    pub loc: SourceLocation,
}

impl Comment {
    /// Whether this is a documentation comment: a block comment whose body
    /// starts with `*`.
    #[must_use]
    pub fn is_doc(&self) -> bool {
        self.kind == CommentKind::Block && self.value.starts_with('*')
    }
}

/// Handle to a node stored in an [`Ast`] arena.
///
/// Ids are only meaningful for the tree that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declaration keyword of a `VariableDeclaration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

/// The shape of a node: a closed tagged union over the supported grammar.
///
/// Child fields are listed in source grammar order; [`NodeKind::children`]
/// visits them in exactly that order, which fixes the traversal order rule
/// authors can rely on.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root of a source file.
    Program {
        /// Top-level statements.
        body: Vec<NodeId>,
    },
    /// `function name(params) { ... }`
    FunctionDeclaration {
        /// Function name.
        id: Option<NodeId>,
        /// Parameter patterns.
        params: Vec<NodeId>,
        /// Body block.
        body: NodeId,
    },
    /// `function (params) { ... }` in expression position.
    FunctionExpression {
        /// Optional function name.
        id: Option<NodeId>,
        /// Parameter patterns.
        params: Vec<NodeId>,
        /// Body block.
        body: NodeId,
    },
    /// `(params) => body`
    ArrowFunctionExpression {
        /// Parameter patterns.
        params: Vec<NodeId>,
        /// Body block or expression.
        body: NodeId,
    },
    /// `var`/`let`/`const` statement.
    VariableDeclaration {
        /// Declaration keyword.
        kind: DeclarationKind,
        /// Declarators, left to right.
        declarations: Vec<NodeId>,
    },
    /// One `name = init` inside a declaration.
    VariableDeclarator {
        /// Bound pattern.
        id: NodeId,
        /// Initializer expression.
        init: Option<NodeId>,
    },
    /// A name reference or binding.
    Identifier {
        /// Identifier text.
        name: String,
    },
    /// A literal value; the raw source text is kept as written.
    Literal {
        /// Literal text as it appears in source.
        raw: String,
    },
    /// `{ ...statements }`
    BlockStatement {
        /// Statements in order.
        body: Vec<NodeId>,
    },
    /// An expression used as a statement.
    ExpressionStatement {
        /// The wrapped expression.
        expression: NodeId,
    },
    /// `callee(arguments)`
    CallExpression {
        /// Called expression.
        callee: NodeId,
        /// Arguments, left to right.
        arguments: Vec<NodeId>,
    },
    /// `object.property` or `object[property]`
    MemberExpression {
        /// Object expression.
        object: NodeId,
        /// Property expression.
        property: NodeId,
        /// Whether bracket notation was used.
        computed: bool,
    },
    /// `left op= right`
    AssignmentExpression {
        /// Assignment operator as written (`=`, `+=`, ...).
        operator: String,
        /// Assignment target.
        left: NodeId,
        /// Assigned value.
        right: NodeId,
    },
    /// `{ key: value, ... }`
    ObjectExpression {
        /// Properties in order.
        properties: Vec<NodeId>,
    },
    /// One `key: value` inside an object expression.
    Property {
        /// Property key.
        key: NodeId,
        /// Property value.
        value: NodeId,
    },
    /// `return argument;`
    ReturnStatement {
        /// Returned expression.
        argument: Option<NodeId>,
    },
    /// `if (test) consequent else alternate`
    IfStatement {
        /// Condition.
        test: NodeId,
        /// Then branch.
        consequent: NodeId,
        /// Else branch.
        alternate: Option<NodeId>,
    },
    /// `export <declaration>`
    ExportNamedDeclaration {
        /// Exported declaration, if any.
        declaration: Option<NodeId>,
    },
    /// `export default <declaration>`
    ExportDefaultDeclaration {
        /// Exported declaration.
        declaration: NodeId,
    },
    /// A lone `;`.
    EmptyStatement,
}

impl NodeKind {
    /// The fieldless discriminant of this kind, used as the event key.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Program { .. } => NodeType::Program,
            Self::FunctionDeclaration { .. } => NodeType::FunctionDeclaration,
            Self::FunctionExpression { .. } => NodeType::FunctionExpression,
            Self::ArrowFunctionExpression { .. } => NodeType::ArrowFunctionExpression,
            Self::VariableDeclaration { .. } => NodeType::VariableDeclaration,
            Self::VariableDeclarator { .. } => NodeType::VariableDeclarator,
            Self::Identifier { .. } => NodeType::Identifier,
            Self::Literal { .. } => NodeType::Literal,
            Self::BlockStatement { .. } => NodeType::BlockStatement,
            Self::ExpressionStatement { .. } => NodeType::ExpressionStatement,
            Self::CallExpression { .. } => NodeType::CallExpression,
            Self::MemberExpression { .. } => NodeType::MemberExpression,
            Self::AssignmentExpression { .. } => NodeType::AssignmentExpression,
            Self::ObjectExpression { .. } => NodeType::ObjectExpression,
            Self::Property { .. } => NodeType::Property,
            Self::ReturnStatement { .. } => NodeType::ReturnStatement,
            Self::IfStatement { .. } => NodeType::IfStatement,
            Self::ExportNamedDeclaration { .. } => NodeType::ExportNamedDeclaration,
            Self::ExportDefaultDeclaration { .. } => NodeType::ExportDefaultDeclaration,
            Self::EmptyStatement => NodeType::EmptyStatement,
        }
    }

    /// Appends this node's children to `out` in grammar order: declarations
    /// before initializers, test before consequent before alternate, callee
    /// before arguments, key before value, left before right.
    pub fn children(&self, out: &mut Vec<NodeId>) {
        match self {
            Self::Program { body } | Self::BlockStatement { body } => out.extend(body),
            Self::FunctionDeclaration { id, params, body }
            | Self::FunctionExpression { id, params, body } => {
                out.extend(id);
                out.extend(params);
                out.push(*body);
            }
            Self::ArrowFunctionExpression { params, body } => {
                out.extend(params);
                out.push(*body);
            }
            Self::VariableDeclaration { declarations, .. } => out.extend(declarations),
            Self::VariableDeclarator { id, init } => {
                out.push(*id);
                out.extend(init);
            }
            Self::ExpressionStatement { expression } => out.push(*expression),
            Self::CallExpression { callee, arguments } => {
                out.push(*callee);
                out.extend(arguments);
            }
            Self::MemberExpression {
                object, property, ..
            } => {
                out.push(*object);
                out.push(*property);
            }
            Self::AssignmentExpression { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            Self::ObjectExpression { properties } => out.extend(properties),
            Self::Property { key, value } => {
                out.push(*key);
                out.push(*value);
            }
            Self::ReturnStatement { argument } => out.extend(argument),
            Self::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                out.push(*test);
                out.push(*consequent);
                out.extend(alternate);
            }
            Self::ExportNamedDeclaration { declaration } => out.extend(declaration),
            Self::ExportDefaultDeclaration { declaration } => out.push(*declaration),
            Self::Identifier { .. } | Self::Literal { .. } | Self::EmptyStatement => {}
        }
    }
}

/// Fieldless node discriminant. Serializes to the ESTree type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum NodeType {
    Program,
    FunctionDeclaration,
    FunctionExpression,
    ArrowFunctionExpression,
    VariableDeclaration,
    VariableDeclarator,
    Identifier,
    Literal,
    BlockStatement,
    ExpressionStatement,
    CallExpression,
    MemberExpression,
    AssignmentExpression,
    ObjectExpression,
    Property,
    ReturnStatement,
    IfStatement,
    ExportNamedDeclaration,
    ExportDefaultDeclaration,
    EmptyStatement,
}

impl NodeType {
    /// The ESTree type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Program => "Program",
            Self::FunctionDeclaration => "FunctionDeclaration",
            Self::FunctionExpression => "FunctionExpression",
            Self::ArrowFunctionExpression => "ArrowFunctionExpression",
            Self::VariableDeclaration => "VariableDeclaration",
            Self::VariableDeclarator => "VariableDeclarator",
            Self::Identifier => "Identifier",
            Self::Literal => "Literal",
            Self::BlockStatement => "BlockStatement",
            Self::ExpressionStatement => "ExpressionStatement",
            Self::CallExpression => "CallExpression",
            Self::MemberExpression => "MemberExpression",
            Self::AssignmentExpression => "AssignmentExpression",
            Self::ObjectExpression => "ObjectExpression",
            Self::Property => "Property",
            Self::ReturnStatement => "ReturnStatement",
            Self::IfStatement => "IfStatement",
            Self::ExportNamedDeclaration => "ExportNamedDeclaration",
            Self::ExportDefaultDeclaration => "ExportDefaultDeclaration",
            Self::EmptyStatement => "EmptyStatement",
        }
    }

    /// Whether this kind introduces a function scope.
    #[must_use]
    pub fn is_function(self) -> bool {
        matches!(
            self,
            Self::FunctionDeclaration | Self::FunctionExpression | Self::ArrowFunctionExpression
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a node type name is not part of the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node type: {0}")]
pub struct UnknownNodeType(pub String);

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Program" => Ok(Self::Program),
            "FunctionDeclaration" => Ok(Self::FunctionDeclaration),
            "FunctionExpression" => Ok(Self::FunctionExpression),
            "ArrowFunctionExpression" => Ok(Self::ArrowFunctionExpression),
            "VariableDeclaration" => Ok(Self::VariableDeclaration),
            "VariableDeclarator" => Ok(Self::VariableDeclarator),
            "Identifier" => Ok(Self::Identifier),
            "Literal" => Ok(Self::Literal),
            "BlockStatement" => Ok(Self::BlockStatement),
            "ExpressionStatement" => Ok(Self::ExpressionStatement),
            "CallExpression" => Ok(Self::CallExpression),
            "MemberExpression" => Ok(Self::MemberExpression),
            "AssignmentExpression" => Ok(Self::AssignmentExpression),
            "ObjectExpression" => Ok(Self::ObjectExpression),
            "Property" => Ok(Self::Property),
            "ReturnStatement" => Ok(Self::ReturnStatement),
            "IfStatement" => Ok(Self::IfStatement),
            "ExportNamedDeclaration" => Ok(Self::ExportNamedDeclaration),
            "ExportDefaultDeclaration" => Ok(Self::ExportDefaultDeclaration),
            "EmptyStatement" => Ok(Self::EmptyStatement),
            other => Err(UnknownNodeType(other.to_string())),
        }
    }
}

/// A node stored in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Shape and children.
    pub kind: NodeKind,
    /// Byte range of the node.
    pub span: Span,
    /// Line/column range of the node.
    pub loc: SourceLocation,
    /// Non-owning back-reference to the syntactic parent; `None` for the
    /// root. Wired by [`AstBuilder::finish`].
    pub parent: Option<NodeId>,
}

impl Node {
    /// The fieldless discriminant of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

/// A parse result: the node arena plus the lexical streams the parser was
/// asked to emit.
///
/// `tokens`, `comments`, `span` and `loc` are optional because parsers only
/// produce them when configured to; a [`crate::SourceCode`] requires all
/// four and rejects the tree otherwise.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
    pub(crate) tokens: Option<Vec<Token>>,
    pub(crate) comments: Option<Vec<Comment>>,
    pub(crate) span: Option<Span>,
    pub(crate) loc: Option<SourceLocation>,
}

impl Ast {
    /// Id of the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Looks up a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The parent of `id`, if it has one.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Iterates over every node in the arena with its id.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Ids of all nodes of the given type, in document (pre-order) order.
    #[must_use]
    pub fn find_all(&self, ty: NodeType) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        let mut children = Vec::new();
        while let Some(id) = stack.pop() {
            if self.node(id).node_type() == ty {
                found.push(id);
            }
            children.clear();
            self.node(id).kind.children(&mut children);
            for &child in children.iter().rev() {
                stack.push(child);
            }
        }
        found
    }

    /// Depth of a node below the root. The root has depth 0.
    #[must_use]
    pub(crate) fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            depth += 1;
            cur = parent;
        }
        depth
    }
}

/// Assembles an [`Ast`] bottom-up: create leaf nodes first, then composites
/// referring to them, then [`finish`](Self::finish) with the root.
///
/// Locations are derived from byte spans against the source text, so builders
/// and parsers cannot disagree with the text they were given. Token and
/// comment streams default to present-but-empty; the `without_*` methods
/// reproduce parser modes that omit them.
pub struct AstBuilder<'text> {
    text: &'text str,
    nodes: Vec<Node>,
    tokens: Option<Vec<Token>>,
    comments: Option<Vec<Comment>>,
    with_span: bool,
    with_loc: bool,
}

impl<'text> AstBuilder<'text> {
    /// Starts a builder for the given source text.
    #[must_use]
    pub fn new(text: &'text str) -> Self {
        Self {
            text,
            nodes: Vec::new(),
            tokens: Some(Vec::new()),
            comments: Some(Vec::new()),
            with_span: true,
            with_loc: true,
        }
    }

    /// Adds a node and returns its id.
    pub fn node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node {
            kind,
            span,
            loc: SourceLocation::spanning(self.text, span),
            parent: None,
        });
        id
    }

    /// Appends a token to the token stream.
    pub fn token(&mut self, kind: TokenKind, value: impl Into<String>, span: Span) {
        let loc = SourceLocation::spanning(self.text, span);
        if let Some(tokens) = &mut self.tokens {
            tokens.push(Token {
                kind,
                value: value.into(),
                span,
                loc,
            });
        }
    }

    /// Appends a comment to the comment stream.
    pub fn comment(&mut self, kind: CommentKind, value: impl Into<String>, span: Span) {
        let loc = SourceLocation::spanning(self.text, span);
        if let Some(comments) = &mut self.comments {
            comments.push(Comment {
                kind,
                value: value.into(),
                span,
                loc,
            });
        }
    }

    /// Omits the token stream, as a parser not asked for tokens would.
    #[must_use]
    pub fn without_tokens(mut self) -> Self {
        self.tokens = None;
        self
    }

    /// Omits the comment stream.
    #[must_use]
    pub fn without_comments(mut self) -> Self {
        self.comments = None;
        self
    }

    /// Omits location information on the finished tree.
    #[must_use]
    pub fn without_loc(mut self) -> Self {
        self.with_loc = false;
        self
    }

    /// Omits range information on the finished tree.
    #[must_use]
    pub fn without_range(mut self) -> Self {
        self.with_span = false;
        self
    }

    /// Finishes the tree: wires parent back-references from `root` down and
    /// stamps the overall span/location from the root node.
    ///
    /// # Panics
    ///
    /// Panics if `root` or any referenced child id is not a node of this
    /// builder.
    #[must_use]
    pub fn finish(mut self, root: NodeId) -> Ast {
        let mut stack = vec![root];
        let mut children = Vec::new();
        while let Some(id) = stack.pop() {
            children.clear();
            self.nodes[id.index()].kind.children(&mut children);
            for &child in &children {
                self.nodes[child.index()].parent = Some(id);
                stack.push(child);
            }
        }
        let root_span = self.nodes[root.index()].span;
        let root_loc = self.nodes[root.index()].loc;
        Ast {
            nodes: self.nodes,
            root,
            tokens: self.tokens,
            comments: self.comments,
            span: self.with_span.then_some(root_span),
            loc: self.with_loc.then_some(root_loc),
        }
    }
}
