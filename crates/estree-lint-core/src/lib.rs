//! # estree-lint-core
//!
//! Core engine for pluggable lint analysis over ESTree-shaped syntax trees.
//!
//! This crate is the analysis core of a linter: given parsed syntax (a tree
//! with token and comment streams) and a set of enabled rules, it walks the
//! tree once, dispatches enter/exit events to rule listeners, and collects
//! severity-tagged messages. It provides:
//!
//! - The syntax tree contract ([`Ast`], [`AstBuilder`], [`NodeKind`]) that
//!   external parsers produce
//! - [`SourceCode`], binding raw text to a validated tree and answering
//!   line, comment-attachment and documentation-comment queries
//! - [`Linter`], owning the traversal, the listener registry and the report
//! - [`Rule`] and [`Parser`] traits for the external collaborators
//!
//! Parsing, file discovery, configuration loading, reporters and autofix
//! application all live outside this crate.
//!
//! ## Example
//!
//! ```ignore
//! use estree_lint_core::{Config, Linter, Severity};
//!
//! let mut linter = Linter::new().with_parser(MyParser::new());
//! linter.define_rule(NoUnusedVars::new());
//!
//! let config = Config::new().with_rule("no-unused-vars", Severity::Error);
//! let messages = linter.verify("let foo = bar;", &config)?;
//! for message in &messages {
//!     println!("{message}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ast;
mod config;
mod linter;
mod source_code;
mod types;

pub use ast::{
    Ast, AstBuilder, Comment, CommentKind, DeclarationKind, Node, NodeId, NodeKind, NodeType,
    Position, SourceLocation, Span, Token, TokenKind, UnknownNodeType,
};
pub use config::{Config, ConfigError, RuleEntry};
pub use linter::{
    Event, Linter, LinterError, ListenerFn, ParseError, Parser, Rule, RuleContext, RuleError,
    VerifyInput, VerifyOptions,
};
pub use source_code::{Comments, SourceCode, SourceCodeError};
pub use types::{InvalidSeverity, Message, MessageDiagnostic, Severity};
