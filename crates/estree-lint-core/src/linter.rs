//! Rule dispatch engine: one depth-first traversal per verify run,
//! enter/exit events routed to registered listeners, messages aggregated
//! into a severity-filtered, position-sorted report.

use crate::ast::{Ast, Node, NodeId, NodeType, UnknownNodeType};
use crate::config::Config;
use crate::source_code::{SourceCode, SourceCodeError};
use crate::types::{Message, Severity};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// A traversal event: entering or leaving a node of a given type.
///
/// Registering for an event whose node type never occurs in a tree is
/// allowed; such listeners simply never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Fired when traversal enters a node, before its children.
    Enter(NodeType),
    /// Fired when traversal leaves a node, after its children.
    Exit(NodeType),
}

impl Event {
    /// Enter event for a node type.
    #[must_use]
    pub fn enter(ty: NodeType) -> Self {
        Self::Enter(ty)
    }

    /// Exit event for a node type.
    #[must_use]
    pub fn exit(ty: NodeType) -> Self {
        Self::Exit(ty)
    }
}

impl From<NodeType> for Event {
    fn from(ty: NodeType) -> Self {
        Self::Enter(ty)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter(ty) => write!(f, "{ty}"),
            Self::Exit(ty) => write!(f, "{ty}:exit"),
        }
    }
}

impl FromStr for Event {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix(":exit") {
            Some(base) => Ok(Self::Exit(base.parse()?)),
            None => Ok(Self::Enter(s.parse()?)),
        }
    }
}

/// Failure raised by a rule listener.
///
/// Converted into an attributable message at the dispatch boundary, so a
/// broken rule cannot hide the findings of the others.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl RuleError {
    /// Creates a listener failure with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Syntax error reported by the external parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parsing failed at {line}:{column}: {message}")]
pub struct ParseError {
    /// Parser-provided description.
    pub message: String,
    /// 1-indexed line of the error.
    pub line: usize,
    /// 0-indexed column of the error.
    pub column: usize,
}

/// Fatal, per-file failures surfaced to the caller of [`Linter::verify`].
#[derive(Debug, Error)]
pub enum LinterError {
    /// The source text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The parse result violated the syntax tree contract.
    #[error(transparent)]
    SourceCode(#[from] SourceCodeError),

    /// Raw text was supplied but no parser is attached.
    #[error("no parser attached; attach one or pass a prebuilt source code model")]
    MissingParser,
}

/// External parser collaborator. Implementations turn source text into an
/// [`Ast`], honoring the language feature flags from the configuration.
pub trait Parser {
    /// Parses `text`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] describing the first syntax error.
    fn parse(&self, text: &str, ecma_features: &HashMap<String, bool>) -> Result<Ast, ParseError>;
}

/// A listener bound to one traversal event.
pub type ListenerFn = Box<dyn FnMut(&mut RuleContext<'_>) -> Result<(), RuleError>>;

/// A pluggable rule. Implementations live outside this crate and are
/// registered with [`Linter::define_rule`]; configuration enables them by
/// id.
pub trait Rule {
    /// Unique id referenced from configuration.
    fn id(&self) -> &'static str;

    /// Builds the listeners this rule wants for one verify run.
    ///
    /// `options` holds the rule-specific configuration values following the
    /// severity level.
    fn create(&self, options: &[Value]) -> Vec<(Event, ListenerFn)>;
}

/// Capabilities handed to a listener at each event: the current node, the
/// active source code model, and reporting.
pub struct RuleContext<'run> {
    source_code: &'run SourceCode,
    node: NodeId,
    rule_id: Option<&'run str>,
    severity: Severity,
    filename: Option<&'run str>,
    messages: &'run mut Vec<Message>,
}

impl RuleContext<'_> {
    /// The node the current event fired for.
    #[must_use]
    pub fn node(&self) -> &Node {
        self.source_code.ast().node(self.node)
    }

    /// Arena id of the current node.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The source code model active for this run.
    #[must_use]
    pub fn source_code(&self) -> &SourceCode {
        self.source_code
    }

    /// Id of the rule this listener belongs to; `None` for listeners
    /// registered directly with [`Linter::on`].
    #[must_use]
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id
    }

    /// Name of the file being verified, when the caller supplied one.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename
    }

    /// Reports a message at the current node, with the rule's configured
    /// severity.
    pub fn report(&mut self, message: impl Into<String>) {
        let node = self.source_code.ast().node(self.node);
        self.push(node, message.into(), self.severity);
    }

    /// Reports a message at an explicit node.
    pub fn report_node(&mut self, node: &Node, message: impl Into<String>) {
        self.push(node, message.into(), self.severity);
    }

    /// Reports a message at an explicit node with a severity override.
    pub fn report_with_severity(&mut self, node: &Node, message: impl Into<String>, severity: Severity) {
        self.push(node, message.into(), severity);
    }

    fn push(&mut self, node: &Node, message: String, severity: Severity) {
        // Severity 0 means the rule is registered but inert.
        if severity == Severity::Off {
            return;
        }
        self.messages.push(
            Message::new(
                self.rule_id.map(String::from),
                severity,
                message,
                node.loc.start.line,
                node.loc.start.column,
            )
            .with_node_type(node.node_type()),
        );
    }
}

/// Input accepted by [`Linter::verify`]: raw text for the attached parser,
/// or a prebuilt model whose tree is already validated.
pub enum VerifyInput {
    /// Source text to parse.
    Source(String),
    /// Prebuilt model, shareable across runs.
    Model(Arc<SourceCode>),
}

impl From<&str> for VerifyInput {
    fn from(text: &str) -> Self {
        Self::Source(text.to_string())
    }
}

impl From<String> for VerifyInput {
    fn from(text: String) -> Self {
        Self::Source(text)
    }
}

impl From<SourceCode> for VerifyInput {
    fn from(model: SourceCode) -> Self {
        Self::Model(Arc::new(model))
    }
}

impl From<Arc<SourceCode>> for VerifyInput {
    fn from(model: Arc<SourceCode>) -> Self {
        Self::Model(model)
    }
}

/// Per-run options for [`Linter::verify_with`].
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    filename: Option<String>,
    save_state: bool,
}

impl VerifyOptions {
    /// Creates the default options: no filename, state cleared after the
    /// run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name reported to listeners for the file being verified.
    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Keeps per-run state (the active model and rule-attached listeners)
    /// alive after the run instead of clearing it.
    #[must_use]
    pub fn save_state(mut self, save: bool) -> Self {
        self.save_state = save;
        self
    }
}

struct RegisteredListener {
    rule_id: Option<String>,
    severity: Severity,
    /// Listeners registered via [`Linter::on`] outlive the run; listeners
    /// attached from configured rules do not.
    persistent: bool,
    callback: ListenerFn,
}

/// The rule dispatch engine.
///
/// One instance serves one logical thread of control: runs are strictly
/// sequential, and listeners run to completion before the next event
/// fires. Callers needing parallelism use one engine per concurrent run;
/// the engine is cheap to construct, and a [`SourceCode`] can be shared
/// read-only between engines.
pub struct Linter {
    parser: Option<Box<dyn Parser>>,
    rules: HashMap<String, Box<dyn Rule>>,
    listeners: HashMap<Event, Vec<RegisteredListener>>,
    source_code: Option<Arc<SourceCode>>,
    filename: Option<String>,
}

impl Default for Linter {
    fn default() -> Self {
        Self::new()
    }
}

impl Linter {
    /// Creates an engine with no parser, no rules and no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: None,
            rules: HashMap::new(),
            listeners: HashMap::new(),
            source_code: None,
            filename: None,
        }
    }

    /// Attaches the external parser used for raw-text input.
    #[must_use]
    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Registers a rule definition so configuration can enable it by id.
    ///
    /// Definitions survive [`reset`](Self::reset); only listeners and run
    /// state are per-run.
    pub fn define_rule(&mut self, rule: impl Rule + 'static) {
        self.rules.insert(rule.id().to_string(), Box::new(rule));
    }

    /// Registers a persistent listener for one event. Multiple listeners on
    /// the same event fire in registration order.
    pub fn on<F>(&mut self, event: impl Into<Event>, listener: F)
    where
        F: FnMut(&mut RuleContext<'_>) -> Result<(), RuleError> + 'static,
    {
        self.listeners
            .entry(event.into())
            .or_default()
            .push(RegisteredListener {
                rule_id: None,
                severity: Severity::Error,
                persistent: true,
                callback: Box::new(listener),
            });
    }

    /// Clears all listeners and per-run state. Rule definitions and the
    /// parser stay. Message lists already returned are unaffected.
    pub fn reset(&mut self) {
        self.listeners.clear();
        self.source_code = None;
        self.filename = None;
    }

    /// The model active for the current or most recent run, available while
    /// state is saved. Listeners reach the same model through their context
    /// mid-traversal.
    #[must_use]
    pub fn source_code(&self) -> Option<&SourceCode> {
        self.source_code.as_deref()
    }

    /// Runs one verification pass with default options.
    ///
    /// # Errors
    ///
    /// Fails only for fatal per-file problems: a syntax error from the
    /// parser, a contract violation in the parse result, or raw text with
    /// no parser attached. Configuration and listener problems are reported
    /// as messages instead.
    pub fn verify(
        &mut self,
        input: impl Into<VerifyInput>,
        config: &Config,
    ) -> Result<Vec<Message>, LinterError> {
        self.verify_with(input, config, &VerifyOptions::new())
    }

    /// Runs one verification pass.
    ///
    /// Performs exactly one depth-first pre-order traversal, emitting an
    /// enter event for each node on the way down and an exit event on the
    /// way up. The returned messages are filtered of severity 0 and
    /// stable-sorted by line, then column.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub fn verify_with(
        &mut self,
        input: impl Into<VerifyInput>,
        config: &Config,
        options: &VerifyOptions,
    ) -> Result<Vec<Message>, LinterError> {
        let source_code = match input.into() {
            VerifyInput::Source(text) => {
                let parser = self.parser.as_ref().ok_or(LinterError::MissingParser)?;
                let ast = parser.parse(&text, &config.ecma_features)?;
                Arc::new(SourceCode::new(text, ast)?)
            }
            VerifyInput::Model(model) => model,
        };

        debug!(
            filename = options.filename.as_deref().unwrap_or("<input>"),
            rules = config.rules.len(),
            "starting verify run"
        );
        self.source_code = Some(Arc::clone(&source_code));
        self.filename.clone_from(&options.filename);

        let mut messages = Vec::new();
        self.attach_configured_rules(config, &mut messages);
        self.walk(&source_code, source_code.ast().root(), &mut messages);

        // Inert rules are already suppressed at the report site; this keeps
        // the output contract even if a listener smuggled one through.
        messages.retain(|message| message.severity != Severity::Off);
        messages.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));

        debug!(messages = messages.len(), "verify run complete");

        if !options.save_state {
            self.clear_run_state();
        }
        Ok(messages)
    }

    /// Resolves `config.rules` and attaches listeners for the run. Invalid
    /// entries and missing definitions become synthetic messages rather
    /// than failures, so one bad entry cannot abort a batch caller.
    fn attach_configured_rules(&mut self, config: &Config, messages: &mut Vec<Message>) {
        // Rule ids are attached in sorted order so listener registration,
        // and with it same-position message order, is deterministic.
        let mut ids: Vec<&String> = config.rules.keys().collect();
        ids.sort();

        for id in ids {
            let entry = &config.rules[id];
            let severity = match entry.severity() {
                Ok(severity) => severity,
                Err(error) => {
                    warn!(rule = %id, %error, "invalid rule configuration");
                    messages.push(Message::new(
                        Some(id.clone()),
                        Severity::Error,
                        format!("Configuration for rule \"{id}\" is invalid: {error}"),
                        0,
                        0,
                    ));
                    continue;
                }
            };
            let Some(rule) = self.rules.get(id.as_str()) else {
                warn!(rule = %id, "no definition for configured rule");
                messages.push(Message::new(
                    Some(id.clone()),
                    Severity::Error,
                    format!("Definition for rule \"{id}\" was not found"),
                    0,
                    0,
                ));
                continue;
            };
            for (event, callback) in rule.create(entry.options()) {
                self.listeners
                    .entry(event)
                    .or_default()
                    .push(RegisteredListener {
                        rule_id: Some(id.clone()),
                        severity,
                        persistent: false,
                        callback,
                    });
            }
        }
    }

    fn walk(&mut self, source_code: &Arc<SourceCode>, node: NodeId, messages: &mut Vec<Message>) {
        let ty = source_code.ast().node(node).node_type();
        self.emit(Event::Enter(ty), source_code, node, messages);

        let mut children = Vec::new();
        source_code.ast().node(node).kind.children(&mut children);
        for child in children {
            self.walk(source_code, child, messages);
        }

        self.emit(Event::Exit(ty), source_code, node, messages);
    }

    fn emit(
        &mut self,
        event: Event,
        source_code: &SourceCode,
        node: NodeId,
        messages: &mut Vec<Message>,
    ) {
        let Some(listeners) = self.listeners.get_mut(&event) else {
            return;
        };
        for listener in listeners.iter_mut() {
            let RegisteredListener {
                rule_id,
                severity,
                callback,
                ..
            } = listener;
            let mut ctx = RuleContext {
                source_code,
                node,
                rule_id: rule_id.as_deref(),
                severity: *severity,
                filename: self.filename.as_deref(),
                messages: &mut *messages,
            };
            if let Err(error) = callback(&mut ctx) {
                // A failing listener is isolated: record the failure against
                // its rule and keep both the traversal and the other
                // listeners going.
                let site = source_code.ast().node(node);
                warn!(rule = rule_id.as_deref().unwrap_or("<listener>"), %error, "listener failed");
                messages.push(
                    Message::new(
                        rule_id.clone(),
                        Severity::Error,
                        format!("Rule execution failed: {error}"),
                        site.loc.start.line,
                        site.loc.start.column,
                    )
                    .with_node_type(site.node_type()),
                );
            }
        }
    }

    fn clear_run_state(&mut self) {
        self.source_code = None;
        self.filename = None;
        for listeners in self.listeners.values_mut() {
            listeners.retain(|listener| listener.persistent);
        }
        self.listeners.retain(|_, listeners| !listeners.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, DeclarationKind, NodeKind, Span};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// `var a = 1;\nvar b = 2;` with full structure.
    fn two_declarations() -> Arc<SourceCode> {
        let text = "var a = 1;\nvar b = 2;";
        let mut b = AstBuilder::new(text);
        let mut declarations = Vec::new();
        for (name, value) in [("a", "1"), ("b", "2")] {
            let binding = format!("{name} = {value}");
            let start = text.find(&binding).expect("binding should occur");
            let ident = b.node(
                NodeKind::Identifier { name: name.into() },
                Span::new(start, start + 1),
            );
            let literal_start = text.find(value).expect("literal should occur");
            let literal = b.node(
                NodeKind::Literal { raw: value.into() },
                Span::new(literal_start, literal_start + 1),
            );
            let declarator = b.node(
                NodeKind::VariableDeclarator {
                    id: ident,
                    init: Some(literal),
                },
                Span::new(start, start + binding.len()),
            );
            declarations.push(b.node(
                NodeKind::VariableDeclaration {
                    kind: DeclarationKind::Var,
                    declarations: vec![declarator],
                },
                Span::new(start - 4, start + binding.len() + 1),
            ));
        }
        let root = b.node(
            NodeKind::Program { body: declarations },
            Span::new(0, text.len()),
        );
        let ast = b.finish(root);
        Arc::new(SourceCode::new(text, ast).expect("model should construct"))
    }

    struct ReportIdentifiers;

    impl Rule for ReportIdentifiers {
        fn id(&self) -> &'static str {
            "report-identifiers"
        }

        fn create(&self, _options: &[Value]) -> Vec<(Event, ListenerFn)> {
            vec![(
                Event::enter(NodeType::Identifier),
                Box::new(|ctx: &mut RuleContext<'_>| {
                    ctx.report("identifier found");
                    Ok(())
                }),
            )]
        }
    }

    /// Counts every invocation, then reports nothing.
    struct CountIdentifiers(Rc<RefCell<usize>>);

    impl Rule for CountIdentifiers {
        fn id(&self) -> &'static str {
            "count-identifiers"
        }

        fn create(&self, _options: &[Value]) -> Vec<(Event, ListenerFn)> {
            let count = Rc::clone(&self.0);
            vec![(
                Event::enter(NodeType::Identifier),
                Box::new(move |_ctx: &mut RuleContext<'_>| {
                    *count.borrow_mut() += 1;
                    Ok(())
                }),
            )]
        }
    }

    /// Fails on the identifier `b`.
    struct FailOnB;

    impl Rule for FailOnB {
        fn id(&self) -> &'static str {
            "fail-on-b"
        }

        fn create(&self, _options: &[Value]) -> Vec<(Event, ListenerFn)> {
            vec![(
                Event::enter(NodeType::Identifier),
                Box::new(|ctx: &mut RuleContext<'_>| {
                    if matches!(&ctx.node().kind, NodeKind::Identifier { name } if name == "b") {
                        return Err(RuleError::new("boom"));
                    }
                    Ok(())
                }),
            )]
        }
    }

    #[test]
    fn empty_rule_set_returns_no_messages() {
        let mut linter = Linter::new();
        let messages = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert!(messages.is_empty());
    }

    #[test]
    fn configured_rule_reports_per_matching_node_sorted() {
        let mut linter = Linter::new();
        linter.define_rule(ReportIdentifiers);
        let config = Config::new().with_rule("report-identifiers", Severity::Error);

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");

        assert_eq!(messages.len(), 2);
        for message in &messages {
            assert_eq!(message.severity, Severity::Error);
            assert_eq!(message.rule_id.as_deref(), Some("report-identifiers"));
            assert_eq!(message.node_type, Some(NodeType::Identifier));
        }
        assert!(messages[0].line < messages[1].line);
        assert_eq!((messages[0].line, messages[0].column), (1, 4));
        assert_eq!((messages[1].line, messages[1].column), (2, 4));
    }

    #[test]
    fn named_severity_is_honored() {
        let mut linter = Linter::new();
        linter.define_rule(ReportIdentifiers);
        let config: Config =
            serde_json::from_value(json!({ "rules": { "report-identifiers": "warn" } }))
                .expect("config should deserialize");

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.severity == Severity::Warning));
    }

    #[test]
    fn severity_zero_rule_runs_but_stays_silent() {
        let count = Rc::new(RefCell::new(0));
        let mut linter = Linter::new();
        linter.define_rule(CountIdentifiers(Rc::clone(&count)));
        linter.define_rule(ReportIdentifiers);
        let config = Config::new()
            .with_rule("count-identifiers", Severity::Off)
            .with_rule("report-identifiers", Severity::Off);

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");

        assert!(messages.is_empty());
        // The disabled rule's listener still ran for side effects.
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn invalid_severity_becomes_synthetic_message() {
        let mut linter = Linter::new();
        linter.define_rule(ReportIdentifiers);
        let config: Config = serde_json::from_value(json!({
            "rules": { "report-identifiers": 2, "broken": 7 }
        }))
        .expect("config should deserialize");

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");

        // The bad entry is diagnosed without aborting the good rule.
        assert_eq!(messages.len(), 3);
        let synthetic = &messages[0];
        assert_eq!(synthetic.rule_id.as_deref(), Some("broken"));
        assert_eq!(synthetic.severity, Severity::Error);
        assert_eq!((synthetic.line, synthetic.column), (0, 0));
        assert!(synthetic.message.contains("invalid"));
        assert_eq!(synthetic.node_type, None);
    }

    #[test]
    fn unknown_rule_becomes_synthetic_message() {
        let mut linter = Linter::new();
        let config = Config::new().with_rule("no-such-rule", Severity::Error);

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");

        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].message,
            "Definition for rule \"no-such-rule\" was not found"
        );
        assert_eq!(messages[0].rule_id.as_deref(), Some("no-such-rule"));
    }

    #[test]
    fn failing_listener_is_isolated() {
        let count = Rc::new(RefCell::new(0));
        let mut linter = Linter::new();
        linter.define_rule(FailOnB);
        linter.define_rule(CountIdentifiers(Rc::clone(&count)));
        linter.define_rule(ReportIdentifiers);
        let config = Config::new()
            .with_rule("fail-on-b", Severity::Error)
            .with_rule("count-identifiers", Severity::Error)
            .with_rule("report-identifiers", Severity::Error);

        let messages = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");

        // Traversal completed despite the failure.
        assert_eq!(*count.borrow(), 2);
        let failure: Vec<_> = messages
            .iter()
            .filter(|m| m.rule_id.as_deref() == Some("fail-on-b"))
            .collect();
        assert_eq!(failure.len(), 1);
        assert_eq!(failure[0].message, "Rule execution failed: boom");
        assert_eq!(failure[0].line, 2);
        // The other rule still reported both identifiers.
        assert_eq!(
            messages
                .iter()
                .filter(|m| m.rule_id.as_deref() == Some("report-identifiers"))
                .count(),
            2
        );
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut linter = Linter::new();
        for tag in ["first", "second"] {
            let order = Rc::clone(&order);
            linter.on(NodeType::Program, move |_ctx: &mut RuleContext<'_>| {
                order.borrow_mut().push(tag);
                Ok(())
            });
        }

        let _ = linter
            .verify_with(
                two_declarations(),
                &Config::new(),
                &VerifyOptions::new().save_state(true),
            )
            .expect("verify should succeed");
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn enter_and_exit_events_bracket_children() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut linter = Linter::new();
        for (event, tag) in [
            (Event::enter(NodeType::VariableDeclaration), "enter-decl"),
            (Event::exit(NodeType::VariableDeclaration), "exit-decl"),
            (Event::enter(NodeType::Identifier), "ident"),
            (Event::exit(NodeType::Program), "exit-program"),
        ] {
            let log = Rc::clone(&log);
            linter.on(event, move |_ctx: &mut RuleContext<'_>| {
                log.borrow_mut().push(tag);
                Ok(())
            });
        }

        let _ = linter
            .verify_with(
                two_declarations(),
                &Config::new(),
                &VerifyOptions::new().save_state(true),
            )
            .expect("verify should succeed");
        assert_eq!(
            *log.borrow(),
            vec![
                "enter-decl",
                "ident",
                "exit-decl",
                "enter-decl",
                "ident",
                "exit-decl",
                "exit-program"
            ]
        );
    }

    #[test]
    fn unmatched_events_never_fire() {
        let count = Rc::new(RefCell::new(0));
        let mut linter = Linter::new();
        {
            let count = Rc::clone(&count);
            linter.on(NodeType::IfStatement, move |_ctx: &mut RuleContext<'_>| {
                *count.borrow_mut() += 1;
                Ok(())
            });
        }
        let _ = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn reset_clears_listeners_and_state() {
        let count = Rc::new(RefCell::new(0));
        let mut linter = Linter::new();
        {
            let count = Rc::clone(&count);
            linter.on(NodeType::Identifier, move |_ctx: &mut RuleContext<'_>| {
                *count.borrow_mut() += 1;
                Ok(())
            });
        }
        linter.reset();
        let _ = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert_eq!(*count.borrow(), 0);
        assert!(linter.source_code().is_none());
    }

    #[test]
    fn rule_listeners_are_dropped_after_run_unless_state_saved() {
        let mut linter = Linter::new();
        linter.define_rule(ReportIdentifiers);
        let config = Config::new().with_rule("report-identifiers", Severity::Error);

        let first = linter
            .verify(two_declarations(), &config)
            .expect("verify should succeed");
        assert_eq!(first.len(), 2);

        // Without saved state the rule's listeners are gone, so an empty
        // configuration reports nothing.
        let second = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert!(second.is_empty());
    }

    #[test]
    fn persistent_listeners_survive_runs_without_saved_state() {
        let count = Rc::new(RefCell::new(0));
        let mut linter = Linter::new();
        {
            let count = Rc::clone(&count);
            linter.on(NodeType::Identifier, move |_ctx: &mut RuleContext<'_>| {
                *count.borrow_mut() += 1;
                Ok(())
            });
        }
        let _ = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        let _ = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert_eq!(*count.borrow(), 4);
    }

    #[test]
    fn source_code_is_kept_only_with_saved_state() {
        let mut linter = Linter::new();
        let _ = linter
            .verify(two_declarations(), &Config::new())
            .expect("verify should succeed");
        assert!(linter.source_code().is_none());

        let _ = linter
            .verify_with(
                two_declarations(),
                &Config::new(),
                &VerifyOptions::new().save_state(true),
            )
            .expect("verify should succeed");
        assert!(linter.source_code().is_some());
    }

    #[test]
    fn verify_is_idempotent_across_reset() {
        let model = two_declarations();
        let config = Config::new().with_rule("report-identifiers", Severity::Error);

        let mut linter = Linter::new();
        linter.define_rule(ReportIdentifiers);
        let first = linter
            .verify(Arc::clone(&model), &config)
            .expect("verify should succeed");
        linter.reset();
        let second = linter
            .verify(Arc::clone(&model), &config)
            .expect("verify should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn raw_text_without_parser_is_rejected() {
        let mut linter = Linter::new();
        let result = linter.verify("var a = 1;", &Config::new());
        assert!(matches!(result, Err(LinterError::MissingParser)));
    }

    #[test]
    fn event_names_round_trip() {
        assert_eq!(
            "FunctionDeclaration".parse::<Event>(),
            Ok(Event::Enter(NodeType::FunctionDeclaration))
        );
        assert_eq!(
            "FunctionDeclaration:exit".parse::<Event>(),
            Ok(Event::Exit(NodeType::FunctionDeclaration))
        );
        assert_eq!(
            Event::Exit(NodeType::Identifier).to_string(),
            "Identifier:exit"
        );
        assert!("Nonsense".parse::<Event>().is_err());
    }
}
