//! The procedural cosmetic-selector compiler.
//!
//! A cosmetic filter pattern is either a plain CSS selector, or a selector
//! extended with procedural `:operator(...)` calls that require runtime
//! work. Compilation turns the latter into a `{selector, tasks, action}`
//! structure; decompilation walks that structure back into a canonical
//! textual form, which is what downstream consumers dedupe on.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::oracles::{Oracles, SelectorKind};
use crate::util::{escape_regex_literal, parse_regex_literal};

/// All the ways a selector can fail to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("not a valid selector")]
    Invalid,

    #[error("unbalanced parenthesis")]
    UnbalancedParens,

    #[error("unknown extended syntax name `{0}`")]
    UnknownExtendedName(String),

    #[error("invalid argument for `{0}`")]
    InvalidArgument(&'static str),

    #[error("invalid regex literal")]
    InvalidRegex,

    #[error("action operator must terminate a root selector")]
    MisplacedAction,

    #[error("`:style()` accepts at most one preceding task")]
    StyleWithTasks,

    #[error("invalid selector prefix `{0}`")]
    InvalidPrefix(String),
}

/// A procedural operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Has,
    HasText,
    IfNot,
    MatchesCss,
    MatchesCssAfter,
    MatchesCssBefore,
    MinTextLength,
    Remove,
    Spath,
    Style,
    Upward,
    WatchAttr,
    Xpath,
}

impl Operator {
    /// The canonical selector syntax of the operator, colon included.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operator::Has => ":has",
            Operator::HasText => ":has-text",
            Operator::IfNot => ":if-not",
            Operator::MatchesCss => ":matches-css",
            Operator::MatchesCssAfter => ":matches-css-after",
            Operator::MatchesCssBefore => ":matches-css-before",
            Operator::MinTextLength => ":min-text-length",
            Operator::Remove => ":remove",
            Operator::Spath => ":spath",
            Operator::Style => ":style",
            Operator::Upward => ":upward",
            Operator::WatchAttr => ":watch-attr",
            Operator::Xpath => ":xpath",
        }
    }

    fn is_action(self) -> bool {
        matches!(self, Operator::Remove | Operator::Style)
    }
}

/// A regex argument: a body plus optional flags. Literal (non-regex) values
/// are escaped into a body and remembered in the compiler's reverse map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexValue {
    pub body: String,
    pub flags: String,
}

impl Serialize for RegexValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.flags.is_empty() {
            serializer.serialize_str(&self.body)
        } else {
            let mut seq = serializer.serialize_seq(Some(2))?;
            seq.serialize_element(&self.body)?;
            seq.serialize_element(&self.flags)?;
            seq.end()
        }
    }
}

/// A `matches-css*` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssDeclaration {
    pub name: String,
    pub value: RegexValue,
}

/// An operator argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Selector(Box<ProceduralSelector>),
    Regex(RegexValue),
    Declaration(CssDeclaration),
    Integer(u32),
    String(String),
    StringList(Vec<String>),
    None,
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arg::Selector(inner) => inner.serialize(serializer),
            Arg::Regex(value) => value.serialize(serializer),
            Arg::Declaration(decl) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("name", &decl.name)?;
                map.serialize_entry("value", &decl.value)?;
                map.end()
            }
            Arg::Integer(n) => serializer.serialize_u32(*n),
            Arg::String(s) => serializer.serialize_str(s),
            Arg::StringList(list) => list.serialize(serializer),
            Arg::None => serializer.serialize_str(""),
        }
    }
}

/// One unit of runtime work: an operator plus its compiled argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub op: Operator,
    pub arg: Arg,
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.arg {
            Arg::None => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(self.op.name())?;
                seq.end()
            }
            _ => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(self.op.name())?;
                seq.serialize_element(&self.arg)?;
                seq.end()
            }
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The compiled form of a procedural selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProceduralSelector {
    pub selector: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Task>,
    #[serde(skip_serializing_if = "is_false")]
    pub pseudo: bool,
}

/// Result of compiling one cosmetic selector.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelector {
    /// Canonical textual form; the dedupe key.
    pub selector: String,
    /// Engine-facing form: the selector itself when plain, its JSON
    /// encoding when procedural.
    pub compiled: String,
    /// Whether a plain selector carries a pseudo-element.
    pub pseudo_element: bool,
    /// Present when the selector compiled to procedural tasks.
    pub procedural: Option<ProceduralSelector>,
}

static RE_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r":(?:-abp-contains|-abp-has|contains|has-text|has|if-not|if|matches-css-after|matches-css-before|matches-css|min-text-length|not|nth-ancestor|remove|style|upward|watch-attrs|watch-attr|xpath)\(",
    )
    .expect("hardcoded regex")
});

static RE_STYLE_INJECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\{\s*([^{}]+?)\s*\}$").expect("hardcoded regex"));

static RE_DISPLAY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^display\s*:\s*none\s*!important\s*;?\s*$").expect("hardcoded regex"));

static RE_REMOVE_TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^remove\s*:\s*true\s*;?\s*$").expect("hardcoded regex"));

static RE_EXT_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[-(?:abp|ext)-([a-z-]+)=(?:'([^']+)'|"([^"]+)")\]"#).expect("hardcoded regex")
});

static RE_DANGLING_COMBINATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+>~\s]\s*$").expect("hardcoded regex"));

static RE_SIBLING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+~]").expect("hardcoded regex"));

static RE_COMBINATOR_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[>+~]").expect("hardcoded regex"));

/// The selector compiler. Reusable; owns the regex reverse map used to
/// restore raw literal arguments during decompilation.
#[derive(Debug, Default)]
pub struct SelectorCompiler {
    regex_to_raw: HashMap<String, String>,
}

impl SelectorCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget per-line state. The reverse map is not a cache across lines.
    pub fn reset(&mut self) {
        self.regex_to_raw.clear();
    }

    /// Compile a raw cosmetic selector.
    pub fn compile(
        &mut self,
        raw: &str,
        oracles: &Oracles,
    ) -> Result<CompiledSelector, SelectorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut s = trimmed.to_string();

        // AdGuard style-injection surface syntax.
        if s.ends_with('}') {
            let Some(captures) = RE_STYLE_INJECTION.captures(&s) else {
                return Err(SelectorError::Invalid);
            };
            let sel = captures[1].to_string();
            let declaration = captures[2].to_string();
            s = if RE_DISPLAY_NONE.is_match(&declaration) {
                sel
            } else if RE_REMOVE_TRUE.is_match(&declaration) {
                format!("{sel}:remove()")
            } else {
                format!("{sel}:style({declaration})")
            };
        }

        // ABP extended bracket syntax, rewritten until gone.
        while let Some(captures) = RE_EXT_BRACKET.captures(&s) {
            let name = match &captures[1] {
                "has" => "has",
                "contains" | "has-text" => "has-text",
                "matches-css" => "matches-css",
                "matches-css-after" => "matches-css-after",
                "matches-css-before" => "matches-css-before",
                other => return Err(SelectorError::UnknownExtendedName(other.to_string())),
            };
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map_or("", |m| m.as_str())
                .to_string();
            let range = captures.get(0).expect("whole match").range();
            s.replace_range(range, &format!(":{name}({value})"));
        }

        match oracles.css.selector_kind(&s) {
            SelectorKind::Plain => {
                return Ok(CompiledSelector {
                    selector: s.clone(),
                    compiled: s,
                    pseudo_element: false,
                    procedural: None,
                });
            }
            SelectorKind::PlainWithPseudoElement => {
                return Ok(CompiledSelector {
                    selector: s.clone(),
                    compiled: s,
                    pseudo_element: true,
                    procedural: None,
                });
            }
            SelectorKind::Invalid => {}
        }

        let procedural = self.compile_procedural(&s, true, oracles)?;
        let selector = self.decompile(&procedural);
        let compiled =
            serde_json::to_string(&procedural).map_err(|_| SelectorError::Invalid)?;
        Ok(CompiledSelector {
            selector,
            compiled,
            pseudo_element: false,
            procedural: Some(procedural),
        })
    }

    fn compile_procedural(
        &mut self,
        raw: &str,
        root: bool,
        oracles: &Oracles,
    ) -> Result<ProceduralSelector, SelectorError> {
        let mut tasks = Vec::new();
        let mut action: Option<Task> = None;
        let mut prefix = "";
        let mut seen_op = false;
        let mut seg_start = 0usize;
        let mut scan = 0usize;

        while let Some(found) = RE_OPERATOR.find(&raw[scan..]) {
            let op_beg = scan + found.start();
            let paren = scan + found.end() - 1;
            let Some(close) = find_paren_end(raw, paren) else {
                return Err(SelectorError::UnbalancedParens);
            };
            // An operator expression which happens to be a valid CSS
            // selector stays in the plain part.
            if oracles.css.selector_kind(&raw[op_beg..=close]) != SelectorKind::Invalid {
                scan = close + 1;
                continue;
            }
            if action.is_some() {
                return Err(SelectorError::MisplacedAction);
            }
            if seen_op {
                if op_beg > seg_start {
                    tasks.push(self.compile_spath(&raw[seg_start..op_beg], oracles)?);
                }
            } else {
                prefix = &raw[..op_beg];
                seen_op = true;
            }
            let name = &raw[op_beg + 1..paren];
            let arg = &raw[paren + 1..close];
            let (op, task) = self.compile_operator(name, arg, oracles)?;
            if op.is_action() {
                if !root {
                    return Err(SelectorError::MisplacedAction);
                }
                action = Some(task);
            } else {
                tasks.push(task);
            }
            scan = close + 1;
            seg_start = scan;
        }

        if !seen_op {
            return Err(SelectorError::Invalid);
        }
        if seg_start < raw.len() {
            if action.is_some() {
                return Err(SelectorError::MisplacedAction);
            }
            tasks.push(self.compile_spath(&raw[seg_start..], oracles)?);
        }
        if matches!(&action, Some(task) if task.op == Operator::Style) && tasks.len() > 1 {
            return Err(SelectorError::StyleWithTasks);
        }

        let mut pseudo = false;
        let mut selector = prefix.to_string();
        if !selector.is_empty() {
            if RE_DANGLING_COMBINATOR.is_match(&selector)
                && !(tasks.is_empty() && action.is_none())
            {
                selector.push('*');
            }
            match oracles.css.selector_kind(&selector) {
                SelectorKind::Invalid => {
                    if root || !RE_SIBLING_PREFIX.is_match(&selector) {
                        return Err(SelectorError::InvalidPrefix(selector));
                    }
                }
                SelectorKind::PlainWithPseudoElement => {
                    // Runtime work cannot look inside a pseudo-element;
                    // only a styling action can target one.
                    if action.is_none() || !tasks.is_empty() {
                        return Err(SelectorError::InvalidPrefix(selector));
                    }
                    pseudo = true;
                }
                SelectorKind::Plain => {}
            }
        }

        Ok(ProceduralSelector {
            selector,
            tasks,
            action,
            pseudo,
        })
    }

    fn compile_operator(
        &mut self,
        name: &str,
        arg: &str,
        oracles: &Oracles,
    ) -> Result<(Operator, Task), SelectorError> {
        let op = match name {
            "-abp-contains" | "contains" | "has-text" => Operator::HasText,
            "-abp-has" | "has" | "if" => Operator::Has,
            "if-not" => Operator::IfNot,
            "not" => {
                // A `:not()` whose argument is plain CSS keeps its CSS4
                // meaning and must not become procedural.
                if oracles.css.selector_kind(arg) != SelectorKind::Invalid {
                    return Err(SelectorError::Invalid);
                }
                Operator::IfNot
            }
            "matches-css" => Operator::MatchesCss,
            "matches-css-after" => Operator::MatchesCssAfter,
            "matches-css-before" => Operator::MatchesCssBefore,
            "min-text-length" => Operator::MinTextLength,
            "nth-ancestor" | "upward" => Operator::Upward,
            "remove" => Operator::Remove,
            "style" => Operator::Style,
            "watch-attr" | "watch-attrs" => Operator::WatchAttr,
            "xpath" => Operator::Xpath,
            _ => return Err(SelectorError::Invalid),
        };
        let arg = match op {
            Operator::Has | Operator::IfNot => {
                Arg::Selector(Box::new(self.compile_conditional(arg, oracles)?))
            }
            Operator::HasText => Arg::Regex(self.compile_text(arg, oracles)?),
            Operator::MatchesCss | Operator::MatchesCssAfter | Operator::MatchesCssBefore => {
                Arg::Declaration(self.compile_css_declaration(arg, oracles)?)
            }
            Operator::MinTextLength => {
                let n: u32 = arg
                    .trim()
                    .parse()
                    .map_err(|_| SelectorError::InvalidArgument("min-text-length"))?;
                if n >= 1 << 31 {
                    return Err(SelectorError::InvalidArgument("min-text-length"));
                }
                Arg::Integer(n)
            }
            Operator::Upward => {
                let arg = arg.trim();
                if let Ok(n) = arg.parse::<u32>() {
                    if !(1..256).contains(&n) {
                        return Err(SelectorError::InvalidArgument("upward"));
                    }
                    Arg::Integer(n)
                } else if oracles.css.selector_kind(arg) == SelectorKind::Plain {
                    Arg::String(arg.to_string())
                } else {
                    return Err(SelectorError::InvalidArgument("upward"));
                }
            }
            Operator::Remove => {
                if !arg.trim().is_empty() {
                    return Err(SelectorError::InvalidArgument("remove"));
                }
                Arg::None
            }
            Operator::Style => {
                if arg.contains('\\') || arg.to_ascii_lowercase().contains("url(") {
                    return Err(SelectorError::InvalidArgument("style"));
                }
                if !oracles.style.is_valid_declarations(arg) {
                    return Err(SelectorError::InvalidArgument("style"));
                }
                Arg::String(arg.trim().to_string())
            }
            Operator::Xpath => {
                if !oracles.xpath.is_valid(arg) {
                    return Err(SelectorError::InvalidArgument("xpath"));
                }
                Arg::String(arg.to_string())
            }
            Operator::WatchAttr => Arg::StringList(
                arg.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            Operator::Spath => unreachable!("spath has no operator syntax"),
        };
        Ok((op, Task { op, arg }))
    }

    // `:has()`-family argument: a plain selector, or a nested procedural
    // one. A leading combinator is made explicit with `:scope`.
    fn compile_conditional(
        &mut self,
        arg: &str,
        oracles: &Oracles,
    ) -> Result<ProceduralSelector, SelectorError> {
        let mut s = arg.trim().to_string();
        if s.is_empty() {
            return Err(SelectorError::Empty);
        }
        if RE_COMBINATOR_START.is_match(&s) {
            s = format!(":scope {s}");
        }
        match oracles.css.selector_kind(&s) {
            SelectorKind::Invalid => self.compile_procedural(&s, false, oracles),
            _ => Ok(ProceduralSelector {
                selector: s,
                ..ProceduralSelector::default()
            }),
        }
    }

    fn compile_text(
        &mut self,
        arg: &str,
        oracles: &Oracles,
    ) -> Result<RegexValue, SelectorError> {
        if let Some((body, flags)) = parse_regex_literal(arg) {
            if !oracles.regex.is_valid(body) {
                return Err(SelectorError::InvalidRegex);
            }
            return Ok(RegexValue {
                body: body.to_string(),
                flags: flags.to_string(),
            });
        }
        let escaped = escape_regex_literal(arg);
        self.regex_to_raw.insert(escaped.clone(), arg.to_string());
        Ok(RegexValue {
            body: escaped,
            flags: String::new(),
        })
    }

    fn compile_css_declaration(
        &mut self,
        arg: &str,
        oracles: &Oracles,
    ) -> Result<CssDeclaration, SelectorError> {
        let (name, value) = arg
            .split_once(':')
            .ok_or(SelectorError::InvalidArgument("matches-css"))?;
        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(SelectorError::InvalidArgument("matches-css"));
        }
        let value = value.trim();
        let value = if let Some((body, flags)) = parse_regex_literal(value) {
            if !oracles.regex.is_valid(body) {
                return Err(SelectorError::InvalidRegex);
            }
            RegexValue {
                body: body.to_string(),
                flags: flags.to_string(),
            }
        } else {
            // Literal values match whole, hence the anchors.
            let escaped = format!("^{}$", escape_regex_literal(value));
            self.regex_to_raw.insert(escaped.clone(), value.to_string());
            RegexValue {
                body: escaped,
                flags: String::new(),
            }
        };
        Ok(CssDeclaration {
            name: name.to_string(),
            value,
        })
    }

    // A CSS fragment between two operators: valid whenever it parses as
    // the suffix of some selector.
    fn compile_spath(
        &self,
        fragment: &str,
        oracles: &Oracles,
    ) -> Result<Task, SelectorError> {
        if fragment.trim().is_empty()
            || oracles.css.selector_kind(&format!("*{fragment}")) == SelectorKind::Invalid
        {
            return Err(SelectorError::Invalid);
        }
        Ok(Task {
            op: Operator::Spath,
            arg: Arg::String(fragment.to_string()),
        })
    }

    /// Walk a compiled selector back into its canonical textual form,
    /// restoring raw literal arguments through the reverse map.
    #[must_use]
    pub fn decompile(&self, selector: &ProceduralSelector) -> String {
        let mut out = selector.selector.clone();
        for task in &selector.tasks {
            self.decompile_task(&mut out, task);
        }
        if let Some(action) = &selector.action {
            self.decompile_task(&mut out, action);
        }
        out
    }

    fn decompile_task(&self, out: &mut String, task: &Task) {
        if task.op == Operator::Spath {
            if let Arg::String(s) = &task.arg {
                out.push_str(s);
            }
            return;
        }
        out.push_str(task.op.name());
        out.push('(');
        match &task.arg {
            Arg::Selector(inner) => out.push_str(&self.decompile(inner)),
            Arg::Regex(value) => out.push_str(&self.decompile_regex(value)),
            Arg::Declaration(decl) => {
                out.push_str(&decl.name);
                out.push_str(": ");
                out.push_str(&self.decompile_regex(&decl.value));
            }
            Arg::Integer(n) => out.push_str(&n.to_string()),
            Arg::String(s) => out.push_str(s),
            Arg::StringList(list) => out.push_str(&list.join(",")),
            Arg::None => {}
        }
        out.push(')');
    }

    fn decompile_regex(&self, value: &RegexValue) -> String {
        if value.flags.is_empty() {
            if let Some(raw) = self.regex_to_raw.get(&value.body) {
                return raw.clone();
            }
            return format!("/{}/", value.body);
        }
        format!("/{}/{}", value.body, value.flags)
    }
}

// Position of the `)` matching the `(` at `open`, honoring backslash
// escapes.
fn find_paren_end(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1u32;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(raw: &str) -> Result<CompiledSelector, SelectorError> {
        SelectorCompiler::new().compile(raw, &Oracles::default())
    }

    #[test]
    fn plain_fast_path() {
        let compiled = compile(".ad-banner").unwrap();
        assert_eq!(compiled.selector, ".ad-banner");
        assert_eq!(compiled.compiled, ".ad-banner");
        assert!(!compiled.pseudo_element);
        assert!(compiled.procedural.is_none());
    }

    #[test]
    fn plain_with_pseudo_element() {
        let compiled = compile("div::before").unwrap();
        assert!(compiled.pseudo_element);
    }

    #[test]
    fn has_text_regex_literal() {
        let compiled = compile(".ad:has-text(/sponsor/i)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.selector, ".ad");
        assert_eq!(
            procedural.tasks,
            vec![Task {
                op: Operator::HasText,
                arg: Arg::Regex(RegexValue {
                    body: "sponsor".to_string(),
                    flags: "i".to_string(),
                }),
            }]
        );
        assert_eq!(
            compiled.compiled,
            r#"{"selector":".ad","tasks":[[":has-text",["sponsor","i"]]]}"#
        );
    }

    #[test]
    fn has_text_literal_round_trips() {
        let mut compiler = SelectorCompiler::new();
        let compiled = compiler
            .compile(".ad:has-text(Sponsored (ad))", &Oracles::default())
            .unwrap();
        // The canonical form restores the raw literal.
        assert_eq!(compiled.selector, ".ad:has-text(Sponsored (ad))");
    }

    #[test]
    fn conditional_selectors() {
        let compiled = compile("section:has(.b)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.tasks.len(), 1);
        match &procedural.tasks[0].arg {
            Arg::Selector(inner) => assert_eq!(inner.selector, ".b"),
            other => panic!("unexpected arg: {other:?}"),
        }
        assert_eq!(compiled.selector, "section:has(.b)");
    }

    #[test]
    fn conditional_combinator_gets_scope() {
        let compiled = compile("div:has(> .x)").unwrap();
        let procedural = compiled.procedural.unwrap();
        match &procedural.tasks[0].arg {
            Arg::Selector(inner) => assert_eq!(inner.selector, ":scope > .x"),
            other => panic!("unexpected arg: {other:?}"),
        }
    }

    #[test]
    fn operator_aliases_normalize() {
        let compiled = compile("div:nth-ancestor(2)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.tasks[0].op, Operator::Upward);
        assert_eq!(compiled.selector, "div:upward(2)");
    }

    #[test]
    fn upward_bounds() {
        assert!(compile("div:upward(1)").is_ok());
        assert!(compile("div:upward(255)").is_ok());
        assert!(compile("div:upward(0)").is_err());
        assert!(compile("div:upward(256)").is_err());
        assert!(compile("div:upward(.container)").is_ok());
    }

    #[test]
    fn style_and_remove_actions() {
        let compiled = compile("div:style(overflow: visible)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert!(procedural.tasks.is_empty());
        assert_eq!(procedural.action.as_ref().unwrap().op, Operator::Style);

        assert!(compile("div:style(background: url(x))").is_err());
        assert!(compile("div:remove()").is_ok());
        assert!(compile("div:remove(arg)").is_err());
        // Actions terminate the selector.
        assert!(compile("div:remove() span").is_err());
        // Style with more than one preceding task is rejected.
        assert!(compile("div:upward(1):has-text(x):style(color: red)").is_err());
    }

    #[test]
    fn spath_between_operators() {
        let compiled = compile("div:has-text(ad) > span:upward(1)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.tasks.len(), 3);
        assert_eq!(procedural.tasks[1].op, Operator::Spath);
        assert_eq!(compiled.selector, "div:has-text(ad) > span:upward(1)");
    }

    #[test]
    fn dangling_combinator_prefix() {
        let compiled = compile("div > :has-text(x)").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.selector, "div > *");
    }

    #[test]
    fn abp_bracket_syntax() {
        let compiled = compile("div[-abp-contains='buy now']").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.tasks[0].op, Operator::HasText);
        assert!(compile("div[-ext-frobnicate='x']").is_err());
    }

    #[test]
    fn style_injection_surface() {
        let compiled = compile("div.ad { display: none!important; }").unwrap();
        assert_eq!(compiled.selector, "div.ad");
        assert!(compiled.procedural.is_none());

        let compiled = compile("div.ad { remove: true; }").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.action.as_ref().unwrap().op, Operator::Remove);

        let compiled = compile("div.ad { color: red }").unwrap();
        let procedural = compiled.procedural.unwrap();
        assert_eq!(procedural.action.as_ref().unwrap().op, Operator::Style);
    }

    #[test]
    fn matches_css_declaration() {
        let compiled = compile("div:matches-css(color: /red/i)").unwrap();
        let procedural = compiled.procedural.unwrap();
        match &procedural.tasks[0].arg {
            Arg::Declaration(decl) => {
                assert_eq!(decl.name, "color");
                assert_eq!(decl.value.body, "red");
                assert_eq!(decl.value.flags, "i");
            }
            other => panic!("unexpected arg: {other:?}"),
        }
        // Literal values anchor.
        let compiled = compile("div:matches-css(color: red)").unwrap();
        let procedural = compiled.procedural.unwrap();
        match &procedural.tasks[0].arg {
            Arg::Declaration(decl) => assert_eq!(decl.value.body, "^red$"),
            other => panic!("unexpected arg: {other:?}"),
        }
    }

    #[test]
    fn rejects() {
        assert!(compile("").is_err());
        assert!(compile("div:has-text(unclosed").is_err());
        assert!(compile("div:min-text-length(-1)").is_err());
        assert!(compile("%%%").is_err());
    }

    #[test]
    fn reset_clears_reverse_map() {
        let mut compiler = SelectorCompiler::new();
        compiler
            .compile(".ad:has-text(plain text)", &Oracles::default())
            .unwrap();
        compiler.reset();
        assert!(compiler.regex_to_raw.is_empty());
    }
}
