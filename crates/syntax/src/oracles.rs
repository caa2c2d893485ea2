//! External predicates the analyzer depends on but does not define:
//! CSS selector validity, regex validity, style-declaration validity,
//! XPath validity and punycode conversion.
//!
//! Each predicate is an injectable trait with a pure-data default
//! implementation, selected at construction time.

use std::fmt;

/// Verdict of the CSS selector oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// Not a valid plain CSS selector.
    Invalid,
    /// A valid plain CSS selector.
    Plain,
    /// A valid plain CSS selector carrying a pseudo-element.
    PlainWithPseudoElement,
}

pub trait CssSelectorOracle {
    fn selector_kind(&self, selector: &str) -> SelectorKind;
}

pub trait RegexOracle {
    fn is_valid(&self, pattern: &str) -> bool;
}

pub trait StyleOracle {
    /// Whether `s` parses as a non-empty list of style declarations.
    fn is_valid_declarations(&self, s: &str) -> bool;
}

pub trait XpathOracle {
    fn is_valid(&self, expression: &str) -> bool;
}

pub trait PunycodeOracle {
    /// Convert a hostname to its ASCII (punycode) form.
    fn to_ascii(&self, hostname: &str) -> Option<String>;
}

/// The full predicate set used by a parser instance.
pub struct Oracles {
    pub css: Box<dyn CssSelectorOracle + Send + Sync>,
    pub regex: Box<dyn RegexOracle + Send + Sync>,
    pub style: Box<dyn StyleOracle + Send + Sync>,
    pub xpath: Box<dyn XpathOracle + Send + Sync>,
    pub punycode: Box<dyn PunycodeOracle + Send + Sync>,
}

impl Default for Oracles {
    fn default() -> Self {
        Self {
            css: Box::new(DefaultCssOracle),
            regex: Box::new(DefaultRegexOracle),
            style: Box::new(DefaultStyleOracle),
            xpath: Box::new(DefaultXpathOracle),
            punycode: Box::new(DefaultPunycodeOracle),
        }
    }
}

impl fmt::Debug for Oracles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Oracles").finish_non_exhaustive()
    }
}

/// Default regex oracle backed by the `regex` crate.
pub struct DefaultRegexOracle;

impl RegexOracle for DefaultRegexOracle {
    fn is_valid(&self, pattern: &str) -> bool {
        regex::Regex::new(pattern).is_ok()
    }
}

/// Default style oracle: a declaration list is a `;`-separated sequence of
/// `property: value` pairs with at least one pair.
pub struct DefaultStyleOracle;

impl StyleOracle for DefaultStyleOracle {
    fn is_valid_declarations(&self, s: &str) -> bool {
        let mut any = false;
        for declaration in s.split(';') {
            let declaration = declaration.trim();
            if declaration.is_empty() {
                continue;
            }
            let Some((name, value)) = declaration.split_once(':') else {
                return false;
            };
            let name = name.trim();
            let mut chars = name.chars();
            let head_ok = match chars.next() {
                Some('-') => matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '-'),
                Some(c) => c.is_ascii_alphabetic(),
                None => false,
            };
            if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return false;
            }
            let value = value.trim();
            if value.is_empty() || value.contains(['{', '}']) {
                return false;
            }
            any = true;
        }
        any
    }
}

/// Default XPath oracle: a shallow well-formedness check — non-empty, with
/// balanced parentheses, brackets and string literals.
pub struct DefaultXpathOracle;

impl XpathOracle for DefaultXpathOracle {
    fn is_valid(&self, expression: &str) -> bool {
        let expression = expression.trim();
        if expression.is_empty() {
            return false;
        }
        let mut depth_paren = 0i32;
        let mut depth_bracket = 0i32;
        let mut quote: Option<char> = None;
        for ch in expression.chars() {
            match quote {
                Some(q) => {
                    if ch == q {
                        quote = None;
                    }
                }
                None => match ch {
                    '\'' | '"' => quote = Some(ch),
                    '(' => depth_paren += 1,
                    ')' => depth_paren -= 1,
                    '[' => depth_bracket += 1,
                    ']' => depth_bracket -= 1,
                    _ => {}
                },
            }
            if depth_paren < 0 || depth_bracket < 0 {
                return false;
            }
        }
        quote.is_none() && depth_paren == 0 && depth_bracket == 0
    }
}

/// Default punycode oracle backed by the `idna` crate.
pub struct DefaultPunycodeOracle;

impl PunycodeOracle for DefaultPunycodeOracle {
    fn to_ascii(&self, hostname: &str) -> Option<String> {
        match idna::domain_to_ascii(hostname) {
            Ok(ascii) if !ascii.is_empty() => Some(ascii),
            _ => None,
        }
    }
}

/// Default CSS selector oracle: a hand-rolled scan over the selector grammar
/// with a fixed pseudo-class/pseudo-element vocabulary.
///
/// Procedural operators (`:has-text`, `:upward`, …) are not part of the
/// vocabulary and classify as invalid, which is what routes them to the
/// procedural compiler. `:has` is deliberately excluded as well.
pub struct DefaultCssOracle;

impl CssSelectorOracle for DefaultCssOracle {
    fn selector_kind(&self, selector: &str) -> SelectorKind {
        let mut scan = Scan::new(selector);
        match scan.selector_list() {
            Ok(()) if scan.pseudo_element => SelectorKind::PlainWithPseudoElement,
            Ok(()) => SelectorKind::Plain,
            Err(()) => SelectorKind::Invalid,
        }
    }
}

struct Scan<'a> {
    bytes: &'a [u8],
    i: usize,
    pseudo_element: bool,
}

impl<'a> Scan<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            i: 0,
            pseudo_element: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.i + 1).copied()
    }

    fn bump(&mut self) {
        self.i += 1;
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.i;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
        self.i > start
    }

    fn selector_list(&mut self) -> Result<(), ()> {
        loop {
            self.complex()?;
            match self.peek() {
                Some(b',') => self.bump(),
                None => return Ok(()),
                Some(_) => return Err(()),
            }
        }
    }

    fn complex(&mut self) -> Result<(), ()> {
        self.skip_ws();
        let mut ended_with_element = self.compound()?;
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                Some(b'>' | b'+' | b'~') => {
                    if ended_with_element {
                        return Err(());
                    }
                    self.bump();
                    self.skip_ws();
                    ended_with_element = self.compound()?;
                }
                Some(b',') | None => return Ok(()),
                Some(_) if had_ws => {
                    if ended_with_element {
                        return Err(());
                    }
                    ended_with_element = self.compound()?;
                }
                Some(_) => return Err(()),
            }
        }
    }

    // One compound selector; returns whether it carries a pseudo-element.
    fn compound(&mut self) -> Result<bool, ()> {
        let mut any = false;
        let mut has_element = false;
        match self.peek() {
            Some(b'*') => {
                self.bump();
                any = true;
            }
            Some(c) if is_ident_start(c) || c == b'\\' || c == b'-' => {
                self.ident()?;
                any = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some(b'#' | b'.') if !has_element => {
                    self.bump();
                    self.ident()?;
                }
                Some(b'[') if !has_element => self.attribute()?,
                Some(b':') => {
                    if self.pseudo()? {
                        if has_element {
                            return Err(());
                        }
                        has_element = true;
                        self.pseudo_element = true;
                    }
                }
                _ => break,
            }
            any = true;
        }
        if any {
            Ok(has_element)
        } else {
            Err(())
        }
    }

    fn ident(&mut self) -> Result<(), ()> {
        if self.peek() == Some(b'-') {
            self.bump();
            if self.peek() == Some(b'-') {
                self.bump();
            }
        }
        match self.peek() {
            Some(b'\\') => self.escape()?,
            Some(c) if is_ident_start(c) => self.bump(),
            _ => return Err(()),
        }
        loop {
            match self.peek() {
                Some(b'\\') => self.escape()?,
                Some(c) if is_ident_continue(c) => self.bump(),
                _ => return Ok(()),
            }
        }
    }

    fn escape(&mut self) -> Result<(), ()> {
        self.bump();
        match self.peek() {
            None => Err(()),
            Some(c) if c.is_ascii_hexdigit() => {
                let mut n = 0;
                while n < 6 && matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                    self.bump();
                    n += 1;
                }
                if self.peek() == Some(b' ') {
                    self.bump();
                }
                Ok(())
            }
            Some(_) => {
                self.bump();
                Ok(())
            }
        }
    }

    fn attribute(&mut self) -> Result<(), ()> {
        self.bump();
        self.skip_ws();
        self.ident()?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(());
        }
        match self.peek() {
            Some(b'~' | b'|' | b'^' | b'$' | b'*') if self.peek2() == Some(b'=') => {
                self.bump();
                self.bump();
            }
            Some(b'=') => self.bump(),
            _ => return Err(()),
        }
        self.skip_ws();
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.string(q)?,
            Some(c) if is_ident_start(c) || c == b'-' || c.is_ascii_digit() => {
                while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
                    self.bump();
                }
            }
            _ => return Err(()),
        }
        self.skip_ws();
        if matches!(self.peek(), Some(b'i' | b'I' | b's' | b'S')) {
            self.bump();
            self.skip_ws();
        }
        if self.peek() == Some(b']') {
            self.bump();
            Ok(())
        } else {
            Err(())
        }
    }

    fn string(&mut self, quote: u8) -> Result<(), ()> {
        self.bump();
        loop {
            match self.peek() {
                None => return Err(()),
                Some(b'\\') => {
                    self.bump();
                    if self.peek().is_none() {
                        return Err(());
                    }
                    self.bump();
                }
                Some(c) => {
                    self.bump();
                    if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }

    // One pseudo-class or pseudo-element; returns whether it is an element.
    fn pseudo(&mut self) -> Result<bool, ()> {
        self.bump();
        let mut element = self.peek() == Some(b':');
        if element {
            self.bump();
        }
        let name_start = self.i;
        match self.peek() {
            Some(c) if is_ident_start(c) => self.bump(),
            _ => return Err(()),
        }
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.bump();
        }
        let name = std::str::from_utf8(&self.bytes[name_start..self.i])
            .map_err(|_| ())?
            .to_ascii_lowercase();
        if element {
            return if is_pseudo_element_name(&name) {
                Ok(true)
            } else {
                Err(())
            };
        }
        if self.peek() == Some(b'(') {
            let close = self.matching_paren()?;
            let inner = std::str::from_utf8(&self.bytes[self.i + 1..close]).map_err(|_| ())?;
            self.i = close + 1;
            return match name.as_str() {
                "dir" | "lang" => {
                    let inner = inner.trim();
                    if !inner.is_empty()
                        && inner
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '*')
                    {
                        Ok(false)
                    } else {
                        Err(())
                    }
                }
                "host" | "host-context" | "is" | "not" | "where" => {
                    let mut sub = Scan::new(inner);
                    sub.selector_list()?;
                    Ok(false)
                }
                "nth-child" | "nth-last-child" | "nth-last-of-type" | "nth-of-type" => {
                    if is_anb_expression(inner) {
                        Ok(false)
                    } else {
                        Err(())
                    }
                }
                _ => Err(()),
            };
        }
        // Legacy single-colon pseudo-element syntax.
        element = matches!(name.as_str(), "after" | "before" | "first-letter" | "first-line");
        if element || is_pseudo_class_name(&name) {
            Ok(element)
        } else {
            Err(())
        }
    }

    // Position of the parenthesis matching the one at the cursor, honoring
    // strings and backslash escapes.
    fn matching_paren(&self) -> Result<usize, ()> {
        let mut depth = 0u32;
        let mut quote: Option<u8> = None;
        let mut j = self.i;
        while j < self.bytes.len() {
            let c = self.bytes[j];
            match quote {
                Some(q) => {
                    if c == b'\\' {
                        j += 1;
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    b'\\' => j += 1,
                    b'"' | b'\'' => quote = Some(c),
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(j);
                        }
                    }
                    _ => {}
                },
            }
            j += 1;
        }
        Err(())
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c >= 0x80
}

fn is_anb_expression(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    if s == "odd" || s == "even" {
        return true;
    }
    // [+-]?INT?n([+-]INT)? | [+-]?INT
    let rest = s.strip_prefix(['+', '-']).unwrap_or(&s);
    match rest.split_once('n') {
        None => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        Some((a, b)) => {
            if !a.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            let b = b.trim();
            if b.is_empty() {
                return true;
            }
            let Some(tail) = b.strip_prefix(['+', '-']) else {
                return false;
            };
            let tail = tail.trim();
            !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

fn is_pseudo_class_name(name: &str) -> bool {
    matches!(
        name,
        "active"
            | "any-link"
            | "blank"
            | "checked"
            | "default"
            | "defined"
            | "disabled"
            | "empty"
            | "enabled"
            | "first-child"
            | "first-of-type"
            | "focus"
            | "focus-visible"
            | "focus-within"
            | "fullscreen"
            | "hover"
            | "in-range"
            | "indeterminate"
            | "invalid"
            | "last-child"
            | "last-of-type"
            | "link"
            | "only-child"
            | "only-of-type"
            | "optional"
            | "out-of-range"
            | "placeholder-shown"
            | "read-only"
            | "read-write"
            | "required"
            | "root"
            | "scope"
            | "target"
            | "valid"
            | "visited"
    )
}

fn is_pseudo_element_name(name: &str) -> bool {
    matches!(
        name,
        "after"
            | "backdrop"
            | "before"
            | "cue"
            | "first-letter"
            | "first-line"
            | "marker"
            | "placeholder"
            | "selection"
    )
}
