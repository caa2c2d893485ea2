//! Extended-filter (cosmetic, scriptlet, HTML) structural analysis.
//!
//! The anchor region between options and pattern matches `#@?(\$\??|%|\?)?#`:
//! `##`, `#@#`, `#$#`, `#$?#`, `#?#`, `#%#` and their exception forms.

use tracing::instrument;

use crate::bits::{Category, CharClass, Flavor};
use crate::selector::CompiledSelector;

use super::options::DomainListPolicy;
use super::{Parser, Span};

/// The compiled payload of an extended filter, produced by
/// [`Parser::analyze_extra`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtCompiled {
    /// A cosmetic (element-hiding or style) selector.
    Cosmetic(CompiledSelector),
    /// An HTML (`##^`) filter selector.
    Html(CompiledSelector),
    /// A `+js(...)` scriptlet call body.
    Scriptlet(String),
}

impl Parser {
    // A single-byte slice of the given class, short of the sentinel.
    fn unit_slice(&self, i: usize, class: CharClass) -> bool {
        i < self.eol.i && self.class_at(i).intersects(class) && self.slice_len(i) == 1
    }

    // Attempt extended-filter analysis with the anchor starting at the
    // HASH slice `from`. Returns false, leaving no trace, when the anchor
    // does not parse.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn analyze_ext(&mut self, from: usize) -> bool {
        let hash_len = self.slice_len(from);
        // Longer runs of `#` are in all likelihood hosts-file comments.
        if hash_len > 3 {
            return false;
        }
        let mut flavor = Flavor::empty();
        let anchor_end = match hash_len {
            2 => {
                let next = from + 3;
                if next >= self.eol.i || self.class_at(next).intersects(CharClass::SPACE) {
                    return false;
                }
                next
            }
            3 => {
                // `###x` is `##` followed by an id selector.
                self.split_slice(from, 2);
                from + 3
            }
            _ => {
                let mut i = from + 3;
                if self.unit_slice(i, CharClass::AT) {
                    flavor |= Flavor::EXCEPTION;
                    i += 3;
                }
                if self.unit_slice(i, CharClass::DOLLAR) {
                    flavor |= Flavor::EXT_STYLE;
                    i += 3;
                    if self.unit_slice(i, CharClass::QUESTION) {
                        flavor |= Flavor::EXT_STRONG;
                        i += 3;
                    }
                } else if self.unit_slice(i, CharClass::PERCENT) {
                    flavor |= Flavor::UNSUPPORTED;
                    i += 3;
                } else if self.unit_slice(i, CharClass::QUESTION) {
                    flavor |= Flavor::EXT_STRONG;
                    i += 3;
                }
                if i >= self.eol.i || !self.class_at(i).intersects(CharClass::HASH) {
                    return false;
                }
                if self.slice_len(i) > 1 {
                    self.split_slice(i, 1);
                }
                i + 3
            }
        };

        self.flavor |= flavor;
        self.category = Category::StaticExtFilter;
        let islice = self.left_space.end();
        self.options = Span {
            i: islice,
            len: from - islice,
        };
        self.options_anchor = Span {
            i: from,
            len: anchor_end - from,
        };
        self.pattern = Span {
            i: anchor_end,
            len: self.eol.i - anchor_end - self.right_space.len,
        };

        let (is_scriptlet, is_html) = if self.pattern.len == 0 {
            (false, false)
        } else {
            let first = self.class_at(self.pattern.i);
            let text = self.span_text(self.pattern);
            (
                first.intersects(CharClass::PLUS)
                    && text.starts_with("+js(")
                    && text.ends_with(')'),
                first.intersects(CharClass::CARET),
            )
        };
        self.flavor |= if is_scriptlet {
            Flavor::EXT_SCRIPTLET
        } else if is_html {
            Flavor::EXT_HTML
        } else {
            Flavor::EXT_COSMETIC
        };
        true
    }

    /// Oracle-backed second pass over an extended filter: hostname-list
    /// validation and selector compilation.
    pub(crate) fn analyze_ext_extra(&mut self) {
        if self.ext_compiled.is_some() {
            return;
        }
        if self.options.len > 0 {
            let from = self.options.i;
            let to = self.options.end();
            self.validate_domain_list(
                from,
                to,
                CharClass::COMMA,
                DomainListPolicy {
                    allow_entity: true,
                    allow_negation: true,
                },
            );
        }

        let text = self.span_text(self.pattern).to_string();
        if self.flavor.contains(Flavor::EXT_SCRIPTLET) {
            let body = text["+js(".len()..text.len() - 1].trim().to_string();
            if body.is_empty() && !self.is_exception() {
                // Only the exception form may disable all scriptlets.
                self.flavor |= Flavor::ERROR;
                self.mark_pattern_error();
            }
            self.ext_compiled = Some(ExtCompiled::Scriptlet(body));
            return;
        }
        if self.flavor.contains(Flavor::EXT_HTML) {
            match self.compiler.compile(&text[1..], &self.oracles) {
                Ok(compiled) => self.ext_compiled = Some(ExtCompiled::Html(compiled)),
                Err(err) => {
                    tracing::debug!(%err, "unsupported HTML filter selector");
                    self.flavor |= Flavor::UNSUPPORTED;
                    self.mark_pattern_error();
                }
            }
            return;
        }
        match self.compiler.compile(&text, &self.oracles) {
            Ok(compiled) => self.ext_compiled = Some(ExtCompiled::Cosmetic(compiled)),
            Err(err) => {
                tracing::debug!(%err, "unsupported cosmetic selector");
                self.flavor |= Flavor::UNSUPPORTED;
                self.mark_pattern_error();
            }
        }
    }

    fn mark_pattern_error(&mut self) {
        if self.interactive {
            let Span { i, len } = self.pattern;
            self.overlay_slices(i, i + len, CharClass::ERROR);
        }
    }

    /// The compiled extended-filter payload, if `analyze_extra` succeeded.
    #[must_use]
    pub fn ext_compiled(&self) -> Option<&ExtCompiled> {
        self.ext_compiled.as_ref()
    }

    /// The canonical compiled text of an extended filter: the selector for
    /// cosmetic and HTML filters, the call body for scriptlets.
    #[must_use]
    pub fn ext_compiled_text(&self) -> Option<&str> {
        match self.ext_compiled.as_ref()? {
            ExtCompiled::Cosmetic(compiled) | ExtCompiled::Html(compiled) => {
                Some(&compiled.selector)
            }
            ExtCompiled::Scriptlet(body) => Some(body),
        }
    }
}
