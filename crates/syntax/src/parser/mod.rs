//! The reusable line parser: slice array, spans, line classification and
//! the public query facade.
//!
//! A [`Parser`] owns mutable buffers which are reused across lines; one
//! call to [`Parser::analyze`] fully replaces the state left by the
//! previous one. Iterators handed out by the parser read those buffers and
//! are invalidated by the next `analyze`.

use tracing::instrument;

use crate::bits::{class_of, Category, CharClass, Flavor};
use crate::oracles::Oracles;
use crate::selector::SelectorCompiler;

mod ext;
mod net;
mod options;
mod tokens;

pub use ext::ExtCompiled;
pub use options::{ExtOption, ExtOptionsIter, NetOption, NetOptionsIter, OptionFlags, OptionId};
pub use tokens::PatternTokens;

use options::OptionRecord;

/// A named region of the line, expressed in slice-array cells: `i` is the
/// offset of its first slice (a multiple of 3), `len` the number of cells
/// it covers (also a multiple of 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub i: usize,
    pub len: usize,
}

impl Span {
    #[must_use]
    pub fn end(self) -> usize {
        self.i + self.len
    }

    fn clear(&mut self) {
        self.i = 0;
        self.len = 0;
    }
}

/// Snapshot of all named spans, in their at-rest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spans {
    pub left_space: Span,
    pub exception: Span,
    pub pattern_left_anchor: Span,
    pub pattern: Span,
    pub pattern_right_anchor: Span,
    pub options_anchor: Span,
    pub options: Span,
    pub comment: Span,
    pub right_space: Span,
    pub eol: Span,
}

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// When set, validation failures overlay ERROR bits on the offending
    /// slices so an editor can underline exact byte ranges.
    pub interactive: bool,
}

/// A static-filter line parser.
#[derive(Debug)]
pub struct Parser {
    pub(crate) interactive: bool,
    pub(crate) max_token_length: usize,
    pub(crate) oracles: Oracles,
    pub(crate) raw: String,
    pub(crate) slices: Vec<u32>,
    pub(crate) all_bits: CharClass,
    pub(crate) category: Category,
    pub(crate) flavor: Flavor,
    pub(crate) left_space: Span,
    pub(crate) exception: Span,
    pub(crate) pattern_left_anchor: Span,
    pub(crate) pattern: Span,
    pub(crate) pattern_right_anchor: Span,
    pub(crate) options_anchor: Span,
    pub(crate) options: Span,
    pub(crate) comment: Span,
    pub(crate) right_space: Span,
    pub(crate) eol: Span,
    pub(crate) option_records: Vec<OptionRecord>,
    pub(crate) options_prepared: bool,
    pub(crate) ext_compiled: Option<ExtCompiled>,
    pub(crate) compiler: SelectorCompiler,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl Parser {
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self::with_oracles(options, Oracles::default())
    }

    /// A parser with caller-provided external predicates.
    #[must_use]
    pub fn with_oracles(options: ParserOptions, oracles: Oracles) -> Self {
        Self {
            interactive: options.interactive,
            max_token_length: usize::MAX,
            oracles,
            raw: String::new(),
            slices: Vec::new(),
            all_bits: CharClass::empty(),
            category: Category::None,
            flavor: Flavor::empty(),
            left_space: Span::default(),
            exception: Span::default(),
            pattern_left_anchor: Span::default(),
            pattern: Span::default(),
            pattern_right_anchor: Span::default(),
            options_anchor: Span::default(),
            options: Span::default(),
            comment: Span::default(),
            right_space: Span::default(),
            eol: Span::default(),
            option_records: Vec::new(),
            options_prepared: false,
            ext_compiled: None,
            compiler: SelectorCompiler::new(),
        }
    }

    /// Forget the previous line. Buffer capacity is retained.
    pub fn reset(&mut self) {
        self.raw.clear();
        self.slices.clear();
        self.all_bits = CharClass::empty();
        self.category = Category::None;
        self.flavor = Flavor::empty();
        self.left_space.clear();
        self.exception.clear();
        self.pattern_left_anchor.clear();
        self.pattern.clear();
        self.pattern_right_anchor.clear();
        self.options_anchor.clear();
        self.options.clear();
        self.comment.clear();
        self.right_space.clear();
        self.eol.clear();
        self.option_records.clear();
        self.options_prepared = false;
        self.ext_compiled = None;
        self.compiler.reset();
    }

    /// Analyze one logical line. The mandatory entry point.
    #[instrument(level = "trace", skip(self))]
    pub fn analyze(&mut self, line: &str) {
        self.reset();
        self.raw.push_str(line);
        self.slice_line();

        let islice = self.left_space.end();
        if islice >= self.eol.i {
            // Pure whitespace.
            return;
        }

        let first = self.class_at(islice);
        if first.intersects(CharClass::LINE_COMMENT) {
            if first.intersects(CharClass::HASH) && self.analyze_ext(islice) {
                return;
            }
            self.category = Category::Comment;
            self.comment = Span {
                i: islice,
                len: self.eol.i - islice - self.right_space.len,
            };
            return;
        }

        if self.all_bits.intersects(CharClass::HASH) {
            let mut i = islice;
            while i < self.eol.i && !self.class_at(i).intersects(CharClass::HASH) {
                i += 3;
            }
            if i < self.eol.i && self.analyze_ext(i) {
                return;
            }
            // A `#` preceded by a space marks an inline trailing comment.
            if self.all_bits.intersects(CharClass::SPACE) {
                let mut i = islice + 3;
                while i < self.eol.i {
                    if self.class_at(i).intersects(CharClass::HASH)
                        && self.class_at(i - 3).intersects(CharClass::SPACE)
                    {
                        self.comment = Span {
                            i: i - 3,
                            len: self.eol.i - (i - 3) - self.right_space.len,
                        };
                        break;
                    }
                    i += 3;
                }
            }
        }

        self.category = Category::StaticNetFilter;
        self.analyze_net();
    }

    /// Optional second pass: oracle-backed validation and cosmetic-selector
    /// compilation, used for highlighting and downstream compilation.
    pub fn analyze_extra(&mut self) {
        match self.category {
            Category::StaticNetFilter => self.analyze_net_extra(),
            Category::StaticExtFilter => self.analyze_ext_extra(),
            Category::None | Category::Comment => {}
        }
    }

    // Linear byte walk producing the slice array and the whitespace spans.
    fn slice_line(&mut self) {
        let bytes = self.raw.as_bytes();
        let mut prev = CharClass::from_bits_retain(u32::MAX);
        for (i, &byte) in bytes.iter().enumerate() {
            let class = class_of(byte);
            if class != prev {
                self.slices.extend_from_slice(&[class.bits(), i as u32, 0]);
                prev = class;
            }
            let last = self.slices.len() - 1;
            self.slices[last] += 1;
            self.all_bits |= class;
        }
        self.slices
            .extend_from_slice(&[0, bytes.len() as u32, 0]);

        let eol_i = self.slices.len() - 3;
        self.eol = Span { i: eol_i, len: 3 };
        if eol_i > 0 && self.class_at(0).intersects(CharClass::SPACE) {
            self.left_space = Span { i: 0, len: 3 };
        }
        self.right_space = Span { i: eol_i, len: 0 };
        if eol_i > 3 && self.class_at(eol_i - 3).intersects(CharClass::SPACE) {
            self.right_space = Span { i: eol_i - 3, len: 3 };
        }
    }

    // Split the slice at `i` into a `left_bytes`-long slice followed by the
    // remainder, shifting every span located after the split point.
    pub(crate) fn split_slice(&mut self, i: usize, left_bytes: u32) {
        let bits = self.slices[i];
        let origin = self.slices[i + 1];
        let len = self.slices[i + 2];
        debug_assert!(left_bytes > 0 && left_bytes < len);
        self.slices[i + 2] = left_bytes;
        let at = i + 3;
        self.slices
            .splice(at..at, [bits, origin + left_bytes, len - left_bytes]);
        for span in [
            &mut self.left_space,
            &mut self.exception,
            &mut self.pattern_left_anchor,
            &mut self.pattern,
            &mut self.pattern_right_anchor,
            &mut self.options_anchor,
            &mut self.options,
            &mut self.comment,
            &mut self.right_space,
            &mut self.eol,
        ] {
            if span.i > i {
                span.i += 3;
            } else if span.len > 0 && i >= span.i && i < span.end() {
                span.len += 3;
            }
        }
    }

    pub(crate) fn class_at(&self, i: usize) -> CharClass {
        CharClass::from_bits_retain(self.slices[i]).class()
    }

    pub(crate) fn slice_len(&self, i: usize) -> u32 {
        self.slices[i + 2]
    }

    pub(crate) fn slice_origin(&self, i: usize) -> usize {
        self.slices[i + 1] as usize
    }

    pub(crate) fn overlay_slices(&mut self, from: usize, to: usize, overlay: CharClass) {
        let mut i = from;
        while i < to {
            self.slices[i] |= overlay.bits();
            i += 3;
        }
    }

    pub(crate) fn has_overlay(&self, i: usize, overlay: CharClass) -> bool {
        CharClass::from_bits_retain(self.slices[i]).intersects(overlay)
    }

    // Raw text covered by the slices `[from, to)`.
    pub(crate) fn text_between(&self, from: usize, to: usize) -> &str {
        if from >= to {
            return "";
        }
        let start = self.slice_origin(from);
        let end = self.slice_origin(to - 3) + self.slice_len(to - 3) as usize;
        &self.raw[start..end]
    }

    // The right bound of network-filter analysis: the comment if present,
    // otherwise trailing whitespace.
    pub(crate) fn net_bound(&self) -> usize {
        if self.comment.len > 0 {
            self.comment.i
        } else {
            self.eol.i - self.right_space.len
        }
    }

    // Effective pattern slices: the pattern span minus IGNORE-overlaid
    // slices at either edge (pointless wildcards, hosts-file residue).
    pub(crate) fn effective_pattern(&self) -> (usize, usize) {
        let mut from = self.pattern.i;
        let mut to = self.pattern.end();
        while from < to && self.has_overlay(from, CharClass::IGNORE) {
            from += 3;
        }
        while to > from && self.has_overlay(to - 3, CharClass::IGNORE) {
            to -= 3;
        }
        (from, to)
    }

    pub(crate) fn pattern_bits(&self) -> CharClass {
        let (from, to) = self.effective_pattern();
        let mut bits = CharClass::empty();
        let mut i = from;
        while i < to {
            bits |= self.class_at(i);
            i += 3;
        }
        bits
    }
}

// The public query facade.
impl Parser {
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.category == Category::None
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.category == Category::Comment
    }

    #[must_use]
    pub fn is_net_filter(&self) -> bool {
        self.category == Category::StaticNetFilter
    }

    #[must_use]
    pub fn is_ext_filter(&self) -> bool {
        self.category == Category::StaticExtFilter
    }

    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.flavor.contains(Flavor::EXCEPTION)
    }

    #[must_use]
    pub fn should_ignore(&self) -> bool {
        self.flavor.contains(Flavor::IGNORE)
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.flavor.contains(Flavor::ERROR)
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.flavor.contains(Flavor::UNSUPPORTED)
    }

    /// Whether the line, though analyzable, is not worth compiling.
    #[must_use]
    pub fn should_discard(&self) -> bool {
        self.flavor.intersects(Flavor::DISCARD)
    }

    #[must_use]
    pub fn has_options(&self) -> bool {
        self.options.len > 0
    }

    /// The raw analyzed line.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The slice array: `(bits, origin, length)` triplets.
    #[must_use]
    pub fn slices(&self) -> &[u32] {
        &self.slices
    }

    #[must_use]
    pub fn spans(&self) -> Spans {
        Spans {
            left_space: self.left_space,
            exception: self.exception,
            pattern_left_anchor: self.pattern_left_anchor,
            pattern: self.pattern,
            pattern_right_anchor: self.pattern_right_anchor,
            options_anchor: self.options_anchor,
            options: self.options,
            comment: self.comment,
            right_space: self.right_space,
            eol: self.eol,
        }
    }

    /// Raw text covered by a span.
    #[must_use]
    pub fn span_text(&self, span: Span) -> &str {
        self.text_between(span.i, span.end())
    }

    #[must_use]
    pub fn options_text(&self) -> &str {
        self.span_text(self.options)
    }

    #[must_use]
    pub fn pattern_text(&self) -> &str {
        self.span_text(self.pattern)
    }

    /// The normalized network pattern: pointless edges dropped, and the
    /// regex body without its enclosing slashes when the pattern is one.
    #[must_use]
    pub fn get_net_pattern(&self) -> &str {
        let (from, to) = self.effective_pattern();
        if from >= to {
            return "";
        }
        let text = self.text_between(from, to);
        if self.flavor.contains(Flavor::NET_REGEX) {
            &text[1..text.len() - 1]
        } else {
            text
        }
    }

    #[must_use]
    pub fn pattern_is_regex(&self) -> bool {
        self.flavor.contains(Flavor::NET_REGEX)
    }

    #[must_use]
    pub fn pattern_is_match_all(&self) -> bool {
        if !self.is_net_filter() || self.pattern_is_regex() {
            return false;
        }
        let (from, to) = self.effective_pattern();
        from >= to || (to - from == 3 && self.class_at(from).intersects(CharClass::ASTERISK))
    }

    #[must_use]
    pub fn pattern_is_plain_hostname(&self) -> bool {
        self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
            && !self.pattern_is_regex()
            && {
                let bits = self.pattern_bits();
                !bits.is_empty() && CharClass::HOSTNAME.contains(bits)
            }
    }

    #[must_use]
    pub fn pattern_is_left_hostname_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
    }

    #[must_use]
    pub fn pattern_is_right_hostname_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_RIGHT_HN_ANCHOR)
    }

    #[must_use]
    pub fn pattern_is_left_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_LEFT_URL_ANCHOR)
    }

    #[must_use]
    pub fn pattern_is_right_anchored(&self) -> bool {
        self.flavor.contains(Flavor::NET_RIGHT_URL_ANCHOR)
    }

    #[must_use]
    pub fn pattern_has_wildcard(&self) -> bool {
        self.pattern_bits().intersects(CharClass::ASTERISK)
    }

    #[must_use]
    pub fn pattern_has_caret(&self) -> bool {
        self.pattern_bits().intersects(CharClass::CARET)
    }

    #[must_use]
    pub fn pattern_has_unicode(&self) -> bool {
        self.pattern_bits().intersects(CharClass::UNICODE)
    }

    #[must_use]
    pub fn pattern_has_uppercase(&self) -> bool {
        self.pattern_bits().intersects(CharClass::UPPERCASE)
    }

    #[must_use]
    pub fn pattern_has_space(&self) -> bool {
        self.flavor.contains(Flavor::NET_SPACE_IN_PATTERN)
    }

    /// Lowercase the pattern in place. Only ASCII uppercase carries the
    /// UPPERCASE class, so byte offsets are unaffected.
    pub fn pattern_to_lowercase(&mut self) -> &str {
        if self.pattern_has_uppercase() {
            let (from, to) = self.effective_pattern();
            let start = self.slice_origin(from);
            let end = self.slice_origin(to - 3) + self.slice_len(to - 3) as usize;
            let mut bytes = std::mem::take(&mut self.raw).into_bytes();
            bytes[start..end].make_ascii_lowercase();
            self.raw = String::from_utf8(bytes).expect("ascii lowercasing preserves utf-8");
            let mut i = from;
            while i < to {
                if self.class_at(i).intersects(CharClass::UPPERCASE) {
                    self.slices[i] &= !CharClass::UPPERCASE.bits();
                }
                i += 3;
            }
        }
        self.get_net_pattern()
    }

    /// Re-analyze the line with the hostname prefix of the pattern
    /// converted to punycode.
    ///
    /// Returns `true` without touching the line when there is nothing to
    /// convert (not a network filter, or no unicode anywhere in the
    /// pattern), and `true` after a successful conversion and re-analysis.
    /// Returns `false` when the pattern does contain unicode but it cannot
    /// be converted away: the leading hostname-class run carries none of
    /// it (the unicode sits in the path), or the punycode oracle rejects
    /// the hostname.
    pub fn to_punycode(&mut self) -> bool {
        if !self.is_net_filter() || !self.pattern_has_unicode() {
            return true;
        }
        let (from, to) = self.effective_pattern();
        let mut i = from;
        let mut has_unicode = false;
        while i < to && CharClass::HOSTNAME.contains(self.class_at(i)) {
            if self.class_at(i).intersects(CharClass::UNICODE) {
                has_unicode = true;
            }
            i += 3;
        }
        if i == from || !has_unicode {
            return false;
        }
        let start = self.slice_origin(from);
        let end = self.slice_origin(i - 3) + self.slice_len(i - 3) as usize;
        let Some(ascii) = self.oracles.punycode.to_ascii(&self.raw[start..end]) else {
            return false;
        };
        let mut line = String::with_capacity(self.raw.len() + ascii.len());
        line.push_str(&self.raw[..start]);
        line.push_str(&ascii);
        line.push_str(&self.raw[end..]);
        self.analyze(&line);
        true
    }

    /// Cap beyond which a trailing wildcard no longer disqualifies a
    /// pattern token.
    pub fn set_max_token_length(&mut self, len: usize) {
        self.max_token_length = len;
    }

    /// Byte ranges of slices flagged with the ERROR overlay, for editors.
    #[must_use]
    pub fn error_byte_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let mut ranges: Vec<std::ops::Range<usize>> = Vec::new();
        let mut i = 0;
        while i < self.eol.i {
            if self.has_overlay(i, CharClass::ERROR) {
                let start = self.slice_origin(i);
                let end = start + self.slice_len(i) as usize;
                match ranges.last_mut() {
                    Some(last) if last.end == start => last.end = end,
                    _ => ranges.push(start..end),
                }
            }
            i += 3;
        }
        ranges
    }
}
