//! The pattern-token iterator: substrings of a network pattern usable as
//! index keys by a matching engine.

use crate::bits::{CharClass, Flavor};

use super::Parser;

/// Iterator over `(token, offset-within-pattern)` pairs. A token is a
/// maximal run of token-class bytes not adjacent to a wildcard; a trailing
/// wildcard stops disqualifying once the run reaches the configured
/// maximum token length.
pub struct PatternTokens<'a> {
    parser: &'a Parser,
    i: usize,
    from: usize,
    to: usize,
    pattern_start: usize,
}

impl Parser {
    #[must_use]
    pub fn pattern_tokens(&self) -> PatternTokens<'_> {
        let (from, to) = if self.is_net_filter() && !self.flavor.contains(Flavor::NET_REGEX) {
            self.effective_pattern()
        } else {
            (0, 0)
        };
        let pattern_start = if from < to { self.slice_origin(from) } else { 0 };
        PatternTokens {
            parser: self,
            i: from,
            from,
            to,
            pattern_start,
        }
    }
}

impl<'a> Iterator for PatternTokens<'a> {
    type Item = (&'a str, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let parser = self.parser;
        loop {
            while self.i < self.to
                && !parser.class_at(self.i).intersects(CharClass::PATTERN_TOKEN)
            {
                self.i += 3;
            }
            if self.i >= self.to {
                return None;
            }
            let sl = self.i;
            let mut sr = sl;
            while sr < self.to && parser.class_at(sr).intersects(CharClass::PATTERN_TOKEN) {
                sr += 3;
            }
            self.i = sr;
            let start = parser.slice_origin(sl);
            let end = parser.slice_origin(sr - 3) + parser.slice_len(sr - 3) as usize;
            let ok_left =
                sl == self.from || !parser.class_at(sl - 3).intersects(CharClass::ASTERISK);
            let ok_right = sr == self.to
                || !parser.class_at(sr).intersects(CharClass::ASTERISK)
                || end - start >= parser.max_token_length;
            if ok_left && ok_right {
                return Some((&parser.raw[start..end], start - self.pattern_start));
            }
        }
    }
}
