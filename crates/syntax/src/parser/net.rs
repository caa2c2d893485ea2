//! Network-filter structural analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

use crate::bits::{CharClass, Flavor};

use super::{Parser, Span};

// Hostnames a hosts file redirects to the local machine; such entries are
// not filters.
static RE_HOSTS_REDIRECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:0\.0\.0\.0|(?:broadcast|local)host|local|ip6-\w+)\b").expect("hardcoded regex")
});

impl Parser {
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn analyze_net(&mut self) {
        let mut islice = self.left_space.end();
        let bound = self.net_bound();

        // Exception prefix: exactly two `@`s.
        self.exception = Span { i: islice, len: 0 };
        if islice < bound && self.class_at(islice).intersects(CharClass::AT) {
            let len = self.slice_len(islice);
            if len >= 2 {
                if len > 2 {
                    self.split_slice(islice, 2);
                }
                self.flavor |= Flavor::EXCEPTION;
                self.exception.len = 3;
                islice += 3;
            }
        }

        self.pattern = Span {
            i: islice,
            len: self.net_bound() - islice,
        };
        self.options_anchor = Span {
            i: self.net_bound(),
            len: 0,
        };
        self.options = self.options_anchor;

        // A pattern enclosed in slashes is a regex literal; regexes keep
        // their `$`s, so option parsing is disabled for them.
        let is_regex = {
            let Span { i, len } = self.pattern;
            len > 0
                && self.class_at(i).intersects(CharClass::SLASH)
                && ((len == 3 && self.slice_len(i) > 2)
                    || (len > 3 && self.class_at(i + len - 3).intersects(CharClass::SLASH)))
        };
        if is_regex {
            self.flavor |= Flavor::NET_REGEX;
        } else if self.all_bits.intersects(CharClass::DOLLAR) {
            self.split_options();
        }

        self.analyze_net_left_anchor();
        self.analyze_net_right_anchor();
        self.analyze_net_hosts_residue();
        self.eliminate_pointless();
    }

    // Locate the options anchor: the rightmost `$` run within the pattern.
    fn split_options(&mut self) {
        let pi = self.pattern.i;
        let mut i = self.pattern.end();
        loop {
            if i <= pi {
                return;
            }
            i -= 3;
            if self.class_at(i).intersects(CharClass::DOLLAR) {
                break;
            }
        }
        let dollar_len = self.slice_len(i);
        // A lone trailing `$` is pattern text, not an empty option list.
        if dollar_len == 1 && i + 3 >= self.pattern.end() {
            return;
        }
        if dollar_len > 1 {
            // AdGuard's `$$` HTML-filtering idiom: hostnames on the left,
            // element syntax on the right. Recognized, unsupported here.
            let mut before = CharClass::empty();
            let mut j = pi;
            while j < i {
                before |= self.class_at(j);
                j += 3;
            }
            let adguard_left = CharClass::HOSTNAME
                | CharClass::COMMA
                | CharClass::ASTERISK
                | CharClass::SPACE;
            if adguard_left.contains(before) {
                tracing::trace!("adguard `$$` syntax");
                self.flavor |= Flavor::ERROR;
                if self.interactive {
                    self.overlay_slices(i, i + 3, CharClass::ERROR);
                }
                return;
            }
            self.split_slice(i, dollar_len - 1);
            i += 3;
        }
        self.options_anchor = Span { i, len: 3 };
        self.options = Span {
            i: i + 3,
            len: self.net_bound() - (i + 3),
        };
        self.pattern.len = i - pi;
    }

    fn analyze_net_left_anchor(&mut self) {
        let i = self.pattern.i;
        if self.pattern.len == 0 || !self.class_at(i).intersects(CharClass::PIPE) {
            return;
        }
        let len = self.slice_len(i);
        if len == 1 {
            self.flavor |= Flavor::NET_LEFT_URL_ANCHOR;
        } else {
            if len > 2 {
                self.split_slice(i, 2);
            }
            self.flavor |= Flavor::NET_LEFT_HN_ANCHOR;
        }
        self.pattern_left_anchor = Span { i, len: 3 };
        self.pattern.i += 3;
        self.pattern.len -= 3;
    }

    fn analyze_net_right_anchor(&mut self) {
        if self.pattern.len == 0 {
            return;
        }
        let last = self.pattern.end() - 3;
        if self.class_at(last).intersects(CharClass::PIPE) {
            let len = self.slice_len(last);
            let anchor = if len > 1 {
                self.split_slice(last, len - 1);
                last + 3
            } else {
                last
            };
            self.flavor |= Flavor::NET_RIGHT_URL_ANCHOR;
            self.pattern_right_anchor = Span { i: anchor, len: 3 };
            self.pattern.len = anchor - self.pattern.i;
            return;
        }
        // A trailing `^` anchors the hostname end, but only on a filter
        // whose whole pattern is a left-anchored hostname.
        if self.class_at(last).intersects(CharClass::CARET)
            && self.slice_len(last) == 1
            && self.flavor.contains(Flavor::NET_LEFT_HN_ANCHOR)
        {
            let mut i = self.pattern.i;
            while i < last {
                if !CharClass::HOSTNAME.contains(self.class_at(i)) {
                    return;
                }
                i += 3;
            }
            self.flavor |= Flavor::NET_RIGHT_HN_ANCHOR;
            self.pattern_right_anchor = Span { i: last, len: 3 };
            self.pattern.len -= 3;
        }
    }

    // Space inside a pattern is in all likelihood a hosts file entry:
    // drop the address column, and ignore the whole line when what is
    // left is a local redirect, not a filter.
    fn analyze_net_hosts_residue(&mut self) {
        let Span { i: from, len } = self.pattern;
        let to = from + len;
        let mut last_space = None;
        let mut i = from;
        while i < to {
            if self.class_at(i).intersects(CharClass::SPACE) {
                last_space = Some(i);
            }
            i += 3;
        }
        let Some(last_space) = last_space else {
            return;
        };
        self.flavor |= Flavor::NET_SPACE_IN_PATTERN;
        self.overlay_slices(from, last_space + 3, CharClass::IGNORE);
        let (from, to) = self.effective_pattern();
        if RE_HOSTS_REDIRECT.is_match(self.text_between(from, to)) {
            self.flavor |= Flavor::IGNORE;
        }
    }

    // Drop wildcards which constrain nothing, and the anchors they strand.
    fn eliminate_pointless(&mut self) {
        if self.flavor.contains(Flavor::NET_REGEX) {
            return;
        }
        let (from, to) = self.effective_pattern();
        if from >= to
            || (to - from == 3 && self.class_at(from).intersects(CharClass::ASTERISK))
        {
            self.clear_left_anchor();
            self.clear_right_anchor();
            return;
        }
        if self.class_at(from).intersects(CharClass::ASTERISK)
            && !self.class_at(from + 3).intersects(CharClass::PATTERN_TOKEN)
        {
            self.slices[from] |= CharClass::IGNORE.bits();
            self.clear_left_anchor();
        }
        let (from, to) = self.effective_pattern();
        if to - from > 3
            && self.class_at(to - 3).intersects(CharClass::ASTERISK)
            && !self.class_at(to - 6).intersects(CharClass::PATTERN_TOKEN)
            && !self.would_become_regex(from, to - 3)
        {
            self.slices[to - 3] |= CharClass::IGNORE.bits();
            self.clear_right_anchor();
        }
    }

    // Whether the pattern restricted to `[from, to)` reads as a regex
    // literal; dropping a trailing wildcard must not manufacture one.
    fn would_become_regex(&self, from: usize, to: usize) -> bool {
        if to <= from {
            return false;
        }
        if !self.class_at(from).intersects(CharClass::SLASH)
            || !self.class_at(to - 3).intersects(CharClass::SLASH)
        {
            return false;
        }
        !(to - from == 3 && self.slice_len(from) == 1)
    }

    fn clear_left_anchor(&mut self) {
        if self.flavor.intersects(Flavor::NET_LEFT_ANCHOR) {
            self.flavor &= !Flavor::NET_LEFT_ANCHOR;
            let Span { i, len } = self.pattern_left_anchor;
            self.overlay_slices(i, i + len, CharClass::IGNORE);
        }
    }

    fn clear_right_anchor(&mut self) {
        if self.flavor.intersects(Flavor::NET_RIGHT_ANCHOR) {
            self.flavor &= !Flavor::NET_RIGHT_ANCHOR;
            let Span { i, len } = self.pattern_right_anchor;
            self.overlay_slices(i, i + len, CharClass::IGNORE);
        }
    }

    /// Oracle-backed second pass over a network filter.
    pub(crate) fn analyze_net_extra(&mut self) {
        if self.flavor.contains(Flavor::NET_REGEX) {
            let body = self.get_net_pattern().to_string();
            if !self.oracles.regex.is_valid(&body) {
                tracing::trace!("invalid regex pattern");
                self.flavor |= Flavor::ERROR;
                if self.interactive {
                    let Span { i, len } = self.pattern;
                    self.overlay_slices(i, i + len, CharClass::ERROR);
                }
            }
        } else if self.pattern_is_dubious() {
            self.flavor |= Flavor::ERROR;
            if self.interactive {
                let Span { i, len } = self.pattern;
                self.overlay_slices(i, i + len, CharClass::ERROR);
            }
        }
        self.prepare_net_options();
    }

    // A single-character pattern with no options matches half the web by
    // accident; `*` alone is the only deliberate way to say "everything".
    fn pattern_is_dubious(&self) -> bool {
        if self.options.len > 0 {
            return false;
        }
        let (from, to) = self.effective_pattern();
        to - from == 3
            && self.slice_len(from) == 1
            && !self.class_at(from).intersects(CharClass::ASTERISK)
    }
}
