//! Network-filter option parsing and the hostname-list validator shared
//! with extended-filter options.

use bitflags::bitflags;

use crate::bits::{Category, CharClass, Flavor};

use super::Parser;

bitflags! {
    /// Capability flags of a network option.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct OptionFlags: u16 {
        const CAN_NEGATE       = 1 << 0;
        const BLOCK_ONLY       = 1 << 1;
        const ALLOW_ONLY       = 1 << 2;
        const MUST_ASSIGN      = 1 << 3;
        const ALLOW_MAY_ASSIGN = 1 << 4;
        const DOMAIN_LIST      = 1 << 5;
        const TYPE             = 1 << 6;
        const NETWORK_TYPE     = 1 << 7;
        const REDIRECT_TYPE    = 1 << 8;
        const NOT_SUPPORTED    = 1 << 9;
    }
}

/// Canonical identity of a network option. Aliases resolve to one id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OptionId {
    #[default]
    Invalid,
    FirstParty,
    ThirdParty,
    All,
    Badfilter,
    Cname,
    Csp,
    Css,
    Denyallow,
    Doc,
    Domain,
    Ehide,
    Empty,
    Font,
    Frame,
    Genericblock,
    Ghide,
    Image,
    Important,
    InlineCss,
    InlineFont,
    InlineScript,
    MatchCase,
    Media,
    Mp4,
    Object,
    Other,
    Ping,
    Popunder,
    Popup,
    Redirect,
    RedirectRule,
    Removeparam,
    Script,
    Shide,
    Webrtc,
    Websocket,
    Xhr,
}

impl OptionId {
    /// The canonical textual name of the option.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            OptionId::Invalid => "",
            OptionId::FirstParty => "1p",
            OptionId::ThirdParty => "3p",
            OptionId::All => "all",
            OptionId::Badfilter => "badfilter",
            OptionId::Cname => "cname",
            OptionId::Csp => "csp",
            OptionId::Css => "css",
            OptionId::Denyallow => "denyallow",
            OptionId::Doc => "doc",
            OptionId::Domain => "domain",
            OptionId::Ehide => "ehide",
            OptionId::Empty => "empty",
            OptionId::Font => "font",
            OptionId::Frame => "frame",
            OptionId::Genericblock => "genericblock",
            OptionId::Ghide => "ghide",
            OptionId::Image => "image",
            OptionId::Important => "important",
            OptionId::InlineCss => "inline-css",
            OptionId::InlineFont => "inline-font",
            OptionId::InlineScript => "inline-script",
            OptionId::MatchCase => "match-case",
            OptionId::Media => "media",
            OptionId::Mp4 => "mp4",
            OptionId::Object => "object",
            OptionId::Other => "other",
            OptionId::Ping => "ping",
            OptionId::Popunder => "popunder",
            OptionId::Popup => "popup",
            OptionId::Redirect => "redirect",
            OptionId::RedirectRule => "redirect-rule",
            OptionId::Removeparam => "removeparam",
            OptionId::Script => "script",
            OptionId::Shide => "shide",
            OptionId::Webrtc => "webrtc",
            OptionId::Websocket => "websocket",
            OptionId::Xhr => "xhr",
        }
    }
}

// The option-token table, keyed by lowercase ASCII.
pub(crate) fn descriptor(token: &str) -> Option<(OptionId, OptionFlags)> {
    use OptionFlags as F;
    let net_type = F::TYPE | F::NETWORK_TYPE | F::CAN_NEGATE;
    Some(match token {
        "1p" | "first-party" => (OptionId::FirstParty, F::CAN_NEGATE),
        "3p" | "third-party" => (OptionId::ThirdParty, F::CAN_NEGATE),
        "all" => (OptionId::All, F::TYPE),
        "badfilter" => (OptionId::Badfilter, F::empty()),
        "cname" => (OptionId::Cname, F::ALLOW_ONLY),
        "csp" => (OptionId::Csp, F::MUST_ASSIGN | F::ALLOW_MAY_ASSIGN),
        "css" | "stylesheet" => (OptionId::Css, net_type),
        "denyallow" => (OptionId::Denyallow, F::MUST_ASSIGN | F::DOMAIN_LIST),
        "doc" | "document" => (OptionId::Doc, F::TYPE | F::CAN_NEGATE),
        "domain" => (OptionId::Domain, F::MUST_ASSIGN | F::DOMAIN_LIST),
        "ehide" | "elemhide" => (OptionId::Ehide, F::ALLOW_ONLY),
        "empty" => (OptionId::Empty, F::BLOCK_ONLY | F::REDIRECT_TYPE),
        "font" => (OptionId::Font, net_type),
        "frame" | "subdocument" => (OptionId::Frame, net_type),
        "genericblock" => (OptionId::Genericblock, F::ALLOW_ONLY | F::NOT_SUPPORTED),
        "generichide" | "ghide" => (OptionId::Ghide, F::ALLOW_ONLY),
        "image" => (OptionId::Image, net_type),
        "important" => (OptionId::Important, F::BLOCK_ONLY),
        "inline-css" => (OptionId::InlineCss, F::BLOCK_ONLY | F::TYPE),
        "inline-font" => (OptionId::InlineFont, F::BLOCK_ONLY | F::TYPE),
        "inline-script" => (OptionId::InlineScript, F::BLOCK_ONLY | F::TYPE),
        "match-case" => (OptionId::MatchCase, F::empty()),
        "media" => (OptionId::Media, net_type),
        "mp4" => (OptionId::Mp4, F::BLOCK_ONLY | F::REDIRECT_TYPE),
        "object" | "object-subrequest" => (OptionId::Object, net_type),
        "other" => (OptionId::Other, net_type),
        "beacon" | "ping" => (OptionId::Ping, net_type),
        "popunder" => (OptionId::Popunder, F::TYPE),
        "popup" => (OptionId::Popup, F::TYPE | F::CAN_NEGATE),
        "redirect" => (
            OptionId::Redirect,
            F::BLOCK_ONLY | F::MUST_ASSIGN | F::REDIRECT_TYPE,
        ),
        "redirect-rule" => (
            OptionId::RedirectRule,
            F::BLOCK_ONLY | F::MUST_ASSIGN | F::REDIRECT_TYPE,
        ),
        "queryprune" | "removeparam" => {
            (OptionId::Removeparam, F::MUST_ASSIGN | F::ALLOW_MAY_ASSIGN)
        }
        "script" => (OptionId::Script, net_type),
        "shide" | "specifichide" => (OptionId::Shide, F::ALLOW_ONLY),
        "webrtc" => (OptionId::Webrtc, F::NOT_SUPPORTED),
        "websocket" => (OptionId::Websocket, net_type),
        "xhr" | "xmlhttprequest" => (OptionId::Xhr, net_type),
        _ => return None,
    })
}

// One parsed option: slice positions plus the resolved descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OptionRecord {
    pub id: OptionId,
    pub flags: OptionFlags,
    pub negated: bool,
    pub error: bool,
    pub start: usize,
    pub token_start: usize,
    pub equals: Option<usize>,
    pub end: usize,
}

/// Hostname-list validation policy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DomainListPolicy {
    pub allow_entity: bool,
    pub allow_negation: bool,
}

impl Parser {
    // Phase one of option iteration: scan the options span into records
    // and enforce the cross-option rules. Runs at most once per line.
    pub(crate) fn prepare_net_options(&mut self) {
        if self.options_prepared {
            return;
        }
        self.options_prepared = true;
        if self.category != Category::StaticNetFilter || self.options.len == 0 {
            return;
        }

        let from = self.options.i;
        let to = self.options.end();
        let mut records = std::mem::take(&mut self.option_records);
        let mut i = from;
        let mut dangling_separator = false;
        while i < to {
            let mut rec = OptionRecord {
                start: i,
                token_start: i,
                end: to,
                ..OptionRecord::default()
            };
            if self.class_at(i).intersects(CharClass::TILDE) {
                if self.slice_len(i) != 1 {
                    rec.error = true;
                }
                rec.negated = true;
                i += 3;
                rec.token_start = i;
            }
            // Scan to the separating comma, noting the first `=`.
            let mut separator = to;
            let mut j = i;
            while j < to {
                let class = self.class_at(j);
                if class.intersects(CharClass::COMMA) {
                    if self.slice_len(j) != 1 {
                        rec.error = true;
                    }
                    separator = j;
                    break;
                }
                if class.intersects(CharClass::EQUAL) && rec.equals.is_none() {
                    if self.slice_len(j) == 1 {
                        rec.equals = Some(j);
                    } else {
                        rec.error = true;
                    }
                }
                j += 3;
            }
            rec.end = separator;

            let token_end = rec.equals.unwrap_or(rec.end);
            if rec.token_start >= token_end {
                rec.error = true;
            } else {
                let token = self
                    .text_between(rec.token_start, token_end)
                    .to_ascii_lowercase();
                match descriptor(&token) {
                    Some((id, flags)) => {
                        rec.id = id;
                        rec.flags = flags;
                    }
                    None => rec.error = true,
                }
            }
            if let Some(eq) = rec.equals {
                if eq + 3 >= rec.end {
                    rec.error = true;
                }
            }

            let exception = self.flavor.contains(Flavor::EXCEPTION);
            if rec.negated && !rec.flags.contains(OptionFlags::CAN_NEGATE) {
                rec.error = true;
            }
            if exception && rec.flags.contains(OptionFlags::BLOCK_ONLY) {
                rec.error = true;
            }
            if !exception && rec.flags.contains(OptionFlags::ALLOW_ONLY) {
                rec.error = true;
            }
            if rec.flags.contains(OptionFlags::MUST_ASSIGN)
                && rec.equals.is_none()
                && !(exception && rec.flags.contains(OptionFlags::ALLOW_MAY_ASSIGN))
            {
                rec.error = true;
            }
            if rec.equals.is_some()
                && !rec
                    .flags
                    .intersects(OptionFlags::MUST_ASSIGN | OptionFlags::ALLOW_MAY_ASSIGN)
            {
                rec.error = true;
            }
            if rec.flags.contains(OptionFlags::NOT_SUPPORTED) {
                self.flavor |= Flavor::UNSUPPORTED;
                if self.interactive {
                    self.overlay_slices(rec.start, rec.end, CharClass::ERROR);
                }
            }

            records.push(rec);
            i = rec.end;
            if i < to {
                i += 3;
                dangling_separator = i >= to;
            }
        }
        if dangling_separator {
            self.flavor |= Flavor::ERROR;
        }

        // Cross-option invariants.
        let mut redirect_count = 0;
        let mut csp_count = 0;
        let mut network_type_count = 0;
        let mut type_count = 0;
        for rec in &records {
            // Uniqueness applies to the assigned redirect directives only;
            // the legacy redirect types (`empty`, `mp4`) may coexist.
            if matches!(rec.id, OptionId::Redirect | OptionId::RedirectRule) {
                redirect_count += 1;
            }
            if rec.id == OptionId::Csp {
                csp_count += 1;
            }
            if rec.flags.contains(OptionFlags::NETWORK_TYPE) && !rec.negated {
                network_type_count += 1;
            }
            if rec.flags.contains(OptionFlags::TYPE) {
                type_count += 1;
            }
        }
        if redirect_count > 1 || csp_count > 1 {
            self.flavor |= Flavor::ERROR;
        }
        if redirect_count > 0 && network_type_count != 1 {
            self.flavor |= Flavor::ERROR;
        }
        if csp_count > 0 && type_count > 0 {
            self.flavor |= Flavor::ERROR;
        }

        // Hostname-list values.
        for index in 0..records.len() {
            let rec = records[index];
            if !rec.error && rec.flags.contains(OptionFlags::DOMAIN_LIST) {
                if let Some(eq) = rec.equals {
                    let policy = if rec.id == OptionId::Domain {
                        DomainListPolicy {
                            allow_entity: true,
                            allow_negation: true,
                        }
                    } else {
                        DomainListPolicy {
                            allow_entity: false,
                            allow_negation: false,
                        }
                    };
                    if !self.validate_domain_list(eq + 3, rec.end, CharClass::PIPE, policy) {
                        records[index].error = true;
                    }
                }
            }
        }

        let mut any_error = false;
        for rec in &records {
            if rec.error {
                any_error = true;
            }
        }
        if any_error {
            self.flavor |= Flavor::ERROR;
            if self.interactive {
                let bad: Vec<(usize, usize)> = records
                    .iter()
                    .filter(|rec| rec.error)
                    .map(|rec| (rec.start, rec.end))
                    .collect();
                for (start, end) in bad {
                    self.overlay_slices(start, end, CharClass::ERROR);
                }
            }
        }
        self.option_records = records;
    }

    // Structural validation of one `separator`-delimited hostname list.
    pub(crate) fn validate_domain_list(
        &mut self,
        from: usize,
        to: usize,
        separator: CharClass,
        policy: DomainListPolicy,
    ) -> bool {
        let mut all_valid = true;
        let mut entry_start = from;
        let mut i = from;
        loop {
            if i < to && !self.class_at(i).intersects(separator) {
                i += 3;
                continue;
            }
            let separator_ok = i >= to || self.slice_len(i) == 1;
            if !separator_ok || !self.validate_domain_entry(entry_start, i, policy) {
                all_valid = false;
                if self.interactive {
                    let end = if entry_start < i { i } else { to.min(i + 3) };
                    self.overlay_slices(entry_start, end, CharClass::ERROR);
                }
            }
            if i >= to {
                break;
            }
            i += 3;
            entry_start = i;
            if i >= to {
                // Dangling trailing separator.
                all_valid = false;
                self.flavor |= Flavor::ERROR;
                break;
            }
        }
        all_valid
    }

    fn validate_domain_entry(&self, from: usize, to: usize, policy: DomainListPolicy) -> bool {
        let mut i = from;
        if i >= to {
            return false;
        }
        if self.class_at(i).intersects(CharClass::TILDE) {
            if !policy.allow_negation || self.slice_len(i) != 1 {
                return false;
            }
            i += 3;
            if i >= to {
                return false;
            }
        }
        // A lone `*` matches everything; meaningful only with entities.
        if to - i == 3 && self.class_at(i).intersects(CharClass::ASTERISK) {
            return policy.allow_entity && self.slice_len(i) == 1;
        }
        if !self.class_at(i).intersects(CharClass::REGEX_WORD) {
            return false;
        }
        let last = to - 3;
        let entity = self.class_at(last).intersects(CharClass::ASTERISK);
        if entity {
            if !policy.allow_entity
                || to - i < 9
                || self.slice_len(last) != 1
                || !self.class_at(last - 3).intersects(CharClass::PERIOD)
            {
                return false;
            }
        } else if !self
            .class_at(last)
            .intersects(CharClass::ALPHANUM | CharClass::UNICODE)
        {
            return false;
        }
        let middle_end = if entity { last } else { to };
        let mut j = i;
        while j < middle_end {
            let class = self.class_at(j);
            if !CharClass::HOSTNAME.contains(class) {
                return false;
            }
            if class.intersects(CharClass::PERIOD) && self.slice_len(j) != 1 {
                return false;
            }
            if class.intersects(CharClass::DASH) {
                let prev_ok = j > i
                    && self
                        .class_at(j - 3)
                        .intersects(CharClass::ALPHANUM | CharClass::UNICODE);
                let next_ok = j + 3 < to
                    && self
                        .class_at(j + 3)
                        .intersects(CharClass::ALPHANUM | CharClass::UNICODE);
                if !prev_ok || !next_ok {
                    return false;
                }
            }
            j += 3;
        }
        true
    }

    /// Iterate the parsed network options. Valid after [`Parser::analyze`];
    /// invalidated by the next analysis.
    pub fn net_options(&mut self) -> NetOptionsIter<'_> {
        self.prepare_net_options();
        NetOptionsIter {
            parser: self,
            index: 0,
        }
    }

    /// Iterate the hostname entries of an extended filter's options.
    #[must_use]
    pub fn ext_options(&self) -> ExtOptionsIter<'_> {
        let (i, to) = if self.category == Category::StaticExtFilter {
            (self.options.i, self.options.end())
        } else {
            (0, 0)
        };
        ExtOptionsIter {
            parser: self,
            i,
            to,
        }
    }
}

/// One network option: canonical id, optional value, negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetOption<'a> {
    pub id: OptionId,
    pub value: Option<&'a str>,
    pub negated: bool,
}

pub struct NetOptionsIter<'a> {
    parser: &'a Parser,
    index: usize,
}

impl<'a> Iterator for NetOptionsIter<'a> {
    type Item = NetOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = self.parser.option_records.get(self.index)?;
        self.index += 1;
        let value = rec.equals.and_then(|eq| {
            if eq + 3 < rec.end {
                Some(self.parser.text_between(eq + 3, rec.end))
            } else {
                None
            }
        });
        Some(NetOption {
            id: rec.id,
            value,
            negated: rec.negated,
        })
    }
}

/// One hostname or entity entry of an extended filter's option list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtOption<'a> {
    pub hostname: &'a str,
    pub negated: bool,
}

pub struct ExtOptionsIter<'a> {
    parser: &'a Parser,
    i: usize,
    to: usize,
}

impl<'a> Iterator for ExtOptionsIter<'a> {
    type Item = ExtOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.to {
            let start = self.i;
            let mut end = self.i;
            while end < self.to && !self.parser.class_at(end).intersects(CharClass::COMMA) {
                end += 3;
            }
            self.i = end + 3;
            let mut from = start;
            let mut negated = false;
            if from < end && self.parser.class_at(from).intersects(CharClass::TILDE) {
                negated = true;
                from += 3;
            }
            if from < end {
                return Some(ExtOption {
                    hostname: self.parser.text_between(from, end),
                    negated,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_aliases_resolve() {
        let (id, _) = descriptor("third-party").unwrap();
        assert_eq!(id, OptionId::ThirdParty);
        assert_eq!(id.canonical_name(), "3p");
        let (id, _) = descriptor("xmlhttprequest").unwrap();
        assert_eq!(id, OptionId::Xhr);
        let (id, _) = descriptor("subdocument").unwrap();
        assert_eq!(id, OptionId::Frame);
        assert!(descriptor("no-such-option").is_none());
    }

    #[test]
    fn descriptor_capabilities() {
        let (_, flags) = descriptor("image").unwrap();
        assert!(flags.contains(OptionFlags::NETWORK_TYPE | OptionFlags::CAN_NEGATE));
        let (_, flags) = descriptor("domain").unwrap();
        assert!(flags.contains(OptionFlags::MUST_ASSIGN | OptionFlags::DOMAIN_LIST));
        let (_, flags) = descriptor("webrtc").unwrap();
        assert!(flags.contains(OptionFlags::NOT_SUPPORTED));
        let (_, flags) = descriptor("important").unwrap();
        assert!(flags.contains(OptionFlags::BLOCK_ONLY));
    }
}
