//! This module contains the character-class and flavor bit declarations
//! the rest of the analyzer is built on.
//!
//! Every byte of a filter line maps to a small set of class bits; maximal
//! runs of bytes sharing the same class form the slices of the slice array.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Character-class bits carried by every slice of the slice array.
    ///
    /// The two topmost bits are overlays: they are OR-ed into slice cells
    /// during analysis and never come out of the byte-class table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct CharClass: u32 {
        const SPACE         = 1 << 0;
        const EXCL          = 1 << 1;
        const HASH          = 1 << 2;
        const DOLLAR        = 1 << 3;
        const PERCENT       = 1 << 4;
        const PAREN         = 1 << 5;
        const ASTERISK      = 1 << 6;
        const PLUS          = 1 << 7;
        const COMMA         = 1 << 8;
        const DASH          = 1 << 9;
        const PERIOD        = 1 << 10;
        const SLASH         = 1 << 11;
        const NUM           = 1 << 12;
        const EQUAL         = 1 << 13;
        const QUESTION      = 1 << 14;
        const AT            = 1 << 15;
        const ALPHA         = 1 << 16;
        const UPPERCASE     = 1 << 17;
        const SQUAREBRACKET = 1 << 18;
        const BACKSLASH     = 1 << 19;
        const CARET         = 1 << 20;
        const UNDERSCORE    = 1 << 21;
        const BRACE         = 1 << 22;
        const PIPE          = 1 << 23;
        const TILDE         = 1 << 24;
        const OPENING       = 1 << 25;
        const CLOSING       = 1 << 26;
        const UNICODE       = 1 << 27;

        // Overlay bits, not part of any byte's class.
        const IGNORE        = 1 << 30;
        const ERROR         = 1 << 31;

        // Composite masks.
        const ALPHANUM      = Self::NUM.bits() | Self::ALPHA.bits();
        const HOSTNAME      = Self::NUM.bits()
            | Self::ALPHA.bits()
            | Self::UPPERCASE.bits()
            | Self::DASH.bits()
            | Self::PERIOD.bits()
            | Self::UNDERSCORE.bits()
            | Self::UNICODE.bits();
        const PATTERN_TOKEN = Self::NUM.bits() | Self::ALPHA.bits() | Self::PERCENT.bits();
        const LINE_COMMENT  = Self::EXCL.bits() | Self::HASH.bits() | Self::SQUAREBRACKET.bits();
        const REGEX_WORD    = Self::NUM.bits()
            | Self::ALPHA.bits()
            | Self::UNDERSCORE.bits()
            | Self::UNICODE.bits();
        const OVERLAY       = Self::IGNORE.bits() | Self::ERROR.bits();
    }
}

impl CharClass {
    /// The class bits without the overlay bits.
    #[must_use]
    pub const fn class(self) -> Self {
        self.difference(Self::OVERLAY)
    }
}

const fn class_bits(byte: u8) -> u32 {
    match byte {
        b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | b' ' => CharClass::SPACE.bits(),
        b'!' => CharClass::EXCL.bits(),
        b'#' => CharClass::HASH.bits(),
        b'$' => CharClass::DOLLAR.bits(),
        b'%' => CharClass::PERCENT.bits(),
        b'(' => CharClass::PAREN.bits() | CharClass::OPENING.bits(),
        b')' => CharClass::PAREN.bits() | CharClass::CLOSING.bits(),
        b'*' => CharClass::ASTERISK.bits(),
        b'+' => CharClass::PLUS.bits(),
        b',' => CharClass::COMMA.bits(),
        b'-' => CharClass::DASH.bits(),
        b'.' => CharClass::PERIOD.bits(),
        b'/' => CharClass::SLASH.bits(),
        b'0'..=b'9' => CharClass::NUM.bits(),
        b'=' => CharClass::EQUAL.bits(),
        b'?' => CharClass::QUESTION.bits(),
        b'@' => CharClass::AT.bits(),
        b'A'..=b'Z' => CharClass::ALPHA.bits() | CharClass::UPPERCASE.bits(),
        b'[' => CharClass::SQUAREBRACKET.bits() | CharClass::OPENING.bits(),
        b'\\' => CharClass::BACKSLASH.bits(),
        b']' => CharClass::SQUAREBRACKET.bits() | CharClass::CLOSING.bits(),
        b'^' => CharClass::CARET.bits(),
        b'_' => CharClass::UNDERSCORE.bits(),
        b'a'..=b'z' => CharClass::ALPHA.bits(),
        b'{' => CharClass::BRACE.bits() | CharClass::OPENING.bits(),
        b'|' => CharClass::PIPE.bits(),
        b'}' => CharClass::BRACE.bits() | CharClass::CLOSING.bits(),
        b'~' => CharClass::TILDE.bits(),
        _ => 0,
    }
}

static CLASS_TABLE: [u32; 128] = {
    let mut table = [0u32; 128];
    let mut byte = 0usize;
    while byte < 128 {
        table[byte] = class_bits(byte as u8);
        byte += 1;
    }
    table
};

/// The character class of a single byte. Bytes outside the ASCII range are
/// the interior of UTF-8 sequences and class as `UNICODE | ALPHA`.
#[must_use]
pub fn class_of(byte: u8) -> CharClass {
    if byte < 0x80 {
        CharClass::from_bits_retain(CLASS_TABLE[byte as usize])
    } else {
        CharClass::UNICODE.union(CharClass::ALPHA)
    }
}

bitflags! {
    /// Per-line semantic properties, orthogonal to [`Category`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flavor: u32 {
        const EXCEPTION            = 1 << 0;
        const NET_REGEX            = 1 << 1;
        const NET_LEFT_URL_ANCHOR  = 1 << 2;
        const NET_RIGHT_URL_ANCHOR = 1 << 3;
        const NET_LEFT_HN_ANCHOR   = 1 << 4;
        const NET_RIGHT_HN_ANCHOR  = 1 << 5;
        const NET_SPACE_IN_PATTERN = 1 << 6;
        const EXT_STYLE            = 1 << 7;
        const EXT_STRONG           = 1 << 8;
        const EXT_COSMETIC         = 1 << 9;
        const EXT_SCRIPTLET        = 1 << 10;
        const EXT_HTML             = 1 << 11;
        const IGNORE               = 1 << 12;
        const UNSUPPORTED          = 1 << 13;
        const ERROR                = 1 << 14;

        const NET_LEFT_ANCHOR  = Self::NET_LEFT_URL_ANCHOR.bits() | Self::NET_LEFT_HN_ANCHOR.bits();
        const NET_RIGHT_ANCHOR = Self::NET_RIGHT_URL_ANCHOR.bits() | Self::NET_RIGHT_HN_ANCHOR.bits();
        const DISCARD          = Self::IGNORE.bits() | Self::UNSUPPORTED.bits() | Self::ERROR.bits();
    }
}

/// The coarse classification of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[default]
    None,
    Comment,
    StaticExtFilter,
    StaticNetFilter,
}
