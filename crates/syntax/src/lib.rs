//! A static content-filter syntax analyzer.
//!
//! One line of filter-list text in, a structured zero-copy description
//! out: character-class slices, named spans, a category, flavor bits, and
//! iterators over options and pattern tokens. Downstream compilers and
//! editors both work from the same analysis.

#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::single_match_else,
    clippy::too_many_lines
)]

pub mod bits;
pub mod oracles;
pub mod parser;
pub mod selector;
mod util;

pub use bits::{Category, CharClass, Flavor};
pub use parser::{Parser, ParserOptions, Span, Spans};
