//! Universal invariants, checked over a mixed corpus.

use filterlist_syntax::{Category, Parser, Span};
use test_case::test_case;

const CORPUS: &[&str] = &[
    "",
    "   ",
    "! a comment",
    "# hosts-style comment",
    "[Adblock Plus 2.0]",
    "||example.com^",
    "@@||ads.example.com/banner$image,~third-party",
    "*$image,redirect=1x1.gif,domain=foo.com|~bar.*",
    r"/^https?:\/\/ads\./",
    "|https://example.com/ads|",
    "@@@foo",
    "|||example.com",
    "foo||",
    "|*/ads",
    "/ads/*",
    "0.0.0.0 ads.example.com",
    "127.0.0.1 localhost",
    "||example.com^ # trailing comment",
    "example.com$$script[tag-content=\"x\"]",
    "example.com/ads$",
    "example.com##.ad-banner",
    "example.com#@#+js(nowebrtc)",
    "example.org##.container > .ad:has-text(/sponsor/i)",
    "example.com###adDiv",
    "example.com#$#body { overflow: hidden!important; }",
    "example.com#%#window.x = 1",
    "##.ad",
    "## not a filter",
    "||EXAMPLE.com/Banner^",
    "||bücher.example^",
];

fn spans_in_order(parser: &Parser) -> Vec<Span> {
    let spans = parser.spans();
    let mut all = vec![
        spans.left_space,
        spans.exception,
        spans.pattern_left_anchor,
        spans.pattern,
        spans.pattern_right_anchor,
        spans.options_anchor,
        spans.options,
        spans.comment,
        spans.right_space,
    ];
    all.retain(|span| span.len > 0);
    all.sort_by_key(|span| span.i);
    all
}

#[test]
fn slice_contiguity() {
    let mut parser = Parser::default();
    for line in CORPUS {
        parser.analyze(line);
        let slices = parser.slices();
        let mut expected_origin = 0;
        for triplet in slices.chunks_exact(3) {
            assert_eq!(triplet[1], expected_origin, "line {line:?}");
            expected_origin += triplet[2];
        }
        assert_eq!(expected_origin as usize, line.len(), "line {line:?}");
    }
}

#[test]
fn span_coverage() {
    let mut parser = Parser::default();
    for line in CORPUS {
        parser.analyze(line);
        let spans = spans_in_order(&parser);
        let covered: usize = spans.iter().map(|span| span.len).sum();
        let eol = parser.spans().eol;
        assert_eq!(covered, eol.i, "line {line:?}");
        // Non-overlapping and contiguous.
        let mut cursor = 0;
        for span in spans {
            assert_eq!(span.i, cursor, "line {line:?}");
            cursor = span.end();
        }
    }
}

#[test]
fn round_trip() {
    let mut parser = Parser::default();
    for line in CORPUS {
        parser.analyze(line);
        let rebuilt: String = spans_in_order(&parser)
            .into_iter()
            .map(|span| parser.span_text(span))
            .collect();
        assert_eq!(rebuilt, **line, "line {line:?}");
    }
}

#[test]
fn idempotence() {
    let mut first = Parser::default();
    let mut second = Parser::default();
    for line in CORPUS {
        first.analyze(line);
        first.analyze_extra();
        second.analyze(line);
        second.analyze(line);
        second.analyze_extra();
        assert_eq!(first.slices(), second.slices(), "line {line:?}");
        assert_eq!(first.spans(), second.spans(), "line {line:?}");
        assert_eq!(first.category(), second.category(), "line {line:?}");
        assert_eq!(first.flavor(), second.flavor(), "line {line:?}");
    }
}

#[test_case("", true ; "empty")]
#[test_case("   ", true ; "spaces")]
#[test_case("\t\t", true ; "tabs")]
#[test_case("x", false ; "non_blank")]
fn blank_lines(line: &str, blank: bool) {
    let mut parser = Parser::default();
    parser.analyze(line);
    assert_eq!(parser.is_blank(), blank);
    if blank {
        assert_eq!(parser.category(), Category::None);
    }
}

#[test]
fn categories_are_disjoint() {
    let mut parser = Parser::default();
    for line in CORPUS {
        parser.analyze(line);
        let flags = [
            parser.is_blank(),
            parser.is_comment(),
            parser.is_net_filter(),
            parser.is_ext_filter(),
        ];
        assert_eq!(
            flags.iter().filter(|&&b| b).count(),
            1,
            "line {line:?}"
        );
    }
}

#[test]
fn buffers_are_reused() {
    let mut parser = Parser::default();
    parser.analyze("||example.com^$image");
    let capacity = parser.slices().len();
    parser.analyze("!");
    assert!(parser.slices().len() <= capacity);
    parser.analyze("||example.com^$image");
    assert_eq!(parser.get_net_pattern(), "example.com");
}
