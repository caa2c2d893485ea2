use filterlist_syntax::parser::{NetOption, OptionId, Parser, ParserOptions};
use filterlist_syntax::{Category, Flavor};
use test_case::test_case;

fn analyzed(line: &str) -> Parser {
    let mut parser = Parser::default();
    parser.analyze(line);
    parser
}

fn analyzed_extra(line: &str) -> Parser {
    let mut parser = Parser::default();
    parser.analyze(line);
    parser.analyze_extra();
    parser
}

#[test]
fn plain_hostname_filter() {
    let parser = analyzed("||example.com^");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert!(parser.pattern_is_left_hostname_anchored());
    assert!(parser.pattern_is_right_hostname_anchored());
    assert!(!parser.pattern_is_left_anchored());
    assert!(!parser.pattern_is_right_anchored());
    assert!(!parser.is_exception());
    assert!(parser.pattern_is_plain_hostname());
    assert_eq!(parser.get_net_pattern(), "example.com");
    assert!(!parser.has_options());
}

#[test]
fn exception_with_options() {
    let mut parser = analyzed("@@||ads.example.com/banner$image,~third-party");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert!(parser.is_exception());
    assert!(parser.pattern_is_left_hostname_anchored());
    assert_eq!(parser.get_net_pattern(), "ads.example.com/banner");
    let options: Vec<_> = parser.net_options().collect();
    assert_eq!(
        options,
        vec![
            NetOption {
                id: OptionId::Image,
                value: None,
                negated: false
            },
            NetOption {
                id: OptionId::ThirdParty,
                value: None,
                negated: true
            },
        ]
    );
    assert_eq!(OptionId::ThirdParty.canonical_name(), "3p");
    assert!(!parser.has_error());
}

#[test]
fn comment_line() {
    let parser = analyzed("! this is a comment");
    assert_eq!(parser.category(), Category::Comment);
    assert!(!parser.should_discard());
    let spans = parser.spans();
    assert_eq!(parser.span_text(spans.comment), "! this is a comment");
}

#[test_case("# hosts-file style comment")]
#[test_case("[Adblock Plus 2.0]")]
#[test_case("####")]
fn other_comment_heads(line: &str) {
    assert_eq!(analyzed(line).category(), Category::Comment);
}

#[test]
fn regex_filter() {
    let parser = analyzed_extra(r"/^https?:\/\/ads\./");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert!(parser.pattern_is_regex());
    assert_eq!(parser.get_net_pattern(), r"^https?:\/\/ads\.");
    assert!(!parser.has_error());
}

#[test]
fn invalid_regex_is_flagged() {
    let parser = analyzed_extra("/ad[/");
    assert!(parser.pattern_is_regex());
    assert!(parser.has_error());
    assert!(parser.should_discard());
}

#[test]
fn regex_disables_option_parsing() {
    let parser = analyzed(r"/ads\$tracker/");
    assert!(parser.pattern_is_regex());
    assert!(!parser.has_options());
    assert_eq!(parser.get_net_pattern(), r"ads\$tracker");
}

#[test]
fn match_all_with_redirect_and_domain() {
    let mut parser = analyzed("*$image,redirect=1x1.gif,domain=foo.com|~bar.*");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert!(parser.pattern_is_match_all());
    let options: Vec<_> = parser.net_options().collect();
    assert_eq!(options.len(), 3);
    assert_eq!(options[0].id, OptionId::Image);
    assert_eq!(options[1].id, OptionId::Redirect);
    assert_eq!(options[1].value, Some("1x1.gif"));
    assert_eq!(options[2].id, OptionId::Domain);
    assert_eq!(options[2].value, Some("foo.com|~bar.*"));
    assert!(!parser.has_error());
}

#[test]
fn inline_trailing_comment() {
    let parser = analyzed("||example.com^ # in-house");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert_eq!(parser.get_net_pattern(), "example.com");
    let spans = parser.spans();
    assert_eq!(parser.span_text(spans.comment), " # in-house");
}

#[test]
fn left_and_right_url_anchors() {
    let parser = analyzed("|https://example.com/ads|");
    assert!(parser.pattern_is_left_anchored());
    assert!(parser.pattern_is_right_anchored());
    assert_eq!(parser.get_net_pattern(), "https://example.com/ads");
}

#[test]
fn extra_at_signs_stay_in_pattern() {
    let parser = analyzed("@@@foo");
    assert!(parser.is_exception());
    assert_eq!(parser.get_net_pattern(), "@foo");
}

#[test]
fn caret_not_an_anchor_without_hostname_prefix() {
    let parser = analyzed("example.com/path^");
    assert!(!parser.pattern_is_right_hostname_anchored());
    assert!(parser.pattern_has_caret());
    assert_eq!(parser.get_net_pattern(), "example.com/path^");
}

#[test]
fn pointless_leading_wildcard() {
    let parser = analyzed("|*/ads");
    assert!(!parser.pattern_is_left_anchored());
    assert_eq!(parser.get_net_pattern(), "/ads");
    // The wildcard loss is a normalization, not a reason to discard.
    assert!(!parser.should_discard());
}

#[test]
fn wildcard_before_token_is_kept() {
    let parser = analyzed("*ads.example.com");
    assert!(parser.pattern_has_wildcard());
    assert_eq!(parser.get_net_pattern(), "*ads.example.com");
}

#[test]
fn trailing_wildcard_must_not_create_regex() {
    let parser = analyzed("/ads/*");
    // Dropping `*` would leave `/ads/`, which reads as a regex literal.
    assert_eq!(parser.get_net_pattern(), "/ads/*");
    assert!(!parser.pattern_is_regex());
}

#[test]
fn hosts_file_entry_keeps_hostname() {
    let parser = analyzed("0.0.0.0 ads.example.com");
    assert_eq!(parser.category(), Category::StaticNetFilter);
    assert!(parser.pattern_has_space());
    assert!(!parser.should_ignore());
    assert_eq!(parser.get_net_pattern(), "ads.example.com");
}

#[test_case("127.0.0.1 localhost")]
#[test_case("255.255.255.255 broadcasthost")]
#[test_case("::1 ip6-localhost")]
fn hosts_file_redirects_are_ignored(line: &str) {
    let parser = analyzed(line);
    assert!(parser.should_ignore());
    assert!(parser.should_discard());
}

#[test]
fn adguard_double_dollar_is_an_error() {
    let parser = analyzed("example.com$$script[tag-content=\"ads\"]");
    assert!(parser.has_error());
    assert!(parser.should_discard());
}

#[test]
fn lone_trailing_dollar_is_pattern_text() {
    let parser = analyzed("example.com/ads$");
    assert!(!parser.has_options());
    assert_eq!(parser.get_net_pattern(), "example.com/ads$");
}

#[test]
fn dubious_single_character_pattern() {
    let parser = analyzed_extra("a");
    assert!(parser.has_error());
    let parser = analyzed_extra("*");
    assert!(!parser.has_error());
    assert!(parser.pattern_is_match_all());
}

#[test_case("@@||example.com^$important"; "block-only option on exception")]
#[test_case("||example.com^$elemhide"; "allow-only option on block filter")]
#[test_case("||example.com^$~image,~bogus"; "unknown option")]
#[test_case("||example.com^$~important"; "negating a non-negatable option")]
#[test_case("||example.com^$domain"; "must-assign without assignment")]
#[test_case("||example.com^$image=foo"; "assignment on a plain option")]
#[test_case("||example.com^$image,"; "dangling comma")]
#[test_case("||example.com^$csp=a,csp=b"; "duplicate csp")]
#[test_case("||example.com^$redirect=a.gif"; "redirect without a network type")]
#[test_case("||example.com^$redirect=a.gif,image,script"; "redirect with two network types")]
#[test_case("||example.com^$redirect=a.gif,redirect-rule=b.gif,image"; "duplicate redirect directives")]
#[test_case("||example.com^$csp=default-src 'none',image"; "csp with a type option")]
#[test_case("||example.com^$denyallow=~foo.com"; "denyallow forbids negation")]
#[test_case("||example.com^$domain=foo..com"; "repeated periods in hostname")]
#[test_case("||example.com^$domain=-foo.com"; "leading dash in hostname")]
#[test_case("||example.com^$domain=foo.com|"; "dangling domain separator")]
fn option_errors(line: &str) {
    let mut parser = Parser::default();
    parser.analyze(line);
    parser.analyze_extra();
    assert!(parser.has_error(), "expected error for {line:?}");
}

#[test_case("@@||example.com^$elemhide"; "allow-only option on exception")]
#[test_case("@@||example.com^$csp"; "may-assign option unassigned on exception")]
#[test_case("||example.com^$domain=a-b.com|~c.de"; "dashes and negation in domain")]
#[test_case("||example.com^$denyallow=cdn.example.com"; "plain denyallow")]
#[test_case("||example.com^$csp=default-src 'self'"; "csp with a value")]
#[test_case("||example.com^$mp4"; "legacy redirect type")]
#[test_case("||example.com^$empty,mp4"; "legacy redirect types may coexist")]
#[test_case("||example.com^$redirect=1x1.gif,image,mp4"; "redirect alongside a legacy redirect type")]
fn option_successes(line: &str) {
    let mut parser = Parser::default();
    parser.analyze(line);
    parser.analyze_extra();
    assert!(!parser.has_error(), "unexpected error for {line:?}");
}

#[test]
fn unsupported_option() {
    let mut parser = Parser::default();
    parser.analyze("||example.com^$webrtc");
    parser.analyze_extra();
    assert!(parser.is_unsupported());
    assert!(parser.should_discard());
    assert!(!parser.has_error());
}

#[test]
fn pattern_tokens_and_offsets() {
    let parser = analyzed("@@||ads.example.com/banner$image");
    let tokens: Vec<_> = parser.pattern_tokens().collect();
    assert_eq!(
        tokens,
        vec![
            ("ads", 0),
            ("example", 4),
            ("com", 12),
            ("banner", 16)
        ]
    );
}

#[test]
fn pattern_tokens_avoid_wildcard_neighbors() {
    let parser = analyzed("foo*bar");
    assert_eq!(parser.pattern_tokens().count(), 0);

    let mut parser = Parser::default();
    parser.analyze("foo*bar");
    parser.set_max_token_length(3);
    // Long enough runs no longer care about a trailing wildcard; a
    // leading wildcard still disqualifies.
    let tokens: Vec<_> = parser.pattern_tokens().collect();
    assert_eq!(tokens, vec![("foo", 0)]);
}

#[test]
fn token_purity() {
    let parser = analyzed("||example.com/ad-42%7e/banner^");
    for (token, _) in parser.pattern_tokens() {
        assert!(
            token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'%'),
            "impure token {token:?}"
        );
    }
}

#[test]
fn pattern_to_lowercase_rewrites_raw() {
    let mut parser = Parser::default();
    parser.analyze("||EXAMPLE.com/Banner^");
    assert!(parser.pattern_has_uppercase());
    assert_eq!(parser.pattern_to_lowercase(), "example.com/banner^");
    assert!(!parser.pattern_has_uppercase());
    assert_eq!(parser.raw(), "||example.com/banner^");
}

#[test]
fn to_punycode_rewrites_hostname() {
    let mut parser = Parser::default();
    parser.analyze("||bücher.example^");
    assert!(parser.pattern_has_unicode());
    assert!(parser.to_punycode());
    assert!(!parser.pattern_has_unicode());
    assert_eq!(parser.get_net_pattern(), "xn--bcher-kva.example");
    assert!(parser.pattern_is_left_hostname_anchored());
}

#[test]
fn to_punycode_needs_a_unicode_hostname_prefix() {
    let mut parser = Parser::default();
    parser.analyze("||example.com/päth");
    assert!(!parser.to_punycode());

    let mut parser = Parser::default();
    parser.analyze("||example.com/ascii");
    assert!(parser.to_punycode());
}

#[test]
fn interactive_error_ranges() {
    let mut parser = Parser::new(ParserOptions { interactive: true });
    parser.analyze("||example.com^$bogus,image");
    parser.analyze_extra();
    assert!(parser.has_error());
    let ranges = parser.error_byte_ranges();
    assert_eq!(ranges.len(), 1);
    assert_eq!(&parser.raw()[ranges[0].clone()], "bogus");
}

#[test]
fn flavor_is_queryable() {
    let parser = analyzed("@@||example.com^");
    assert!(parser
        .flavor()
        .contains(Flavor::EXCEPTION | Flavor::NET_LEFT_HN_ANCHOR));
}
