#![no_main]
use filterlist_syntax::Parser;

#[macro_use]
extern crate libfuzzer_sys;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let mut parser = Parser::default();
        for line in s.lines() {
            parser.analyze(line);
            parser.analyze_extra();
            let _ = parser.net_options().count();
            let _ = parser.pattern_tokens().count();
        }
    }
});
