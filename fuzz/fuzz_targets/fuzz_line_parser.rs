//! Fuzz target for the line framer.
//!
//! Feeds arbitrary byte streams through the parser in random-sized chunks;
//! framing must never panic and never hand out a line over the cap.

#![no_main]

use libfuzzer_sys::fuzz_target;
use perch::{LineParser, MAX_LINE_LENGTH};

fuzz_target!(|data: &[u8]| {
    let mut parser = LineParser::new();

    for chunk in data.chunks(7) {
        parser.extend(chunk);
        loop {
            match parser.next_line() {
                Ok(Some(line)) => assert!(line.len() <= MAX_LINE_LENGTH),
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
