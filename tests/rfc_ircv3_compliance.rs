//! Comprehensive RFC 1459/2812 and IRCv3 compliance tests.
//!
//! This module tests specific edge cases and requirements from:
//! - RFC 1459: Internet Relay Chat Protocol
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - IRCv3 Message Tags: https://ircv3.net/specs/extensions/message-tags

use ircflow::message::tags::{escape_tag_value, unescape_tag_value};
use ircflow::Message;

// =============================================================================
// IRCv3 MESSAGE TAGS ESCAPING (https://ircv3.net/specs/extensions/message-tags)
// =============================================================================

mod tag_escaping {
    use super::*;

    #[test]
    fn test_unescape_semicolon() {
        assert_eq!(unescape_tag_value("a\\:b"), "a;b");
    }

    #[test]
    fn test_unescape_space() {
        assert_eq!(unescape_tag_value("hello\\sworld"), "hello world");
    }

    #[test]
    fn test_unescape_backslash() {
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
    }

    #[test]
    fn test_unescape_carriage_return() {
        assert_eq!(unescape_tag_value("line\\rend"), "line\rend");
    }

    #[test]
    fn test_unescape_line_feed() {
        assert_eq!(unescape_tag_value("line\\nend"), "line\nend");
    }

    #[test]
    fn test_unescape_combined() {
        let input = "a\\:b\\sc\\\\d\\re\\nf";
        let expected = "a;b c\\d\re\nf";
        assert_eq!(unescape_tag_value(input), expected);
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
    }

    #[test]
    fn test_unescape_unknown_escape() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_escape_roundtrip() {
        let test_values = [
            "simple",
            "with space",
            "with;semicolon",
            "with\\backslash",
            "with\nnewline",
            "with\rcarriage",
            "complex; \\ \n \r all",
        ];

        for original in test_values {
            let mut escaped = String::new();
            escape_tag_value(&mut escaped, original).unwrap();
            let unescaped = unescape_tag_value(&escaped);
            assert_eq!(
                unescaped, original,
                "roundtrip failed: '{original}' -> '{escaped}' -> '{unescaped}'"
            );
        }
    }
}

// =============================================================================
// IRCv3 TAG PARSING IN MESSAGES
// =============================================================================

mod tag_parsing {
    use super::*;

    #[test]
    fn test_tag_with_escaped_semicolon() {
        let raw = "@key=value\\:with\\:semicolons :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert_eq!(msg.tag("key"), Some("value;with;semicolons"));
    }

    #[test]
    fn test_tag_with_escaped_spaces() {
        let raw = "@key=hello\\sworld :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert_eq!(msg.tag("key"), Some("hello world"));
    }

    #[test]
    fn test_tag_without_value() {
        let raw = "@+typing :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert!(msg.has_tag("typing"));
        assert_eq!(msg.tag("typing"), None);
    }

    #[test]
    fn test_multiple_tags_mixed() {
        let raw = "@+typing;time=2023-01-01T00:00:00Z;msgid=abc :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert!(msg.has_tag("typing"));
        assert_eq!(msg.tag("time"), Some("2023-01-01T00:00:00Z"));
        assert_eq!(msg.tag("msgid"), Some("abc"));
    }

    #[test]
    fn test_client_only_tag_prefix() {
        let raw = "@+example.com/custom=value :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert_eq!(msg.tag("example.com/custom"), Some("value"));
        assert!(msg.tags.iter().any(|t| t.client_only));
    }

    #[test]
    fn test_vendor_prefixed_tag() {
        let raw = "@example.com/foo=bar :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert_eq!(msg.tag("example.com/foo"), Some("bar"));
    }
}

// =============================================================================
// RFC 1459/2812 MESSAGE FORMAT
// =============================================================================

mod message_format {
    use super::*;

    #[test]
    fn test_max_line_length_512() {
        let long_text = "a".repeat(500);
        let raw = format!("PRIVMSG #ch :{long_text}\r\n");

        let msg = Message::parse(&raw).expect("should parse");
        assert_eq!(msg.trailing.as_deref().unwrap().len(), 500);
    }

    #[test]
    fn test_crlf_line_ending() {
        let msg = Message::parse("PING :server\r\n").expect("should parse with CRLF");
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn test_lf_only_line_ending() {
        let msg = Message::parse("PING :server\n").expect("should parse with LF only");
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn test_no_line_ending() {
        let msg = Message::parse("PING :server").expect("should parse without line ending");
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn test_empty_trailing_parameter() {
        let msg = Message::parse("PRIVMSG #channel :").expect("should parse");
        assert_eq!(msg.all_params(), vec!["#channel", ""]);
    }

    #[test]
    fn test_trailing_with_spaces() {
        let msg = Message::parse(":nick PRIVMSG #ch :hello world with spaces").expect("should parse");
        assert_eq!(msg.trailing.as_deref(), Some("hello world with spaces"));
    }

    #[test]
    fn test_trailing_preserves_leading_colon() {
        let msg = Message::parse("PRIVMSG #ch ::starts with colon").expect("should parse");
        assert_eq!(msg.trailing.as_deref(), Some(":starts with colon"));
    }

    #[test]
    fn test_numeric_command() {
        let msg = Message::parse(":server 001 nick :Welcome to the network").expect("should parse");
        assert_eq!(msg.command, "001");
    }

    #[test]
    fn test_max_params_15() {
        let raw = "CMD 1 2 3 4 5 6 7 8 9 10 11 12 13 14 :15th trailing";
        let msg = Message::parse(raw).expect("should parse 15 params");
        assert_eq!(msg.all_params().len(), 15);
        assert_eq!(msg.trailing.as_deref(), Some("15th trailing"));
    }
}

// =============================================================================
// SOURCE PARSING (RFC 2812 Section 2.3.1)
// =============================================================================

mod source_parsing {
    use super::*;

    #[test]
    fn test_full_user_prefix() {
        let raw = ":nick!user@host.example.com PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        let source = msg.source.unwrap();
        assert_eq!(source.name, "nick");
        assert_eq!(source.user.as_deref(), Some("user"));
        assert_eq!(source.host.as_deref(), Some("host.example.com"));
    }

    #[test]
    fn test_nick_only_prefix() {
        let raw = ":nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse");
        assert_eq!(msg.source.unwrap().name, "nick");
    }

    #[test]
    fn test_server_prefix() {
        let raw = ":irc.example.com 001 nick :Welcome";
        let msg = Message::parse(raw).expect("should parse");
        assert!(msg.source.unwrap().is_server());
    }

    #[test]
    fn test_ipv6_host() {
        let raw = ":nick!user@2001:db8::1 PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse IPv6 host");
        assert_eq!(msg.source.unwrap().name, "nick");
    }

    #[test]
    fn test_cloaked_host() {
        let raw = ":nick!user@user/nick/cloaked PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse cloaked host");
        assert_eq!(msg.source.unwrap().host.as_deref(), Some("user/nick/cloaked"));
    }
}

// =============================================================================
// CHANNEL NAMES (RFC 2812 Section 1.3)
// =============================================================================

mod channel_names {
    use super::*;

    #[test]
    fn test_standard_channel() {
        let msg = Message::parse("JOIN #channel").expect("should parse");
        assert_eq!(msg.params, vec!["#channel"]);
    }

    #[test]
    fn test_local_channel() {
        let msg = Message::parse("JOIN &localchan").expect("should parse");
        assert_eq!(msg.params, vec!["&localchan"]);
    }

    #[test]
    fn test_channel_with_special_chars() {
        let msg = Message::parse("JOIN #foo-bar_baz").expect("should parse");
        assert_eq!(msg.params, vec!["#foo-bar_baz"]);
    }

    #[test]
    fn test_multiple_channels_join() {
        let msg = Message::parse("JOIN #chan1,#chan2,#chan3").expect("should parse");
        assert_eq!(msg.params, vec!["#chan1,#chan2,#chan3"]);
    }
}

// =============================================================================
// UTF-8 HANDLING (IRCv3 implies UTF-8)
// =============================================================================

mod utf8_handling {
    use super::*;

    #[test]
    fn test_utf8_in_message() {
        let raw = ":nick PRIVMSG #ch :Hello 世界 🌍";
        let msg = Message::parse(raw).expect("should parse UTF-8");
        assert_eq!(msg.trailing.as_deref(), Some("Hello 世界 🌍"));
    }

    #[test]
    fn test_utf8_in_nick() {
        let raw = ":Ñoño!user@host PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse UTF-8 nick");
        assert_eq!(msg.source.unwrap().name, "Ñoño");
    }

    #[test]
    fn test_utf8_in_tag_value() {
        let raw = "@label=föö :nick PRIVMSG #ch :hi";
        let msg = Message::parse(raw).expect("should parse UTF-8 in tag");
        assert_eq!(msg.tag("label"), Some("föö"));
    }

    #[test]
    fn test_emoji_in_message() {
        let raw = ":nick PRIVMSG #ch :🎉🎊🎈";
        let msg = Message::parse(raw).expect("should parse emoji");
        assert_eq!(msg.trailing.as_deref(), Some("🎉🎊🎈"));
    }
}

// =============================================================================
// ROUND-TRIP COMPLIANCE
// =============================================================================

mod roundtrip {
    use super::*;

    fn assert_roundtrip(raw: &str) {
        let msg = Message::parse(raw).expect("should parse");
        let serialized = msg.to_wire().expect("should serialize");
        let reparsed = Message::parse(&serialized).expect("should reparse");
        assert_eq!(msg, reparsed, "roundtrip failed for: {raw}");
    }

    #[test]
    fn test_roundtrip_simple() {
        assert_roundtrip("PING :server");
    }

    #[test]
    fn test_roundtrip_with_prefix() {
        assert_roundtrip(":nick!user@host PRIVMSG #channel :Hello world");
    }

    #[test]
    fn test_roundtrip_with_tags() {
        assert_roundtrip("@time=2023-01-01T00:00:00Z;msgid=abc :nick PRIVMSG #ch :Tagged");
    }

    #[test]
    fn test_roundtrip_empty_trailing() {
        assert_roundtrip("PRIVMSG #channel :");
    }

    #[test]
    fn test_roundtrip_numeric() {
        assert_roundtrip(":server 001 nick :Welcome to the network");
    }

    #[test]
    fn test_roundtrip_with_escaped_tags() {
        let mut original = Message::new("PING", vec!["test".to_string()]);
        original
            .tags
            .push(ircflow::Tag::with_value("key", "value;with;semicolons"));

        let serialized = original.to_wire().expect("should serialize");
        let reparsed = Message::parse(&serialized).expect("should reparse");
        assert_eq!(original, reparsed);
        assert_eq!(reparsed.tag("key"), Some("value;with;semicolons"));
    }
}

// =============================================================================
// COMMAND-SPECIFIC TESTS
// =============================================================================

mod commands {
    use super::*;

    #[test]
    fn test_privmsg_requires_target_and_text() {
        let msg = Message::parse("PRIVMSG #channel :Hello").unwrap();
        assert_eq!(msg.params, vec!["#channel"]);
        assert_eq!(msg.trailing.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_notice_similar_to_privmsg() {
        let msg = Message::parse("NOTICE #channel :Hello").unwrap();
        assert_eq!(msg.command, "NOTICE");
        assert_eq!(msg.params, vec!["#channel"]);
        assert_eq!(msg.trailing.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_join_with_key() {
        let msg = Message::parse("JOIN #channel secretkey").unwrap();
        assert_eq!(msg.params, vec!["#channel", "secretkey"]);
    }

    #[test]
    fn test_part_with_message() {
        let msg = Message::parse("PART #channel :Goodbye!").unwrap();
        assert_eq!(msg.params, vec!["#channel"]);
        assert_eq!(msg.trailing.as_deref(), Some("Goodbye!"));
    }

    #[test]
    fn test_quit_with_message() {
        let msg = Message::parse("QUIT :Gone fishing").unwrap();
        assert_eq!(msg.trailing.as_deref(), Some("Gone fishing"));
    }

    #[test]
    fn test_mode_channel() {
        let msg = Message::parse("MODE #channel +o nick").unwrap();
        assert_eq!(msg.command, "MODE");
        assert_eq!(msg.params, vec!["#channel", "+o", "nick"]);
    }

    #[test]
    fn test_kick_with_reason() {
        let msg = Message::parse("KICK #channel nick :Bad behavior").unwrap();
        assert_eq!(msg.params, vec!["#channel", "nick"]);
        assert_eq!(msg.trailing.as_deref(), Some("Bad behavior"));
    }
}

// =============================================================================
// EDGE CASES AND ERROR HANDLING
// =============================================================================

mod edge_cases {
    use super::*;

    #[test]
    fn test_empty_message_fails() {
        assert!(Message::parse("").is_err());
    }

    #[test]
    fn test_multiple_consecutive_spaces() {
        // Extra spaces between parts should not panic, even if rejected.
        let _ = Message::parse(":nick  PRIVMSG  #ch  :hello");
    }

    #[test]
    fn test_very_long_nick() {
        let long_nick = "a".repeat(100);
        let raw = format!(":{long_nick}!user@host PRIVMSG #ch :hi");
        let msg = Message::parse(&raw).expect("should handle long nick");
        assert_eq!(msg.source.unwrap().name, long_nick);
    }

    #[test]
    fn test_trailing_only_colon() {
        let msg = Message::parse("PRIVMSG #ch ::").expect("should parse");
        assert_eq!(msg.trailing.as_deref(), Some(":"));
    }
}
