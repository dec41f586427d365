//! Parse a wire line into an owned [`Message`].

use super::nom_parser::ParsedMessage;
use super::tags;
use super::Message;
use crate::error::MessageParseError;
use crate::prefix::Source;

impl Message {
    /// Parse a single IRC wire line (without its trailing `\r\n`, though a
    /// trailing `\r`, `\n`, or `\r\n` is tolerated and stripped).
    pub fn parse(line: &str) -> Result<Message, MessageParseError> {
        if line.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);

        let parsed = ParsedMessage::parse(trimmed).map_err(|_| MessageParseError::MissingCommand)?;

        let tags = match parsed.tags {
            Some(raw) => tags::parse_tags(raw)?,
            None => Vec::new(),
        };

        let source = match parsed.prefix {
            Some("") => return Err(MessageParseError::EmptySource),
            Some(raw) => Some(Source::parse(raw)),
            None => None,
        };

        if !is_valid_command_token(parsed.command) {
            return Err(MessageParseError::InvalidCommand(
                parsed.command.to_string(),
            ));
        }

        let mut params: Vec<String> = parsed.params.iter().map(|p| p.to_string()).collect();
        let mut trailing = None;
        let mut empty_trailing = false;
        if parsed.had_trailing {
            let last = params.pop().unwrap_or_default();
            empty_trailing = last.is_empty();
            trailing = Some(last);
        }

        Ok(Message {
            tags,
            source,
            command: parsed.command.to_uppercase(),
            params,
            trailing,
            empty_trailing,
            sensitive: is_sensitive_command(parsed.command),
            echo: false,
            raw: Some(line.to_string()),
        })
    }
}

fn is_valid_command_token(command: &str) -> bool {
    if command.is_empty() {
        return false;
    }
    if command.chars().all(|c| c.is_ascii_alphabetic()) {
        return true;
    }
    command.len() == 3 && command.chars().all(|c| c.is_ascii_digit())
}

fn is_sensitive_command(command: &str) -> bool {
    matches!(
        command.to_ascii_uppercase().as_str(),
        "PASS" | "AUTHENTICATE" | "OPER"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_privmsg() {
        let m = Message::parse("PRIVMSG #channel :Hello, world!").unwrap();
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#channel"]);
        assert_eq!(m.trailing.as_deref(), Some("Hello, world!"));
    }

    #[test]
    fn parses_source_and_tags() {
        let m = Message::parse("@time=2023-01-01T00:00:00Z;msgid=abc :nick!u@h PRIVMSG #ch :hi")
            .unwrap();
        assert_eq!(m.tags.len(), 2);
        let source = m.source.unwrap();
        assert_eq!(source.name, "nick");
        assert_eq!(source.user.as_deref(), Some("u"));
        assert_eq!(source.host.as_deref(), Some("h"));
        assert_eq!(m.trailing.as_deref(), Some("hi"));
    }

    #[test]
    fn parses_numeric_command() {
        let m = Message::parse(":server 001 nick :Welcome").unwrap();
        assert_eq!(m.command, "001");
        assert_eq!(m.params, vec!["nick"]);
    }

    #[test]
    fn rejects_empty_line() {
        assert_eq!(Message::parse(""), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn rejects_empty_source() {
        assert_eq!(
            Message::parse(": PRIVMSG #ch :hi"),
            Err(MessageParseError::EmptySource)
        );
    }

    #[test]
    fn rejects_malformed_command_token() {
        assert!(matches!(
            Message::parse("12 foo"),
            Err(MessageParseError::InvalidCommand(_))
        ));
    }

    #[test]
    fn empty_trailing_param_is_distinct_from_absent() {
        let m = Message::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(m.trailing.as_deref(), Some(""));
        assert!(m.empty_trailing);

        let m2 = Message::parse("JOIN #channel").unwrap();
        assert!(m2.trailing.is_none());
    }

    #[test]
    fn marks_pass_as_sensitive() {
        let m = Message::parse("PASS hunter2").unwrap();
        assert!(m.sensitive);
    }

    #[test]
    fn tolerates_trailing_crlf() {
        let m = Message::parse("PING :server\r\n").unwrap();
        assert_eq!(m.command, "PING");
        assert_eq!(m.trailing.as_deref(), Some("server"));
    }
}
