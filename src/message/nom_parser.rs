//! Nom-based IRC message parser.
//!
//! This module provides zero-copy parsing of IRC messages using the nom
//! parser combinator library.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (alphanumeric characters).
fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric())(input)
}

/// Parse IRC message parameters from the remaining input after the command.
///
/// Handles both regular space-separated parameters and the trailing parameter
/// (prefixed with `:`) which may contain spaces. Multiple consecutive spaces
/// are treated as a single separator (RFC compliance).
fn parse_params(input: &str) -> (&str, Vec<&str>, bool) {
    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;
    let mut had_trailing = false;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        // Skip all leading spaces (handles multiple consecutive spaces)
        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }

        // Check if we've reached the end after skipping spaces
        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }

        if let Some(b':') = rest.as_bytes().first().copied() {
            // Trailing parameter - everything after `:` until line end
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            had_trailing = true;
            break;
        }

        // Regular parameter - until next space or line end
        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        let param = &rest[..end];
        if param.is_empty() {
            break;
        }
        params.push(param);
        rest = &rest[end..];
    }

    (rest, params, had_trailing)
}

/// Parse a complete IRC message into its components.
///
/// IRC message format:
/// ```text
/// [@tags] [:prefix] <command> [params...] [:trailing]
/// ```
pub(crate) fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    // Parse optional tags
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    // Parse optional prefix
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    // Parse command (required)
    let (input, command) = parse_command(input)?;

    // Parse parameters (including trailing)
    let (rest, params, had_trailing) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
            had_trailing,
        },
    ))
}

/// A parsed IRC message with borrowed string slices.
///
/// This is the intermediate representation produced by the nom parser.
/// It holds references into the original input string for zero-copy parsing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
    /// Whether the last entry of `params` was introduced by a `:` trailing
    /// marker, as opposed to being the final space-separated middle param.
    pub had_trailing: bool,
}

impl<'a> ParsedMessage<'a> {
    /// Parse an IRC message string into a `ParsedMessage`.
    ///
    /// This is the primary entry point for parsing borrowed messages.
    /// Returns detailed error information for debugging failed parses.
    pub fn parse(input: &'a str) -> Result<Self, DetailedParseError> {
        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let position = input.len() - e.input.len();
                Err(DetailedParseError {
                    input: input.to_string(),
                    position,
                    kind: e.code,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(DetailedParseError {
                input: input.to_string(),
                position: input.len(),
                kind: ErrorKind::Eof,
            }),
        }
    }
}

/// Detailed parse error with position information.
#[derive(Debug, Clone)]
pub(crate) struct DetailedParseError {
    /// The original input string that failed to parse.
    pub input: String,
    /// Character position where parsing failed.
    pub position: usize,
    /// The nom error kind.
    pub kind: ErrorKind,
}

impl std::fmt::Display for DetailedParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at position {}: {:?}",
            self.position, self.kind
        )?;

        // Show the error position in the input
        if self.position < self.input.len() {
            let before = &self.input[..self.position];
            let after = &self.input[self.position..];
            write!(f, "\n  Input: {}<<<HERE>>>{}", before, after)?;
        } else {
            write!(f, "\n  Input: {}<<<EOF>>>", self.input)?;
        }

        Ok(())
    }
}

impl std::error::Error for DetailedParseError {}
