//! mIRC-style formatting helpers: `{name}` token substitution, plain-text
//! extraction, and raw control-code stripping.
//!
//! Control byte table matches [`crate::validation::FORMAT_CONTROL_CHARS`].

/// Bold (`\x02`).
pub const BOLD: char = '\x02';
/// Colour introducer (`\x03`).
pub const COLOR: char = '\x03';
/// Italic (`\x1d`).
pub const ITALIC: char = '\x1d';
/// Reset all formatting (`\x0f`).
pub const RESET: char = '\x0f';
/// Reverse/inverse video (`\x16`).
pub const REVERSE: char = '\x16';
/// Underline (`\x1f`).
pub const UNDERLINE: char = '\x1f';

/// mIRC colour palette, index = colour code (`\x03` + two-digit code).
const PALETTE: &[&str] = &[
    "white", "black", "blue", "green", "red", "brown", "purple", "orange", "yellow", "lightgreen",
    "cyan", "lightcyan", "lightblue", "pink", "grey", "silver",
];

fn color_code(name: &str) -> Option<u8> {
    PALETTE.iter().position(|n| *n == name).map(|i| i as u8)
}

/// Replace `{name}` formatting tokens with their mIRC control byte sequence.
///
/// Known tokens: the 16-colour palette names, `bold`, `italic`, `reset` (also
/// spelled `c`/`clear`), `reverse`, `underline`. A `{fg,bg}` pair maps to
/// `\x03FG,BG`. Unknown tokens are left verbatim (braces included).
pub fn fmt(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let token = &after[..close];
        rest = &after[close + 1..];

        if let Some(rendered) = render_token(token) {
            out.push_str(&rendered);
        } else {
            out.push('{');
            out.push_str(token);
            out.push('}');
        }
    }
    out.push_str(rest);
    out
}

fn render_token(token: &str) -> Option<String> {
    if let Some((fg, bg)) = token.split_once(',') {
        let fg = color_code(fg)?;
        let bg = color_code(bg)?;
        return Some(format!("{COLOR}{:02},{:02}", fg, bg));
    }

    match token {
        "bold" => Some(BOLD.to_string()),
        "italic" => Some(ITALIC.to_string()),
        "reset" => Some(RESET.to_string()),
        "c" | "clear" => Some(COLOR.to_string()),
        "reverse" => Some(REVERSE.to_string()),
        "underline" => Some(UNDERLINE.to_string()),
        name => color_code(name).map(|code| format!("{COLOR}{:02}", code)),
    }
}

/// Drop `{name}` formatting tokens, leaving the surrounding plain text.
pub fn trim_fmt(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let token = &after[..close];
        rest = &after[close + 1..];

        if render_token(token).is_none() {
            out.push('{');
            out.push_str(token);
            out.push('}');
        }
    }
    out.push_str(rest);
    out
}

/// Strip raw mIRC control bytes (and colour-code digit runs) from a string,
/// leaving plain text. Unlike [`trim_fmt`], this operates on already-rendered
/// wire text, not `{name}` tokens.
pub fn strip_raw(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            COLOR => {
                // Consume up to two digits, an optional ",NN" pair.
                for _ in 0..2 {
                    if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                        chars.next();
                    }
                }
                if chars.peek() == Some(&',') {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                        chars.next();
                        for _ in 0..2 {
                            if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                                chars.next();
                            }
                        }
                    }
                }
            }
            BOLD | ITALIC | RESET | REVERSE | UNDERLINE | '\x04' | '\x11' => {}
            c => out.push(c),
        }
    }
    out
}

/// Case-sensitive glob match where `*` matches any (possibly empty) run.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    glob_rec(&pat, &txt)
}

fn glob_rec(pat: &[char], txt: &[char]) -> bool {
    match pat.first() {
        None => txt.is_empty(),
        Some('*') => {
            let rest = &pat[1..];
            if glob_rec(rest, txt) {
                return true;
            }
            !txt.is_empty() && glob_rec(pat, &txt[1..])
        }
        Some(&p) => !txt.is_empty() && txt[0] == p && glob_rec(&pat[1..], &txt[1..]),
    }
}
