//! Argument-string splitting shared by the built-in tools.
//!
//! Tokens are separated by whitespace. Single or double quotes group a
//! token; inside double quotes and in bare tokens a backslash escapes
//! the next character.

/// Take the first token off `input`, returning it and the unparsed rest.
pub fn take_arg(input: &str) -> Option<(String, &str)> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    let mut token = String::new();
    let mut quote: Option<char> = None;
    let mut chars = trimmed.char_indices();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some((_, next)) = chars.next() {
                    token.push(next);
                }
            }
            (Some(_), c) => token.push(c),
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, c) if c.is_whitespace() => return Some((token, &trimmed[i..])),
            (None, c) => token.push(c),
        }
    }

    Some((token, ""))
}

/// Interpret everything after the leading tokens as one argument.
///
/// A single fully quoted token is unquoted; anything else is returned
/// verbatim (minus leading whitespace) so free text survives intact.
pub fn rest_arg(rest: &str) -> String {
    let rest = rest.trim_start();
    if rest.starts_with('"') || rest.starts_with('\'') {
        if let Some((token, tail)) = take_arg(rest) {
            if tail.trim().is_empty() {
                return token;
            }
        }
    }
    rest.to_string()
}

/// Split a whole argument string into tokens.
pub fn split_args(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = input;
    while let Some((token, tail)) = take_arg(rest) {
        out.push(token);
        rest = tail;
    }
    out
}

/// Extract a `--count=N` flag and the first positional argument.
pub fn count_and_path(input: &str, default_count: usize) -> Result<(String, usize), String> {
    let mut path = ".".to_string();
    let mut count = default_count;
    for part in split_args(input) {
        if let Some(value) = part.strip_prefix("--count=") {
            count = value
                .parse()
                .map_err(|_| "Invalid count value. Use --count=N".to_string())?;
        } else if !part.starts_with("--") {
            path = part;
        }
    }
    Ok((path, count))
}
