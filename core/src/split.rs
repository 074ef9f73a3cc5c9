use crate::error::{BuildError, Result};

/// Splits `input` into shell-like words.
///
/// Words are separated by unquoted spaces. Within double quotes spaces are
/// literal and a backslash escapes the following character (`\n` becomes a
/// newline). Outside quotes a backslash is an ordinary character.
pub fn split_quoted(input: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(if ch == 'n' { '\n' } else { ch });
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            ' ' if !in_string => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if in_string {
        return Err(BuildError::Parse(format!(
            "unterminated string in {:?}",
            input
        )));
    }

    if !current.is_empty() {
        parts.push(current);
    }

    Ok(parts)
}
