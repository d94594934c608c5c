//! Splitting of a raw input line into argument tokens.
//!
//! The rules are deliberately narrow: the only separator is the ASCII space character,
//! and the only other character with a meaning is the line terminator `\n`, which ends
//! the token it appears in. Tabs, quotes, `$`, `|` and everything else are ordinary
//! token characters.

const SEPARATOR: char = ' ';
const TERMINATOR: char = '\n';

/// Splits `line` into non-empty tokens.
///
/// Runs of spaces collapse, a token is cut at its first `\n`, and tokens that end up
/// empty are dropped. A line made of spaces and terminators yields an empty vector,
/// which callers treat as an empty command.
///
/// Tokens borrow from `line`, so they cannot outlive the input they were split from.
pub fn split_into_tokens(line: &str) -> Vec<&str> {
    line.split(SEPARATOR)
        .map(|token| match token.find(TERMINATOR) {
            Some(pos) => &token[..pos],
            None => token,
        })
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_into_tokens;

    #[test]
    fn splits_on_single_spaces() {
        assert_eq!(split_into_tokens("ls -l /tmp"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn collapses_space_runs_and_strips_terminator() {
        assert_eq!(
            split_into_tokens("   echo   hi  \n"),
            vec!["echo", "hi"],
        );
    }

    #[test]
    fn tab_is_not_a_separator() {
        let expected = vec!["echo", "hello\tworld"];
        assert_eq!(split_into_tokens("echo  hello\tworld\n"), expected);
        assert_eq!(split_into_tokens("echo hello\tworld"), expected);
    }

    #[test]
    fn terminator_is_never_its_own_token() {
        assert_eq!(split_into_tokens("pwd \n"), vec!["pwd"]);
        assert_eq!(split_into_tokens("pwd\n"), vec!["pwd"]);
    }

    #[test]
    fn blank_lines_are_empty() {
        assert!(split_into_tokens("").is_empty());
        assert!(split_into_tokens("\n").is_empty());
        assert!(split_into_tokens("     \n").is_empty());
    }

    #[test]
    fn special_characters_are_plain() {
        assert_eq!(
            split_into_tokens("echo 'a b' | $HOME &"),
            vec!["echo", "'a", "b'", "|", "$HOME", "&"],
        );
    }
}
