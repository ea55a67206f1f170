use crate::error::{Error, Result};

const END_OF_TEXT: &str = "<end of text>";

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assert that two extractions of one document carry the same content.
///
/// Whitespace differences are ignored. On mismatch the error holds the first
/// differing character position in the collapsed text and up to
/// `excerpt_chars` characters from each side starting there.
pub fn verify_text(left: &str, right: &str, excerpt_chars: usize) -> Result<()> {
    let left = collapse_whitespace(left);
    let right = collapse_whitespace(right);
    if left == right {
        return Ok(());
    }

    let position = left
        .chars()
        .zip(right.chars())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| left.chars().count().min(right.chars().count()));

    Err(Error::Verification {
        position,
        left: excerpt(&left, position, excerpt_chars),
        right: excerpt(&right, position, excerpt_chars),
    })
}

fn excerpt(text: &str, position: usize, len: usize) -> String {
    let piece: String = text.chars().skip(position).take(len).collect();
    if piece.is_empty() {
        END_OF_TEXT.to_string()
    } else {
        piece
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_is_ignored() {
        assert!(verify_text("פרק 1 -  כללי\n1.1 טקסט\n", "  פרק 1 - כללי 1.1\tטקסט", 10).is_ok());
    }

    #[test]
    fn test_first_difference_is_reported() {
        let err = verify_text("1.1 בעל העסק", "1.1 בעל המקום", 5).unwrap_err();
        match err {
            Error::Verification {
                position,
                left,
                right,
            } => {
                assert_eq!(position, 9);
                assert_eq!(left, "עסק");
                assert_eq!(right, "מקום");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prefix_difference() {
        let err = verify_text("abc", "abc def", 40).unwrap_err();
        match err {
            Error::Verification {
                position,
                left,
                right,
            } => {
                assert_eq!(position, 3);
                assert_eq!(left, END_OF_TEXT);
                assert_eq!(right, " def");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
