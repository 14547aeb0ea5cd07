//! Character codec: the closed alphabet the flaps can show and its integer codes.
//!
//! Letters are case-insensitive (`a`/`A` → 1 … `z`/`Z` → 26), digits run
//! `1` → 27 … `9` → 35 with `0` → 36, followed by a fixed punctuation set.
//! Blank (space) is code 0. Codes 63..=66 are solid colour tiles and are only
//! reachable through the status renderer, never through text.

use std::fmt;
use std::str::FromStr;

use crate::core::errors::{Result, SfbError};

/// Code of an empty flap.
pub const BLANK: u8 = 0;

/// Highest code this board ever writes.
pub const MAX_CODE: u8 = 66;

const PUNCTUATION: &[(char, u8)] = &[
    ('!', 37),
    ('@', 38),
    ('#', 39),
    ('$', 40),
    ('(', 41),
    (')', 42),
    ('-', 44),
    ('+', 46),
    ('&', 47),
    ('=', 48),
    (';', 49),
    (':', 50),
    ('\'', 52),
    ('"', 53),
    ('%', 54),
    (',', 55),
    ('.', 56),
    ('/', 59),
    ('?', 60),
    ('°', 62),
];

/// Code for a single character, or `None` when the flaps cannot show it.
#[must_use]
pub fn encode(ch: char) -> Option<u8> {
    match ch {
        ' ' => Some(BLANK),
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        'A'..='Z' => Some(ch as u8 - b'A' + 1),
        '1'..='9' => Some(ch as u8 - b'1' + 27),
        '0' => Some(36),
        _ => PUNCTUATION
            .iter()
            .find(|(c, _)| *c == ch)
            .map(|(_, code)| *code),
    }
}

/// Character for a text code. Letters decode lowercase; colour codes decode to `None`.
#[must_use]
pub fn decode(code: u8) -> Option<char> {
    match code {
        BLANK => Some(' '),
        1..=26 => Some(char::from(b'a' + code - 1)),
        27..=35 => Some(char::from(b'1' + code - 27)),
        36 => Some('0'),
        _ => PUNCTUATION
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(ch, _)| *ch),
    }
}

/// A string already proven to consist only of displayable characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
    text: String,
    codes: Vec<u8>,
}

impl DisplayText {
    /// Validate `raw`, rejecting the first character the board cannot show.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut codes = Vec::with_capacity(raw.len());
        for (position, ch) in raw.chars().enumerate() {
            let code = encode(ch).ok_or(SfbError::UnsupportedCharacter { ch, position })?;
            codes.push(code);
        }
        Ok(Self {
            text: raw.to_string(),
            codes,
        })
    }

    /// Encode `raw`, substituting a blank for anything unsupported.
    ///
    /// Returns the replaced characters in order so the caller can report them.
    #[must_use]
    pub fn lossy(raw: &str) -> (Self, Vec<char>) {
        let mut replaced = Vec::new();
        let mut text = String::with_capacity(raw.len());
        let mut codes = Vec::with_capacity(raw.len());
        for ch in raw.chars() {
            if let Some(code) = encode(ch) {
                text.push(ch);
                codes.push(code);
            } else {
                replaced.push(ch);
                text.push(' ');
                codes.push(BLANK);
            }
        }
        (Self { text, codes }, replaced)
    }

    /// Per-character codes, left to right.
    #[must_use]
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Number of flaps this text occupies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for DisplayText {
    type Err = SfbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(encode('a'), Some(1));
        assert_eq!(encode('A'), Some(1));
        assert_eq!(encode('z'), Some(26));
        assert_eq!(encode('Z'), Some(26));
    }

    #[test]
    fn zero_sorts_after_nine() {
        assert_eq!(encode('1'), Some(27));
        assert_eq!(encode('9'), Some(35));
        assert_eq!(encode('0'), Some(36));
    }

    #[test]
    fn punctuation_codes_match_board_table() {
        assert_eq!(encode('#'), Some(39));
        assert_eq!(encode('$'), Some(40));
        assert_eq!(encode(':'), Some(50));
        assert_eq!(encode('.'), Some(56));
        assert_eq!(encode('°'), Some(62));
        assert_eq!(encode(' '), Some(BLANK));
    }

    #[test]
    fn unsupported_characters_have_no_code() {
        for ch in ['~', '*', '_', '<', 'é', '\n'] {
            assert_eq!(encode(ch), None, "{ch:?} should be unsupported");
        }
    }

    #[test]
    fn decode_inverts_encode_for_lowercase_alphabet() {
        let alphabet = "abcdefghijklmnopqrstuvwxyz0123456789!@#$()-+&=;:'\"%,./?° ";
        for ch in alphabet.chars() {
            let code = encode(ch).expect("alphabet character");
            assert_eq!(decode(code), Some(ch));
            assert!(code <= MAX_CODE);
        }
    }

    #[test]
    fn colour_and_gap_codes_do_not_decode() {
        for code in [43, 45, 51, 57, 58, 61, 63, 65, 66] {
            assert_eq!(decode(code), None, "code {code} is not text");
        }
    }

    #[test]
    fn parse_reports_first_unsupported_character() {
        let err = DisplayText::parse("12*3~").unwrap_err();
        match err {
            SfbError::UnsupportedCharacter { ch, position } => {
                assert_eq!(ch, '*');
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_accepts_metric_formats() {
        for raw in ["#12345", "1024", "12.35gb", "27123.99$", "error"] {
            let text: DisplayText = raw.parse().expect("metric text is displayable");
            assert_eq!(text.len(), raw.chars().count());
            assert_eq!(text.as_str(), raw);
        }
    }

    #[test]
    fn lossy_substitutes_blank_and_reports() {
        let (text, replaced) = DisplayText::lossy("a~b*");
        assert_eq!(text.codes(), &[1, BLANK, 2, BLANK]);
        assert_eq!(replaced, vec!['~', '*']);
        assert_eq!(text.as_str(), "a b ");
    }

    #[test]
    fn degree_sign_counts_as_one_cell() {
        let text = DisplayText::parse("21°").expect("degree is displayable");
        assert_eq!(text.len(), 3);
        assert_eq!(text.codes(), &[28, 27, 62]);
    }
}
