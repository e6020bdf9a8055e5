//! WinAnsi encoding for the text drawn with the standard fonts.

/// WinAnsi code points 0x80..=0x9F; `None` marks unassigned slots.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Encodes `text` for a WinAnsi simple font.
///
/// Returns the bytes and the number of characters that had no WinAnsi code
/// and were replaced with `?`.
pub(crate) fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut missing = 0;
    for ch in text.chars() {
        match win_ansi_code(ch) {
            Some(code) => bytes.push(code),
            None => {
                missing += 1;
                bytes.push(b'?');
            }
        }
    }
    (bytes, missing)
}

fn win_ansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x09 | 0x0A | 0x0D => Some(b' '),
        0x20..=0x7E => Some(code as u8),
        0xA0..=0xFF => Some(code as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|slot| *slot == Some(ch))
            .map(|index| 0x80 + index as u8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_covers_typographic_punctuation() {
        let (bytes, missing) = encode_win_ansi("\u{201C}Caf\u{e9}\u{201D} \u{2014} 5\u{20AC}");
        assert_eq!(missing, 0);
        assert_eq!(
            bytes,
            vec![0x93, b'C', b'a', b'f', 0xE9, 0x94, b' ', 0x97, b' ', b'5', 0x80]
        );
    }

    #[test]
    fn characters_outside_win_ansi_become_question_marks() {
        let (bytes, missing) = encode_win_ansi("a\u{4e2d}b");
        assert_eq!(bytes, b"a?b".to_vec());
        assert_eq!(missing, 1);
    }
}
