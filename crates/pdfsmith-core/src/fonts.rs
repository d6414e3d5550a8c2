//! Standard 14 font metrics for Helvetica-Bold under WinAnsiEncoding

use crate::error::{PdfSmithError, Result};

pub(crate) const WATERMARK_FONT: &str = "Helvetica-Bold";

/// Glyph widths (1/1000 em) for codes 32..=126
#[rustfmt::skip]
const ASCII_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 48-63
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 80-95
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 96-111
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,      // 112-126
];

/// Glyph widths for codes 128..=255; zero marks a code WinAnsi leaves undefined
#[rustfmt::skip]
const HIGH_WIDTHS: [u16; 128] = [
    556, 0, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,      // 128-143
    0, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 0, 500, 667,     // 144-159
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,   // 160-175
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,   // 176-191
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,  // 192-207
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,   // 208-223
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,   // 224-239
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,   // 240-255
];

/// WinAnsi codes 128..=159 that differ from Latin-1
const WIN_ANSI_EXTRAS: [(char, u8); 27] = [
    ('€', 0x80), ('‚', 0x82), ('ƒ', 0x83), ('„', 0x84), ('…', 0x85), ('†', 0x86),
    ('‡', 0x87), ('ˆ', 0x88), ('‰', 0x89), ('Š', 0x8A), ('‹', 0x8B), ('Œ', 0x8C),
    ('Ž', 0x8E), ('\u{2018}', 0x91), ('\u{2019}', 0x92), ('\u{201C}', 0x93),
    ('\u{201D}', 0x94), ('•', 0x95), ('–', 0x96), ('—', 0x97), ('˜', 0x98),
    ('™', 0x99), ('š', 0x9A), ('›', 0x9B), ('œ', 0x9C), ('ž', 0x9E), ('Ÿ', 0x9F),
];

/// Encode `text` as WinAnsi bytes
pub(crate) fn encode_win_ansi(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            match code {
                32..=126 | 160..=255 => Ok(code as u8),
                _ => WIN_ANSI_EXTRAS
                    .iter()
                    .find(|(ch, _)| *ch == c)
                    .map(|(_, byte)| *byte)
                    .ok_or(PdfSmithError::UnsupportedCharacter(c)),
            }
        })
        .collect()
}

fn glyph_width(code: u8) -> u16 {
    match code {
        32..=126 => ASCII_WIDTHS[(code - 32) as usize],
        128..=255 => HIGH_WIDTHS[(code - 128) as usize],
        _ => 0,
    }
}

/// Advance width of WinAnsi-encoded text in points
pub(crate) fn text_width(encoded: &[u8], font_size: f32) -> f32 {
    let units: u32 = encoded.iter().map(|&b| glyph_width(b) as u32).sum();
    units as f32 * font_size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_ascii_and_latin1() {
        assert_eq!(encode_win_ansi("Hi!").unwrap(), b"Hi!".to_vec());
        assert_eq!(encode_win_ansi("café").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("€ – ™").unwrap(), vec![0x80, b' ', 0x96, b' ', 0x99]);
    }

    #[test]
    fn test_unencodable_character() {
        assert!(matches!(
            encode_win_ansi("日本"),
            Err(PdfSmithError::UnsupportedCharacter('日'))
        ));
        assert!(matches!(
            encode_win_ansi("tab\there"),
            Err(PdfSmithError::UnsupportedCharacter('\t'))
        ));
    }

    #[test]
    fn test_text_width_matches_afm() {
        // C=722 O=778 N=722 F=611 I=278 D=722 E=667 N=722 T=611 I=278 A=722 L=611
        let encoded = encode_win_ansi("CONFIDENTIAL").unwrap();
        assert_eq!(text_width(&encoded, 1000.0), 7444.0);
        assert_eq!(text_width(b"  ", 10.0), 5.56);
    }

    #[test]
    fn test_width_tables_cover_encoding() {
        for code in (32u8..=126).chain(160..=255) {
            assert!(glyph_width(code) > 0, "code {code} has no width");
        }
        for (_, code) in WIN_ANSI_EXTRAS {
            assert!(glyph_width(code) > 0, "code {code} has no width");
        }
    }
}
