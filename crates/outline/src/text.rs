use unicode_normalization::UnicodeNormalization;

const LIGATURES: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Clean up text decoded from a content stream.
///
/// NFC normalization, ligature expansion, removal of the replacement
/// character, and all whitespace runs (newlines included) collapsed to a
/// single space.
pub fn normalize_text(text: &str) -> String {
    let mut result: String = text.nfc().collect();

    for (lig, replacement) in LIGATURES {
        if result.contains(lig) {
            result = result.replace(lig, replacement);
        }
    }

    result = result.replace('\u{FFFD}', "");

    collapse_whitespace(&result)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns `true` if `c` belongs to a script written without inter-word
/// spaces (CJK, kana, Hangul, Thai and neighbours).
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c,
        '\u{3000}'..='\u{30FF}'
            | '\u{3130}'..='\u{318F}'
            | '\u{31F0}'..='\u{31FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FFEF}'
            | '\u{1100}'..='\u{11FF}'
            | '\u{0E00}'..='\u{0EFF}'
            | '\u{0F00}'..='\u{0FFF}'
            | '\u{1000}'..='\u{109F}'
            | '\u{1780}'..='\u{17FF}'
            | '\u{20000}'..='\u{2A6DF}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(normalize_text("Revision History"), "Revision History");
    }

    #[test]
    fn test_newlines_collapse_to_spaces() {
        assert_eq!(normalize_text("  Chapter 1:\nIntroduction \n"), "Chapter 1: Introduction");
    }

    #[test]
    fn test_ligatures() {
        assert_eq!(normalize_text("\u{FB01}nancial o\u{FB03}ce"), "financial office");
    }

    #[test]
    fn test_replacement_char_removed() {
        assert_eq!(normalize_text("Sum\u{FFFD}mary"), "Summary");
    }

    #[test]
    fn test_nfc() {
        assert_eq!(normalize_text("Re\u{0073}ume\u{0301}"), "Resum\u{00E9}");
    }

    #[test]
    fn test_spaceless_scripts() {
        assert!(is_spaceless_script_char('\u{4E00}'));
        assert!(is_spaceless_script_char('\u{3042}'));
        assert!(is_spaceless_script_char('\u{AC00}'));
        assert!(is_spaceless_script_char('\u{0E01}'));
        assert!(!is_spaceless_script_char('A'));
        assert!(!is_spaceless_script_char(' '));
    }
}
