//! Conversion between user-facing 8.3 names ("asd.txt") and the padded
//! 11-byte on-disk form, plus validation.
//!
//! Grounded on `original_source/src/fat.c`'s `_fatname2name`, `_name2fatname`
//! and `_name_check`.

pub const LOWERCASE_ISSUE: u8 = 0x01;
pub const BAD_CHARACTER: u8 = 0x02;
pub const BAD_TERMINATION: u8 = 0x04;
pub const TOO_MANY_DOTS: u8 = 0x10;

const BAD_CHARS: &[u8] = b"\"*+,/:;<=>?[\\]|";

/// Uppercase `user_name`, split at the last `.`, and pack into the 11-byte
/// padded 8.3 form.
pub fn encode(user_name: &str) -> [u8; 11] {
    let upper = user_name.to_ascii_uppercase();

    let (base, ext) = match upper.rfind('.') {
        Some(idx) => (&upper[..idx], &upper[idx + 1..]),
        None => (upper.as_str(), ""),
    };

    let mut out = [b' '; 11];
    for (i, b) in base.as_bytes().iter().take(8).enumerate() {
        out[i] = *b;
    }
    for (i, b) in ext.as_bytes().iter().take(3).enumerate() {
        out[8 + i] = *b;
    }
    out
}

/// Unpack an 11-byte padded field into a user-facing name with a `.`
/// separator. `.` and `..` pass through unchanged.
pub fn decode(raw: &[u8; 11]) -> String {
    let base_len = raw[..8].iter().position(|&b| b == b' ').unwrap_or(8);
    let base = &raw[..base_len];

    if base == b"." || base == b".." {
        return String::from_utf8_lossy(base).into_owned();
    }

    let ext_len = raw[8..11].iter().position(|&b| b == b' ').unwrap_or(3);
    let ext = &raw[8..8 + ext_len];

    let mut out = String::from_utf8_lossy(base).into_owned();
    if !ext.is_empty() {
        out.push('.');
        out.push_str(&String::from_utf8_lossy(ext));
    }
    out
}

/// Returns a bitmask of issues found in `user_name`, or 0 if the name is a
/// legal 8.3 name. Multiple issues OR together.
pub fn validate(user_name: &str) -> u8 {
    let mut mask = 0u8;

    if user_name.chars().any(|c| c.is_ascii_lowercase()) {
        mask |= LOWERCASE_ISSUE;
    }

    if user_name.bytes().any(|b| BAD_CHARS.contains(&b) || (b < 0x20 && b != 0x05)) {
        mask |= BAD_CHARACTER;
    }

    let dot_count = user_name.matches('.').count();
    if dot_count > 1 {
        mask |= TOO_MANY_DOTS;
    }

    let (base, ext) = match user_name.rfind('.') {
        Some(idx) => (&user_name[..idx], &user_name[idx + 1..]),
        None => (user_name, ""),
    };

    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        mask |= BAD_TERMINATION;
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_no_extension() {
        assert_eq!(&encode("asd"), b"ASD        ");
    }

    #[test]
    fn encode_with_extension() {
        assert_eq!(&encode("asd.txt"), b"ASD     TXT");
    }

    #[test]
    fn decode_base_and_extension() {
        assert_eq!(decode(b"ASD     TXT"), "ASD.TXT");
    }

    #[test]
    fn decode_suppresses_trailing_dot_when_no_extension() {
        assert_eq!(decode(b"ASD        "), "ASD");
    }

    #[test]
    fn validate_lowercase() {
        assert_eq!(validate("a.b"), LOWERCASE_ISSUE);
    }

    #[test]
    fn validate_bad_character() {
        assert_eq!(validate("A*B"), BAD_CHARACTER);
    }

    #[test]
    fn validate_double_quote_is_bad_character() {
        assert_eq!(validate("A\"B"), BAD_CHARACTER);
    }

    #[test]
    fn validate_space_is_not_bad_character() {
        assert_eq!(validate("A B"), 0);
    }

    #[test]
    fn validate_too_many_dots() {
        assert_eq!(validate("A.B.C"), TOO_MANY_DOTS);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let encoded = encode("readme.md");
        assert_eq!(decode(&encoded), "README.MD");
    }
}
