const ROMAN_NUMERALS: [(char, &str); 5] = [
    ('Ⅰ', "I"),
    ('Ⅱ', "II"),
    ('Ⅲ', "III"),
    ('Ⅳ', "IV"),
    ('Ⅴ', "V"),
];

/// Lookup key for subject names.
///
/// Ideographic spaces become ASCII spaces, surrounding whitespace is dropped
/// and the Roman numeral code points Ⅰ..Ⅴ are spelled with Latin letters, so
/// `"微積分Ⅰ "` and `"微積分I"` share a key.
pub fn normalize_name(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        match ch {
            '\u{3000}' => key.push(' '),
            _ => match ROMAN_NUMERALS.iter().find(|(numeral, _)| *numeral == ch) {
                Some((_, latin)) => key.push_str(latin),
                None => key.push(ch),
            },
        }
    }
    key.trim().to_owned()
}
