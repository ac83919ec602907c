/// Generational suffixes dropped from the end of a name
const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Normalize a player name for exact matching across feeds.
///
/// Lower-cases, drops periods and apostrophes ("A.J." -> "aj"), turns any
/// other punctuation into whitespace, strips trailing suffix tokens when
/// other tokens remain, and collapses whitespace.
pub fn normalize_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '.' | '\'' | '\u{2019}' | '`' => {}
            c if c.is_alphanumeric() => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}
