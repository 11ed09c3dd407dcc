/// Sanitize recognized text before field extraction.
///
/// Strips control characters and recognition noise, collapses runs of
/// whitespace inside a line, drops blank lines. Vietnamese letters (including
/// decomposed combining marks) and the punctuation found on cards survive.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || is_combining_mark(*c)
                || matches!(
                    c,
                    '.' | ',' | ';' | ':' | '-' | '/' | '(' | ')' | '\'' | '"' | '<'
                )
        })
        .collect::<String>()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Combining Diacritical Marks block (U+0300..U+036F): tone marks that some
/// engines emit decomposed.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}
