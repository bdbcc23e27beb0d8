/// Make free text safe for a 7-bit column: drop every code point ≥ 128 and
/// turn tab, line feed and carriage return into a single space each.
pub fn scrub_text(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii)
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
