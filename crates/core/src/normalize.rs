use regex::Regex;

/// Removes C0 control characters (newlines and tabs included) and DEL,
/// then trims. Text headed for the generation service goes through this
/// first, so the chunker mostly sees sentence boundaries rather than
/// line structure.
pub fn strip_control(text: &str) -> String {
    let control = Regex::new(r"[\x00-\x1f\x7f]").expect("control pattern is valid");
    control.replace_all(text, "").trim().to_string()
}

/// Cleanup applied to every layout region before it becomes a block:
/// de-hyphenate across line breaks, collapse horizontal whitespace runs,
/// collapse repeated newlines, trim. Idempotent.
pub fn cleanup_text(text: &str) -> String {
    let hyphen_break = Regex::new(r"(\w)-\n(\w)").expect("hyphen pattern is valid");
    let horizontal_ws = Regex::new(r"[ \t]+").expect("whitespace pattern is valid");
    let newline_runs = Regex::new(r"\n{2,}").expect("newline pattern is valid");

    let dehyphenated = hyphen_break.replace_all(text, "$1$2");
    let collapsed = horizontal_ws.replace_all(&dehyphenated, " ");
    newline_runs.replace_all(&collapsed, "\n").trim().to_string()
}

/// Splits plain text into paragraph-sized pieces on blank lines and
/// sentence boundaries. Used by the last-resort block strategy when no
/// richer layout is available.
pub fn split_blocks(text: &str) -> Vec<String> {
    let blank_line = Regex::new(r"\n\s*\n").expect("blank line pattern is valid");

    blank_line
        .split(text)
        .flat_map(split_sentences)
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Splits after sentence punctuation followed by whitespace, keeping the
/// punctuation on the preceding piece.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let boundary = Regex::new(r"[.!?]\s+").expect("sentence pattern is valid");

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for found in boundary.find_iter(text) {
        let split_at = found.start() + 1;
        pieces.push(&text[cursor..split_at]);
        cursor = found.end();
    }
    pieces.push(&text[cursor..]);
    pieces
}
