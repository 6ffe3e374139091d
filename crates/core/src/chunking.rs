use regex::Regex;

/// Separator granularities tried by [`split_with_overlap`], coarsest
/// first. A lower level is only consulted when the level above failed to
/// split the text into more than one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    BlankLine,
    LineBreak,
    Sentence,
    Whitespace,
}

pub const SEPARATORS: [Separator; 4] = [
    Separator::BlankLine,
    Separator::LineBreak,
    Separator::Sentence,
    Separator::Whitespace,
];

impl Separator {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            Separator::BlankLine => {
                let pattern = Regex::new(r"\n{2,}").expect("blank line pattern is valid");
                pattern.split(text).collect()
            }
            Separator::LineBreak => {
                let pattern = Regex::new(r"\n+").expect("line break pattern is valid");
                pattern.split(text).collect()
            }
            Separator::Sentence => crate::normalize::split_sentences(text),
            Separator::Whitespace => text.split_whitespace().collect(),
        }
    }
}

/// Splits `text` into chunks of at most `max_len` characters along the
/// most meaningful boundary available, prepending the previous chunk's
/// last `overlap` characters to every chunk after the first so the
/// consumer keeps continuity across a cut.
///
/// Chunks after the first are re-truncated to `max_len` once the overlap
/// is prepended, which can shave up to `overlap` characters off a chunk
/// that was already at the limit. Consumers tolerate this tail loss at
/// the margin, and must deduplicate records that the overlapped region
/// produces twice.
pub fn split_with_overlap(text: &str, max_len: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if max_len == 0 {
        return vec![text.to_string()];
    }
    // overlap >= max_len would never make forward progress; clamp instead
    // of failing.
    let overlap = overlap.min(max_len - 1);

    if char_count(text) <= max_len {
        return vec![text.to_string()];
    }

    for separator in SEPARATORS {
        let pieces = separator.split(text);
        if pieces.len() == 1 {
            continue;
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut buffer = String::new();
        for piece in pieces {
            let candidate = if buffer.is_empty() {
                piece.trim().to_string()
            } else {
                format!("{buffer} {piece}").trim().to_string()
            };

            if char_count(&candidate) <= max_len {
                buffer = candidate;
                continue;
            }

            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }
            if char_count(piece) > max_len {
                chunks.extend(split_with_overlap(piece, max_len, overlap));
            } else {
                buffer = piece.trim().to_string();
            }
        }
        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        if chunks.len() > 1 && overlap > 0 {
            let mut with_overlap = Vec::with_capacity(chunks.len());
            for (index, chunk) in chunks.iter().enumerate() {
                if index == 0 {
                    with_overlap.push(chunk.clone());
                } else {
                    let tail = tail_chars(&chunks[index - 1], overlap);
                    with_overlap.push(take_chars(&format!("{tail}{chunk}"), max_len));
                }
            }
            return with_overlap;
        }
        return chunks;
    }

    sliding_window(text, max_len, overlap)
}

/// Last resort for text with no whitespace at all: fixed-stride windows
/// advancing `max_len - overlap` characters per step.
fn sliding_window(text: &str, max_len: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + max_len).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    windows
}

fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Last `count` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    let total = char_count(text);
    if total <= count {
        return text;
    }
    match text.char_indices().nth(total - count) {
        Some((byte_index, _)) => &text[byte_index..],
        None => text,
    }
}

/// First `count` characters of `text` (all of it when shorter).
fn take_chars(text: &str, count: usize) -> String {
    match text.char_indices().nth(count) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_text(target_chars: usize) -> String {
        let sentence = "The contracting party shall deliver the goods on time. ";
        let mut text = String::new();
        while text.chars().count() < target_chars {
            text.push_str(sentence);
        }
        text.truncate(target_chars);
        text
    }

    #[test]
    fn short_text_is_returned_whole() {
        let chunks = split_with_overlap("short clause", 100, 20);
        assert_eq!(chunks, vec!["short clause".to_string()]);
    }

    #[test]
    fn empty_text_yields_single_empty_chunk() {
        assert_eq!(split_with_overlap("   ", 100, 20), vec![String::new()]);
    }

    #[test]
    fn every_chunk_respects_the_size_bound() {
        let text = sentence_text(25_000);
        for chunk in split_with_overlap(&text, 800, 50) {
            assert!(chunk.chars().count() <= 800, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn nine_thousand_chars_of_sentences_become_two_chunks() {
        let text = sentence_text(9_000);
        let chunks = split_with_overlap(&text, 8_000, 200);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chars().count() <= 8_000);

        let tail: String = {
            let chars: Vec<char> = chunks[0].chars().collect();
            chars[chars.len() - 200..].iter().collect()
        };
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn paragraph_breaks_win_over_sentence_breaks() {
        let paragraph = "Sentence one. Sentence two.";
        let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        let chunks = split_with_overlap(&text, paragraph.len() + 2, 0);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(chunk, paragraph);
        }
    }

    #[test]
    fn oversized_single_piece_is_recursed_into() {
        let long_word = "x".repeat(250);
        let text = format!("Short head. {long_word} Short tail.");
        let chunks = split_with_overlap(&text, 100, 0);

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        assert!(chunks.concat().contains("Short head."));
        assert!(chunks.concat().contains("Short tail."));
    }

    #[test]
    fn whitespace_free_text_uses_sliding_window() {
        let text = "a".repeat(1_000);
        let chunks = split_with_overlap(&text, 300, 50);

        assert!(chunks.len() > 1);
        // Dropping each later chunk's overlap prefix reconstructs the
        // original text exactly on this path.
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk[50.min(chunk.len())..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn sliding_window_windows_share_overlap() {
        let text: String = ('a'..='z').cycle().take(700).collect();
        let chunks = split_with_overlap(&text, 300, 100);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(100).collect::<Vec<_>>()
                .into_iter().rev().collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn overlap_larger_than_max_len_is_clamped() {
        let text = "b".repeat(500);
        let chunks = split_with_overlap(&text, 100, 400);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn packing_preserves_every_sentence() {
        let text = sentence_text(10_000);
        let chunks = split_with_overlap(&text, 2_000, 0);

        let original: String = text.split_whitespace().collect();
        let rebuilt: String = chunks.join(" ").split_whitespace().collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn multibyte_text_is_sliced_on_character_boundaries() {
        let text = "é".repeat(900);
        let chunks = split_with_overlap(&text, 400, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 400);
            assert!(chunk.chars().all(|c| c == 'é'));
        }
    }
}
