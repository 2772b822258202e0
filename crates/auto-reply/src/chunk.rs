//! Splits one generated reply into the chunks that are sent as separate
//! chat messages.
//!
//! Short replies are never split. Longer ones are cut at paragraph breaks,
//! at topic-transition phrases (which stay at the start of the chunk they
//! introduce) and, for overlong segments, at sentence boundaries. Bullet and
//! numbered lists stay in one piece. Fragments that would read as orphans are
//! merged back into their neighbours.

use std::collections::BTreeSet;

use ringle_config::SegmenterConfig;

#[derive(Debug, Clone)]
pub struct Segmenter {
    short_response_words: usize,
    max_segment_chars: usize,
    min_fragment_words: usize,
    /// Lowercased, non-empty.
    transitions: Vec<String>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(&SegmenterConfig::default())
    }
}

impl Segmenter {
    pub fn new(cfg: &SegmenterConfig) -> Self {
        let transitions = cfg
            .transition_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            short_response_words: cfg.short_response_words,
            max_segment_chars: cfg.max_segment_chars.max(1),
            min_fragment_words: cfg.min_fragment_words,
            transitions,
        }
    }

    /// Chunks of `text` in delivery order. Empty input yields no chunks;
    /// any other input yields at least one non-empty chunk.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if word_count(trimmed) < self.short_response_words {
            return vec![trimmed.to_string()];
        }

        let mut pieces = Vec::new();
        for block in paragraphs(trimmed) {
            if is_list_block(&block) {
                pieces.push(block);
                continue;
            }
            for seg in self.split_transitions(&block) {
                if seg.chars().count() > self.max_segment_chars {
                    pieces.extend(split_at(&seg, &sentence_starts(&seg)));
                } else {
                    pieces.push(seg);
                }
            }
        }

        let pieces = merge_fragments(pieces, self.min_fragment_words);
        let chunks: Vec<String> = merge_symbols(pieces)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| c.chars().count() >= 2)
            .collect();

        if chunks.is_empty() {
            tracing::debug!("segmentation produced no chunks, sending reply whole");
            return vec![trimmed.to_string()];
        }
        chunks
    }

    /// Cut `block` before every sentence that contains a transition phrase.
    /// A phrase in the middle of a sentence moves the whole sentence into the
    /// next chunk; the sentence itself is never cut.
    fn split_transitions(&self, block: &str) -> Vec<String> {
        let starts = sentence_starts(block);
        let mut cuts = BTreeSet::new();

        for (idx, _) in block.char_indices() {
            if !word_boundary_before(block, idx) {
                continue;
            }
            let rest = &block[idx..];
            let hit = self.transitions.iter().any(|phrase| {
                prefix_len_ci(rest, phrase).is_some_and(|len| followed_by_break(&rest[len..]))
            });
            if hit {
                let cut = starts.iter().rev().find(|&&s| s <= idx).copied().unwrap_or(0);
                if cut > 0 {
                    cuts.insert(cut);
                }
            }
        }

        let cuts: Vec<usize> = cuts.into_iter().collect();
        split_at(block, &cuts)
    }
}

/// Segment with the default settings.
pub fn segment(text: &str) -> Vec<String> {
    Segmenter::default().segment(text)
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Blocks separated by one or more blank (or whitespace-only) lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

fn is_list_block(block: &str) -> bool {
    block.lines().filter(|l| is_list_line(l)).count() >= 2
}

/// `- item`, `* item`, `• item`, `1. item` or `1) item`.
fn is_list_line(line: &str) -> bool {
    let line = line.trim_start();
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '•') => chars.next().is_some_and(char::is_whitespace),
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut rest = rest.chars();
            matches!(rest.next(), Some('.' | ')')) && rest.next().is_some_and(char::is_whitespace)
        },
        _ => false,
    }
}

/// Byte offsets where a new sentence starts (never 0): after `.`, `?` or
/// `!`, whitespace, then a character that can open a sentence.
fn sentence_starts(text: &str) -> Vec<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut starts = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i].1, '.' | '?' | '!') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && opens_sentence(chars[j].1) {
                starts.push(chars[j].0);
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }
    starts
}

/// Uppercase letters, letters of scripts without case (Hangul, kana, ...),
/// and opening quotes or brackets.
fn opens_sentence(c: char) -> bool {
    (c.is_alphabetic() && !c.is_lowercase())
        || matches!(c, '"' | '\'' | '(' | '[' | '“' | '‘' | '「' | '『')
}

fn word_boundary_before(text: &str, idx: usize) -> bool {
    text[..idx]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric())
}

/// Byte length of the prefix of `hay` equal to `needle` (already lowercase),
/// ignoring case.
fn prefix_len_ci(hay: &str, needle: &str) -> Option<usize> {
    let mut hay_chars = hay.char_indices();
    for n in needle.chars() {
        let (_, h) = hay_chars.next()?;
        if !h.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
    }
    Some(hay_chars.next().map_or(hay.len(), |(i, _)| i))
}

/// A transition phrase must be followed by an optional comma and whitespace.
fn followed_by_break(rest: &str) -> bool {
    let rest = rest.strip_prefix(',').unwrap_or(rest);
    rest.chars().next().is_some_and(char::is_whitespace)
}

/// Split `text` at sorted byte offsets, trimming pieces and dropping empty
/// ones.
fn split_at(text: &str, cuts: &[usize]) -> Vec<String> {
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut prev = 0;
    for &cut in cuts.iter().chain(std::iter::once(&text.len())) {
        let piece = text[prev..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        prev = cut;
    }
    pieces
}

/// Append chunks with fewer than `min_words` words to the previous chunk.
/// The first chunk is kept as is.
fn merge_fragments(pieces: Vec<String>, min_words: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match out.last_mut() {
            Some(prev) if word_count(&piece) < min_words => {
                prev.push(' ');
                prev.push_str(&piece);
            },
            _ => out.push(piece),
        }
    }
    out
}

fn join_spaced(prev: &mut String, piece: &str) {
    prev.truncate(prev.trim_end().len());
    prev.push(' ');
    prev.push_str(piece.trim());
}

/// Fold stray punctuation or digits (at most 3 characters, no letters) into
/// the previous chunk, or into the next one when there is no previous.
/// Either way the two are joined with a space.
fn merge_symbols(pieces: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(pieces.len());
    let mut carry: Option<String> = None;
    for piece in pieces {
        let stray = piece.chars().count() <= 3 && !piece.chars().any(char::is_alphabetic);
        if stray {
            if let Some(prev) = out.last_mut() {
                join_spaced(prev, &piece);
            } else if let Some(prefix) = carry.as_mut() {
                join_spaced(prefix, &piece);
            } else {
                carry = Some(piece.trim().to_string());
            }
            continue;
        }
        match carry.take() {
            Some(prefix) => out.push(format!("{prefix} {piece}")),
            None => out.push(piece),
        }
    }
    if let Some(rest) = carry {
        out.push(rest);
    }
    out
}
