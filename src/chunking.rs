//! Chunking engine: partitions page text into bounded windows along natural
//! breakpoints, attaching page anchors and structural context.
//!
//! Chunks are a partition of the source text, not a cover: their spans never
//! overlap, and concatenated in order they reconstruct the page's
//! whitespace-normalized text. A chunk spans multiple pages only when a
//! paragraph itself runs across a page break.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::structure::Outline;
use crate::types::{Chunk, Page, chunk_id};

/// Trailing characters that mark a paragraph as finished at a page break.
const PARAGRAPH_TERMINATORS: [char; 7] = ['.', '!', '?', ':', ';', '"', '\''];

/// A paragraph-or-smaller span of normalized text with its page anchors.
#[derive(Debug)]
struct Segment {
    text: String,
    start_page: u32,
    end_page: u32,
}

/// Collapses all whitespace runs to single spaces and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The normalized form a page's chunks reconstruct when concatenated with
/// single spaces. Exposed for the lossless-partition property.
pub fn normalize_page_text(raw_text: &str) -> String {
    split_paragraphs(raw_text).join(" ")
}

fn split_paragraphs(raw_text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for line in raw_text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(normalize_whitespace(&current));
                current.clear();
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(normalize_whitespace(&current));
    }
    paragraphs.retain(|paragraph| !paragraph.is_empty());
    paragraphs
}

fn ends_terminated(paragraph: &str) -> bool {
    paragraph
        .chars()
        .last()
        .is_some_and(|last| PARAGRAPH_TERMINATORS.contains(&last))
}

fn continues_previous(paragraph: &str) -> bool {
    paragraph
        .chars()
        .next()
        .is_some_and(|first| first.is_lowercase())
}

/// Splits pages into paragraph segments, stitching a paragraph that runs
/// across a page break back into one segment spanning both pages.
fn collect_segments(pages: &[Page]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut carry: Option<Segment> = None;

    for (index, page) in pages.iter().enumerate() {
        let mut paragraphs = split_paragraphs(&page.raw_text);

        if let Some(pending) = carry.take() {
            if !paragraphs.is_empty()
                && page.page_number == pending.end_page + 1
                && continues_previous(&paragraphs[0])
            {
                let continuation = paragraphs.remove(0);
                segments.push(Segment {
                    text: format!("{} {}", pending.text, continuation),
                    start_page: pending.start_page,
                    end_page: page.page_number,
                });
            } else {
                segments.push(pending);
            }
        }

        let last_index = paragraphs.len().checked_sub(1);
        for (paragraph_index, paragraph) in paragraphs.into_iter().enumerate() {
            let is_last_on_page = Some(paragraph_index) == last_index;
            let is_last_page = index + 1 == pages.len();
            if is_last_on_page && !is_last_page && !ends_terminated(&paragraph) {
                carry = Some(Segment {
                    text: paragraph,
                    start_page: page.page_number,
                    end_page: page.page_number,
                });
            } else {
                segments.push(Segment {
                    text: paragraph,
                    start_page: page.page_number,
                    end_page: page.page_number,
                });
            }
        }
    }

    if let Some(pending) = carry {
        segments.push(pending);
    }
    segments
}

/// Splits a single overlong word at character boundaries. Pure degradation
/// path; only reachable when a "word" exceeds the whole window.
fn split_word(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Packs words into pieces no longer than `max_chars`. Splitting on spaces
/// keeps the join-with-space reconstruction exact.
fn split_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_word(word, max_chars));
            continue;
        }
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Splits an oversized segment at sentence boundaries where available,
/// falling back to word and finally character splits. A piece produced by
/// the fallback path lacks a trailing sentence terminator, which implicitly
/// flags the degradation.
fn split_oversized(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for sentence in text.split_sentence_bounds() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();
        if sentence_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_words(sentence, max_chars));
            continue;
        }
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + sentence_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Partitions the pages of one document into chunks, looking up structural
/// context for each chunk's start page in `outline`.
///
/// Pages must arrive in ascending page order (caller responsibility, matching
/// the structure detector's contract). An empty page yields zero chunks.
pub fn chunk_pages(pages: &[Page], outline: &Outline, config: &ChunkingConfig) -> Vec<Chunk> {
    let Some(first) = pages.first() else {
        return Vec::new();
    };
    let document_id = first.document_id.clone();

    let mut pieces: Vec<Segment> = Vec::new();
    for segment in collect_segments(pages) {
        if segment.text.chars().count() <= config.max_chars {
            pieces.push(segment);
        } else {
            for piece in split_oversized(&segment.text, config.max_chars) {
                pieces.push(Segment {
                    text: piece,
                    start_page: segment.start_page,
                    end_page: segment.end_page,
                });
            }
        }
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut sequence = 0usize;
    let mut buffer: Option<Segment> = None;

    let mut flush = |buffer: &mut Option<Segment>, chunks: &mut Vec<Chunk>, sequence: &mut usize| {
        if let Some(segment) = buffer.take() {
            chunks.push(Chunk {
                chunk_id: chunk_id(&document_id, *sequence),
                document_id: document_id.clone(),
                text: segment.text,
                start_page: segment.start_page,
                end_page: segment.end_page,
                structural_context: outline.context_for(segment.start_page),
            });
            *sequence += 1;
        }
    };

    for piece in pieces {
        let spans_pages = piece.start_page != piece.end_page;
        let can_append = buffer.as_ref().is_some_and(|current| {
            !spans_pages
                && current.start_page == piece.start_page
                && current.end_page == piece.end_page
                && current.text.chars().count() + 1 + piece.text.chars().count()
                    <= config.max_chars
        });
        if can_append {
            let current = buffer.as_mut().expect("checked by can_append");
            current.text.push(' ');
            current.text.push_str(&piece.text);
            continue;
        }
        flush(&mut buffer, &mut chunks, &mut sequence);
        buffer = Some(piece);
        if spans_pages {
            // A page-spanning paragraph always stands alone.
            flush(&mut buffer, &mut chunks, &mut sequence);
        }
    }
    flush(&mut buffer, &mut chunks, &mut sequence);

    // A trailing undersized chunk folds into its same-page predecessor when
    // the merged text still fits the window.
    merge_trailing_fragment(&mut chunks, config);

    chunks
}

fn merge_trailing_fragment(chunks: &mut Vec<Chunk>, config: &ChunkingConfig) {
    if chunks.len() < 2 {
        return;
    }
    let last = &chunks[chunks.len() - 1];
    let previous = &chunks[chunks.len() - 2];
    let last_len = last.text.chars().count();
    let combined = previous.text.chars().count() + 1 + last_len;
    if last_len < config.min_chars
        && previous.start_page == last.start_page
        && previous.end_page == last.end_page
        && combined <= config.max_chars
    {
        let fragment = chunks.pop().expect("len checked above");
        let target = chunks.last_mut().expect("len checked above");
        target.text.push(' ');
        target.text.push_str(&fragment.text);
    }
}
