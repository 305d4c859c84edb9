//! Generic sliding-window chunking with overlap.
//!
//! Used for prose, configuration, unsupported languages, and as the
//! fallback for oversize code entities. Window edges snap back to the
//! nearest preceding word boundary so tokens are never split, and a trailing
//! remainder shorter than the minimum merges into the previous chunk.

/// Window sizing, in bytes of UTF-8 text.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Upper bound for a chunk (default: 1000).
    pub max_chunk_size: usize,
    /// Bytes shared between consecutive chunks (default: 150).
    pub overlap_size: usize,
    /// Chunks below this merge into a neighbor (default: 100).
    pub min_chunk_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap_size: 150,
            min_chunk_size: 100,
        }
    }
}

/// Half-open byte range `[start, end)` within the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `text` into overlapping windows.
///
/// Consecutive spans share up to `overlap_size` bytes; every span except the
/// last is at most `max_chunk_size` long (the last may absorb a remainder
/// shorter than `min_chunk_size` and exceed the maximum by that much).
#[must_use]
pub fn split_windows(text: &str, config: &WindowConfig) -> Vec<Span> {
    let len = text.len();
    if len == 0 {
        return Vec::new();
    }
    let max = config.max_chunk_size.max(1);

    let mut spans: Vec<Span> = Vec::new();
    let mut start = 0_usize;

    loop {
        if len - start <= max {
            if len - start < config.min_chunk_size
                && let Some(last) = spans.last_mut()
            {
                // Tiny trailing remainder: grow the previous chunk instead
                // of emitting a fragment.
                last.end = len;
            } else {
                spans.push(Span { start, end: len });
            }
            break;
        }

        let end = snap_to_word_boundary(text, start + max, start);
        spans.push(Span { start, end });

        let overlap_start = end.saturating_sub(config.overlap_size);
        start = if overlap_start <= start {
            end
        } else {
            let snapped = snap_to_word_boundary(text, overlap_start, start);
            if snapped <= start { end } else { snapped }
        };
    }

    spans
}

/// Largest position `p` in `(floor, idx]` that does not split a word:
/// either side of `p` is whitespace. Falls back to `idx` (char-floored)
/// when the whole range is one unbroken token.
fn snap_to_word_boundary(text: &str, idx: usize, floor: usize) -> usize {
    let idx = floor_char_boundary(text, idx);
    let mut i = idx;

    while i > floor {
        let prev = text[..i].chars().next_back();
        let next = text[i..].chars().next();
        let at_boundary = match (prev, next) {
            (Some(p), Some(n)) => p.is_whitespace() || n.is_whitespace(),
            _ => true,
        };
        if at_boundary {
            return i;
        }
        i -= prev.map_or(1, char::len_utf8);
    }

    idx
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_config() -> WindowConfig {
        WindowConfig {
            max_chunk_size: 40,
            overlap_size: 10,
            min_chunk_size: 8,
        }
    }

    #[test]
    fn empty_input_yields_no_spans() {
        assert!(split_windows("", &WindowConfig::default()).is_empty());
    }

    #[test]
    fn short_input_yields_single_span() {
        let text = "short text";
        let spans = split_windows(text, &WindowConfig::default());
        assert_eq!(spans, vec![Span { start: 0, end: text.len() }]);
    }

    #[test]
    fn windows_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let spans = split_windows(text, &small_config());
        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            assert!(pair[1].start < pair[0].end, "expected overlap between spans");
            assert!(pair[1].start > pair[0].start, "expected forward progress");
        }
    }

    #[test]
    fn edges_do_not_split_words() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let spans = split_windows(text, &small_config());
        for span in &spans {
            if span.end < text.len() {
                let before = text[..span.end].chars().next_back().unwrap();
                let after = text[span.end..].chars().next().unwrap();
                assert!(
                    before.is_whitespace() || after.is_whitespace(),
                    "span edge at {} splits a word",
                    span.end
                );
            }
        }
    }

    #[test]
    fn tiny_remainder_merges_into_previous() {
        // 40-byte windows over 45 bytes of text leave a 5-byte tail, which
        // is below min_chunk_size and must merge.
        let text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii";
        let config = WindowConfig {
            max_chunk_size: 40,
            overlap_size: 0,
            min_chunk_size: 8,
        };
        let spans = split_windows(text, &config);
        assert_eq!(spans.last().unwrap().end, text.len());
        for span in &spans {
            assert!(span.len() >= config.min_chunk_size);
        }
    }

    #[test]
    fn unbroken_token_still_makes_progress() {
        let text = "x".repeat(200);
        let config = WindowConfig {
            max_chunk_size: 50,
            overlap_size: 10,
            min_chunk_size: 5,
        };
        let spans = split_windows(&text, &config);
        assert!(spans.len() > 1);
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn multibyte_text_stays_on_char_boundaries() {
        let text = "日本語のテキスト ".repeat(20);
        let spans = split_windows(&text, &small_config());
        for span in &spans {
            assert!(text.is_char_boundary(span.start));
            assert!(text.is_char_boundary(span.end));
        }
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    proptest! {
        #[test]
        fn coverage_without_gaps(text in "[a-z ]{0,500}", max in 20_usize..120, overlap in 0_usize..15) {
            let config = WindowConfig {
                max_chunk_size: max,
                overlap_size: overlap,
                min_chunk_size: 10,
            };
            let spans = split_windows(&text, &config);

            if text.is_empty() {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(spans[0].start, 0);
                prop_assert_eq!(spans.last().unwrap().end, text.len());
                for pair in spans.windows(2) {
                    // No gap: the next span starts at or before the previous end.
                    prop_assert!(pair[1].start <= pair[0].end);
                    prop_assert!(pair[1].start > pair[0].start);
                }
            }
        }

        #[test]
        fn spans_respect_max_plus_merge_slack(text in "[a-z ]{0,500}") {
            let config = WindowConfig {
                max_chunk_size: 50,
                overlap_size: 10,
                min_chunk_size: 10,
            };
            for span in split_windows(&text, &config) {
                prop_assert!(span.len() <= config.max_chunk_size + config.min_chunk_size);
            }
        }
    }
}
