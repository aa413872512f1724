use crate::error::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Windowing parameters for `chunk_text`, measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Within each window the cut prefers the last sentence or paragraph
/// boundary past the window midpoint; otherwise the window is cut at its
/// raw size. Consecutive chunks share `overlap` characters of context.
/// Windowing is character-based, so multi-byte input never splits a
/// code point.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.chunk_size {
        return Ok(vec![text.trim().to_string()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let window_end = (start + config.chunk_size).min(chars.len());

        let end = if window_end < chars.len() {
            boundary_cut(&chars[start..window_end], config.chunk_size / 2)
                .map(|cut| start + cut)
                .unwrap_or(window_end)
        } else {
            window_end
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }

        // A boundary cut can land close to the midpoint; clamp so the
        // scan always moves forward.
        start = end.saturating_sub(config.overlap).max(start + 1);
    }

    Ok(chunks)
}

/// Last position past `midpoint` where the window ends a sentence
/// (`.`/`!`/`?` followed by whitespace) or a paragraph (blank line).
/// Returns the cut index just after the boundary pair.
fn boundary_cut(window: &[char], midpoint: usize) -> Option<usize> {
    for position in (0..window.len().saturating_sub(1)).rev() {
        if position <= midpoint {
            break;
        }

        let here = window[position];
        let next = window[position + 1];
        let ends_sentence = matches!(here, '.' | '!' | '?') && next.is_whitespace();
        let ends_paragraph = here == '\n' && next == '\n';

        if ends_sentence || ends_paragraph {
            return Some(position + 2);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunk_text("", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());

        let chunks = chunk_text("   \n  ", &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunks = chunk_text("  hello world  ", &config(100, 10)).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            chunk_text("some text", &config(10, 10)),
            Err(RagError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            chunk_text("some text", &config(10, 15)),
            Err(RagError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(
            chunk_text("some text", &config(0, 0)),
            Err(RagError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn breaks_at_sentence_boundary_not_mid_word() {
        let text = "The sky is blue. Water is wet.";
        let chunks = chunk_text(text, &config(15, 3)).unwrap();

        assert_eq!(chunks[0], "The sky is blue");
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().count() <= 15);
        }
    }

    #[test]
    fn paragraph_break_is_preferred_past_the_midpoint() {
        let text = "first paragraph here\n\nsecond paragraph continues on for a while";
        let chunks = chunk_text(text, &config(30, 5)).unwrap();

        assert_eq!(chunks[0], "first paragraph here");
    }

    #[test]
    fn consecutive_chunks_share_overlap_context() {
        // No boundaries anywhere, so every cut is a raw window cut.
        let text: String = ('a'..='z').cycle().take(100).collect();
        let chunks = chunk_text(&text, &config(20, 5)).unwrap();

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(5).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn chunk_concatenation_covers_the_original_text() {
        let text: String = ('a'..='z').cycle().take(200).collect();
        let overlap = 7;
        let chunks = chunk_text(&text, &config(40, overlap)).unwrap();

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk.chars().skip(overlap).collect::<String>());
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_never_splits_a_code_point() {
        let text = "é".repeat(95);
        let chunks = chunk_text(&text, &config(30, 5)).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().all(|character| character == 'é'));
        }
    }

    #[test]
    fn scan_terminates_when_boundaries_sit_near_the_midpoint() {
        // Sentence ends land just past every midpoint, which drags each
        // cut backwards; the clamp must still make progress.
        let text = "ab cd. ".repeat(50);
        let chunks = chunk_text(&text, &config(12, 9)).unwrap();
        assert!(!chunks.is_empty());
    }
}
