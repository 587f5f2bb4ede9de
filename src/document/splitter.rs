/// Separator cascade, coarsest first. The empty separator is the terminal
/// fallback: it splits into single characters so oversized runs without any
/// natural boundary still get cut, without ever landing mid-character.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character text splitter.
///
/// Splits on the coarsest separator present in the text, recurses into
/// pieces that are still larger than `chunk_size`, then greedily merges
/// adjacent pieces back together, carrying `chunk_overlap` of trailing
/// context from each chunk into the next.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator that actually occurs in the text wins; the empty
        // separator matches everything.
        let mut separator = *separators.last().unwrap_or(&"");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_on(text, separator);

        let mut chunks = Vec::new();
        let mut small: Vec<String> = Vec::new();
        for piece in splits {
            if piece.len() < self.chunk_size {
                small.push(piece);
            } else {
                if !small.is_empty() {
                    chunks.extend(self.merge(&small, separator));
                    small.clear();
                }
                if remaining.is_empty() {
                    chunks.push(piece);
                } else {
                    chunks.extend(self.split_with(&piece, remaining));
                }
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small, separator));
        }
        chunks
    }

    /// Greedily joins pieces into chunks of at most `chunk_size`, retaining
    /// up to `chunk_overlap` of tail pieces at the start of the next chunk.
    fn merge(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = separator.len();
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut total = 0usize;

        for piece in splits {
            let piece_len = piece.len();
            if !current.is_empty() && total + piece_len + sep_len > self.chunk_size {
                if let Some(chunk) = join_pieces(&current, separator) {
                    chunks.push(chunk);
                }
                // Shrink the window from the front until the retained tail
                // fits inside the overlap and leaves room for the new piece.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + piece_len + extra_sep(&current, sep_len) > self.chunk_size)
                {
                    let dropped = current.remove(0);
                    total -= dropped.len() + extra_sep(&current, sep_len);
                }
            }
            total += piece_len + extra_sep(&current, sep_len);
            current.push(piece.clone());
        }

        if let Some(chunk) = join_pieces(&current, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

/// Separator bytes owed if another piece joins the current window.
fn extra_sep(current: &[String], sep_len: usize) -> usize {
    if current.is_empty() {
        0
    } else {
        sep_len
    }
}

fn split_on(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    text.split(separator)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_pieces(pieces: &[String], separator: &str) -> Option<String> {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(1000, 200);
        let chunks = splitter.split("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let splitter = TextSplitter::new(100, 10);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  \n ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let splitter = TextSplitter::new(40, 10);
        let text = "The quick brown fox jumps over the lazy dog. \
                    Pack my box with five dozen liquor jugs. \
                    How vexingly quick daft zebras jump.";
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 40, "chunk too long: {:?}", chunk);
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let splitter = TextSplitter::new(10, 5);
        let chunks = splitter.split("aaaa bbbb cccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(30, 0);
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird one";
        let chunks = splitter.split(text);
        assert!(chunks.contains(&"first paragraph here".to_string()));
        assert!(chunks.contains(&"second paragraph here".to_string()));
    }

    #[test]
    fn test_unbroken_run_is_hard_cut() {
        let splitter = TextSplitter::new(10, 2);
        let text = "x".repeat(25);
        let chunks = splitter.split(&text);
        let lengths: Vec<usize> = chunks.iter().map(String::len).collect();
        assert_eq!(lengths, vec![10, 10, 9]);
    }

    #[test]
    fn test_hard_cut_respects_char_boundaries() {
        let splitter = TextSplitter::new(10, 2);
        // Multi-byte characters with no separator anywhere.
        let text = "é".repeat(30);
        let chunks = splitter.split(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn test_deterministic_output() {
        let splitter = TextSplitter::new(50, 10);
        let text = "one two three four five six seven eight nine ten\n\
                    eleven twelve thirteen fourteen fifteen sixteen";
        assert_eq!(splitter.split(text), splitter.split(text));
    }
}
