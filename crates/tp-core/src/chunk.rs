//! Line-aligned chunking of table content.
//!
//! Table content is rebuilt line by line into one buffer while chunk
//! boundaries are recorded, so the buffer can be validated as a whole and
//! then shipped as a sequence of slices that never split a row.
//!
//! The CSV reader skips empty lines, which would shift the five metadata rows
//! if one of them is blank. Blank lines among the first five are therefore
//! rewritten to a single `,` (an empty two-field record).

/// Number of leading metadata lines protected from blank-line collapse.
pub const METADATA_LINES: usize = 5;

const BLANK_METADATA_LINE: &str = ",";

/// Normalized content plus the end offset of every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedContent {
    content: String,
    boundaries: Vec<usize>,
}

/// One slice of a [`ChunkedContent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub number: usize,
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
    pub is_last: bool,
}

impl ChunkedContent {
    /// Rebuild `raw` line by line and split it into chunks of at most
    /// `budget` bytes.
    ///
    /// A chunk is closed before the line that would push it over budget, even
    /// when that chunk is still empty, so an oversized first line is preceded
    /// by an empty chunk 0. An oversized line is never split. The final
    /// boundary is always the end of the buffer, so empty input
    /// still yields one (empty) chunk.
    pub fn build(raw: &str, budget: usize) -> Self {
        let mut content = String::with_capacity(raw.len() + METADATA_LINES);
        let mut boundaries = Vec::new();
        let mut chunk_start = 0;

        for (lineno, line) in raw.lines().enumerate() {
            let line = if line.is_empty() && lineno < METADATA_LINES {
                BLANK_METADATA_LINE
            } else {
                line
            };
            let line_len = line.len() + 1;
            let chunk_len = content.len() - chunk_start;
            if chunk_len + line_len > budget {
                boundaries.push(content.len());
                chunk_start = content.len();
            }
            content.push_str(line);
            content.push('\n');
        }
        boundaries.push(content.len());

        Self {
            content,
            boundaries,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'_>> + '_ {
        let total = self.content.len();
        let starts = std::iter::once(0).chain(self.boundaries.iter().copied());
        starts
            .zip(self.boundaries.iter().copied())
            .enumerate()
            .map(move |(number, (start, end))| Chunk {
                number,
                start,
                end,
                text: &self.content[start..end],
                is_last: end == total,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_metadata_lines_rewritten() {
        let chunked = ChunkedContent::build("v1\n\nname\nstr\n\nx\n\ny\n", 1000);
        assert_eq!(chunked.content(), "v1\n,\nname\nstr\n,\nx\n\ny\n");
    }

    #[test]
    fn test_missing_trailing_newline_added() {
        let chunked = ChunkedContent::build("a\nb", 1000);
        assert_eq!(chunked.content(), "a\nb\n");
        assert_eq!(chunked.boundaries(), &[4]);
    }

    #[test]
    fn test_crlf_normalized() {
        let chunked = ChunkedContent::build("a\r\nb\r\n", 1000);
        assert_eq!(chunked.content(), "a\nb\n");
    }

    #[test]
    fn test_empty_content_has_one_boundary() {
        let chunked = ChunkedContent::build("", 10);
        assert_eq!(chunked.boundaries(), &[0]);
        let chunks: Vec<_> = chunked.chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn test_boundaries_fall_on_line_ends() {
        // each line is 4 bytes with its newline
        let chunked = ChunkedContent::build("aaa\nbbb\nccc\nddd\neee\n", 8);
        assert_eq!(chunked.boundaries(), &[8, 16, 20]);
        let texts: Vec<_> = chunked.chunks().map(|c| c.text).collect();
        assert_eq!(texts, vec!["aaa\nbbb\n", "ccc\nddd\n", "eee\n"]);
    }

    #[test]
    fn test_exact_fit_stays_in_chunk() {
        let chunked = ChunkedContent::build("aaa\nbbb\n", 8);
        assert_eq!(chunked.boundaries(), &[8]);
    }

    #[test]
    fn test_oversized_line_gets_own_chunk() {
        let chunked = ChunkedContent::build("a\nbbbbbbbbbb\nc\n", 4);
        let texts: Vec<_> = chunked.chunks().map(|c| c.text).collect();
        assert_eq!(texts, vec!["a\n", "bbbbbbbbbb\n", "c\n"]);
    }

    #[test]
    fn test_oversized_first_line_leaves_empty_chunk() {
        let chunked = ChunkedContent::build("aaaaaaaaaa\nb\n", 4);
        assert_eq!(chunked.boundaries(), &[0, 11, 13]);
        let chunks: Vec<_> = chunked.chunks().collect();
        assert_eq!(chunks[0].text, "");
        assert!(!chunks[0].is_last);
        assert_eq!(chunks[1].text, "aaaaaaaaaa\n");
        assert_eq!(chunks[2].number, 2);
        assert!(chunks[2].is_last);
    }

    #[test]
    fn test_only_final_chunk_is_last() {
        let chunked = ChunkedContent::build("aaa\nbbb\nccc\n", 4);
        let flags: Vec<_> = chunked.chunks().map(|c| c.is_last).collect();
        assert_eq!(flags, vec![false, false, true]);
        let numbers: Vec<_> = chunked.chunks().map(|c| c.number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }
}
