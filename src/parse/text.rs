//! Plain text → paragraphs.
//!
//! Blocks are separated by blank lines; the lines of a block are trimmed
//! and joined with a single space.

use crate::document::Segment;

pub fn parse(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut segments, &mut block);
        } else {
            block.push(line);
        }
    }
    flush(&mut segments, &mut block);
    segments
}

fn flush(segments: &mut Vec<Segment>, block: &mut Vec<&str>) {
    if block.is_empty() {
        return;
    }
    segments.push(Segment::paragraph(vec![Segment::text(block.join(" "))]));
    block.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_split_paragraphs() {
        let segs = parse("  Release 1.0\nfixes bugs.  \n\n\n\tRelease 0.9\n");
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].text_content(), "Release 1.0 fixes bugs.");
        assert_eq!(segs[1].text_content(), "Release 0.9");
    }

    #[test]
    fn empty_input_has_no_segments() {
        assert!(parse("\n  \n").is_empty());
    }
}
