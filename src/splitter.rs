//! UAX #14 line splitting for outbound message text (spec §4.2).
//!
//! `split(text, max_bytes)` breaks `text` into segments each at most
//! `max_bytes` UTF-8 bytes long, preferring break opportunities chosen by
//! the Unicode line-breaking algorithm (UAX #14) over a hard cut. Mandatory
//! breaks (`BK`/`CR`/`LF`/`NL`) always force a split and are consumed
//! rather than carried into the next line; optional breaks are chosen by
//! lowest rule-priority. A grapheme cluster is never split across lines.

use unicode_linebreak::{linebreaks, BreakOpportunity};
use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into pieces each at most `max_bytes` UTF-8 bytes, breaking
/// at UAX-14 opportunities when possible and never inside a grapheme
/// cluster.
///
/// # Panics
/// Never — `max_bytes == 0` yields one empty-ish grapheme-by-grapheme
/// split attempt; callers should pass a sane (>0) byte budget.
#[must_use]
pub fn split(text: &str, max_bytes: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let break_points: Vec<(usize, BreakOpportunity)> = linebreaks(text).collect();
    let grapheme_starts: std::collections::BTreeSet<usize> =
        text.grapheme_indices(true).map(|(i, _)| i).collect();

    let mut lines = Vec::new();
    let mut line_start = 0usize;
    let mut last_opportunity: Option<usize> = None;

    let bytes = text.as_bytes();
    let mut cursor = 0usize;

    for &(pos, opportunity) in &break_points {
        let is_mandatory = matches!(opportunity, BreakOpportunity::Mandatory);

        // `pos` is the offset *after* the break opportunity (unicode-linebreak
        // convention): the opportunity lies between `pos`'s preceding char
        // and `pos`.
        if is_mandatory {
            let content_end = trim_mandatory_break(text, line_start, pos);
            push_nonempty(&mut lines, &text[line_start..content_end]);
            line_start = pos;
            last_opportunity = None;
            cursor = line_start;
            continue;
        }

        if grapheme_starts.contains(&pos) || pos == text.len() {
            last_opportunity = Some(pos);
        }

        if pos - line_start > max_bytes {
            // Overflow: use the last opportunity before this point, if any;
            // otherwise hard-cut at the last grapheme boundary that fits.
            let cut = last_opportunity.filter(|&o| o > line_start).unwrap_or_else(|| {
                hard_cut_point(&grapheme_starts, line_start, max_bytes)
            });
            push_nonempty(&mut lines, &text[line_start..cut]);
            line_start = cut;
            last_opportunity = None;
            cursor = line_start;
        } else {
            cursor = pos;
        }
    }

    let _ = cursor;
    let _ = bytes;

    if line_start < text.len() {
        // Remaining tail may still overflow max_bytes if it has no
        // opportunities; hard-cut repeatedly.
        let mut start = line_start;
        while text.len() - start > max_bytes {
            let cut = hard_cut_point(&grapheme_starts, start, max_bytes);
            if cut <= start {
                break;
            }
            push_nonempty(&mut lines, &text[start..cut]);
            start = cut;
        }
        push_nonempty(&mut lines, &text[start..]);
    }

    lines
}

fn push_nonempty(lines: &mut Vec<String>, s: &str) {
    if !s.is_empty() {
        lines.push(s.to_owned());
    }
}

/// Strip the mandatory break character(s) ending a segment (CR, LF, CRLF, or
/// other UAX-14 `BK` characters) so they are consumed, not carried forward.
fn trim_mandatory_break(text: &str, start: usize, end: usize) -> usize {
    let segment = &text[start..end];
    let trimmed = segment.trim_end_matches(['\r', '\n', '\u{0B}', '\u{0C}', '\u{85}', '\u{2028}', '\u{2029}']);
    start + trimmed.len()
}

/// Find the furthest grapheme boundary at or before `start + max_bytes`.
fn hard_cut_point(
    grapheme_starts: &std::collections::BTreeSet<usize>,
    start: usize,
    max_bytes: usize,
) -> usize {
    let limit = start + max_bytes;
    grapheme_starts
        .range(..=limit)
        .next_back()
        .copied()
        .filter(|&g| g > start)
        .unwrap_or(limit)
}
