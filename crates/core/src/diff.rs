//! Line-oriented diff engine.
//!
//! Produces unified-style patches with [`CONTEXT_LINES`] lines of context,
//! applies them strictly, and inverts them for history reconstruction.
//!
//! Text is split on `'\n'` only, so `"a\n"` is the two lines `["a", ""]` and
//! joining with `'\n'` reproduces the input byte-for-byte. Every function in
//! this module is pure.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, group_diff_ops, Algorithm, DiffOp, DiffTag};

use crate::error::CoreError;

/// Lines of unchanged context kept around each change.
pub const CONTEXT_LINES: usize = 3;

const OLD_FILE_HEADER: &str = "--- a";
const NEW_FILE_HEADER: &str = "+++ b";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A patch that cannot be parsed or does not fit the text it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("malformed patch at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("hunk {hunk} does not match base text at line {line}")]
    Mismatch { hunk: usize, line: usize },

    #[error("hunk {hunk} extends past the end of the base text ({base_len} lines)")]
    OutOfRange { hunk: usize, base_len: usize },

    #[error("hunk {hunk} overlaps or precedes the previous hunk")]
    Overlap { hunk: usize },

    #[error("hunk {hunk} expects output line {expected} but is at line {actual}")]
    Offset {
        hunk: usize,
        expected: usize,
        actual: usize,
    },

    #[error("patch does not reproduce the {0} text")]
    Diverged(&'static str),
}

impl From<PatchError> for CoreError {
    fn from(err: PatchError) -> Self {
        CoreError::PatchApply(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Patch model
// ---------------------------------------------------------------------------

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Delete(String),
    Insert(String),
}

impl HunkLine {
    fn prefix(&self) -> char {
        match self {
            Self::Context(_) => ' ',
            Self::Delete(_) => '-',
            Self::Insert(_) => '+',
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Context(text) | Self::Delete(text) | Self::Insert(text) => text,
        }
    }
}

/// A contiguous region of change.
///
/// `old_start` / `new_start` are 0-based line indices; the unified rendering
/// converts them to the 1-based convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// The same hunk seen from the other side: inserts become deletes and
    /// vice versa, source and target ranges are swapped.
    ///
    /// Within every run of changed lines the deletes are emitted before the
    /// inserts, so a swapped change renders the way a forward diff would.
    pub fn inverted(&self) -> Hunk {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut deletes = Vec::new();
        let mut inserts = Vec::new();

        for line in &self.lines {
            match line {
                HunkLine::Context(text) => {
                    lines.append(&mut deletes);
                    lines.append(&mut inserts);
                    lines.push(HunkLine::Context(text.clone()));
                }
                HunkLine::Insert(text) => deletes.push(HunkLine::Delete(text.clone())),
                HunkLine::Delete(text) => inserts.push(HunkLine::Insert(text.clone())),
            }
        }
        lines.append(&mut deletes);
        lines.append(&mut inserts);

        Hunk {
            old_start: self.new_start,
            old_len: self.new_len,
            new_start: self.old_start,
            new_len: self.old_len,
            lines,
        }
    }
}

/// A forward diff: the ordered, non-overlapping hunks turning one text into
/// another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    hunks: Vec<Hunk>,
}

impl Patch {
    pub fn new(hunks: Vec<Hunk>) -> Self {
        Self { hunks }
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// `true` when the two texts were identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// The inverse patch, mapping the target text back onto the source.
    pub fn reversed(&self) -> Patch {
        Patch {
            hunks: self.hunks.iter().map(Hunk::inverted).collect(),
        }
    }

    /// Number of inserted and deleted lines across all hunks.
    pub fn line_counts(&self) -> (usize, usize) {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .fold((0, 0), |(added, deleted), line| match line {
                HunkLine::Insert(_) => (added + 1, deleted),
                HunkLine::Delete(_) => (added, deleted + 1),
                HunkLine::Context(_) => (added, deleted),
            })
    }

    /// Apply this patch to `base`, verifying every context and deleted line.
    pub fn apply(&self, base: &str) -> Result<String, PatchError> {
        let base_lines = split_lines(base);
        let mut out: Vec<&str> = Vec::with_capacity(base_lines.len());
        let mut cursor = 0;

        for (idx, hunk) in self.hunks.iter().enumerate() {
            let hunk_no = idx + 1;
            if hunk.old_start < cursor {
                return Err(PatchError::Overlap { hunk: hunk_no });
            }
            if hunk.old_start + hunk.old_len > base_lines.len() {
                return Err(PatchError::OutOfRange {
                    hunk: hunk_no,
                    base_len: base_lines.len(),
                });
            }

            out.extend_from_slice(&base_lines[cursor..hunk.old_start]);
            if out.len() != hunk.new_start {
                return Err(PatchError::Offset {
                    hunk: hunk_no,
                    expected: hunk.new_start + 1,
                    actual: out.len() + 1,
                });
            }

            let mut pos = hunk.old_start;
            for line in &hunk.lines {
                match line {
                    HunkLine::Insert(text) => out.push(text),
                    HunkLine::Context(text) | HunkLine::Delete(text) => {
                        let found = base_lines.get(pos).copied();
                        if found != Some(text.as_str()) {
                            return Err(PatchError::Mismatch {
                                hunk: hunk_no,
                                line: pos + 1,
                            });
                        }
                        if let HunkLine::Context(_) = line {
                            out.push(text);
                        }
                        pos += 1;
                    }
                }
            }
            cursor = pos;
        }

        out.extend_from_slice(&base_lines[cursor..]);
        Ok(out.join("\n"))
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hunks.is_empty() {
            return Ok(());
        }
        writeln!(f, "{OLD_FILE_HEADER}")?;
        writeln!(f, "{NEW_FILE_HEADER}")?;
        for hunk in &self.hunks {
            writeln!(
                f,
                "@@ -{} +{} @@",
                format_range(hunk.old_start, hunk.old_len),
                format_range(hunk.new_start, hunk.new_len)
            )?;
            for line in &hunk.lines {
                writeln!(f, "{}{}", line.prefix(), line.text())?;
            }
        }
        Ok(())
    }
}

impl FromStr for Patch {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Patch::default());
        }
        let body = s.strip_suffix('\n').ok_or_else(|| PatchError::Malformed {
            line: s.split('\n').count(),
            reason: "patch must end with a newline".into(),
        })?;

        let mut lines = body.split('\n').enumerate().map(|(i, l)| (i + 1, l));

        for expected in [OLD_FILE_HEADER, NEW_FILE_HEADER] {
            match lines.next() {
                Some((_, l)) if l == expected => {}
                Some((n, _)) => {
                    return Err(PatchError::Malformed {
                        line: n,
                        reason: format!("expected '{expected}'"),
                    })
                }
                None => {
                    return Err(PatchError::Malformed {
                        line: 1,
                        reason: "missing file headers".into(),
                    })
                }
            }
        }

        let mut hunks = Vec::new();
        while let Some((n, header)) = lines.next() {
            let (old_start, old_len, new_start, new_len) = parse_hunk_header(header, n)?;
            let mut hunk = Hunk {
                old_start,
                old_len,
                new_start,
                new_len,
                lines: Vec::new(),
            };

            let (mut old_seen, mut new_seen) = (0, 0);
            while old_seen < old_len || new_seen < new_len {
                let Some((n, raw)) = lines.next() else {
                    return Err(PatchError::Malformed {
                        line: n,
                        reason: "hunk ends early".into(),
                    });
                };
                let prefix = raw.chars().next();
                let text = prefix
                    .map(|c| raw[c.len_utf8()..].to_string())
                    .unwrap_or_default();
                let line = match prefix {
                    Some(' ') => {
                        old_seen += 1;
                        new_seen += 1;
                        HunkLine::Context(text)
                    }
                    Some('-') => {
                        old_seen += 1;
                        HunkLine::Delete(text)
                    }
                    Some('+') => {
                        new_seen += 1;
                        HunkLine::Insert(text)
                    }
                    _ => {
                        return Err(PatchError::Malformed {
                            line: n,
                            reason: "expected ' ', '-' or '+' line prefix".into(),
                        })
                    }
                };
                if old_seen > old_len || new_seen > new_len {
                    return Err(PatchError::Malformed {
                        line: n,
                        reason: "hunk body longer than its header".into(),
                    });
                }
                hunk.lines.push(line);
            }
            hunks.push(hunk);
        }

        Ok(Patch { hunks })
    }
}

fn format_range(start: usize, len: usize) -> String {
    // Unified convention: an empty side names the line before it.
    let first = if len == 0 { start } else { start + 1 };
    format!("{first},{len}")
}

fn parse_hunk_header(header: &str, n: usize) -> Result<(usize, usize, usize, usize), PatchError> {
    let malformed = |reason: &str| PatchError::Malformed {
        line: n,
        reason: reason.to_string(),
    };

    let ranges = header
        .strip_prefix("@@ -")
        .and_then(|rest| rest.split_once(" @@"))
        .map(|(ranges, _)| ranges)
        .ok_or_else(|| malformed("expected hunk header '@@ -a,b +c,d @@'"))?;
    let (old, new) = ranges
        .split_once(" +")
        .ok_or_else(|| malformed("hunk header is missing the '+' range"))?;

    let (old_start, old_len) = parse_range(old).ok_or_else(|| malformed("bad '-' range"))?;
    let (new_start, new_len) = parse_range(new).ok_or_else(|| malformed("bad '+' range"))?;
    Ok((old_start, old_len, new_start, new_len))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (first, len) = match range.split_once(',') {
        Some((first, len)) => (first.parse::<usize>().ok()?, len.parse::<usize>().ok()?),
        None => (range.parse::<usize>().ok()?, 1),
    };
    let start = if len == 0 { first } else { first.checked_sub(1)? };
    Some((start, len))
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Split text into lines on `'\n'`, keeping a trailing empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Compute the forward patch transforming `old` into `new`.
pub fn diff_texts(old: &str, new: &str) -> Patch {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let ops = aligned_ops(&old_lines, &new_lines);

    let hunks = group_diff_ops(ops, CONTEXT_LINES)
        .into_iter()
        .filter_map(|group| {
            if group.iter().all(|op| op.tag() == DiffTag::Equal) {
                return None;
            }
            let first = group.first()?;
            let last = group.last()?;
            let old_start = first.old_range().start;
            let new_start = first.new_range().start;

            let mut lines = Vec::new();
            for op in &group {
                let (tag, old_range, new_range) = op.as_tag_tuple();
                match tag {
                    DiffTag::Equal => lines.extend(
                        old_range.map(|i| HunkLine::Context(old_lines[i].to_string())),
                    ),
                    DiffTag::Delete => lines.extend(
                        old_range.map(|i| HunkLine::Delete(old_lines[i].to_string())),
                    ),
                    DiffTag::Insert => lines.extend(
                        new_range.map(|i| HunkLine::Insert(new_lines[i].to_string())),
                    ),
                    DiffTag::Replace => {
                        lines.extend(old_range.map(|i| HunkLine::Delete(old_lines[i].to_string())));
                        lines.extend(new_range.map(|i| HunkLine::Insert(new_lines[i].to_string())));
                    }
                }
            }

            Some(Hunk {
                old_start,
                old_len: last.old_range().end - old_start,
                new_start,
                new_len: last.new_range().end - new_start,
                lines,
            })
        })
        .collect();

    Patch { hunks }
}

/// Edit script between two line slices, in ascending position order.
///
/// Only the matched runs reported by Myers are used. The ops `similar` emits
/// around a replacement may arrive out of order or with shifted indices, so
/// the gaps between matches are rebuilt here as delete / insert / replace.
fn aligned_ops(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let mut matches: Vec<(usize, usize, usize)> =
        capture_diff_slices(Algorithm::Myers, old, new)
            .into_iter()
            .filter_map(|op| match op {
                DiffOp::Equal {
                    old_index,
                    new_index,
                    len,
                } => Some((old_index, new_index, len)),
                _ => None,
            })
            .collect();
    matches.sort_unstable();

    let mut ops = Vec::new();
    let (mut old_pos, mut new_pos) = (0, 0);
    for (old_index, new_index, len) in matches {
        let old_end = old_index + len;
        let new_end = new_index + len;
        let usable = len > 0
            && old_index >= old_pos
            && new_index >= new_pos
            && old_end <= old.len()
            && new_end <= new.len()
            && old[old_index..old_end] == new[new_index..new_end];
        if !usable {
            continue;
        }
        push_gap(&mut ops, old_pos..old_index, new_pos..new_index);
        match ops.last_mut() {
            Some(DiffOp::Equal { len: prev, .. })
                if old_index == old_pos && new_index == new_pos =>
            {
                *prev += len;
            }
            _ => ops.push(DiffOp::Equal {
                old_index,
                new_index,
                len,
            }),
        }
        old_pos = old_end;
        new_pos = new_end;
    }
    push_gap(&mut ops, old_pos..old.len(), new_pos..new.len());
    ops
}

fn push_gap(ops: &mut Vec<DiffOp>, old: Range<usize>, new: Range<usize>) {
    let op = match (old.is_empty(), new.is_empty()) {
        (true, true) => return,
        (false, true) => DiffOp::Delete {
            old_index: old.start,
            old_len: old.len(),
            new_index: new.start,
        },
        (true, false) => DiffOp::Insert {
            old_index: old.start,
            new_index: new.start,
            new_len: new.len(),
        },
        (false, false) => DiffOp::Replace {
            old_index: old.start,
            old_len: old.len(),
            new_index: new.start,
            new_len: new.len(),
        },
    };
    ops.push(op);
}

/// Compute the unified forward diff from `old` to `new` as stored text.
pub fn compute_diff(old: &str, new: &str) -> String {
    diff_texts(old, new).to_string()
}

/// Apply a stored forward diff to `base`.
pub fn apply_patch(base: &str, diff: &str) -> Result<String, PatchError> {
    diff.parse::<Patch>()?.apply(base)
}

/// Undo a stored forward diff: given the text the diff produced, return the
/// text it was computed from.
pub fn reverse_patch(result: &str, diff: &str) -> Result<String, PatchError> {
    diff.parse::<Patch>()?.reversed().apply(result)
}

/// Check that the stored form of a diff maps `old` onto `new` and back.
pub fn verify_patch(old: &str, new: &str, diff: &str) -> Result<(), PatchError> {
    let patch: Patch = diff.parse()?;
    if patch.apply(old)? != new {
        return Err(PatchError::Diverged("new"));
    }
    if patch.reversed().apply(new)? != old {
        return Err(PatchError::Diverged("old"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Change statistics
// ---------------------------------------------------------------------------

/// Size of an edit as recorded on each version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub added_lines: i32,
    pub deleted_lines: i32,
    /// Absolute difference in character count between the two texts. A coarse
    /// proxy, not a character-level diff size.
    pub changed_chars: i32,
}

impl ChangeStats {
    /// Stats for an already computed patch between `old` and `new`.
    pub fn from_patch(patch: &Patch, old: &str, new: &str) -> Self {
        let (added, deleted) = patch.line_counts();
        let old_chars = old.chars().count() as i64;
        let new_chars = new.chars().count() as i64;
        Self {
            added_lines: clamp_i32(added as i64),
            deleted_lines: clamp_i32(deleted as i64),
            changed_chars: clamp_i32((new_chars - old_chars).abs()),
        }
    }
}

/// Line and character change counts between two texts.
pub fn change_stats(old: &str, new: &str) -> ChangeStats {
    ChangeStats::from_patch(&diff_texts(old, new), old, new)
}

fn clamp_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
