#![forbid(unsafe_code)]

use super::script::EditOp;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag};
use std::borrow::Cow;
use std::time::Instant;

/// Line-comparison sensitivity. Literal bytes in a script are always copied
/// raw; these flags only decide which lines count as equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub ignore_case: bool,
    pub ignore_eol: bool,
    pub ignore_all_whitespace: bool,
    pub ignore_leading_whitespace: bool,
}

impl CompareOptions {
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn is_exact(&self) -> bool {
        *self == Self::exact()
    }

    fn key<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_exact() {
            return Cow::Borrowed(line);
        }
        let mut line = line;
        if self.ignore_eol {
            line = line.strip_suffix(b"\n").unwrap_or(line);
            line = line.strip_suffix(b"\r").unwrap_or(line);
        }
        if self.ignore_leading_whitespace {
            line = line.trim_ascii_start();
        }
        let mut key: Vec<u8> = if self.ignore_all_whitespace {
            line.iter()
                .copied()
                .filter(|b| !matches!(b, b' ' | b'\t'))
                .collect()
        } else {
            line.to_vec()
        };
        if self.ignore_case {
            key.make_ascii_uppercase();
        }
        Cow::Owned(key)
    }
}

/// Splits after every `\n`; the final line may be unterminated.
pub(crate) fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content
        .split_inclusive(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .collect()
}

/// Byte offset of every line start, plus the total length as a sentinel.
fn line_offsets(lines: &[&[u8]]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    let mut at = 0;
    offsets.push(at);
    for line in lines {
        at += line.len();
        offsets.push(at);
    }
    offsets
}

/// Edits that turn `newer` back into `older`. Seek positions index into `newer`.
pub(crate) fn reverse_edit_ops(
    older: &[u8],
    newer: &[u8],
    options: &CompareOptions,
    deadline: Option<Instant>,
) -> Vec<EditOp> {
    let base_lines = split_lines(newer);
    let target_lines = split_lines(older);
    let base_keys: Vec<Cow<'_, [u8]>> = base_lines.iter().map(|l| options.key(l)).collect();
    let target_keys: Vec<Cow<'_, [u8]>> = target_lines.iter().map(|l| options.key(l)).collect();
    let base_offsets = line_offsets(&base_lines);
    let target_offsets = line_offsets(&target_lines);

    // Ops are consumed in order on both sides; Myers can emit target ranges
    // that run backwards, LCS never does.
    let diff =
        similar::capture_diff_slices_deadline(Algorithm::Lcs, &base_keys, &target_keys, deadline);

    let mut ops = Vec::new();
    for op in &diff {
        let (tag, base_range, target_range) = op.as_tag_tuple();
        let seek = base_offsets[base_range.start] as u64;
        let deleted = (base_offsets[base_range.end] - base_offsets[base_range.start]) as u64;
        let literal = || {
            older[target_offsets[target_range.start]..target_offsets[target_range.end]].to_vec()
        };
        match tag {
            DiffTag::Equal => {}
            DiffTag::Delete => ops.push(EditOp::Delete { seek, deleted }),
            DiffTag::Insert => ops.push(EditOp::Insert {
                seek,
                bytes: literal(),
            }),
            DiffTag::Replace => ops.push(EditOp::Replace {
                seek,
                deleted,
                bytes: literal(),
            }),
        }
    }
    ops
}
