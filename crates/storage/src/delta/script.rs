#![forbid(unsafe_code)]

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Reserved prefix of every edit script. Hydration skips it.
pub const HEADER_LEN: usize = 8;

const KIND_DELETE: u16 = 0;
const KIND_INSERT: u16 = 1;
const KIND_REPLACE: u16 = 2;

/// Field layout of the edit records. Both share the 8-byte header and the
/// 16-bit record kind; the legacy layout stores seek and counts as 64-bit values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptFormat {
    Current,
    Legacy,
}

impl ScriptFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScriptHeader {
    /// Length of the buffer the script is applied to.
    pub base_len: u32,
    /// Unix seconds at which the script was produced.
    pub created_at: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOp {
    Delete { seek: u64, deleted: u64 },
    Insert { seek: u64, bytes: Vec<u8> },
    Replace { seek: u64, deleted: u64, bytes: Vec<u8> },
}

impl EditOp {
    pub fn seek(&self) -> u64 {
        match self {
            Self::Delete { seek, .. } | Self::Insert { seek, .. } | Self::Replace { seek, .. } => {
                *seek
            }
        }
    }

    pub fn deleted(&self) -> u64 {
        match self {
            Self::Delete { deleted, .. } | Self::Replace { deleted, .. } => *deleted,
            Self::Insert { .. } => 0,
        }
    }

    pub fn inserted(&self) -> &[u8] {
        match self {
            Self::Insert { bytes, .. } | Self::Replace { bytes, .. } => bytes,
            Self::Delete { .. } => &[],
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::Delete { .. } => KIND_DELETE,
            Self::Insert { .. } => KIND_INSERT,
            Self::Replace { .. } => KIND_REPLACE,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("edit script is shorter than its {HEADER_LEN}-byte header")]
    MissingHeader,
    #[error("edit record truncated at byte {offset}")]
    TruncatedRecord { offset: usize },
    #[error("unknown edit kind {kind} at byte {offset}")]
    UnknownKind { kind: u16, offset: usize },
    #[error("literal run of {len} bytes at byte {offset} runs past the end of the script")]
    TruncatedLiteral { offset: usize, len: u64 },
    #[error("edit seek {seek} precedes the previous edit end {cursor}")]
    SeekBackwards { seek: u64, cursor: u64 },
    #[error("edit at {seek} deleting {deleted} bytes exceeds base length {base_len}")]
    OutOfBounds {
        seek: u64,
        deleted: u64,
        base_len: u64,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} value {value} does not fit the {format} record layout")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        format: &'static str,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditScript {
    pub header: ScriptHeader,
    pub ops: Vec<EditOp>,
}

impl EditScript {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn encode(&self, format: ScriptFormat) -> Result<Vec<u8>, EncodeError> {
        let literal_len: usize = self.ops.iter().map(|op| op.inserted().len()).sum();
        let mut out = Vec::with_capacity(HEADER_LEN + self.ops.len() * 26 + literal_len);
        // Writes into a Vec cannot fail.
        let _ = out.write_u32::<BigEndian>(self.header.base_len);
        let _ = out.write_u32::<BigEndian>(self.header.created_at);

        for op in &self.ops {
            let _ = out.write_u16::<BigEndian>(op.kind());
            let inserted = op.inserted();
            let fields = [
                ("seek", op.seek()),
                ("deleted", op.deleted()),
                ("inserted", inserted.len() as u64),
            ];
            for (field, value) in fields {
                match format {
                    ScriptFormat::Current => {
                        let narrow =
                            u32::try_from(value).map_err(|_| EncodeError::FieldOverflow {
                                field,
                                value,
                                format: format.as_str(),
                            })?;
                        let _ = out.write_u32::<BigEndian>(narrow);
                    }
                    ScriptFormat::Legacy => {
                        let _ = out.write_u64::<BigEndian>(value);
                    }
                }
            }
            out.extend_from_slice(inserted);
        }
        Ok(out)
    }

    /// Parses a script without looking at the base buffer. Bounds against the
    /// base are checked when the script is applied.
    pub fn decode(bytes: &[u8], format: ScriptFormat) -> Result<Self, ScriptError> {
        if bytes.len() < HEADER_LEN {
            return Err(ScriptError::MissingHeader);
        }
        let mut cursor = Cursor::new(bytes);
        let header = ScriptHeader {
            base_len: read_u32(&mut cursor)?,
            created_at: read_u32(&mut cursor)?,
        };

        let mut ops = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let offset = cursor.position() as usize;
            let kind = cursor
                .read_u16::<BigEndian>()
                .map_err(|_| ScriptError::TruncatedRecord { offset })?;
            if !matches!(kind, KIND_DELETE | KIND_INSERT | KIND_REPLACE) {
                return Err(ScriptError::UnknownKind { kind, offset });
            }
            let seek = read_field(&mut cursor, format)?;
            let deleted = read_field(&mut cursor, format)?;
            let inserted = read_field(&mut cursor, format)?;

            let op = match kind {
                KIND_DELETE => EditOp::Delete { seek, deleted },
                KIND_INSERT => EditOp::Insert {
                    seek,
                    bytes: read_literal(&mut cursor, bytes, inserted)?,
                },
                _ => EditOp::Replace {
                    seek,
                    deleted,
                    bytes: read_literal(&mut cursor, bytes, inserted)?,
                },
            };
            ops.push(op);
        }

        Ok(Self { header, ops })
    }

    /// Applies the script to `base`: unchanged bytes are copied up to each seek,
    /// deletes skip base bytes and literals are copied from the script.
    pub fn apply(&self, base: &[u8]) -> Result<Vec<u8>, ScriptError> {
        let base_len = base.len() as u64;
        let mut out = Vec::with_capacity(base.len());
        let mut cursor: u64 = 0;

        for op in &self.ops {
            let seek = op.seek();
            let deleted = op.deleted();
            if seek < cursor {
                return Err(ScriptError::SeekBackwards { seek, cursor });
            }
            let end = seek
                .checked_add(deleted)
                .filter(|end| *end <= base_len)
                .ok_or(ScriptError::OutOfBounds {
                    seek,
                    deleted,
                    base_len,
                })?;
            out.extend_from_slice(&base[cursor as usize..seek as usize]);
            out.extend_from_slice(op.inserted());
            cursor = end;
        }

        out.extend_from_slice(&base[cursor as usize..]);
        Ok(out)
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ScriptError> {
    let offset = cursor.position() as usize;
    cursor
        .read_u32::<BigEndian>()
        .map_err(|_| ScriptError::TruncatedRecord { offset })
}

fn read_field(cursor: &mut Cursor<&[u8]>, format: ScriptFormat) -> Result<u64, ScriptError> {
    match format {
        ScriptFormat::Current => read_u32(cursor).map(u64::from),
        ScriptFormat::Legacy => {
            let offset = cursor.position() as usize;
            cursor
                .read_u64::<BigEndian>()
                .map_err(|_| ScriptError::TruncatedRecord { offset })
        }
    }
}

fn read_literal(
    cursor: &mut Cursor<&[u8]>,
    bytes: &[u8],
    len: u64,
) -> Result<Vec<u8>, ScriptError> {
    let offset = cursor.position() as usize;
    let remaining = (bytes.len() - offset) as u64;
    if len > remaining {
        return Err(ScriptError::TruncatedLiteral { offset, len });
    }
    let end = offset + len as usize;
    cursor.set_position(end as u64);
    Ok(bytes[offset..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EditScript {
        EditScript {
            header: ScriptHeader {
                base_len: 11,
                created_at: 7,
            },
            ops: vec![
                EditOp::Replace {
                    seek: 0,
                    deleted: 5,
                    bytes: b"HELLO".to_vec(),
                },
                EditOp::Delete {
                    seek: 5,
                    deleted: 1,
                },
                EditOp::Insert {
                    seek: 11,
                    bytes: b"!".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn current_layout_is_byte_exact() {
        let script = EditScript {
            header: ScriptHeader {
                base_len: 3,
                created_at: 1,
            },
            ops: vec![EditOp::Insert {
                seek: 2,
                bytes: b"xy".to_vec(),
            }],
        };
        let bytes = script.encode(ScriptFormat::Current).unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 3, 0, 0, 0, 1, // header
                0, 1, // insert
                0, 0, 0, 2, // seek
                0, 0, 0, 0, // deleted
                0, 0, 0, 2, // inserted
                b'x', b'y',
            ]
        );
        assert_eq!(
            EditScript::decode(&bytes, ScriptFormat::Current).unwrap(),
            script
        );
    }

    #[test]
    fn apply_copies_deletes_and_inserts() {
        let out = sample().apply(b"hello world").unwrap();
        assert_eq!(out, b"HELLOworld!".to_vec());
    }

    #[test]
    fn header_only_script_is_a_pure_copy() {
        let script = EditScript::default();
        let bytes = script.encode(ScriptFormat::Current).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded = EditScript::decode(&bytes, ScriptFormat::Current).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.apply(b"unchanged").unwrap(), b"unchanged".to_vec());
    }

    #[test]
    fn decode_rejects_malformed_scripts() {
        assert_eq!(
            EditScript::decode(&[0, 0, 0], ScriptFormat::Current).unwrap_err(),
            ScriptError::MissingHeader
        );

        let mut unknown = vec![0u8; HEADER_LEN];
        unknown.extend_from_slice(&[0, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            EditScript::decode(&unknown, ScriptFormat::Current).unwrap_err(),
            ScriptError::UnknownKind {
                kind: 9,
                offset: HEADER_LEN
            }
        );

        let mut truncated = sample().encode(ScriptFormat::Current).unwrap();
        truncated.pop();
        assert!(matches!(
            EditScript::decode(&truncated, ScriptFormat::Current).unwrap_err(),
            ScriptError::TruncatedLiteral { len: 1, .. }
        ));
    }

    #[test]
    fn apply_rejects_edits_outside_the_base() {
        let past_end = EditScript {
            header: ScriptHeader::default(),
            ops: vec![EditOp::Delete {
                seek: 3,
                deleted: 4,
            }],
        };
        assert_eq!(
            past_end.apply(b"abcde").unwrap_err(),
            ScriptError::OutOfBounds {
                seek: 3,
                deleted: 4,
                base_len: 5
            }
        );

        let backwards = EditScript {
            header: ScriptHeader::default(),
            ops: vec![
                EditOp::Delete {
                    seek: 2,
                    deleted: 2,
                },
                EditOp::Delete {
                    seek: 1,
                    deleted: 1,
                },
            ],
        };
        assert_eq!(
            backwards.apply(b"abcde").unwrap_err(),
            ScriptError::SeekBackwards { seek: 1, cursor: 4 }
        );
    }

    #[test]
    fn current_layout_refuses_values_wider_than_32_bits() {
        let script = EditScript {
            header: ScriptHeader::default(),
            ops: vec![EditOp::Delete {
                seek: u64::from(u32::MAX) + 1,
                deleted: 0,
            }],
        };
        assert_eq!(
            script.encode(ScriptFormat::Current).unwrap_err(),
            EncodeError::FieldOverflow {
                field: "seek",
                value: u64::from(u32::MAX) + 1,
                format: "current",
            }
        );
        assert!(script.encode(ScriptFormat::Legacy).is_ok());
    }
}
