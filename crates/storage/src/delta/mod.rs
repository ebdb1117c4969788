#![forbid(unsafe_code)]

//! Reverse-delta computation and hydration.
//!
//! A reverse delta is an edit script that, applied to a newer revision's
//! content, reproduces the older revision's content. Scripts are written in the
//! current record layout; hydration also understands the legacy layout.

mod compare;
mod script;

pub use compare::CompareOptions;
pub use script::{
    EditOp, EditScript, EncodeError, HEADER_LEN, ScriptError, ScriptFormat, ScriptHeader,
};

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("diff input of {len} bytes exceeds the {limit}-byte limit")]
    InputTooLarge { len: usize, limit: usize },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("reverse delta does not reproduce the older content")]
    VerificationFailed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Both decoders rejected the script.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unable to hydrate revision (current format: {current}; legacy format: {legacy})")]
pub struct HydrateError {
    pub current: ScriptError,
    pub legacy: ScriptError,
}

#[derive(Clone, Debug)]
pub struct DeltaEngine {
    options: CompareOptions,
    max_input_bytes: usize,
    deadline: Option<Duration>,
    verify: bool,
}

impl Default for DeltaEngine {
    fn default() -> Self {
        Self::new(CompareOptions::exact())
    }
}

impl DeltaEngine {
    pub fn new(options: CompareOptions) -> Self {
        Self {
            options,
            max_input_bytes: usize::MAX,
            deadline: None,
            verify: true,
        }
    }

    pub fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Produces the script that turns `newer` back into `older`.
    pub fn compute_reverse_delta(&self, older: &[u8], newer: &[u8]) -> Result<Vec<u8>, DeltaError> {
        Ok(self.diff(older, newer)?.1)
    }

    /// File-path form of [`Self::compute_reverse_delta`]. Writes the script to
    /// `out` and reports whether the two files compared equal.
    pub fn compare_files(&self, older: &Path, newer: &Path, out: &Path) -> Result<bool, DeltaError> {
        let older = std::fs::read(older)?;
        let newer = std::fs::read(newer)?;
        let (is_equal, script) = self.diff(&older, &newer)?;
        std::fs::write(out, script)?;
        Ok(is_equal)
    }

    pub fn hydrate(&self, base: &[u8], script: &[u8]) -> Result<Vec<u8>, HydrateError> {
        hydrate(base, script)
    }

    fn diff(&self, older: &[u8], newer: &[u8]) -> Result<(bool, Vec<u8>), DeltaError> {
        for len in [older.len(), newer.len()] {
            if len > self.max_input_bytes {
                return Err(DeltaError::InputTooLarge {
                    len,
                    limit: self.max_input_bytes,
                });
            }
        }

        let base_len = u32::try_from(newer.len()).map_err(|_| EncodeError::FieldOverflow {
            field: "base_len",
            value: newer.len() as u64,
            format: ScriptFormat::Current.as_str(),
        })?;
        let deadline = self.deadline.map(|budget| Instant::now() + budget);
        let script = EditScript {
            header: ScriptHeader {
                base_len,
                created_at: unix_seconds(),
            },
            ops: compare::reverse_edit_ops(older, newer, &self.options, deadline),
        };
        let bytes = script.encode(ScriptFormat::Current)?;

        if self.verify {
            let rebuilt = hydrate_as(newer, &bytes, ScriptFormat::Current)
                .map_err(|_| DeltaError::VerificationFailed)?;
            if rebuilt != older {
                return Err(DeltaError::VerificationFailed);
            }
        }

        Ok((script.is_empty(), bytes))
    }
}

/// Decodes and applies `script` under one record layout.
pub fn hydrate_as(base: &[u8], script: &[u8], format: ScriptFormat) -> Result<Vec<u8>, ScriptError> {
    EditScript::decode(script, format)?.apply(base)
}

/// Applies `script` to `base`, retrying with the legacy layout when the
/// current layout rejects the script.
pub fn hydrate(base: &[u8], script: &[u8]) -> Result<Vec<u8>, HydrateError> {
    match hydrate_as(base, script, ScriptFormat::Current) {
        Ok(content) => Ok(content),
        Err(current) => {
            warn!(error = %current, "edit script rejected by current decoder; retrying legacy layout");
            hydrate_as(base, script, ScriptFormat::Legacy)
                .map_err(|legacy| HydrateError { current, legacy })
        }
    }
}

fn unix_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}
