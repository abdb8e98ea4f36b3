//! The "diagnostic channel" from the error-handling design: warnings are
//! emitted via `tracing` for interactive consumers, and also collected as
//! plain values so library callers without a subscriber can inspect them.

use std::fmt;

/// A single non-fatal warning raised while packing/unpacking an archive or
/// assembling/disassembling a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An opcode had no entry in any format table for its version and was
    /// decoded with the generic "consume remaining bytes as i32s" fallback.
    UnknownOpcode { version: u32, opcode: u16 },
    /// A `@name(...)` call site referenced a sub that does not exist (yet).
    UnknownSub { name: String },
    /// Two entries in an archive directory share the same name.
    DuplicateEntryName { name: String },
    /// A field documented as "ignored" by the original format was non-zero.
    NonZeroIgnoredField { field: &'static str, value: u64 },
    /// Free-form warning for cases not worth a dedicated variant.
    Other(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { version, opcode } => write!(
                f,
                "unknown opcode {opcode} for version {version}, falling back to raw i32 words"
            ),
            Self::UnknownSub { name } => write!(f, "call to unknown sub `{name}`"),
            Self::DuplicateEntryName { name } => {
                write!(f, "duplicate filename in archive: `{name}`")
            }
            Self::NonZeroIgnoredField { field, value } => {
                write!(f, "field `{field}` documented as ignored is non-zero: {value:#x}")
            }
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// Appends `diag` to `sink` and emits it as a `tracing::warn!` event.
pub fn warn(sink: &mut Vec<Diagnostic>, diag: Diagnostic) {
    tracing::warn!(%diag, "dmtk warning");
    sink.push(diag);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let d = Diagnostic::UnknownOpcode {
            version: 17,
            opcode: 9001,
        };
        assert!(d.to_string().contains("9001"));
        assert!(d.to_string().contains("17"));
    }
}
