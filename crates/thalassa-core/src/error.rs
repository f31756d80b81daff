use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// All variants are cloneable so a failed day load can be fanned out to
/// every waiter of a shared in-flight future.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Bad phase, unknown tracer, non-ascending date range. The run does
    /// not start.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Missing day file or archive metadata. Surfaced before the step
    /// that needed it; the run halts at the last completed step.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Truncated payload, size mismatch, offset out of range.
    #[error("corrupt binary file {path}: {detail}")]
    CorruptBinary { path: String, detail: String },

    /// Header version not in the supported set.
    #[error("unsupported format version {version} in {path}")]
    UnsupportedFormat { path: String, version: i32 },

    /// Cancellation observed between steps or recorded frames.
    #[error("run cancelled")]
    Cancelled,
}

impl EngineError {
    /// Process exit code for batch runs.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Configuration(_) => 2,
            EngineError::DataUnavailable(_) => 3,
            EngineError::CorruptBinary { .. } | EngineError::UnsupportedFormat { .. } => 4,
            EngineError::Cancelled => 5,
        }
    }

    pub fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        EngineError::DataUnavailable(format!("{}: {}", path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(EngineError::Configuration("x".into()).exit_code(), 2);
        assert_eq!(EngineError::DataUnavailable("x".into()).exit_code(), 3);
        assert_eq!(
            EngineError::CorruptBinary {
                path: "f.bin".into(),
                detail: "short".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            EngineError::UnsupportedFormat {
                path: "f.bin".into(),
                version: 9
            }
            .exit_code(),
            4
        );
        assert_eq!(EngineError::Cancelled.exit_code(), 5);
    }
}
