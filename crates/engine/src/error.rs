use process_utils::RunError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("mkvmerge failed (exit code {}): {stderr}", describe_code(.exit_code))]
    MuxProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{program} failed (exit code {}): {stderr}", describe_code(.exit_code))]
    ProcessFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RunError> for EngineError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Spawn { program, source } => Self::Spawn { program, source },
            RunError::Io(e) => Self::Io(e),
            RunError::Cancelled => Self::Cancelled,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EngineError::MuxProcessFailed {
            exit_code: Some(2),
            stderr: "Error: no such file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "mkvmerge failed (exit code 2): Error: no such file"
        );

        let err = EngineError::ProcessFailed {
            program: "ffmpeg".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "ffmpeg failed (exit code none): ");
    }

    #[test]
    fn test_from_run_error() {
        assert!(EngineError::from(RunError::Cancelled).is_cancelled());
        assert!(matches!(
            EngineError::from(RunError::Io(std::io::Error::other("x"))),
            EngineError::Io(_)
        ));
    }
}
