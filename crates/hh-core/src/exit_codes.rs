//! Exit codes for the hh-core CLI.
//!
//! Exit code ranges:
//! - 0: clean run
//! - 10-19: user/environment errors (fix the input, config, or arguments)
//! - 20-29: internal errors

use hh_common::{Error, ErrorCategory};

/// Exit codes for hh-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Invalid arguments
    ArgsError = 10,

    /// Input file failed batch-level validation
    InputError = 11,

    /// Engine configuration missing, unreadable, or invalid
    ConfigError = 12,

    /// Requested player absent from the analysis output
    NotFound = 13,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// User/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::NotFound => "ERR_NOT_FOUND",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::UnknownEntity { .. } => ExitCode::NotFound,
            Error::InvalidQuery(_) => ExitCode::ArgsError,
            Error::Csv(_) | Error::Json(_) => ExitCode::InputError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Input => ExitCode::InputError,
                ErrorCategory::Inference => ExitCode::InternalError,
                ErrorCategory::Query => ExitCode::ArgsError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::InputError.as_i32(), 11);
        assert_eq!(ExitCode::ConfigError.as_i32(), 12);
        assert_eq!(ExitCode::NotFound.as_i32(), 13);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_exit_code_classification() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::NotFound.is_user_error());
        assert!(!ExitCode::NotFound.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_error_mapping() {
        let missing = Error::MissingField {
            field: "GAME_ID".into(),
        };
        assert_eq!(ExitCode::from(&missing), ExitCode::InputError);
        let unknown = Error::UnknownEntity {
            player: "x".into(),
        };
        assert_eq!(ExitCode::from(&unknown), ExitCode::NotFound);
        assert_eq!(
            ExitCode::from(&Error::InvalidConfig("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from(&Error::NumericalInstability("x".into())),
            ExitCode::InternalError
        );
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(ExitCode::from(&io), ExitCode::IoError);
    }
}
