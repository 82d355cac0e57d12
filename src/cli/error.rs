//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("no entity stored with who_id {0}")]
    NotFound(u64),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => exitcode::USAGE,
            CliError::NotFound(_) => exitcode::NOINPUT,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } | InfraError::Sqlite { .. } => exitcode::IOERR,
                InfraError::Http { .. } => exitcode::SOFTWARE,
                InfraError::Application(app) => match app {
                    ApplicationError::Auth { .. } => exitcode::NOPERM,
                    ApplicationError::Fetch { .. } | ApplicationError::Transport { .. } => {
                        exitcode::UNAVAILABLE
                    }
                    ApplicationError::Domain(_) => exitcode::DATAERR,
                    ApplicationError::Store { .. } => exitcode::IOERR,
                    ApplicationError::Config { .. } => exitcode::CONFIG,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_maps_to_noperm() {
        let err = CliError::from(ApplicationError::Auth {
            status: 401,
            body: "invalid_client".into(),
        });
        assert_eq!(err.exit_code(), exitcode::NOPERM);
        assert!(err.to_string().contains("invalid_client"));
    }

    #[test]
    fn missing_credentials_map_to_config() {
        let err = CliError::from(ApplicationError::Config {
            message: "client_id not set".into(),
        });
        assert_eq!(err.exit_code(), exitcode::CONFIG);
    }

    #[test]
    fn root_fetch_failure_maps_to_unavailable() {
        let err = CliError::from(ApplicationError::Fetch {
            path: "entity".into(),
            status: 503,
            body: "Service Unavailable".into(),
        });
        assert_eq!(err.exit_code(), exitcode::UNAVAILABLE);
        assert!(!err.to_string().contains("Service Unavailable"));
    }
}
