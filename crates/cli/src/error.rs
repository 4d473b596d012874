//! Structured exit codes.
//!
//! Scripts driving the CLI can branch on the exit code without parsing
//! stderr. The mapping follows the client error taxonomy.

use sap_odata_client::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    UsageError = 2,
    AuthError = 3,
    NetworkError = 4,
    NoMatch = 5,
    Ambiguous = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Map an error chain onto an exit code by looking for a [`ClientError`]
/// anywhere in it.
pub fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let Some(client_error) = error.downcast_ref::<ClientError>() else {
        return ExitCode::GeneralError;
    };
    match client_error {
        ClientError::Auth { .. } => ExitCode::AuthError,
        ClientError::Network { .. } => ExitCode::NetworkError,
        ClientError::NoMatch { .. } => ExitCode::NoMatch,
        ClientError::AmbiguousMatch { .. } => ExitCode::Ambiguous,
        ClientError::UnknownField { .. }
        | ClientError::MissingKeyField { .. }
        | ClientError::UnknownService { .. }
        | ClientError::InvalidUrl(_) => ExitCode::UsageError,
        _ => ExitCode::GeneralError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_distinct_codes() {
        let err = anyhow::Error::new(ClientError::Auth {
            status: 401,
            url: "https://x".to_string(),
        });
        assert_eq!(exit_code_for(&err), ExitCode::AuthError);

        let err = anyhow::Error::new(ClientError::NoMatch {
            hint: "x".to_string(),
            best_score: 0.0,
            threshold: 0.2,
        });
        assert_eq!(exit_code_for(&err), ExitCode::NoMatch);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
    }
}
