use thiserror::Error;

/// SQLSTATE raised when the requested database does not exist.
pub const SQLSTATE_INVALID_CATALOG: &str = "3D000";

/// Errors returned by sqlshim-pg operations.
#[derive(Debug, Error)]
pub enum PgError {
    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or unexpected message from server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication failure.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Server-sent error response (severity, code, message).
    #[error("PG {severity}: {message} ({code})")]
    Server {
        severity: String,
        code: String,
        message: String,
    },

    /// Connection is closed or in an invalid state.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A backend message exceeded the accepted size.
    #[error("Message of {0} bytes exceeds the buffer limit")]
    BufferOverflow(usize),
}

impl PgError {
    /// The SQLSTATE code carried by a server error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            PgError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the server rejected the connection because the database is missing.
    pub fn is_missing_database(&self) -> bool {
        self.sqlstate() == Some(SQLSTATE_INVALID_CATALOG)
    }
}

pub type PgResult<T> = Result<T, PgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_detection() {
        let err = PgError::Server {
            severity: "FATAL".to_string(),
            code: "3D000".to_string(),
            message: "database \"cars\" does not exist".to_string(),
        };
        assert!(err.is_missing_database());
        assert_eq!(
            err.to_string(),
            "PG FATAL: database \"cars\" does not exist (3D000)"
        );
        assert!(!PgError::ConnectionClosed.is_missing_database());
    }
}
