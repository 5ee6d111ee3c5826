use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("unexpected result shape: {0}")]
    UnexpectedShape(String),

    #[error("table `{0}` has no columns")]
    EmptyTable(String),

    #[error("write error: {0}")]
    Write(String),
}

/// Classifies an error for the ambient retry policy (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Fatal,
}

impl DbError {
    /// Network blips, deadlocks and lock-wait timeouts are retried;
    /// everything else (bad SQL, constraint violations that aren't simple
    /// duplicate keys, driver misuse) is fatal.
    pub fn classify(&self) -> ErrorKind {
        match self {
            DbError::MySql(mysql_async::Error::Io(_)) => ErrorKind::Transient,
            DbError::MySql(mysql_async::Error::Driver(_)) => ErrorKind::Transient,
            DbError::MySql(mysql_async::Error::Server(server_err)) => {
                // 1205 = lock wait timeout, 1213 = deadlock found, 2006/2013 = gone away
                match server_err.code {
                    1205 | 1213 | 2006 | 2013 => ErrorKind::Transient,
                    _ => ErrorKind::Fatal,
                }
            }
            _ => ErrorKind::Fatal,
        }
    }
}
