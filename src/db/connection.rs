use oracle::{Connection, Error as OracleError, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by the database capability.
///
/// `Message` carries plain error text; the in-crate test double uses it to
/// simulate Oracle failures without a live server.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("{0}")]
    Message(String),
}

/// The slice of a database connection the migration runner needs.
pub trait Database {
    /// Execute a statement, discarding any result.
    fn execute(&self, sql: &str) -> Result<(), DbError>;

    /// Run a query and return the first column of its first row as an integer.
    fn query_scalar(&self, sql: &str) -> Result<i64, DbError>;

    /// Run a query and return every row, each column rendered as text.
    fn query_rows(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionInfo {
    pub name: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
}

impl ConnectionInfo {
    pub fn connection_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} ({}@{}:{}/{})",
            self.name, self.username, self.host, self.port, self.service_name
        )
    }

    /// Securely clear the password from memory by overwriting with zeros
    /// then releasing the allocation.
    pub fn clear_password(&mut self) {
        // SAFETY: we write zeros over the valid UTF-8 bytes (zeros are valid UTF-8)
        let bytes = unsafe { self.password.as_bytes_mut() };
        for b in bytes.iter_mut() {
            // Use write_volatile to prevent the compiler from optimizing away the zeroing
            unsafe { std::ptr::write_volatile(b, 0) };
        }
        self.password.clear();
        self.password.shrink_to_fit();
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            username: "system".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 1521,
            service_name: "XEPDB1".to_string(),
        }
    }
}

/// A single, explicitly owned Oracle session.
///
/// Opened once per process and handed to the runner by reference. The session
/// is closed by [`DatabaseConnection::close`] on the normal path and by `Drop`
/// on every early return.
pub struct DatabaseConnection {
    connection: Option<Connection>,
    info: ConnectionInfo,
}

impl DatabaseConnection {
    pub fn connect(mut info: ConnectionInfo) -> Result<Self, DbError> {
        tracing::info!(
            "Connecting to Oracle DB at {}:{}/{} as user '{}'...",
            info.host,
            info.port,
            info.service_name,
            info.username
        );

        let conn_str = info.connection_string();
        let mut connection = match Connection::connect(&info.username, &info.password, &conn_str)
        {
            Ok(connection) => connection,
            Err(err) => {
                tracing::error!("Failed to open DB: {err}");
                return Err(err.into());
            }
        };

        // Every statement commits on its own so a failed one cannot poison the next.
        connection.set_autocommit(true);

        if let Err(err) = connection.ping() {
            tracing::error!("Failed to ping DB: {err}");
            return Err(err.into());
        }

        info.clear_password();
        tracing::info!("Successfully connected to Oracle database");

        Ok(Self {
            connection: Some(connection),
            info,
        })
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            match connection.close() {
                Ok(()) => tracing::debug!("Closed connection {}", self.info.display_string()),
                Err(err) => tracing::warn!("Failed to close database connection: {err}"),
            }
        }
    }

    fn session(&self) -> Result<&Connection, DbError> {
        self.connection
            .as_ref()
            .ok_or_else(|| DbError::Message("database connection already closed".to_string()))
    }
}

impl Drop for DatabaseConnection {
    fn drop(&mut self) {
        self.release();
    }
}

impl Database for DatabaseConnection {
    fn execute(&self, sql: &str) -> Result<(), DbError> {
        self.session()?.execute(sql, &[])?;
        Ok(())
    }

    fn query_scalar(&self, sql: &str) -> Result<i64, DbError> {
        let row = self.session()?.query_row(sql, &[])?;
        let value: i64 = row.get(0)?;
        Ok(value)
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError> {
        let mut stmt = self.session()?.statement(sql).build()?;
        let result_set = stmt.query(&[])?;
        let column_count = result_set.column_info().len();

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for row_result in result_set {
            let row: Row = row_result?;
            let mut values: Vec<Option<String>> = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: Option<String> = row.get(i)?;
                values.push(value);
            }
            rows.push(values);
        }

        Ok(rows)
    }
}
