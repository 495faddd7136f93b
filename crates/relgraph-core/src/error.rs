//! Error types for relgraph operations.

use std::fmt;

/// The primary error type for all relgraph operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close)
    Connection(ConnectionError),
    /// Query execution errors reported by the database
    Query(QueryError),
    /// Type conversion errors between column values and fields
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Entity or relation configuration errors, surfaced at registration
    Config(ConfigError),
    /// Per-operation constraint violations detected while building statements
    Constraint(ConstraintError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Handle is no longer usable
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, not null, primary key)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Database is busy or locked
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this handle
    AlreadyActive,
    /// No transaction is open on this handle
    NotActive,
}

/// Configuration errors. These are fatal and indicate a broken entity or
/// relation declaration rather than bad data.
#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Entity declared without a table name
    MissingTableName,
    /// Table or forced column name is not a plain SQL identifier
    InvalidIdentifier,
    /// More than one primary key field
    DuplicatePrimaryKey,
    /// An id-based operation on a type without primary key
    MissingPrimaryKey,
    /// Two has-many fields resolve to the same contained type
    DuplicateHasMany,
    /// A has-many B while B has-many A
    CyclicHasMany,
    /// Contained type does not declare belongs-to the container
    UnresolvedBelongsTo,
    /// Has-many and many-to-many declared between the same pair
    AmbiguousCardinality,
    /// Many-to-many between a type and itself
    SelfManyToMany,
    /// Requested relation is not registered
    UnknownRelation,
    /// Entity type was never registered
    UnregisteredEntity,
    /// Named database spec was never registered
    UnknownDatabase,
}

/// A constraint violation detected before the statement reaches the database.
#[derive(Debug)]
pub struct ConstraintError {
    pub kind: ConstraintErrorKind,
    pub table: String,
    pub column: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintErrorKind {
    /// NULL bound to a NOT NULL column
    NullColumn,
    /// Non auto-increment primary key left unset
    UnsetPrimaryKey,
}

impl Error {
    /// Build a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            kind,
            message: message.into(),
        })
    }

    /// Build a constraint error for a table column.
    pub fn constraint(
        kind: ConstraintErrorKind,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let column = column.into();
        let message = match kind {
            ConstraintErrorKind::NullColumn => {
                format!("column {table}.{column} is NOT NULL but no value was set")
            }
            ConstraintErrorKind::UnsetPrimaryKey => format!(
                "primary key {table}.{column} is not auto-increment and must be set before storing"
            ),
        };
        Error::Constraint(ConstraintError {
            kind,
            table,
            column,
            message,
        })
    }

    /// Configuration error kind, if this is a configuration error.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(c) => Some(c.kind),
            _ => None,
        }
    }

    /// Constraint error kind, if this is a constraint error.
    pub fn constraint_kind(&self) -> Option<ConstraintErrorKind> {
        match self {
            Error::Constraint(c) => Some(c.kind),
            _ => None,
        }
    }

    /// Is this a fatal configuration error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Constraint(e) => write!(f, "Constraint error: {}", e.message),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ConstraintError> for Error {
    fn from(err: ConstraintError) -> Self {
        Error::Constraint(err)
    }
}

/// Result type alias for relgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
