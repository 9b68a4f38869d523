use thiserror::Error;

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers and tests can match on
/// without depending on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    UnknownProperty,
    InvalidOperator,
    SchemaValidation,
    QueryNotBuilt,
    TypeMismatch,

    // Unit of work
    MissingField,
    WriteFailed,
    NotTracked,

    // Integration
    Persistence,
    Serialization,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::UnknownProperty => "ERR_UNKNOWN_PROPERTY",
            ExErrorKind::InvalidOperator => "ERR_INVALID_OPERATOR",
            ExErrorKind::SchemaValidation => "ERR_SCHEMA_VALIDATION",
            ExErrorKind::QueryNotBuilt => "ERR_QUERY_NOT_BUILT",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::MissingField => "ERR_MISSING_FIELD",
            ExErrorKind::WriteFailed => "ERR_WRITE_FAILED",
            ExErrorKind::NotTracked => "ERR_NOT_TRACKED",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification plus the context a log reader needs: which operation, which
/// model or table, which column, which flush phase.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    model: Option<String>,
    table: Option<String>,
    column: Option<String>,
    phase: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            model: None,
            table: None,
            column: None,
            phase: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add model type context
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add column / property context
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Add flush phase context
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(column) = &self.column {
            write!(f, " (column: {})", column)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for the persistence core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrmError {
    /// Property or column is not declared by the model's schema
    #[error("Property {property} does not exist in model {model}")]
    UnknownProperty { property: String, model: String },

    /// Comparison or sort operator outside the supported set
    #[error("Operator {operator} is not valid")]
    InvalidOperator { operator: String },

    /// Model metadata is missing a required declaration or declares an unknown kind
    #[error("Invalid schema for model {model}: {reason}")]
    SchemaValidation { model: String, reason: String },

    /// execute() called before build()
    #[error("Query has not been built; call build() before execute()")]
    QueryNotBuilt,

    /// A batch row cannot supply a declared column
    #[error("Row for table {table} cannot supply column {column}")]
    MissingField { table: String, column: String },

    /// A flush statement failed or reported zero affected rows
    #[error("{phase} failed for table {table}: {reason}")]
    WriteFailed {
        phase: String,
        table: String,
        reason: String,
    },

    /// A value does not fit the column's declared kind
    #[error("Column {column} expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// A handle whose identity the session no longer tracks
    #[error("Instance {identity} is not tracked by this session")]
    NotTracked { identity: u64 },

    /// Driver-level failure
    #[error("Database error in {op}: {message}")]
    Database { op: String, message: String },

    /// A column value could not be rendered as JSON
    #[error("Column {column} could not be serialized: {message}")]
    Serialization { column: String, message: String },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl OrmError {
    /// Shorthand for a driver failure
    pub fn database(op: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Database {
            op: op.into(),
            message: message.into(),
        }
    }
}

impl From<OrmError> for ExError {
    fn from(err: OrmError) -> Self {
        match err {
            OrmError::UnknownProperty { property, model } => {
                ExError::new(ExErrorKind::UnknownProperty)
                    .with_model(model)
                    .with_column(property)
                    .with_message("Property does not exist on the model")
            }
            OrmError::InvalidOperator { operator } => ExError::new(ExErrorKind::InvalidOperator)
                .with_message(format!("Operator {} is not valid", operator)),
            OrmError::SchemaValidation { model, reason } => {
                ExError::new(ExErrorKind::SchemaValidation)
                    .with_model(model)
                    .with_message(reason)
            }
            OrmError::QueryNotBuilt => ExError::new(ExErrorKind::QueryNotBuilt)
                .with_op("execute")
                .with_message("Query has not been built"),
            OrmError::MissingField { table, column } => ExError::new(ExErrorKind::MissingField)
                .with_table(table)
                .with_column(column)
                .with_message("Row cannot supply a declared column"),
            OrmError::WriteFailed {
                phase,
                table,
                reason,
            } => ExError::new(ExErrorKind::WriteFailed)
                .with_op("flush")
                .with_phase(phase)
                .with_table(table)
                .with_message(reason),
            OrmError::TypeMismatch {
                column,
                expected,
                found,
            } => ExError::new(ExErrorKind::TypeMismatch)
                .with_column(column)
                .with_message(format!("expected {}, got {}", expected, found)),
            OrmError::NotTracked { identity } => ExError::new(ExErrorKind::NotTracked)
                .with_message(format!("Instance {} is not tracked", identity)),
            OrmError::Database { op, message } => ExError::new(ExErrorKind::Persistence)
                .with_op(op)
                .with_message(message),
            OrmError::Serialization { column, message } => {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("dump")
                    .with_column(column)
                    .with_message(message)
            }
            OrmError::Config { message } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }
        }
    }
}
