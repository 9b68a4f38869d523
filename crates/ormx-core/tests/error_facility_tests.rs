//! Integration tests for the error facility
//!
//! Checks that every `OrmError` converts into an `ExError` with a stable
//! code and the context (op, table, column, phase) a log reader needs.

use ormx_core::errors::{ExError, ExErrorKind, OrmError};

#[test]
fn test_unknown_property_verifiable_by_kind() {
    let err = OrmError::UnknownProperty {
        property: "nonexistent".to_string(),
        model: "Widget".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::UnknownProperty);
    assert_eq!(ex_err.code(), "ERR_UNKNOWN_PROPERTY");
    assert_eq!(ex_err.column(), Some("nonexistent"));
    assert_eq!(ex_err.model(), Some("Widget"));
}

#[test]
fn test_write_failed_structured_fields() {
    let err = OrmError::WriteFailed {
        phase: "DELETE".to_string(),
        table: "wp_posts".to_string(),
        reason: "0 rows affected".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "DELETE failed for table wp_posts: 0 rows affected"
    );

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::WriteFailed);
    assert_eq!(ex_err.op(), Some("flush"));
    assert_eq!(ex_err.phase(), Some("DELETE"));
    assert_eq!(ex_err.table(), Some("wp_posts"));
    assert_eq!(ex_err.message(), "0 rows affected");
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ExErrorKind::UnknownProperty, "ERR_UNKNOWN_PROPERTY"),
        (ExErrorKind::InvalidOperator, "ERR_INVALID_OPERATOR"),
        (ExErrorKind::SchemaValidation, "ERR_SCHEMA_VALIDATION"),
        (ExErrorKind::QueryNotBuilt, "ERR_QUERY_NOT_BUILT"),
        (ExErrorKind::TypeMismatch, "ERR_TYPE_MISMATCH"),
        (ExErrorKind::MissingField, "ERR_MISSING_FIELD"),
        (ExErrorKind::WriteFailed, "ERR_WRITE_FAILED"),
        (ExErrorKind::NotTracked, "ERR_NOT_TRACKED"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Config, "ERR_CONFIG"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_query_not_built_conversion() {
    let ex_err: ExError = OrmError::QueryNotBuilt.into();

    assert_eq!(ex_err.kind(), ExErrorKind::QueryNotBuilt);
    assert_eq!(ex_err.op(), Some("execute"));
}

#[test]
fn test_database_error_maps_to_persistence() {
    let ex_err: ExError = OrmError::database("sqlite_execute", "disk I/O error").into();

    assert_eq!(ex_err.kind(), ExErrorKind::Persistence);
    assert_eq!(ex_err.op(), Some("sqlite_execute"));
    assert!(ex_err.to_string().contains("disk I/O error"));
}

#[test]
fn test_missing_field_names_table_and_column() {
    let ex_err: ExError = OrmError::MissingField {
        table: "widget".to_string(),
        column: "price".to_string(),
    }
    .into();

    assert_eq!(ex_err.code(), "ERR_MISSING_FIELD");
    assert_eq!(ex_err.table(), Some("widget"));
    assert_eq!(ex_err.column(), Some("price"));
}

#[test]
fn test_display_format() {
    let ex_err = ExError::new(ExErrorKind::SchemaValidation)
        .with_op("resolve")
        .with_model("Broken")
        .with_message("no columns declared");

    let display = format!("{}", ex_err);
    assert!(display.contains("ERR_SCHEMA_VALIDATION"));
    assert!(display.contains("resolve"));
    assert!(display.contains("no columns declared"));
}
