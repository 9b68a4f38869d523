//! Shared fixtures: blog models and table creation for SQLite sessions

#![allow(dead_code)]

use chrono::NaiveDateTime;
use ormx_core::{impl_model, ColumnSpec, Model, Reference, RelationSpec, SchemaDescriptor, Session};
use ormx_store::{open_session, SqliteDatabase, StoreConfig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Users {
    pub id: Option<i64>,
    pub user_login: String,
    pub display_name: String,
}

impl_model! {
    Users {
        table: "users",
        primary_key: id,
        columns: {
            user_login => ColumnSpec::new("varchar").length(60).not_null(),
            display_name => ColumnSpec::new("varchar").length(250).not_null(),
        }
    }
}

pub fn user(login: &str) -> Users {
    Users {
        id: None,
        user_login: login.to_string(),
        display_name: login.to_uppercase(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Posts {
    pub id: Option<i64>,
    pub post_author: Option<i64>,
    pub post_title: String,
    pub post_date: Option<NaiveDateTime>,
    pub comment_count: i64,
    pub author: Reference<Users>,
}

impl_model! {
    Posts {
        table: "posts",
        primary_key: id,
        columns: {
            post_author => ColumnSpec::new("bigint").length(20),
            post_title => ColumnSpec::new("text").not_null(),
            post_date => ColumnSpec::new("datetime").nullable(),
            comment_count => ColumnSpec::new("bigint").length(20),
        },
        relations: [RelationSpec::many_to_one::<Users>("post_author", "id")]
    }
}

pub fn post(title: &str, author: Option<i64>) -> Posts {
    Posts {
        post_title: title.to_string(),
        post_author: author,
        ..Posts::default()
    }
}

pub fn author_slot(post: &mut Posts) -> &mut Reference<Users> {
    &mut post.author
}

/// CREATE TABLE statement built from a model's column definitions
pub fn create_table_sql(schema: &SchemaDescriptor, prefix: &str) -> String {
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        schema.primary_key
    )];
    columns.extend(schema.columns.iter().map(|c| c.definition()));
    format!(
        "CREATE TABLE IF NOT EXISTS {}{} ({})",
        prefix,
        schema.table,
        columns.join(", ")
    )
}

pub fn create_table<M: Model>(session: &Session<SqliteDatabase>) {
    let schema = session.schema::<M>().unwrap();
    let sql = create_table_sql(&schema, &session.config().table_prefix);
    session.database().connection().execute_batch(&sql).unwrap();
}

/// In-memory session with the blog tables created
pub fn blog_session(config: &StoreConfig) -> Session<SqliteDatabase> {
    let session = open_session(config).unwrap();
    create_table::<Users>(&session);
    create_table::<Posts>(&session);
    session
}
