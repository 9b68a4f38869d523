//! SQL dialects
//!
//! Statements are rendered identically for every dialect except the conflict
//! tail of the UPDATE-phase upsert.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `ON DUPLICATE KEY UPDATE c=VALUES(c)`
    MySql,
    /// `ON CONFLICT(pk) DO UPDATE SET c=excluded.c`
    Sqlite,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Conflict tail appended to a multi-row INSERT to make it an upsert
    pub fn upsert_clause(&self, primary_key: &str, columns: &[String]) -> String {
        match self {
            Dialect::MySql => {
                let assignments: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c}=VALUES({c})"))
                    .collect();
                format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
            }
            Dialect::Sqlite => {
                let assignments: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c}=excluded.{c}"))
                    .collect();
                format!(
                    "ON CONFLICT({}) DO UPDATE SET {}",
                    primary_key,
                    assignments.join(", ")
                )
            }
        }
    }
}

/// `n` comma separated placeholders
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        vec!["c1".to_string(), "c2".to_string()]
    }

    #[test]
    fn test_mysql_upsert_clause() {
        assert_eq!(
            Dialect::MySql.upsert_clause("id", &cols()),
            "ON DUPLICATE KEY UPDATE c1=VALUES(c1), c2=VALUES(c2)"
        );
    }

    #[test]
    fn test_sqlite_upsert_clause() {
        assert_eq!(
            Dialect::Sqlite.upsert_clause("id", &cols()),
            "ON CONFLICT(id) DO UPDATE SET c1=excluded.c1, c2=excluded.c2"
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}
