//! SQL statement classification for read-only enforcement.
//!
//! Every statement reaching the database passes through [`classify`]. The
//! base contract works on a trimmed, upper-cased copy of the text:
//!
//! 1. it must start with `SELECT`, `SHOW` or `DESCRIBE`;
//! 2. it must not contain any of the write keywords in [`DENIED_KEYWORDS`]
//!    anywhere, as plain substrings.
//!
//! A third rule holds in every mode: one statement per call. Any `;` followed
//! by more text is refused, even inside a string literal.
//!
//! Rule 2 is substring matching, not keyword matching: `created_orders`
//! contains `CREATE` and is rejected. Callers that want fewer surprises can
//! opt into [`ValidationMode::Strict`], which additionally parses the text with
//! [sqlparser](https://docs.rs/sqlparser/) and only accepts a single read-only
//! statement.

use crate::config::ValidationMode;
use crate::error::{GatewayError, GatewayResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::borrow::Cow;

/// Statement prefixes accepted by the allow-list, after normalization.
pub const ALLOWED_PREFIXES: &[&str] = &["SELECT", "SHOW", "DESCRIBE"];

/// Substrings that reject a statement wherever they appear.
pub const DENIED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE",
];

/// Placeholder expanded into an escaped identifier by [`ClassifiedQuery::bind_identifier`].
pub const IDENTIFIER_PLACEHOLDER: &str = "??";

/// Error messages for each rejection reason.
mod error_messages {
    pub const NOT_READ_ONLY: &str = "read-only statements only (SELECT, SHOW, DESCRIBE)";
    pub const WRITE_DETECTED: &str = "write operation detected";
    pub const MULTI_STATEMENT: &str = "multi-statement batches are not allowed";
    pub const PARSE_ERROR: &str = "failed to parse SQL statement";
    pub const EMPTY_IDENTIFIER: &str = "table name must not be empty";
}

/// Kind of read-only statement, decided by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Show,
    Describe,
}

impl StatementKind {
    fn from_normalized(normalized: &str) -> Option<Self> {
        if normalized.starts_with("SELECT") {
            Some(Self::Select)
        } else if normalized.starts_with("SHOW") {
            Some(Self::Show)
        } else if normalized.starts_with("DESCRIBE") {
            Some(Self::Describe)
        } else {
            None
        }
    }
}

/// A statement that passed classification.
///
/// The normalized text is only used for the classification decision; the
/// original text, with its casing and whitespace, is what gets executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedQuery {
    sql: String,
    normalized: String,
    kind: StatementKind,
}

impl ClassifiedQuery {
    /// The statement text that will be executed.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Trimmed, upper-cased text the classification ran against.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Replace the first `??` placeholder with an escaped identifier.
    ///
    /// The identifier is never part of the classified text, so a table named
    /// `created_orders` can still be described.
    pub fn bind_identifier(mut self, identifier: &str) -> GatewayResult<Self> {
        let escaped = escape_identifier(identifier)?;
        if let Some(pos) = self.sql.find(IDENTIFIER_PLACEHOLDER) {
            self.sql
                .replace_range(pos..pos + IDENTIFIER_PLACEHOLDER.len(), &escaped);
        }
        Ok(self)
    }

    /// Statement text with the hard row cap applied.
    ///
    /// SELECT statements always get ` LIMIT <row_limit> ` appended, whatever
    /// limit clause they already carry. SHOW and DESCRIBE do not accept a
    /// trailing LIMIT on MySQL; they are bounded while streaming instead.
    pub fn bounded_sql(&self, row_limit: usize) -> Cow<'_, str> {
        match self.kind {
            StatementKind::Select => Cow::Owned(format!("{} LIMIT {} ", self.sql, row_limit)),
            StatementKind::Show | StatementKind::Describe => Cow::Borrowed(&self.sql),
        }
    }

    /// Parse the statement and require a single read-only statement.
    pub fn verify_structure(&self) -> GatewayResult<()> {
        let statements = Parser::parse_sql(&MySqlDialect {}, &self.sql).map_err(|e| {
            GatewayError::validation(format!("{}: {}", error_messages::PARSE_ERROR, e))
        })?;

        match statements.as_slice() {
            [] => Err(GatewayError::validation(error_messages::NOT_READ_ONLY)),
            [statement] => match read_only_statement_name(statement) {
                Some(_) => Ok(()),
                None => Err(GatewayError::validation(error_messages::NOT_READ_ONLY)),
            },
            _ => Err(GatewayError::validation(error_messages::MULTI_STATEMENT)),
        }
    }
}

/// Trim and upper-case SQL text for classification.
pub fn normalize(sql: &str) -> String {
    sql.trim().to_uppercase()
}

/// Classify SQL text, returning the statement ready for execution.
///
/// Fails with `GatewayError::Validation` when the text is not read-only
/// under `mode`.
pub fn classify(sql: &str, mode: ValidationMode) -> GatewayResult<ClassifiedQuery> {
    let normalized = normalize(sql);

    let kind = StatementKind::from_normalized(&normalized)
        .ok_or_else(|| GatewayError::validation(error_messages::NOT_READ_ONLY))?;

    if let Some(keyword) = find_denied_keyword(&normalized) {
        return Err(GatewayError::validation(format!(
            "{}: statement contains {}",
            error_messages::WRITE_DETECTED,
            keyword
        )));
    }

    if is_statement_batch(sql) {
        return Err(GatewayError::validation(error_messages::MULTI_STATEMENT));
    }

    let classified = ClassifiedQuery {
        sql: strip_terminator(sql).to_string(),
        normalized,
        kind,
    };

    if mode == ValidationMode::Strict {
        classified.verify_structure()?;
    }

    Ok(classified)
}

/// True when a `;` is followed by anything but whitespace or more `;`.
///
/// Quotes and comments are not interpreted, so `'a;b'` counts too.
pub fn is_statement_batch(sql: &str) -> bool {
    sql.split_once(';')
        .is_some_and(|(_, rest)| rest.chars().any(|c| c != ';' && !c.is_whitespace()))
}

/// Drop trailing `;` terminators so the row cap lands inside the statement.
fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') {
        trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
    } else {
        sql
    }
}

/// Return the first deny-listed keyword contained in normalized text.
pub fn find_denied_keyword(normalized: &str) -> Option<&'static str> {
    DENIED_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| normalized.contains(keyword))
}

/// Escape an identifier with backticks, MySQL style.
///
/// Embedded backticks are doubled and `.` separates qualified parts, so
/// `pos.sales` becomes `` `pos`.`sales` ``.
pub fn escape_identifier(identifier: &str) -> GatewayResult<String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::validation(error_messages::EMPTY_IDENTIFIER));
    }

    let quoted = trimmed
        .split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".");
    Ok(quoted)
}

/// Name of the statement if its type is read-only.
fn read_only_statement_name(stmt: &Statement) -> Option<&'static str> {
    match stmt {
        Statement::Query(_) => Some("SELECT"),
        Statement::ShowTables { .. } => Some("SHOW TABLES"),
        Statement::ShowColumns { .. } => Some("SHOW COLUMNS"),
        Statement::ShowDatabases { .. } => Some("SHOW DATABASES"),
        Statement::ShowSchemas { .. } => Some("SHOW SCHEMAS"),
        Statement::ShowCreate { .. } => Some("SHOW CREATE"),
        Statement::ShowFunctions { .. } => Some("SHOW FUNCTIONS"),
        Statement::ShowVariable { .. } => Some("SHOW VARIABLE"),
        Statement::ShowVariables { .. } => Some("SHOW VARIABLES"),
        Statement::ShowStatus { .. } => Some("SHOW STATUS"),
        Statement::ShowCollation { .. } => Some("SHOW COLLATION"),
        Statement::ExplainTable { .. } => Some("DESCRIBE"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODE: ValidationMode = ValidationMode::Substring;

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize("  select * from sales \n"), "SELECT * FROM SALES");
    }

    #[test]
    fn test_allows_read_only_prefixes() {
        assert_eq!(
            classify("SELECT * FROM sales", MODE).unwrap().kind(),
            StatementKind::Select
        );
        assert_eq!(
            classify("show tables", MODE).unwrap().kind(),
            StatementKind::Show
        );
        assert_eq!(
            classify("  describe products", MODE).unwrap().kind(),
            StatementKind::Describe
        );
    }

    #[test]
    fn test_rejects_non_read_only_prefix() {
        for sql in ["INSERT INTO t VALUES (1)", "WITH x AS (SELECT 1) SELECT * FROM x", "", "   "] {
            let err = classify(sql, MODE).unwrap_err();
            assert!(
                err.to_string().contains("read-only statements only"),
                "unexpected error for {sql:?}: {err}"
            );
        }
    }

    #[test]
    fn test_rejects_denied_keyword_anywhere() {
        let err = classify("SELECT 1; DROP TABLE sales", MODE).unwrap_err();
        assert!(err.to_string().contains("write operation detected"));
        assert!(err.to_string().contains("DROP"));
    }

    #[test]
    fn test_substring_match_rejects_created_orders() {
        let err = classify("SELECT * FROM created_orders", MODE).unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
        assert!(err.to_string().contains("CREATE"));
    }

    #[test]
    fn test_original_text_preserved() {
        let classified = classify("  select Name from Products ", MODE).unwrap();
        assert_eq!(classified.sql(), "  select Name from Products ");
        assert_eq!(classified.normalized(), "SELECT NAME FROM PRODUCTS");
    }

    #[test]
    fn test_bounded_sql_appends_limit_to_select_only() {
        let select = classify("SELECT * FROM products LIMIT 5", MODE).unwrap();
        assert_eq!(
            select.bounded_sql(100),
            "SELECT * FROM products LIMIT 5 LIMIT 100 "
        );

        let show = classify("SHOW TABLES", MODE).unwrap();
        assert_eq!(show.bounded_sql(100), "SHOW TABLES");
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("products").unwrap(), "`products`");
        assert_eq!(escape_identifier("pos.sales").unwrap(), "`pos`.`sales`");
        assert_eq!(escape_identifier("we`ird").unwrap(), "`we``ird`");
        assert!(escape_identifier("  ").is_err());
    }

    #[test]
    fn test_bind_identifier_skips_classification() {
        let describe = classify("DESCRIBE ??", MODE)
            .unwrap()
            .bind_identifier("created_orders")
            .unwrap();
        assert_eq!(describe.sql(), "DESCRIBE `created_orders`");
        assert_eq!(describe.kind(), StatementKind::Describe);
    }

    #[test]
    fn test_bind_identifier_cannot_break_out_of_quotes() {
        let describe = classify("DESCRIBE ??", MODE)
            .unwrap()
            .bind_identifier("x`; DROP TABLE sales; --")
            .unwrap();
        assert_eq!(describe.sql(), "DESCRIBE `x``; DROP TABLE sales; --`");
    }

    #[test]
    fn test_strict_mode_accepts_single_read_only_statement() {
        let strict = ValidationMode::Strict;
        assert!(classify("SELECT id, total FROM sales WHERE store_id = ?", strict).is_ok());
        assert!(classify("SHOW TABLES", strict).is_ok());
        assert!(classify("DESCRIBE products", strict).is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_multi_statement_batch() {
        let err = classify("SELECT 1; SELECT 2", ValidationMode::Strict).unwrap_err();
        assert!(err.to_string().contains("multi-statement"));
    }

    #[test]
    fn test_batches_rejected_in_every_mode() {
        for sql in [
            "SELECT 1; SET SESSION TRANSACTION READ WRITE; REPLACE INTO products SELECT * FROM products",
            "SHOW TABLES;GRANT ALL ON pos.* TO 'agent'",
            "DESCRIBE products ; RENAME TABLE sales TO sales_old",
            "SELECT 'a;b'",
        ] {
            for mode in [MODE, ValidationMode::Strict] {
                let err = classify(sql, mode).unwrap_err();
                assert!(
                    err.to_string().contains("multi-statement"),
                    "{:?} gave {}",
                    sql,
                    err
                );
            }
        }
    }

    #[test]
    fn test_trailing_terminator_is_dropped() {
        let query = classify("SELECT * FROM sales; ;\n", MODE).unwrap();
        assert_eq!(query.sql(), "SELECT * FROM sales");
        assert_eq!(query.bounded_sql(100), "SELECT * FROM sales LIMIT 100 ");

        assert!(!is_statement_batch("SHOW TABLES;  "));
        assert_eq!(classify("  SHOW TABLES ", MODE).unwrap().sql(), "  SHOW TABLES ");
    }

    #[test]
    fn test_strict_mode_rejects_unparseable_text() {
        let err = classify("SELECT * FROM sales WHERE (", ValidationMode::Strict).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_strict_mode_still_applies_substring_rules() {
        assert!(classify("SELECT * FROM created_orders", ValidationMode::Strict).is_err());
    }

    #[test]
    fn test_strict_mode_placeholder_is_not_a_bypass() {
        let err = classify("SELECT 1 ??; SELECT 2", ValidationMode::Strict);
        assert!(matches!(err, Err(GatewayError::Validation { .. })));
    }

    #[test]
    fn test_strict_verify_after_bind() {
        let describe = classify("DESCRIBE ??", MODE)
            .unwrap()
            .bind_identifier("products")
            .unwrap();
        assert!(describe.verify_structure().is_ok());
    }
}
