use std::sync::LazyLock;

use regex::Regex;

use crate::error::SqlMiddlewareDbError;

type StaticRegex = LazyLock<Regex>;

static PROC_KEYWORD: StaticRegex =
    LazyLock::new(|| Regex::new(r"(?i)^\s*exec(?:ute)?\s").expect("static regex"));
static PROC_NAME: StaticRegex =
    LazyLock::new(|| Regex::new(r"(?i)^\s*exec(?:ute)?\s+([^@\s;]+)").expect("static regex"));
static PARAM_TOKEN: StaticRegex =
    LazyLock::new(|| Regex::new(r"@@?\w+").expect("static regex"));

/// Whether `sql` starts with `exec`/`execute` (any case) followed by whitespace.
#[must_use]
pub fn is_procedure_call(sql: &str) -> bool {
    PROC_KEYWORD.is_match(sql)
}

/// A stored procedure invocation recognised from SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCall {
    /// Procedure name as written, schema prefix included.
    pub name: String,
    /// Every `@word` in the text, in order and without the `@`; `@@` system
    /// functions are skipped.
    pub param_names: Vec<String>,
}

impl ProcedureCall {
    /// Parse a procedure call, or `None` when `sql` is a plain query.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ParameterError` when the text starts with the
    /// procedure keyword but no procedure name follows it.
    pub fn parse(sql: &str) -> Result<Option<Self>, SqlMiddlewareDbError> {
        if !is_procedure_call(sql) {
            return Ok(None);
        }

        let name = PROC_NAME
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                SqlMiddlewareDbError::ParameterError(format!(
                    "Could not find a procedure name in: {sql}"
                ))
            })?;

        let param_names = PARAM_TOKEN
            .find_iter(sql)
            .map(|m| m.as_str())
            .filter(|token| !token.starts_with("@@"))
            .map(|token| token.trim_start_matches('@').to_string())
            .collect();

        Ok(Some(ProcedureCall { name, param_names }))
    }
}
