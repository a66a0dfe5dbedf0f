//! Statement dispatch: binds each value under its parameter name and issues exactly one
//! request per statement, either as a plain query or as a stored procedure call.

use async_trait::async_trait;

use crate::error::SqlMiddlewareDbError;
use crate::mssql::binding::{Binding, BindingOptions, TypeInferencer, WireType};
use crate::results::Response;
use crate::translation::{ProcedureCall, param_name, rewrite_markers};
use crate::types::RowValues;

/// One named parameter registered on an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    /// Parameter name without the leading `@`.
    pub name: String,
    pub binding: Binding,
}

/// Parameters collected for a single request, in binding order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub params: Vec<BoundParameter>,
}

impl Request {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one parameter.
    pub fn input(
        &mut self,
        name: impl Into<String>,
        wire_type: WireType,
        value: RowValues,
        options: BindingOptions,
    ) {
        self.params.push(BoundParameter {
            name: name.into(),
            binding: Binding {
                wire_type,
                value,
                options,
            },
        });
    }
}

/// A live connection able to run requests.
///
/// Implemented for pooled tiberius clients; tests provide their own.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run `sql` with the request's parameters declared under their names.
    async fn query(&mut self, sql: &str, request: Request) -> Result<Response, SqlMiddlewareDbError>;

    /// Run stored procedure `procedure`, passing each parameter by name.
    async fn execute(
        &mut self,
        procedure: &str,
        request: Request,
    ) -> Result<Response, SqlMiddlewareDbError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Query,
    Procedure(ProcedureCall),
}

/// SQL text plus its ordered bindings, rewritten once and ready to run any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    bindings: Vec<RowValues>,
    target: Target,
}

impl Statement {
    /// Prepare compiled SQL for dispatch.
    ///
    /// Positional markers are numbered here, so retrying a statement reuses the same text.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::EmptyStatement` for blank SQL, and
    /// `SqlMiddlewareDbError::ParameterError` when the number of markers (or, for a procedure
    /// call, of `@name` markers) cannot cover the bindings.
    pub fn new(sql: &str, bindings: Vec<RowValues>) -> Result<Self, SqlMiddlewareDbError> {
        if sql.trim().is_empty() {
            return Err(SqlMiddlewareDbError::EmptyStatement);
        }

        if let Some(call) = ProcedureCall::parse(sql)? {
            if call.param_names.len() < bindings.len() {
                return Err(SqlMiddlewareDbError::ParameterError(format!(
                    "procedure {} names {} parameters but {} values were bound",
                    call.name,
                    call.param_names.len(),
                    bindings.len()
                )));
            }
            return Ok(Self {
                sql: sql.to_string(),
                bindings,
                target: Target::Procedure(call),
            });
        }

        let positioned = rewrite_markers(sql);
        if positioned.markers != bindings.len() {
            return Err(SqlMiddlewareDbError::ParameterError(format!(
                "query has {} placeholders but {} values were bound",
                positioned.markers,
                bindings.len()
            )));
        }

        Ok(Self {
            sql: positioned.sql.into_owned(),
            bindings,
            target: Target::Query,
        })
    }

    /// SQL text as it will be sent.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn bindings(&self) -> &[RowValues] {
        &self.bindings
    }

    /// The stored procedure this statement calls, if any.
    #[must_use]
    pub fn procedure(&self) -> Option<&ProcedureCall> {
        match &self.target {
            Target::Procedure(call) => Some(call),
            Target::Query => None,
        }
    }

    /// Infer and name every binding.
    ///
    /// # Errors
    ///
    /// Propagates type inference failures for the first offending value.
    pub fn request(
        &self,
        inferencer: &TypeInferencer,
        verbose: bool,
    ) -> Result<Request, SqlMiddlewareDbError> {
        let mut request = Request::new();
        for (position, raw) in self.bindings.iter().enumerate() {
            let name = match &self.target {
                Target::Procedure(call) => {
                    call.param_names.get(position).cloned().ok_or_else(|| {
                        SqlMiddlewareDbError::ParameterError(format!(
                            "no parameter name for binding {position} of procedure {}",
                            call.name
                        ))
                    })?
                }
                Target::Query => param_name(position),
            };
            let binding = inferencer.infer(raw)?;
            if verbose {
                tracing::debug!(
                    name = %name,
                    wire_type = %binding.wire_type,
                    value = ?binding.value,
                    "request::binding"
                );
            } else {
                tracing::trace!(name = %name, wire_type = %binding.wire_type, "request::binding");
            }
            request.input(name, binding.wire_type, binding.value, binding.options);
        }
        Ok(request)
    }
}

/// Bind `statement` and run it on `conn`.
///
/// Every parameter is bound before the request is issued; the connection is neither
/// validated nor released here.
///
/// # Errors
///
/// Returns type inference errors before anything is sent, otherwise whatever the
/// connection reports.
pub async fn execute_statement<C>(
    conn: &mut C,
    statement: &Statement,
    inferencer: &TypeInferencer,
    verbose: bool,
) -> Result<Response, SqlMiddlewareDbError>
where
    C: DriverConnection + ?Sized,
{
    let request = statement.request(inferencer, verbose)?;

    match &statement.target {
        Target::Procedure(call) => {
            if verbose {
                tracing::debug!(procedure = %call.name, "request::execute");
            }
            conn.execute(&call.name, request).await
        }
        Target::Query => {
            if verbose {
                tracing::debug!(sql = %statement.sql, "request::query");
            }
            conn.query(&statement.sql, request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_query_is_rewritten_once() {
        let stmt = Statement::new("select ? as a, ? as b", vec![RowValues::Int(1), RowValues::Int(2)])
            .unwrap();
        assert_eq!(stmt.sql(), "select @c0 as a, @c1 as b");
        assert!(stmt.procedure().is_none());
        let again = stmt.clone();
        assert_eq!(again.sql(), stmt.sql());
    }

    #[test]
    fn empty_sql_is_rejected() {
        assert!(matches!(
            Statement::new("   ", vec![]),
            Err(SqlMiddlewareDbError::EmptyStatement)
        ));
    }

    #[test]
    fn marker_count_must_match() {
        let err = Statement::new("select ?", vec![]).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ParameterError(_)));
    }

    #[test]
    fn procedure_names_come_from_text() {
        let stmt = Statement::new(
            "exec dbo.touch @id = ?, @flag = ?",
            vec![RowValues::Int(3), RowValues::Bool(true)],
        )
        .unwrap();
        let request = stmt.request(&TypeInferencer::default(), false).unwrap();
        let names: Vec<_> = request.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "flag"]);
        assert_eq!(request.params[1].binding.wire_type, WireType::Bit);
        assert_eq!(stmt.sql(), "exec dbo.touch @id = ?, @flag = ?");
    }

    #[test]
    fn inference_errors_surface_before_sending() {
        let stmt = Statement::new("select ?", vec![RowValues::Int(i64::MAX)]).unwrap();
        let err = stmt.request(&TypeInferencer::default(), false).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::UnsafeInteger(_)));
    }
}
