use mssql_middleware::prelude::*;
use mssql_middleware::test_utils::{RecordedCall, RecordingConnection, recordset};
use tokio::runtime::Runtime;

#[test]
fn plain_query_binds_sequential_names() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let stmt = Statement::new(
            "select * from users where id = ? and name = ? and score > ?",
            vec![
                RowValues::Int(1),
                RowValues::Text("ann".into()),
                RowValues::Float(0.5),
            ],
        )?;
        let rows = recordset(&["id"], vec![vec![RowValues::Int(1)]]);
        let mut conn = RecordingConnection::new().respond(Ok(Response::new(vec![rows.clone()])));

        let response = execute_statement(&mut conn, &stmt, &TypeInferencer::default(), false).await?;
        assert_eq!(response.recordsets, vec![rows]);

        assert_eq!(conn.calls.len(), 1);
        let RecordedCall::Query { sql, request } = &conn.calls[0] else {
            panic!("expected a plain query, got {:?}", conn.calls[0]);
        };
        assert_eq!(sql, "select * from users where id = @c0 and name = @c1 and score > @c2");
        let bound: Vec<_> = request
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.binding.wire_type))
            .collect();
        assert_eq!(
            bound,
            vec![
                ("c0", WireType::Int),
                ("c1", WireType::NVarChar),
                ("c2", WireType::Float),
            ]
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn procedure_call_uses_names_from_text() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let stmt = Statement::new(
            "exec dbo.add_score @player = ?, @points = ?",
            vec![RowValues::Text("ann".into()), RowValues::Int(5_000_000_000)],
        )?;
        let mut conn = RecordingConnection::new();
        execute_statement(&mut conn, &stmt, &TypeInferencer::default(), true).await?;

        let RecordedCall::Execute { procedure, request } = &conn.calls[0] else {
            panic!("expected a procedure call, got {:?}", conn.calls[0]);
        };
        assert_eq!(procedure, "dbo.add_score");
        assert_eq!(request.params[0].name, "player");
        assert_eq!(request.params[1].name, "points");
        assert_eq!(request.params[1].binding.wire_type, WireType::BigInt);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn driver_errors_keep_message_and_code() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let stmt = Statement::new("select * from nope", vec![])?;
        let mut conn = RecordingConnection::new().respond(Err(SqlMiddlewareDbError::Driver {
            message: "Invalid object name 'nope'.".to_string(),
            code: Some(208),
        }));

        let err = execute_statement(&mut conn, &stmt, &TypeInferencer::default(), false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid object name 'nope'.");
        assert_eq!(err.code(), Some(208));
        // no retry
        assert_eq!(conn.calls.len(), 1);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn bad_bindings_never_reach_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let stmt = Statement::new("select ?", vec![RowValues::Int(i64::MAX)])?;
        let mut conn = RecordingConnection::new();
        let err = execute_statement(&mut conn, &stmt, &TypeInferencer::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::UnsafeInteger(_)));
        assert!(conn.calls.is_empty());
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[test]
fn dispatched_response_shapes_by_method() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let query = CompiledQuery::new(
            "insert into t (a) values (?); select @@rowcount",
            vec![RowValues::Int(4)],
        )
        .with_method(QueryMethod::Insert)
        .with_returning("@@rowcount");
        let stmt = Statement::new(&query.sql, query.bindings.clone())?;
        let count = recordset(&[""], vec![vec![RowValues::Int(1)]]);
        let mut conn = RecordingConnection::new().respond(Ok(Response::new(vec![count])));

        let response = execute_statement(&mut conn, &stmt, &TypeInferencer::default(), false).await?;
        let out = shape_response(response, &query, ResultMode::Default)?;
        assert_eq!(out.into_value(), Some(RowValues::Int(1)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
