use std::time::Duration;

use clap::ValueEnum;
use mssql_middleware::mssql::config::normalize_request_timeout;
use mssql_middleware::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;

#[test]
fn full_option_tree() -> Result<(), SqlMiddlewareDbError> {
    let opts = MssqlOptions::from_json(json!({
        "driver": "ODBC Driver 18 for SQL Server",
        "resultMode": "multi",
        "connection": {
            "type": "azure-active-directory-access-token",
            "token": "eyJ0eXAi",
            "host": "db.example.net",
            "port": 14330,
            "database": "app",
            "timeout": 5000,
            "requestTimeout": 30000,
            "options": {
                "encrypt": true,
                "trustServerCertificate": true,
                "debug": true
            }
        },
        "pool": { "min": 1, "max": 25, "idleTimeoutMillis": 30000 }
    }))?;

    assert_eq!(opts.result_mode, ResultMode::Multi);
    assert_eq!(opts.pool.max, 25);
    assert_eq!(opts.pool.idle_timeout_millis, Some(30_000));

    let desc = ConnectionDescriptor::from_options(&opts);
    assert_eq!(desc.server, "db.example.net");
    assert_eq!(desc.port, 14330);
    assert_eq!(desc.database.as_deref(), Some("app"));
    assert_eq!(desc.connection_timeout, Duration::from_millis(5000));
    assert_eq!(desc.request_timeout, Some(Duration::from_millis(30_000)));
    assert_eq!(
        desc.authentication.auth_type,
        AuthenticationType::AzureActiveDirectoryAccessToken
    );
    assert!(desc.encrypt && desc.trust_server_certificate && desc.debug);
    assert!(desc.tiberius_config().is_ok());
    Ok(())
}

#[test]
fn user_alias_and_defaults() -> Result<(), SqlMiddlewareDbError> {
    let opts = MssqlOptions::from_json_str(
        r#"{ "connection": { "server": "db", "user": "sa", "password": "pw" } }"#,
    )?;
    assert_eq!(opts.result_mode, ResultMode::Default);
    assert_eq!(opts.pool, PoolOptions::default());

    let desc = ConnectionDescriptor::from_options(&opts);
    assert_eq!(desc.authentication.user_name, "sa");
    assert_eq!(desc.port, 1433);
    assert_eq!(desc.connection_timeout, Duration::from_millis(15_000));
    assert!(desc.connection_string().contains("Driver={SQL Server Native Client 11.0}"));
    Ok(())
}

#[test]
fn bad_options_are_config_errors() {
    for bad in [
        json!({ "resultMode": "sometimes" }),
        json!({ "connection": { "type": "kerberos" } }),
        json!({ "connection": { "options": { "encrpyt": true } } }),
        json!({ "pool": { "maximum": 3 } }),
    ] {
        let err = MssqlOptions::from_json(bad.clone()).unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)), "{bad}");
    }
}

#[test]
fn timeouts_normalize() {
    assert_eq!(normalize_request_timeout(Some(f64::NAN)), 15_000);
    assert_eq!(normalize_request_timeout(Some(f64::INFINITY)), 0);
    assert_eq!(normalize_request_timeout(Some(-5.0)), 0);
    assert_eq!(normalize_request_timeout(Some(16_000.0)), 16_000);

    let opts = MssqlOptionsBuilder::new("db".into(), "master".into())
        .request_timeout_ms(-1.0)
        .finish();
    assert_eq!(ConnectionDescriptor::from_options(&opts).request_timeout, None);
}

#[test]
fn cli_value_names() {
    assert_eq!(ResultMode::from_str("mixed", true).ok(), Some(ResultMode::Mixed));
    assert_eq!(
        AuthenticationType::from_str("azure-active-directory-access-token", false).ok(),
        Some(AuthenticationType::AzureActiveDirectoryAccessToken)
    );
    assert!(AuthenticationType::from_str("kerberos", true).is_err());
}

#[test]
fn pool_builds_lazily_and_closes() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        // Nothing listens on port 1, so the pool must not connect while it is built.
        let pool = ConfigAndPool::mssql_builder("127.0.0.1".into(), "master".into())
            .port(Some(1))
            .connection_timeout_ms(2000)
            .result_mode(ResultMode::Mixed)
            .pool(PoolOptions {
                max: 3,
                idle_timeout_millis: Some(1000),
                ..PoolOptions::default()
            })
            .build()
            .await?;

        assert_eq!(pool.result_mode(), ResultMode::Mixed);
        assert_eq!(pool.status().max_size, 3);
        assert_eq!(pool.status().size, 0);

        assert!(pool.get_connection().await.is_err());

        pool.close();
        let err = pool.get_connection().await.unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::PoolError(_)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[cfg(not(windows))]
#[test]
fn trusted_connection_needs_windows() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let err = ConfigAndPool::mssql_builder("localhost".into(), "master".into())
            .trusted_connection(true)
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[tokio::test]
async fn idle_reaper_does_not_keep_pool_alive() -> Result<(), SqlMiddlewareDbError> {
    let pool = ConfigAndPool::mssql_builder("127.0.0.1".into(), "master".into())
        .port(Some(1))
        .pool(PoolOptions {
            idle_timeout_millis: Some(100),
            ..PoolOptions::default()
        })
        .build()
        .await?;
    let weak = pool.pool.weak();
    drop(pool);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(weak.upgrade().is_none());
    Ok(())
}

#[test]
fn connection_timeout_prefers_long_key() -> Result<(), SqlMiddlewareDbError> {
    let both = MssqlOptions::from_json(json!({
        "connection": { "server": "db", "connectionTimeout": 3000, "timeout": 9000 }
    }))?;
    assert_eq!(
        ConnectionDescriptor::from_options(&both).connection_timeout,
        Duration::from_millis(3000)
    );

    let short = MssqlOptions::from_json(json!({ "connection": { "server": "db", "timeout": 9000 } }))?;
    assert_eq!(
        ConnectionDescriptor::from_options(&short).connection_timeout,
        Duration::from_millis(9000)
    );
    Ok(())
}
