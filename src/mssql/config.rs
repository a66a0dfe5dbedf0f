use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Config as TiberiusConfig, EncryptionLevel};

use super::binding::MapBinding;
use crate::error::SqlMiddlewareDbError;
use crate::pool::ConfigAndPool;
use crate::types::ResultMode;

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_DRIVER: &str = "SQL Server Native Client 11.0";
pub const DEFAULT_POOL_MAX: usize = 10;
const DEFAULT_APP_NAME: &str = "mssql-middleware";

/// How the login is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticationType {
    /// SQL Server login with user name and password.
    #[default]
    Default,
    /// Windows (NTLM) login; Windows builds only.
    Ntlm,
    /// Azure AD access token taken from `connection.token`.
    AzureActiveDirectoryAccessToken,
}

/// `connection.options`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ConnectionFlags {
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub trusted_connection: bool,
    /// Log every request's SQL text and binding values at `debug`.
    pub debug: bool,
    /// Named instance, resolved through the SQL Browser service.
    pub instance_name: Option<String>,
    pub app_name: Option<String>,
}

/// `connection`
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionSettings {
    #[serde(rename = "type", default)]
    pub auth_type: AuthenticationType,
    #[serde(alias = "user")]
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    #[serde(alias = "host")]
    pub server: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    /// Milliseconds; `0` or absent means the default.
    pub connection_timeout: Option<u64>,
    /// Short spelling of `connectionTimeout`, which wins when both are given.
    pub timeout: Option<u64>,
    /// Milliseconds; normalized by [`normalize_request_timeout`].
    pub request_timeout: Option<f64>,
    #[serde(default)]
    pub options: ConnectionFlags,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("auth_type", &self.auth_type)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("token", &self.token.as_ref().map(|_| "<hidden>"))
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("connection_timeout", &self.connection_timeout)
            .field("timeout", &self.timeout)
            .field("request_timeout", &self.request_timeout)
            .field("options", &self.options)
            .finish()
    }
}

/// Pool sizing handed to the pool manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PoolOptions {
    /// Connections opened when the pool is built.
    pub min: usize,
    pub max: usize,
    /// Connections unused for this long are dropped by a background reaper.
    pub idle_timeout_millis: Option<u64>,
    /// How long `get_connection` waits for a free slot.
    pub acquire_timeout_millis: Option<u64>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_POOL_MAX,
            idle_timeout_millis: None,
            acquire_timeout_millis: None,
        }
    }
}

/// Options for configuring an MSSQL pool.
///
/// Deserializes from the same option tree a query-builder client is configured with;
/// unknown keys are rejected:
/// ```rust
/// use mssql_middleware::prelude::*;
///
/// let opts = MssqlOptions::from_json(serde_json::json!({
///     "driver": "ODBC Driver 18 for SQL Server",
///     "resultMode": "mixed",
///     "connection": {
///         "host": "localhost",
///         "database": "master",
///         "requestTimeout": 2000,
///         "options": { "encrypt": true, "trustServerCertificate": true }
///     },
///     "pool": { "min": 2, "max": 100 }
/// }))?;
/// assert_eq!(opts.result_mode, ResultMode::Mixed);
/// # Ok::<(), SqlMiddlewareDbError>(())
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MssqlOptions {
    pub driver: Option<String>,
    #[serde(default)]
    pub result_mode: ResultMode,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub pool: PoolOptions,
    /// Custom type mapping consulted before the built-in inference rules.
    #[serde(skip)]
    pub map_binding: Option<MapBinding>,
}

impl fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("driver", &self.driver)
            .field("result_mode", &self.result_mode)
            .field("connection", &self.connection)
            .field("pool", &self.pool)
            .field("map_binding", &self.map_binding.is_some())
            .finish()
    }
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String) -> Self {
        let mut opts = Self::default();
        opts.connection.server = Some(server);
        opts.connection.database = Some(database);
        opts
    }

    /// Parse options from a JSON option tree.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ConfigError` on unknown keys or mistyped values.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SqlMiddlewareDbError> {
        serde_json::from_value(value)
            .map_err(|e| SqlMiddlewareDbError::ConfigError(format!("Invalid MSSQL options: {e}")))
    }

    /// Parse options from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ConfigError` on malformed JSON, unknown keys or
    /// mistyped values.
    pub fn from_json_str(text: &str) -> Result<Self, SqlMiddlewareDbError> {
        serde_json::from_str(text)
            .map_err(|e| SqlMiddlewareDbError::ConfigError(format!("Invalid MSSQL options: {e}")))
    }

    #[must_use]
    pub fn with_result_mode(mut self, result_mode: ResultMode) -> Self {
        self.result_mode = result_mode;
        self
    }

    #[must_use]
    pub fn with_map_binding(mut self, map_binding: MapBinding) -> Self {
        self.map_binding = Some(map_binding);
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database),
        }
    }

    #[must_use]
    pub fn credentials(mut self, user: String, password: String) -> Self {
        self.opts.connection.user_name = Some(user);
        self.opts.connection.password = Some(password);
        self
    }

    #[must_use]
    pub fn authentication(mut self, auth_type: AuthenticationType) -> Self {
        self.opts.connection.auth_type = auth_type;
        self
    }

    #[must_use]
    pub fn token(mut self, token: String) -> Self {
        self.opts.connection.token = Some(token);
        self
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.connection.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.connection.options.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn connection_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.connection.connection_timeout = Some(millis);
        self
    }

    /// Request timeout in milliseconds; see [`normalize_request_timeout`].
    #[must_use]
    pub fn request_timeout_ms(mut self, millis: f64) -> Self {
        self.opts.connection.request_timeout = Some(millis);
        self
    }

    #[must_use]
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.opts.connection.options.encrypt = encrypt;
        self
    }

    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.opts.connection.options.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn trusted_connection(mut self, trusted: bool) -> Self {
        self.opts.connection.options.trusted_connection = trusted;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.opts.connection.options.debug = debug;
        self
    }

    #[must_use]
    pub fn driver(mut self, driver: String) -> Self {
        self.opts.driver = Some(driver);
        self
    }

    #[must_use]
    pub fn result_mode(mut self, result_mode: ResultMode) -> Self {
        self.opts.result_mode = result_mode;
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolOptions) -> Self {
        self.opts.pool = pool;
        self
    }

    #[must_use]
    pub fn map_binding(mut self, map_binding: MapBinding) -> Self {
        self.opts.map_binding = Some(map_binding);
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for SQL Server.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError` if the options are inconsistent or pool creation fails.
    pub async fn build(self) -> Result<ConfigAndPool, SqlMiddlewareDbError> {
        ConfigAndPool::new_mssql(self.finish()).await
    }
}

/// Normalize a request timeout given in milliseconds.
///
/// Absent or NaN becomes 15000, infinity and negative values become 0 (no timeout).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_request_timeout(raw: Option<f64>) -> u64 {
    match raw {
        None => DEFAULT_REQUEST_TIMEOUT_MS,
        Some(ms) if ms.is_nan() => DEFAULT_REQUEST_TIMEOUT_MS,
        Some(ms) if ms == f64::INFINITY || ms < 0.0 => 0,
        Some(ms) => ms.round() as u64,
    }
}

/// Credentials of a [`ConnectionDescriptor`].
#[derive(Clone, PartialEq, Eq)]
pub struct Authentication {
    pub auth_type: AuthenticationType,
    pub user_name: String,
    pub password: String,
    pub token: Option<String>,
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authentication")
            .field("auth_type", &self.auth_type)
            .field("user_name", &self.user_name)
            .field("password", &"<hidden>")
            .finish_non_exhaustive()
    }
}

/// Fully-defaulted connection settings the pool manager connects with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub authentication: Authentication,
    pub driver: String,
    pub server: String,
    pub port: u16,
    pub database: Option<String>,
    pub connection_timeout: Duration,
    /// `None` when requests may run forever.
    pub request_timeout: Option<Duration>,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub trusted_connection: bool,
    pub debug: bool,
    pub instance_name: Option<String>,
    pub app_name: String,
}

impl ConnectionDescriptor {
    #[must_use]
    pub fn from_options(opts: &MssqlOptions) -> Self {
        let settings = &opts.connection;
        let connection_timeout = match settings
            .connection_timeout
            .filter(|ms| *ms > 0)
            .or(settings.timeout)
        {
            Some(ms) if ms > 0 => ms,
            _ => DEFAULT_CONNECTION_TIMEOUT_MS,
        };
        let request_timeout = normalize_request_timeout(settings.request_timeout);

        Self {
            authentication: Authentication {
                auth_type: settings.auth_type,
                user_name: settings.user_name.clone().unwrap_or_default(),
                password: settings.password.clone().unwrap_or_default(),
                token: settings.token.clone(),
            },
            driver: opts
                .driver
                .clone()
                .unwrap_or_else(|| DEFAULT_DRIVER.to_string()),
            server: settings
                .server
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            port: settings.port.unwrap_or(DEFAULT_PORT),
            database: settings.database.clone(),
            connection_timeout: Duration::from_millis(connection_timeout),
            request_timeout: (request_timeout > 0).then(|| Duration::from_millis(request_timeout)),
            encrypt: settings.options.encrypt,
            trust_server_certificate: settings.options.trust_server_certificate,
            trusted_connection: settings.options.trusted_connection,
            debug: settings.options.debug,
            instance_name: settings.options.instance_name.clone(),
            app_name: settings
                .options
                .app_name
                .clone()
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        }
    }

    /// ODBC-style connection string describing this descriptor.
    #[must_use]
    pub fn connection_string(&self) -> String {
        self.render_connection_string(&self.authentication.password)
    }

    /// Connection string with the password masked, safe to log.
    #[must_use]
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string("***")
    }

    fn render_connection_string(&self, password: &str) -> String {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        format!(
            "Driver={{{driver}}};UID={uid};PWD={password};Server={server},{port};Database={database};\
             Trusted_Connection={trusted};TrustServerCertificate={trust};Encrypt={encrypt};",
            driver = self.driver,
            uid = self.authentication.user_name,
            server = self.server,
            port = self.port,
            database = self.database.as_deref().unwrap_or_default(),
            trusted = yes_no(self.trusted_connection),
            trust = yes_no(self.trust_server_certificate),
            encrypt = yes_no(self.encrypt),
        )
    }

    /// Build the tiberius configuration for this descriptor.
    ///
    /// # Errors
    ///
    /// Returns `SqlMiddlewareDbError::ConfigError` when the requested authentication is not
    /// available on this platform or lacks its token.
    pub fn tiberius_config(&self) -> Result<TiberiusConfig, SqlMiddlewareDbError> {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.port(self.port);
        if let Some(database) = &self.database {
            config.database(database);
        }
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
        }
        config.application_name(&self.app_name);
        config.encryption(if self.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });
        if self.trust_server_certificate {
            config.trust_cert();
        }
        config.authentication(self.auth_method()?);
        Ok(config)
    }

    fn auth_method(&self) -> Result<AuthMethod, SqlMiddlewareDbError> {
        let auth = &self.authentication;
        if self.trusted_connection {
            return integrated_auth();
        }

        match auth.auth_type {
            AuthenticationType::Default => {
                Ok(AuthMethod::sql_server(&auth.user_name, &auth.password))
            }
            AuthenticationType::Ntlm => windows_auth(&auth.user_name, &auth.password),
            AuthenticationType::AzureActiveDirectoryAccessToken => auth
                .token
                .as_ref()
                .map(AuthMethod::aad_token)
                .ok_or_else(|| {
                    SqlMiddlewareDbError::ConfigError(
                        "azure-active-directory-access-token authentication needs connection.token"
                            .to_string(),
                    )
                }),
        }
    }
}

#[cfg(windows)]
fn integrated_auth() -> Result<AuthMethod, SqlMiddlewareDbError> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthMethod, SqlMiddlewareDbError> {
    Err(SqlMiddlewareDbError::ConfigError(
        "trustedConnection needs integrated authentication, which is only built on Windows"
            .to_string(),
    ))
}

#[cfg(windows)]
fn windows_auth(user: &str, password: &str) -> Result<AuthMethod, SqlMiddlewareDbError> {
    Ok(AuthMethod::windows(user, password))
}

#[cfg(not(windows))]
fn windows_auth(_user: &str, _password: &str) -> Result<AuthMethod, SqlMiddlewareDbError> {
    Err(SqlMiddlewareDbError::ConfigError(
        "ntlm authentication is only built on Windows".to_string(),
    ))
}
