//! Warehouse connection handling.
//!
//! Credentials are only checked here, when a connection is actually needed.

use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Executor,
};

use crate::{
    error::{PipelineError, Result},
    Config,
};

// ---

/// Connect to the warehouse and verify the connection.
pub async fn connect(config: &Config) -> Result<PgPool> {
    // ---
    let url = database_url(config)?;
    tracing::info!("Connecting to warehouse");

    let pool = pool_options(config).connect(url).await?;

    tracing::info!("Successfully connected to warehouse");
    Ok(pool)
}

/// Build a pool that connects on first use.
///
/// Used by the query server so that an unreachable warehouse surfaces per
/// request rather than at start-up.
pub fn connect_lazy(config: &Config) -> Result<PgPool> {
    // ---
    let url = database_url(config)?;
    Ok(pool_options(config).connect_lazy(url)?)
}

fn database_url(config: &Config) -> Result<&str> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| PipelineError::Config("DATABASE_URL must be set in .env or environment".into()))
}

/// Pool options applying `WAREHOUSE_SCHEMA` and `WAREHOUSE_ROLE` to each session.
fn pool_options(config: &Config) -> PgPoolOptions {
    // ---
    let session_sql = session_setup_sql(config);

    let options = PgPoolOptions::new()
        .max_connections(config.db_pool_max)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs.into()));
    if session_sql.is_empty() {
        return options;
    }

    options.after_connect(move |conn, _meta| {
        let sql = session_sql.clone();
        Box::pin(async move {
            conn.execute(sql.as_str()).await?;
            Ok(())
        })
    })
}

/// `SET ROLE` / `SET search_path` statements for a new session.
pub fn session_setup_sql(config: &Config) -> String {
    // ---
    let mut sql = String::new();
    if let Some(role) = &config.warehouse_role {
        sql.push_str(&format!("SET ROLE {};", quote_ident(role)));
    }
    if let Some(schema) = &config.warehouse_schema {
        sql.push_str(&format!("SET search_path TO {};", quote_ident(schema)));
    }
    sql
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_session_setup_sql() {
        // ---
        let mut cfg = Config::default();
        assert_eq!(session_setup_sql(&cfg), "");

        cfg.warehouse_schema = Some("energy".into());
        assert_eq!(session_setup_sql(&cfg), r#"SET search_path TO "energy";"#);

        cfg.warehouse_role = Some("etl_writer".into());
        assert_eq!(
            session_setup_sql(&cfg),
            r#"SET ROLE "etl_writer";SET search_path TO "energy";"#
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        // ---
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_missing_url_is_config_error() {
        // ---
        let err = connect_lazy(&Config::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
