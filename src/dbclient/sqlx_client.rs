//! `sqlx`-backed [`DatabaseClient`]. Uses `sqlx::raw_sql` so every query runs
//! over the Postgres simple query protocol rather than the extended
//! (prepared-statement) protocol, which poolers like `PgBouncer` in
//! transaction-pooling mode cannot reliably support (spec §4.3).

use super::{DatabaseClient, DbError, Endpoint, Session};
use crate::query_result::{ColumnDescription, QueryResult};
use futures::future::BoxFuture;
use futures::TryStreamExt as _;
use secrecy::ExposeSecret as _;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Column as _, ConnectOptions as _, Connection as _, Row as _};
use tracing::warn;

pub struct SqlxClient;

impl DatabaseClient for SqlxClient {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, DbError>> {
        Box::pin(async move {
            let options = PgConnectOptions::new()
                .host(&endpoint.host)
                .port(endpoint.port)
                .username(&endpoint.user)
                .password(endpoint.password.expose_secret())
                .database(&endpoint.database)
                .ssl_mode(PgSslMode::Prefer);

            let conn = options.connect().await.map_err(|err| classify_connect_error(&err))?;
            Ok(Box::new(PgSession { conn }) as Box<dyn Session>)
        })
    }
}

struct PgSession {
    conn: PgConnection,
}

impl Session for PgSession {
    fn version(&mut self) -> BoxFuture<'_, Result<u32, DbError>> {
        Box::pin(async move {
            let result = self
                .query("SELECT current_setting('server_version_num') AS version_num")
                .await?;
            let row = result
                .rows()
                .first()
                .ok_or_else(|| DbError::QueryFailed("server_version_num returned no rows".into()))?;
            let raw = row
                .first()
                .and_then(Option::as_ref)
                .ok_or_else(|| DbError::QueryFailed("server_version_num was null".into()))?;
            raw.parse()
                .map_err(|_| DbError::QueryFailed(format!("unparseable server version: {raw}")))
        })
    }

    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<QueryResult, DbError>> {
        Box::pin(async move {
            let mut stream = sqlx::raw_sql(sql).fetch(&mut self.conn);
            let mut columns: Option<Vec<ColumnDescription>> = None;
            let mut rows = Vec::new();

            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| DbError::QueryFailed(e.to_string()))?
            {
                if columns.is_none() {
                    columns = Some(
                        row.columns()
                            .iter()
                            .map(|c| ColumnDescription {
                                name: c.name().to_string(),
                                type_oid: i32::try_from(c.type_info().oid().map_or(0, |oid| oid.0))
                                    .unwrap_or(0),
                            })
                            .collect(),
                    );
                }

                let cells: Vec<Option<String>> = (0..row.columns().len())
                    .map(|i| row.try_get_raw(i).ok().and_then(|raw| raw.as_str().ok().map(str::to_string)))
                    .collect();
                rows.push(cells);
            }

            QueryResult::new(columns.unwrap_or_default(), rows).map_err(DbError::from)
        })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Err(err) = self.conn.close().await {
                warn!(error = %err, "failed to close database session cleanly");
            }
        })
    }
}

fn classify_connect_error(err: &sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = err {
        match db_err.code().as_deref() {
            Some("28P01" | "28000") => return DbError::AuthFailed(db_err.message().to_string()),
            Some("3D000") => return DbError::WrongDatabase(db_err.message().to_string()),
            _ => {}
        }
    }
    DbError::Unreachable(err.to_string())
}
