// src/lib.rs

pub mod schema;
pub mod naive_dt_seconds;
pub mod models;
pub mod db;

use diesel::r2d2::{self, ConnectionManager, PoolError};
use diesel::connection::SimpleConnection;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

/// Primary keys are SQLite `INTEGER` rowids.
pub type UserId = i32;
pub type GroupId = i32;
pub type CollectionId = i32;
pub type SampleId = i32;
pub type CommandId = i32;
pub type ExecutionId = i32;

/// Applied to every pooled connection on checkout.
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn establish_connection_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionPragmas))
        .build(manager)
}

/// Applies every pending embedded migration.
pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

pub fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
