// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for MySQL and Redis.
//!
//! Provides helpers to spin up both stores for integration tests, create
//! the source table, and inspect the document store directly.

use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use table_replicator::Record;
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

pub const MYSQL_USER: &str = "appuser";
pub const MYSQL_PASSWORD: &str = "app123";
pub const MYSQL_DATABASE: &str = "appdb";

/// Create a vanilla Redis container.
///
/// Uses official redis:7 image. Waits for "Ready to accept connections".
pub fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

/// Get the Redis URL for a container.
pub fn redis_url(container: &Container<'_, GenericImage>) -> String {
    let port = container.get_host_port_ipv4(6379);
    format!("redis://127.0.0.1:{}", port)
}

/// Create a MySQL 8 container with the application database and user.
///
/// The entrypoint starts a temporary server (port 0) to initialise the data
/// directory first, so wait for the real one on port 3306.
pub fn mysql_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("mysql", "8.0")
        .with_exposed_port(3306)
        .with_env_var("MYSQL_ROOT_PASSWORD", "rootpass")
        .with_env_var("MYSQL_DATABASE", MYSQL_DATABASE)
        .with_env_var("MYSQL_USER", MYSQL_USER)
        .with_env_var("MYSQL_PASSWORD", MYSQL_PASSWORD)
        .with_wait_for(WaitFor::message_on_stderr(
            "port: 3306  MySQL Community Server",
        ));
    docker.run(image)
}

/// Get the MySQL URL for a container.
pub fn mysql_url(container: &Container<'_, GenericImage>) -> String {
    let port = container.get_host_port_ipv4(3306);
    format!(
        "mysql://{}:{}@127.0.0.1:{}/{}",
        MYSQL_USER, MYSQL_PASSWORD, port, MYSQL_DATABASE
    )
}

/// Direct access to the source table, bypassing the replicator.
pub struct SourceFixture {
    pub pool: MySqlPool,
    table: String,
}

impl SourceFixture {
    /// Connect and create `table` with the application schema.
    pub async fn create(url: &str, table: &str) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .expect("Failed to connect to MySQL");

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS `{}` (
                id VARCHAR(64) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) NOT NULL,
                createdAt DATETIME(3) NOT NULL,
                updatedAt DATETIME(3) NOT NULL
            )",
            table
        ))
        .execute(&pool)
        .await
        .expect("Failed to create table");

        Self {
            pool,
            table: table.to_string(),
        }
    }

    /// Insert or replace a row.
    pub async fn put(&self, record: &Record) {
        sqlx::query(&format!(
            "REPLACE INTO `{}` (id, name, email, createdAt, updatedAt) VALUES (?, ?, ?, ?, ?)",
            self.table
        ))
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.created_at.naive_utc())
        .bind(record.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .expect("Failed to write row");
    }

    /// Change one row's email and bump its `updatedAt`.
    pub async fn update_email(&self, id: &str, email: &str, updated_at: DateTime<Utc>) {
        sqlx::query(&format!(
            "UPDATE `{}` SET email = ?, updatedAt = ? WHERE id = ?",
            self.table
        ))
        .bind(email)
        .bind(updated_at.naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await
        .expect("Failed to update row");
    }
}

/// Number of documents in a collection hash.
pub async fn redis_hlen(url: &str, key: &str) -> redis::RedisResult<u64> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    use redis::AsyncCommands;
    conn.hlen(key).await
}
