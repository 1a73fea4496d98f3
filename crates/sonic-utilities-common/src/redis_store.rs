//! Redis backend for [`TableStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::db::{table_key, DbId, FieldValues, TableStore};
use crate::error::{UtilError, UtilResult};

/// Connection parameters for one SONiC database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis server hostname or IP
    pub host: String,
    /// Redis server port
    pub port: u16,
    /// Redis database number
    pub db: u32,
    /// Which SONiC database this is, for logging
    pub db_id: DbId,
}

impl RedisConfig {
    /// Creates a configuration using the database's default number.
    pub fn new(host: impl Into<String>, port: u16, db_id: DbId) -> Self {
        Self {
            host: host.into(),
            port,
            db: db_id.id(),
            db_id,
        }
    }

    /// Overrides the database number.
    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Returns the Redis connection URI.
    pub fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// A [`TableStore`] backed by a Redis connection manager.
#[derive(Clone)]
pub struct RedisStore {
    config: RedisConfig,
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connects to the database described by `config`.
    pub async fn connect(config: RedisConfig) -> UtilResult<Self> {
        let uri = config.uri();

        let client = redis::Client::open(uri.as_str())
            .map_err(|e| UtilError::database("open", format!("{}: {}", uri, e)))?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| UtilError::database("connect", format!("{}: {}", uri, e)))?;

        info!(
            "Connected to {} at {}:{} (db={})",
            config.db_id.name(),
            config.host,
            config.port,
            config.db
        );

        Ok(Self { config, connection })
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[async_trait]
impl TableStore for RedisStore {
    async fn get_entry(&self, table: &str, key: &str) -> UtilResult<Option<FieldValues>> {
        let redis_key = table_key(table, key);
        let mut conn = self.connection.clone();

        let map: HashMap<String, String> = conn
            .hgetall(&redis_key)
            .await
            .map_err(|e| UtilError::database("hgetall", e.to_string()))?;

        debug!(key = %redis_key, fields = map.len(), "get_entry");

        if map.is_empty() {
            return Ok(None);
        }
        let mut fvs: FieldValues = map.into_iter().collect();
        fvs.sort();
        Ok(Some(fvs))
    }

    async fn set_entry(&self, table: &str, key: &str, fvs: Option<FieldValues>) -> UtilResult<()> {
        let redis_key = table_key(table, key);
        let mut conn = self.connection.clone();

        let fvs = fvs.unwrap_or_default();
        debug!(key = %redis_key, fields = ?fvs, "set_entry");

        let mut pipe = redis::pipe();
        pipe.atomic().del(&redis_key).ignore();
        if !fvs.is_empty() {
            pipe.hset_multiple(&redis_key, &fvs[..]).ignore();
        }

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| UtilError::database("set_entry", e.to_string()))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> UtilResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| UtilError::database("keys", e.to_string()))?;
        keys.sort();
        Ok(keys)
    }

    async fn hget(&self, raw_key: &str, field: &str) -> UtilResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn
            .hget(raw_key, field)
            .await
            .map_err(|e| UtilError::database("hget", e.to_string()))?;
        Ok(value)
    }

    async fn delete(&self, raw_key: &str) -> UtilResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(raw_key)
            .await
            .map_err(|e| UtilError::database("del", e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_defaults() {
        let config = RedisConfig::new("127.0.0.1", 6379, DbId::ConfigDb);
        assert_eq!(config.db, 4);
        assert_eq!(config.uri(), "redis://127.0.0.1:6379/4");
    }

    #[test]
    fn test_redis_config_chassis_db() {
        let config = RedisConfig::new("redis_chassis.server", 6380, DbId::ChassisStateDb);
        assert_eq!(config.uri(), "redis://redis_chassis.server:6380/13");

        let config = config.with_db(12);
        assert_eq!(config.uri(), "redis://redis_chassis.server:6380/12");
    }
}
