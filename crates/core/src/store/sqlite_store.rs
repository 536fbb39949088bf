//! SQLite-backed key-value store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{KvStore, ScoredMember, StoreError};

/// SQLite-backed implementation of [`KvStore`].
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_strings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS kv_lists (
                key TEXT NOT NULL,
                seq INTEGER NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, seq)
            );

            CREATE TABLE IF NOT EXISTS kv_zsets (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                score INTEGER NOT NULL,
                PRIMARY KEY (key, member)
            );

            CREATE INDEX IF NOT EXISTS idx_kv_zsets_score ON kv_zsets(key, score, member);
            CREATE INDEX IF NOT EXISTS idx_kv_strings_expires ON kv_strings(expires_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(format!("connection lock poisoned: {}", e)))
    }

    /// Delete string values whose expiry has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM kv_strings WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_millis()],
        )?;
        Ok(removed)
    }

    fn upsert_counter(
        &self,
        key: &str,
        initial: i64,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let value = conn.query_row(
            r#"
            INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, ?2, NULL)
            ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN kv_strings.expires_at IS NOT NULL AND kv_strings.expires_at <= ?4
                        THEN excluded.value
                    ELSE CAST(kv_strings.value AS INTEGER) + ?3
                END,
                expires_at = NULL
            RETURNING CAST(value AS INTEGER)
            "#,
            params![key, initial, delta, now_millis()],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(value)
    }

    fn query_members(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(ScoredMember {
                member: row.get(0)?,
                score: row.get(1)?,
            })
        })?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_strings WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now_millis()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, ?2, NULL)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let written = conn.execute(
            r#"
            INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, ?2, NULL)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = NULL
                WHERE kv_strings.expires_at IS NOT NULL AND kv_strings.expires_at <= ?3
            "#,
            params![key, value, now_millis()],
        )?;
        Ok(written > 0)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = now_millis().saturating_add(ttl.as_millis() as i64);
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = tx.execute("DELETE FROM kv_strings WHERE key = ?1", params![key])?;
        removed += tx.execute("DELETE FROM kv_lists WHERE key = ?1", params![key])?;
        removed += tx.execute("DELETE FROM kv_zsets WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.upsert_counter(key, delta, delta)
    }

    fn incr_from(&self, key: &str, base: i64) -> Result<i64, StoreError> {
        self.upsert_counter(key, base.saturating_add(1), 1)
    }

    fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO kv_lists (key, seq, value)
            VALUES (?1, COALESCE((SELECT MIN(seq) FROM kv_lists WHERE key = ?1), 0) - 1, ?2)
            "#,
            params![key, value],
        )?;
        let len: i64 = tx.query_row(
            "SELECT COUNT(*) FROM kv_lists WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(len as usize)
    }

    fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let tail = tx
            .query_row(
                "SELECT seq, value FROM kv_lists WHERE key = ?1 ORDER BY seq DESC LIMIT 1",
                params![key],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let value = match tail {
            Some((seq, value)) => {
                tx.execute(
                    "DELETE FROM kv_lists WHERE key = ?1 AND seq = ?2",
                    params![key, seq],
                )?;
                Some(value)
            }
            None => None,
        };
        tx.commit()?;
        Ok(value)
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv_lists WHERE key = ?1 ORDER BY seq ASC")?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let len: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_lists WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(len as usize)
    }

    fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO kv_zsets (key, member, score) VALUES (?1, ?2, ?3)
            ON CONFLICT(key, member) DO UPDATE SET score = excluded.score
            "#,
            params![key, member, score],
        )?;
        Ok(())
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM kv_zsets WHERE key = ?1 AND member = ?2",
            params![key, member],
        )?;
        Ok(removed > 0)
    }

    fn zrank(&self, key: &str, member: &str) -> Result<Option<usize>, StoreError> {
        let conn = self.conn()?;
        let rank = conn
            .query_row(
                r#"
                SELECT (
                    SELECT COUNT(*) FROM kv_zsets z2
                    WHERE z2.key = z1.key
                      AND (z2.score < z1.score OR (z2.score = z1.score AND z2.member < z1.member))
                )
                FROM kv_zsets z1
                WHERE z1.key = ?1 AND z1.member = ?2
                "#,
                params![key, member],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(rank.map(|r| r as usize))
    }

    fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_zsets WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_zsets WHERE key = ?1 AND score >= ?2 AND score <= ?3",
            params![key, min, max],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn zrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.query_members(
            r#"
            SELECT member, score FROM kv_zsets WHERE key = ?1
            ORDER BY score ASC, member ASC LIMIT ?2 OFFSET ?3
            "#,
            params![key, count as i64, start as i64],
        )
    }

    fn zrevrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.query_members(
            r#"
            SELECT member, score FROM kv_zsets WHERE key = ?1
            ORDER BY score DESC, member DESC LIMIT ?2 OFFSET ?3
            "#,
            params![key, count as i64, start as i64],
        )
    }

    fn zrevrange_by_score(
        &self,
        key: &str,
        max: i64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.query_members(
            r#"
            SELECT member, score FROM kv_zsets WHERE key = ?1 AND score <= ?2
            ORDER BY score DESC, member DESC LIMIT ?3 OFFSET ?4
            "#,
            params![key, max, count as i64, offset as i64],
        )
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store() -> SqliteKvStore {
        SqliteKvStore::in_memory().unwrap()
    }

    #[test]
    fn test_string_set_get_del() {
        let store = store();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));

        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("2".to_string()));

        assert!(store.del("a").unwrap());
        assert!(!store.del("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_expired_value_reads_as_absent() {
        let store = store();
        store.set_ex("short", "v", Duration::ZERO).unwrap();
        store.set_ex("long", "v", Duration::from_secs(3600)).unwrap();

        assert_eq!(store.get("short").unwrap(), None);
        assert_eq!(store.get("long").unwrap(), Some("v".to_string()));

        assert_eq!(store.purge_expired().unwrap(), 1);
    }

    #[test]
    fn test_set_clears_expiry() {
        let store = store();
        store.set_ex("k", "old", Duration::ZERO).unwrap();
        store.set("k", "new").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("new".to_string()));
    }

    #[test]
    fn test_set_nx_writes_only_absent_keys() {
        let store = store();
        assert!(store.set_nx("k", "first").unwrap());
        assert!(!store.set_nx("k", "second").unwrap());
        assert_eq!(store.get("k").unwrap(), Some("first".to_string()));

        // An expired value counts as absent
        store.set_ex("stale", "old", Duration::ZERO).unwrap();
        assert!(store.set_nx("stale", "new").unwrap());
        assert_eq!(store.get("stale").unwrap(), Some("new".to_string()));
    }

    #[test]
    fn test_incr_by_starts_from_zero() {
        let store = store();
        assert_eq!(store.incr_by("cursor", 1).unwrap(), 1);
        assert_eq!(store.incr_by("cursor", 3).unwrap(), 4);
        assert_eq!(store.incr_by("cursor", -2).unwrap(), 2);
        assert_eq!(store.get("cursor").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_incr_from_seeds_base() {
        let store = store();
        assert_eq!(store.incr_from("code", 1000).unwrap(), 1001);
        assert_eq!(store.incr_from("code", 1000).unwrap(), 1002);
        // Base only applies to an absent counter
        assert_eq!(store.incr_from("code", 5000).unwrap(), 1003);
    }

    #[test]
    fn test_list_is_fifo_with_lpush_rpop() {
        let store = store();
        assert_eq!(store.lpush("q", "a").unwrap(), 1);
        assert_eq!(store.lpush("q", "b").unwrap(), 2);
        assert_eq!(store.lpush("q", "c").unwrap(), 3);

        assert_eq!(store.lrange("q").unwrap(), vec!["c", "b", "a"]);
        assert_eq!(store.llen("q").unwrap(), 3);

        assert_eq!(store.rpop("q").unwrap(), Some("a".to_string()));
        assert_eq!(store.rpop("q").unwrap(), Some("b".to_string()));
        assert_eq!(store.rpop("q").unwrap(), Some("c".to_string()));
        assert_eq!(store.rpop("q").unwrap(), None);
    }

    #[test]
    fn test_zset_ranking_and_ranges() {
        let store = store();
        store.zadd("z", 30, "c").unwrap();
        store.zadd("z", 10, "a").unwrap();
        store.zadd("z", 20, "b").unwrap();

        assert_eq!(store.zcard("z").unwrap(), 3);
        assert_eq!(store.zrank("z", "a").unwrap(), Some(0));
        assert_eq!(store.zrank("z", "c").unwrap(), Some(2));
        assert_eq!(store.zrank("z", "missing").unwrap(), None);

        let asc: Vec<String> = store
            .zrange("z", 1, 5)
            .unwrap()
            .into_iter()
            .map(|m| m.member)
            .collect();
        assert_eq!(asc, vec!["b", "c"]);

        let desc = store.zrevrange("z", 0, 2).unwrap();
        assert_eq!(desc[0], ScoredMember { member: "c".into(), score: 30 });
        assert_eq!(desc[1].member, "b");

        let bounded = store.zrevrange_by_score("z", 20, 0, 10).unwrap();
        assert_eq!(bounded.len(), 2);
        assert_eq!(bounded[0].member, "b");
        assert_eq!(store.zcount("z", 0, 20).unwrap(), 2);

        assert!(store.zrem("z", "b").unwrap());
        assert!(!store.zrem("z", "b").unwrap());
        assert_eq!(store.zrank("z", "c").unwrap(), Some(1));
    }

    #[test]
    fn test_zadd_rescores_existing_member() {
        let store = store();
        store.zadd("z", 10, "a").unwrap();
        store.zadd("z", 20, "b").unwrap();
        store.zadd("z", 30, "a").unwrap();

        assert_eq!(store.zcard("z").unwrap(), 2);
        assert_eq!(store.zrank("z", "a").unwrap(), Some(1));
    }

    #[test]
    fn test_del_removes_every_kind() {
        let store = store();
        store.lpush("k", "x").unwrap();
        store.zadd("k2", 1, "m").unwrap();

        assert!(store.del("k").unwrap());
        assert!(store.del("k2").unwrap());
        assert_eq!(store.llen("k").unwrap(), 0);
        assert_eq!(store.zcard("k2").unwrap(), 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiosk.db");
        {
            let store = SqliteKvStore::new(&path).unwrap();
            store.set("k", "v").unwrap();
            store.incr_from("code", 100).unwrap();
        }
        let store = SqliteKvStore::new(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.incr_from("code", 100).unwrap(), 102);
    }

    #[test]
    fn test_concurrent_counter_increments_are_gapless() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.incr_from("code", 0).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        assert_eq!(all, (1..=200).collect::<Vec<_>>());
    }
}
