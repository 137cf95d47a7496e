//! Named cache stores and the responses kept in them.
//!
//! A store is the unit of invalidation: one exists per cache generation and
//! rolling the generation forward deletes the old store with all of its
//! entries. Within a store, entries are keyed by request and overwritten on
//! every put.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    /// Request URL; together with `method` it forms the entry key.
    pub url: String,
    /// URL the response was finally served from, after redirects.
    pub final_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    pub fn key_hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl CacheDb {
    /// Open (create if absent) a named store.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing store, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store with that name existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE store = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response in `store`, replacing any entry for the same request.
    ///
    /// The store is created if it does not exist yet.
    pub async fn put_response(&self, store: &str, response: &CachedResponse) -> Result<(), Error> {
        let store = store.to_string();
        let key_hash = response.key_hash();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        store, key_hash, method, url, final_url, status_code, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(store, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        final_url = excluded.final_url,
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        store,
                        key_hash,
                        response.method,
                        response.url,
                        response.final_url,
                        response.status,
                        headers_json,
                        response.body,
                        response.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored for a request.
    ///
    /// Returns None if the store or the entry doesn't exist.
    pub async fn match_response(&self, store: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let store = store.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, final_url, status_code, headers_json, body, stored_at
                     FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                match result {
                    Ok((method, url, final_url, status, headers_json, body, stored_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(CachedResponse { method, url, final_url, status, headers, body, stored_at }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a store.
    pub async fn count_entries(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            method: "GET".to_string(),
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_open_store_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("kagan-v1").await.unwrap();
        db.open_store("kagan-v1").await.unwrap();
        assert_eq!(db.store_names().await.unwrap(), vec!["kagan-v1"]);
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = make_response("https://nutz.app/", b"<html>shell</html>");

        db.put_response("kagan-v2", &response).await.unwrap();

        let found = db
            .match_response("kagan-v2", "GET", "https://nutz.app/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, response);
        assert_eq!(found.headers, vec![("content-type".to_string(), "text/html".to_string())]);
        assert!(db.has_store("kagan-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.match_response("kagan-v2", "GET", "https://nutz.app/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_are_scoped_to_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_response("kagan-v1", &make_response("https://nutz.app/", b"old")).await.unwrap();

        assert!(db.match_response("kagan-v2", "GET", "https://nutz.app/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_response("kagan-v2", &make_response("https://nutz.app/", b"first")).await.unwrap();
        db.put_response("kagan-v2", &make_response("https://nutz.app/", b"second")).await.unwrap();

        let found = db.match_response("kagan-v2", "GET", "https://nutz.app/").await.unwrap().unwrap();
        assert_eq!(found.body, b"second");
        assert_eq!(db.count_entries("kagan-v2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_store_drops_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_response("kagan-v1", &make_response("https://nutz.app/a", b"a")).await.unwrap();
        db.put_response("kagan-v1", &make_response("https://nutz.app/b", b"b")).await.unwrap();
        db.put_response("kagan-v2", &make_response("https://nutz.app/a", b"a")).await.unwrap();

        assert!(db.delete_store("kagan-v1").await.unwrap());
        assert!(!db.delete_store("kagan-v1").await.unwrap());

        assert_eq!(db.store_names().await.unwrap(), vec!["kagan-v2"]);
        assert_eq!(db.count_entries("kagan-v1").await.unwrap(), 0);
        assert_eq!(db.count_entries("kagan-v2").await.unwrap(), 1);
    }
}
