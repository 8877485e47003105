//! Durable signature catalog backed by SQLite.
//!
//! One row per image: primary key `post_id`, an optional indexed `md5`, the
//! DC triple as three doubles and the coefficient matrix as a 240-byte
//! little-endian blob. The catalog is the source of truth; the in-memory
//! index structures are rebuilt from it on startup.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::signature::HaarSignature;
use crate::types::CatalogRow;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS images (
    post_id TEXT PRIMARY KEY,
    md5     TEXT,
    avglf1  DOUBLE NOT NULL,
    avglf2  DOUBLE NOT NULL,
    avglf3  DOUBLE NOT NULL,
    sig     BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_images_md5 ON images (md5);
";

const ROW_COLUMNS: &str = "post_id, md5, avglf1, avglf2, avglf3, sig";

pub struct Catalog {
    // The engine lock serializes writers; this mutex only protects the
    // connection itself so concurrent readers can share the catalog handle.
    conn: Mutex<Connection>,
}

type RawRow = (String, Option<String>, [f64; 3], Vec<u8>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        [row.get(2)?, row.get(3)?, row.get(4)?],
        row.get(5)?,
    ))
}

fn into_record((post_id, md5, avglf, blob): RawRow) -> Result<CatalogRow> {
    let signature = HaarSignature::from_blob(avglf, &blob)?;
    Ok(CatalogRow {
        post_id,
        md5,
        signature,
    })
}

impl Catalog {
    /// Open (creating the schema if needed) the catalog at `path`. The
    /// empty string is the ephemeral in-memory sentinel.
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path.is_empty() {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Point-get by primary key.
    pub fn get(&self, post_id: &str) -> Result<Option<CatalogRow>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ROW_COLUMNS} FROM images WHERE post_id = ?1"),
                params![post_id],
                read_row,
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(into_record(raw)?)),
            None => Ok(None),
        }
    }

    /// All rows sharing a content hash (the md5 index is non-unique).
    pub fn get_by_md5(&self, md5: &str) -> Result<Vec<CatalogRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {ROW_COLUMNS} FROM images WHERE md5 = ?1"))?;
        let rows = stmt.query_map(params![md5], read_row)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(into_record(raw?)?);
        }
        Ok(out)
    }

    /// Replace any existing row for `post_id` with the given signature, as
    /// one transaction.
    pub fn upsert(&self, post_id: &str, md5: Option<&str>, sig: &HaarSignature) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM images WHERE post_id = ?1", params![post_id])?;
        tx.execute(
            "INSERT INTO images (post_id, md5, avglf1, avglf2, avglf3, sig)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                post_id,
                md5,
                sig.avglf[0],
                sig.avglf[1],
                sig.avglf[2],
                sig.to_blob()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete the row for `post_id`. Idempotent.
    pub fn remove(&self, post_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM images WHERE post_id = ?1", params![post_id])?;
        Ok(())
    }

    /// Stream every row through `f` in unspecified order. Rows are decoded
    /// one at a time off the cursor, so memory stays bounded by one row.
    pub fn each_image(&self, mut f: impl FnMut(CatalogRow)) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {ROW_COLUMNS} FROM images"))?;
        let rows = stmt.query_map([], read_row)?;
        for raw in rows {
            f(into_record(raw?)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haar::{NUM_CHANNELS, NUM_COEFS};
    use tempfile::TempDir;

    fn sig(seed: i16) -> HaarSignature {
        let mut coefs = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (c, chan) in coefs.iter_mut().enumerate() {
            for (k, coef) in chan.iter_mut().enumerate() {
                *coef = seed + (c * NUM_COEFS + k) as i16 + 1;
            }
        }
        HaarSignature {
            avglf: [seed as f64 / 100.0, 0.25, -0.5],
            sig: coefs,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let catalog = Catalog::open("").unwrap();
        catalog.upsert("post-1", Some("d41d8cd9"), &sig(1)).unwrap();

        let row = catalog.get("post-1").unwrap().unwrap();
        assert_eq!(row.post_id, "post-1");
        assert_eq!(row.md5.as_deref(), Some("d41d8cd9"));
        assert_eq!(row.signature, sig(1));

        assert!(catalog.get("post-2").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let catalog = Catalog::open("").unwrap();
        catalog.upsert("post-1", None, &sig(1)).unwrap();
        catalog.upsert("post-1", Some("abc"), &sig(2)).unwrap();

        let row = catalog.get("post-1").unwrap().unwrap();
        assert_eq!(row.signature, sig(2));

        let mut count = 0;
        catalog.each_image(|_| count += 1).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_get_by_md5_non_unique() {
        let catalog = Catalog::open("").unwrap();
        catalog.upsert("post-1", Some("same"), &sig(1)).unwrap();
        catalog.upsert("post-2", Some("same"), &sig(2)).unwrap();
        catalog.upsert("post-3", Some("other"), &sig(3)).unwrap();

        let rows = catalog.get_by_md5("same").unwrap();
        let mut ids: Vec<_> = rows.iter().map(|r| r.post_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["post-1", "post-2"]);
    }

    #[test]
    fn test_remove_idempotent() {
        let catalog = Catalog::open("").unwrap();
        catalog.upsert("post-1", None, &sig(1)).unwrap();

        catalog.remove("post-1").unwrap();
        catalog.remove("post-1").unwrap();
        assert!(catalog.get("post-1").unwrap().is_none());
    }

    #[test]
    fn test_reopen_persists_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images.db");
        let path = path.to_str().unwrap();

        {
            let catalog = Catalog::open(path).unwrap();
            catalog.upsert("post-1", Some("abc"), &sig(7)).unwrap();
        }

        let catalog = Catalog::open(path).unwrap();
        let row = catalog.get("post-1").unwrap().unwrap();
        assert_eq!(row.signature, sig(7));
        assert_eq!(row.signature.avglf, sig(7).avglf);
    }
}
