use chrono::Local;
use rusqlite::{Connection, OptionalExtension, Result as SqlResult};
use std::path::{Path, PathBuf};
use tracing::info;

use super::data::ImageRecord;

/// The Library manages the SQLite history database.
/// It stores one record per generated image: the prompt, where the file
/// was saved, which provider produced it, and its pixel dimensions.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

const RECORD_COLUMNS: &str =
    "id, prompt, filename, filepath, provider, width, height, created_at";

impl Library {
    /// Create a new Library instance at the default location and
    /// initialize the database.
    pub fn new() -> SqlResult<Self> {
        Self::open(&crate::settings::db_path())
    }

    /// Open (or create) the history database at the given path.
    ///
    /// Background tasks open their own connection through this, since the
    /// main connection stays with the UI state.
    pub fn open(db_path: &Path) -> SqlResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .expect("Failed to create application data directory");
        }

        let conn = Connection::open(db_path)?;

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates the images table and its indexes if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt          TEXT NOT NULL,
                filename        TEXT NOT NULL,
                filepath        TEXT NOT NULL,
                provider        TEXT NOT NULL,
                width           INTEGER,
                height          INTEGER,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_created_at
             ON images(created_at DESC)",
            [],
        )?;

        info!("history database ready at {}", self.db_path.display());

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a count of records in the history
    pub fn image_count(&self) -> SqlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
    }

    /// Insert a record for a newly generated image.
    /// The creation timestamp is assigned here. Returns the new record ID.
    #[allow(clippy::too_many_arguments)]
    pub fn add_image(
        &self,
        prompt: &str,
        filename: &str,
        filepath: &str,
        provider: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> SqlResult<i64> {
        let created_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        self.conn.execute(
            "INSERT INTO images (prompt, filename, filepath, provider, width, height, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![prompt, filename, filepath, provider, width, height, created_at],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Get all records, newest first
    pub fn get_all_images(&self) -> SqlResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM images ORDER BY created_at DESC, id DESC",
            RECORD_COLUMNS
        ))?;

        let record_iter = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }

    /// Get records whose prompt contains the given term, newest first
    pub fn search_images(&self, term: &str) -> SqlResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM images
             WHERE prompt LIKE '%' || ?1 || '%'
             ORDER BY created_at DESC, id DESC",
            RECORD_COLUMNS
        ))?;

        let record_iter = stmt.query_map([term], row_to_record)?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }

    /// Fetch a single record by ID
    pub fn get_image(&self, id: i64) -> SqlResult<Option<ImageRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", RECORD_COLUMNS),
                [id],
                row_to_record,
            )
            .optional()
    }

    /// Delete a record by ID. Returns true if a record was removed.
    /// The backing file is not touched here; callers decide what to do
    /// with it (the two operations are not transactional).
    pub fn delete_image(&self, id: i64) -> SqlResult<bool> {
        let affected = self.conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

fn row_to_record(row: &rusqlite::Row) -> SqlResult<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        prompt: row.get(1)?,
        filename: row.get(2)?,
        filepath: row.get(3)?,
        provider: row.get(4)?,
        width: row.get(5)?,
        height: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_library() -> (TempDir, Library) {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open(&temp_dir.path().join("test.db")).unwrap();
        (temp_dir, library)
    }

    fn add(library: &Library, prompt: &str) -> i64 {
        library
            .add_image(
                prompt,
                "img.png",
                "/tmp/img.png",
                "openai",
                Some(1024),
                Some(1024),
            )
            .unwrap()
    }

    #[test]
    fn test_add_and_count() {
        let (_dir, library) = test_library();
        assert_eq!(library.image_count().unwrap(), 0);

        let id = add(&library, "a red fox");
        assert!(id > 0);
        assert_eq!(library.image_count().unwrap(), 1);
    }

    #[test]
    fn test_record_fields_round_trip() {
        let (_dir, library) = test_library();
        let id = library
            .add_image(
                "misty forest",
                "forest.png",
                "/tmp/forest.png",
                "stability",
                Some(1152),
                Some(896),
            )
            .unwrap();

        let record = library.get_image(id).unwrap().unwrap();
        assert_eq!(record.prompt, "misty forest");
        assert_eq!(record.filename, "forest.png");
        assert_eq!(record.filepath, "/tmp/forest.png");
        assert_eq!(record.provider, "stability");
        assert_eq!(record.width, Some(1152));
        assert_eq!(record.height, Some(896));
        assert!(!record.created_at.is_empty());
    }

    #[test]
    fn test_legacy_record_without_dimensions() {
        let (_dir, library) = test_library();
        let id = library
            .add_image("old one", "old.png", "/tmp/old.png", "openai", None, None)
            .unwrap();

        let record = library.get_image(id).unwrap().unwrap();
        assert_eq!(record.width, None);
        assert_eq!(record.height, None);
        assert_eq!(record.dimensions_label(), "N/A");
    }

    #[test]
    fn test_list_is_newest_first() {
        let (_dir, library) = test_library();
        add(&library, "first");
        add(&library, "second");
        add(&library, "third");

        let records = library.get_all_images().unwrap();
        let prompts: Vec<&str> = records.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_search_by_prompt_substring() {
        let (_dir, library) = test_library();
        add(&library, "a red fox in the snow");
        add(&library, "a blue whale");
        add(&library, "red rocks at sunset");

        let hits = library.search_images("red").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.prompt.contains("red")));

        let misses = library.search_images("dinosaur").unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn test_delete() {
        let (_dir, library) = test_library();
        let id = add(&library, "doomed");

        assert!(library.delete_image(id).unwrap());
        assert_eq!(library.image_count().unwrap(), 0);

        // Deleting again reports that nothing was removed
        assert!(!library.delete_image(id).unwrap());
    }

    #[test]
    fn test_two_connections_same_file() {
        // Background generation tasks open their own connection
        let (dir, library) = test_library();
        let other = Library::open(&dir.path().join("test.db")).unwrap();

        add(&other, "from the background task");
        assert_eq!(library.image_count().unwrap(), 1);
    }
}
