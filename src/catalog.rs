//! Catalog Module
//!
//! Read-only queries over a Calibre `metadata.db`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::models::{Book, BookSearchParams, LibraryStats};

// == Catalog ==
/// Handle on a Calibre library database.
///
/// Each query opens its own read-only connection on the blocking pool, so
/// the handle is cheap to clone and never holds the file open between
/// requests.
#[derive(Debug, Clone)]
pub struct Catalog {
    db_path: Arc<PathBuf>,
}

impl Catalog {
    /// Binds to the database at `db_path`, which must already exist.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(CacheError::Catalog(format!(
                "Calibre database not found at {}",
                db_path.display()
            )));
        }

        // Fail at startup, not on the first request, if it is not SQLite.
        connect(&db_path)?.query_row("SELECT COUNT(*) FROM books", [], |row| {
            row.get::<_, i64>(0)
        })?;

        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    /// Counts books, authors and publishers.
    pub async fn statistics(&self) -> Result<LibraryStats> {
        self.run(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM books),
                    (SELECT COUNT(*) FROM authors),
                    (SELECT COUNT(*) FROM publishers)",
                [],
                |row| {
                    Ok(LibraryStats {
                        total_books: row.get(0)?,
                        total_authors: row.get(1)?,
                        total_publishers: row.get(2)?,
                        last_updated: chrono::Utc::now(),
                    })
                },
            )?;
            debug!("Catalog statistics: {:?}", stats);
            Ok(stats)
        })
        .await
    }

    /// Books whose title and author contain the given fragments.
    ///
    /// One row per book/author pair, ordered by book id.
    pub async fn search_books(&self, params: BookSearchParams) -> Result<Vec<Book>> {
        self.run(move |conn| {
            let title = params.title.as_deref().map(like_pattern);
            let author = params.author.as_deref().map(like_pattern);

            let mut stmt = conn.prepare(
                "SELECT books.id, books.title, authors.name
                 FROM books
                 JOIN books_authors_link ON books.id = books_authors_link.book
                 JOIN authors ON books_authors_link.author = authors.id
                 WHERE (?1 IS NULL OR books.title LIKE ?1 ESCAPE '\\')
                   AND (?2 IS NULL OR authors.name LIKE ?2 ESCAPE '\\')
                 ORDER BY books.id, authors.id
                 LIMIT ?3",
            )?;

            let books = stmt
                .query_map(params![title, author, params.limit], |row| {
                    Ok(Book {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        author: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            debug!("Catalog search returned {} books", books.len());
            Ok(books)
        })
        .await
    }

    async fn run<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let conn = connect(&db_path)?;
            query(&conn)
        })
        .await
        .map_err(|e| CacheError::Internal(format!("catalog query task failed: {}", e)))?
    }
}

fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// `%fragment%`, with LIKE wildcards in the fragment matched literally.
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use rusqlite::Connection;

    /// Writes a minimal Calibre-shaped library to `path`.
    pub fn write_library(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT NOT NULL);
             CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE publishers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE books_authors_link (id INTEGER PRIMARY KEY, book INTEGER, author INTEGER);
             INSERT INTO books VALUES (1, 'Dune'), (2, 'Dune Messiah'), (3, 'Foundation'), (4, '100% Bad');
             INSERT INTO authors VALUES (1, 'Frank Herbert'), (2, 'Isaac Asimov');
             INSERT INTO publishers VALUES (1, 'Chilton'), (2, 'Gnome Press'), (3, 'Ace');
             INSERT INTO books_authors_link (book, author) VALUES (1, 1), (2, 1), (3, 2), (4, 2);",
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.db");
        fixtures::write_library(&path);
        let catalog = Catalog::open(&path).unwrap();
        (dir, catalog)
    }

    fn search(title: Option<&str>, author: Option<&str>, limit: u32) -> BookSearchParams {
        BookSearchParams {
            title: title.map(String::from),
            author: author.map(String::from),
            limit,
        }
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        let result = Catalog::open(dir.path().join("metadata.db"));
        assert!(matches!(result, Err(CacheError::Catalog(_))));
    }

    #[test]
    fn test_open_non_calibre_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.db");
        std::fs::write(&path, "plain text").unwrap();
        assert!(matches!(Catalog::open(&path), Err(CacheError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_statistics() {
        let (_dir, catalog) = catalog();
        let stats = catalog.statistics().await.unwrap();

        assert_eq!(stats.total_books, 4);
        assert_eq!(stats.total_authors, 2);
        assert_eq!(stats.total_publishers, 3);
    }

    #[tokio::test]
    async fn test_search_by_title() {
        let (_dir, catalog) = catalog();
        let books = catalog
            .search_books(search(Some("dune"), None, 100))
            .await
            .unwrap();

        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dune", "Dune Messiah"]);
        assert!(books.iter().all(|b| b.author == "Frank Herbert"));
    }

    #[tokio::test]
    async fn test_search_by_author_and_limit() {
        let (_dir, catalog) = catalog();

        let books = catalog
            .search_books(search(None, Some("Asimov"), 1))
            .await
            .unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Foundation");
    }

    #[tokio::test]
    async fn test_search_without_filters_returns_all() {
        let (_dir, catalog) = catalog();
        let books = catalog.search_books(search(None, None, 100)).await.unwrap();
        assert_eq!(books.len(), 4);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let (_dir, catalog) = catalog();

        let books = catalog
            .search_books(search(Some("100%"), None, 100))
            .await
            .unwrap();
        assert_eq!(books.len(), 1);

        let none = catalog
            .search_books(search(None, Some("_"), 100))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_like_pattern_escaping() {
        assert_eq!(like_pattern("Dune"), "%Dune%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
