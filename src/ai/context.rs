//! File context ingestion
//!
//! Turns the user's file set into one text blob for the prompt. Each file
//! gets a `File: <name>` header followed by its content; relational files are
//! dumped table by table. A file that cannot be read is logged and skipped.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::IngestError;

/// How a file's content is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Database,
    Text,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("db" | "sqlite" | "sqlite3") => FileKind::Database,
            Some("txt") => FileKind::Text,
            _ => FileKind::Other,
        }
    }
}

/// Display name used in the `File:` header
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The current file set and the blob derived from it.
///
/// Every mutation of the file set marks the blob dirty; the blob is rebuilt
/// lazily the next time it is asked for.
#[derive(Debug, Default)]
pub struct FileContext {
    files: Vec<PathBuf>,
    ingested: Vec<PathBuf>,
    contents: String,
    dirty: bool,
    ingestions: u64,
}

impl FileContext {
    pub fn new(files: Vec<PathBuf>) -> Self {
        let dirty = !files.is_empty();
        Self {
            files,
            dirty,
            ..Self::default()
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Files the current blob was built from
    pub fn ingested_files(&self) -> &[PathBuf] {
        &self.ingested
    }

    pub fn set_files(&mut self, files: Vec<PathBuf>) {
        self.files = files;
        self.dirty = true;
    }

    pub fn add_files(&mut self, files: impl IntoIterator<Item = PathBuf>) {
        self.files.extend(files);
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.dirty = true;
    }

    /// Force the next read to re-ingest, e.g. after files were rewritten
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How many times the blob has been rebuilt
    pub fn ingestions(&self) -> u64 {
        self.ingestions
    }

    /// Rebuild the blob if the file set changed; returns the blob length
    pub fn refresh(&mut self) -> usize {
        if self.dirty {
            self.contents = ingest_files(&self.files);
            self.ingested = self.files.clone();
            self.ingestions += 1;
            self.dirty = false;
            debug!(
                files = self.files.len(),
                bytes = self.contents.len(),
                "File context rebuilt"
            );
        }
        self.contents.len()
    }

    /// The blob, rebuilt first if stale
    pub fn contents(&mut self) -> &str {
        self.refresh();
        &self.contents
    }

    /// The blob as last built, without refreshing
    pub fn cached_contents(&self) -> &str {
        &self.contents
    }
}

/// Concatenate every file in order under a `File: <name>` header
pub fn ingest_files(files: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in files {
        out.push_str("File: ");
        out.push_str(&file_name(path));
        out.push('\n');

        let extracted = match FileKind::from_path(path) {
            FileKind::Database => read_database(path),
            FileKind::Text => read_text(path),
            FileKind::Other => read_lines(path),
        };

        match extracted {
            Ok(content) => out.push_str(&content),
            Err(e) => warn!("Skipping file: {}", e),
        }
    }
    out
}

/// Whole-file read; invalid UTF-8 is replaced, not rejected
fn read_text(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut content = String::from_utf8_lossy(&bytes).into_owned();
    content.push('\n');
    Ok(content)
}

/// Line-by-line read that tolerates invalid UTF-8
fn read_lines(path: &Path) -> Result<String, IngestError> {
    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut out = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(io_err)?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        out.push_str(line.trim_end_matches(['\n', '\r']));
        out.push('\n');
    }

    Ok(out)
}

/// Dump every user table as `{Table: name\n<columns>\n<rows>...}`
fn read_database(path: &Path) -> Result<String, IngestError> {
    let db_err = |source| IngestError::Database {
        path: path.to_path_buf(),
        source,
    };

    // Connection is dropped (and closed) on every return path
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(db_err)?;
    let tables = table_names(&conn).map_err(db_err)?;
    Ok(dump_tables(&conn, &tables))
}

/// `{Table: ...}` dump; a table that fails to read keeps its header and loses its rows
fn dump_tables(conn: &Connection, tables: &[String]) -> String {
    let mut out = String::from("{");
    for table in tables {
        out.push_str("Table: ");
        out.push_str(table);
        out.push('\n');
        match dump_table(conn, table) {
            Ok(dump) => out.push_str(&dump),
            Err(e) => warn!(table = %table, "Skipping table: {}", e),
        }
    }
    out.push_str("}\n");
    out
}

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn dump_table(conn: &Connection, table: &str) -> rusqlite::Result<String> {
    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql)?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut out = columns.join(" ");
    out.push('\n');

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(value_to_string))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push_str(&values.join(" "));
        out.push('\n');
    }

    Ok(out)
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "null".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE t1 (id INTEGER, name TEXT);
             INSERT INTO t1 VALUES (1, 'Ada');
             INSERT INTO t1 VALUES (2, NULL);",
        )
        .unwrap();
    }

    #[test]
    fn test_file_kind_detection() {
        assert_eq!(FileKind::from_path(Path::new("db/acu.db")), FileKind::Database);
        assert_eq!(FileKind::from_path(Path::new("notes.TXT")), FileKind::Text);
        assert_eq!(FileKind::from_path(Path::new("main.rs")), FileKind::Other);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), FileKind::Other);
    }

    #[test]
    fn test_text_and_database_blob() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("a.txt");
        let db = dir.path().join("b.db");
        fs::write(&text, "Student: Jane Doe").unwrap();
        make_db(&db);

        let blob = ingest_files(&[text, db]);
        assert_eq!(
            blob,
            "File: a.txt\nStudent: Jane Doe\nFile: b.db\n{Table: t1\nid name\n1 Ada\n2 null\n}\n"
        );
    }

    #[test]
    fn test_text_with_invalid_utf8_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, b"Caf\xe9 menu: soup").unwrap();

        let blob = ingest_files(&[notes]);
        assert_eq!(blob, "File: notes.txt\nCaf\u{FFFD} menu: soup\n");
    }

    #[test]
    fn test_failing_table_does_not_drop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("b.db");
        make_db(&db);
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE t2 (grade REAL); INSERT INTO t2 VALUES (4.0);")
            .unwrap();

        let tables = ["t1", "gone", "t2"].map(String::from);
        assert_eq!(
            dump_tables(&conn, &tables),
            "{Table: t1\nid name\n1 Ada\n2 null\nTable: gone\nTable: t2\ngrade\n4.0\n}\n"
        );
    }

    #[test]
    fn test_real_values_keep_decimal_point() {
        assert_eq!(value_to_string(ValueRef::Real(1.0)), "1.0");
        assert_eq!(value_to_string(ValueRef::Real(3.25)), "3.25");
    }

    #[test]
    fn test_other_files_are_read_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.rs");
        fs::write(&src, "fn main() {\r\n    run();\r\n}").unwrap();

        let blob = ingest_files(&[src]);
        assert_eq!(blob, "File: main.rs\nfn main() {\n    run();\n}\n");
    }

    #[test]
    fn test_failing_file_keeps_order_and_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("missing.txt");
        let c = dir.path().join("c.txt");
        fs::write(&a, "alpha").unwrap();
        fs::write(&c, "gamma").unwrap();

        let blob = ingest_files(&[a, b, c]);
        assert_eq!(blob, "File: a.txt\nalpha\nFile: missing.txt\nFile: c.txt\ngamma\n");
    }

    #[test]
    fn test_corrupt_database_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("broken.db");
        fs::write(&db, "this is not a sqlite database ".repeat(64)).unwrap();

        let blob = ingest_files(&[db]);
        assert_eq!(blob, "File: broken.db\n");
    }

    #[test]
    fn test_missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("absent.db");

        let blob = ingest_files(&[db.clone()]);
        assert_eq!(blob, "File: absent.db\n");
        assert!(!db.exists());
    }

    #[test]
    fn test_empty_file_set() {
        assert_eq!(ingest_files(&[]), "");
        let mut context = FileContext::default();
        assert_eq!(context.refresh(), 0);
        assert_eq!(context.ingestions(), 0);
    }

    #[test]
    fn test_recompute_only_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "first").unwrap();

        let mut context = FileContext::new(vec![a.clone()]);
        let first = context.contents().to_string();
        assert_eq!(context.ingestions(), 1);

        // Same file set, no mutation: cached blob, no re-read
        fs::write(&a, "second").unwrap();
        assert_eq!(context.contents(), first);
        assert_eq!(context.ingestions(), 1);

        // Replacing with an identical set still re-reads
        context.set_files(vec![a.clone()]);
        assert!(context.is_dirty());
        assert_eq!(context.contents(), "File: a.txt\nsecond\n");
        assert_eq!(context.ingestions(), 2);
    }

    #[test]
    fn test_add_and_clear_mark_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "A").unwrap();
        fs::write(&b, "B").unwrap();

        let mut context = FileContext::new(vec![a]);
        context.refresh();
        context.add_files(vec![b]);
        assert_eq!(context.contents(), "File: a.txt\nA\nFile: b.txt\nB\n");
        assert_eq!(context.ingested_files().len(), 2);

        context.clear();
        assert_eq!(context.contents(), "");
        assert!(context.ingested_files().is_empty());
    }
}
