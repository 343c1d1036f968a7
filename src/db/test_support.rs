use tempfile::TempDir;

use super::Database;

/// Open a fresh database in a temporary directory. The `TempDir` must be
/// kept alive for the duration of the test.
pub(crate) fn open_temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::new(dir.path().join("rackscan-test.sqlite3")).expect("open test database");
    (dir, db)
}
