//! Reopen and crash-recovery tests against on-disk databases.

use rockbatch_codec::WriteBatch;
use rockbatch_core::{Comparator, CoreError, Database, Options, ReadOptions, SequenceNumber, WriteOptions};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn create_options() -> Options {
    Options::new().create_if_missing(true)
}

fn read(db: &Database, key: &[u8]) -> Option<Vec<u8>> {
    db.get(&ReadOptions::default(), key).unwrap()
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path.join("wal.log")).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn wal_len(path: &Path) -> u64 {
    std::fs::metadata(path.join("wal.log")).unwrap().len()
}

#[test]
fn committed_batches_survive_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("db");

    {
        let db = Database::open(&path, create_options()).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        db.write(&WriteOptions::new().sync(true), &mut batch).unwrap();
        db.delete(&WriteOptions::default(), b"a").unwrap();
        db.close().unwrap();
    }

    let db = Database::open(&path, Options::default()).unwrap();
    assert_eq!(read(&db, b"a"), None);
    assert_eq!(read(&db, b"b"), Some(b"2".to_vec()));
    assert_eq!(db.latest_sequence(), SequenceNumber(3));

    // Sequence numbers keep increasing across the restart.
    assert_eq!(db.put(&WriteOptions::default(), b"c", b"3").unwrap(), SequenceNumber(4));
}

#[test]
fn recovery_without_close() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("crash");

    {
        let db = Database::open(&path, create_options()).unwrap();
        db.put(&WriteOptions::default(), b"k", b"v").unwrap();
        // Dropped without an explicit close.
    }

    let db = Database::open(&path, Options::default()).unwrap();
    assert_eq!(read(&db, b"k"), Some(b"v".to_vec()));
}

#[test]
fn unlogged_writes_are_lost_on_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("nowal");

    {
        let db = Database::open(&path, create_options()).unwrap();
        db.put(&WriteOptions::default(), b"logged", b"1").unwrap();
        db.put(&WriteOptions::new().disable_wal(true), b"unlogged", b"2").unwrap();
    }

    let db = Database::open(&path, Options::default()).unwrap();
    assert_eq!(read(&db, b"logged"), Some(b"1".to_vec()));
    assert_eq!(read(&db, b"unlogged"), None);
}

#[test]
fn torn_tail_is_discarded() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("torn");

    {
        let db = Database::open(&path, create_options()).unwrap();
        db.put(&WriteOptions::default(), b"kept", b"yes").unwrap();
    }
    let good = wal_len(&path);
    // A frame header promising more bytes than were written.
    append_raw(&path, &[64, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3]);

    {
        let db = Database::open(&path, Options::default()).unwrap();
        assert_eq!(read(&db, b"kept"), Some(b"yes".to_vec()));
        assert_eq!(db.latest_sequence(), SequenceNumber(1));
        db.put(&WriteOptions::default(), b"after", b"ok").unwrap();
    }
    assert!(wal_len(&path) > good);

    let db = Database::open(&path, Options::default()).unwrap();
    assert_eq!(read(&db, b"after"), Some(b"ok".to_vec()));
    assert_eq!(db.latest_sequence(), SequenceNumber(2));
}

#[test]
fn corrupted_frame_is_fatal_when_paranoid() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("corrupt");

    {
        let db = Database::open(&path, create_options()).unwrap();
        db.put(&WriteOptions::default(), b"first", b"1").unwrap();
    }
    // Complete frame whose checksum does not match its payload.
    let mut bad = WriteBatch::new();
    bad.put(b"second", b"2");
    let payload = bad.into_bytes();
    let mut frame = Vec::new();
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    frame.extend_from_slice(&payload);
    append_raw(&path, &frame);

    let result = Database::open(&path, Options::default());
    assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));

    let lenient = Database::open(&path, Options::default().paranoid_checks(false)).unwrap();
    assert_eq!(read(&lenient, b"first"), Some(b"1".to_vec()));
    assert_eq!(read(&lenient, b"second"), None);
}

#[test]
fn missing_database_requires_create_if_missing() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("absent");

    let result = Database::open(&path, Options::default());
    assert!(matches!(result, Err(CoreError::InvalidDatabase { .. })));

    // An existing but empty directory is not a database either.
    std::fs::create_dir_all(&path).unwrap();
    let result = Database::open(&path, Options::default());
    assert!(matches!(result, Err(CoreError::InvalidDatabase { .. })));
}

#[test]
fn error_if_exists_rejects_existing_database() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("exists");
    drop(Database::open(&path, create_options()).unwrap());

    let result = Database::open(&path, create_options().error_if_exists(true));
    assert!(matches!(result, Err(CoreError::InvalidDatabase { .. })));
}

#[test]
fn second_open_is_locked() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("locked");
    let _db = Database::open(&path, create_options()).unwrap();

    let result = Database::open(&path, Options::default());
    assert!(matches!(result, Err(CoreError::DatabaseLocked)));
}

#[test]
fn comparator_must_match_on_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("cmp");
    drop(Database::open(&path, create_options()).unwrap());

    let reverse = Comparator::new("test.Reverse", |a: &[u8], b: &[u8]| b.cmp(a));
    let result = Database::open(&path, Options::default().comparator(reverse));
    assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));

    let db = Database::open(&path, Options::default().comparator(Comparator::bytewise())).unwrap();
    assert_eq!(db.path(), Some(path.as_path()));
}
