//! Batch submission semantics of the reference engine.

use proptest::prelude::*;
use rockbatch_codec::WriteBatch;
use rockbatch_core::{
    BatchSubmitter, Comparator, Database, Options, ReadOptions, SequenceNumber, WriteOptions,
};
use rockbatch_storage::InMemoryBackend;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

fn create_db() -> Database {
    Database::open_in_memory(Options::default()).unwrap()
}

fn scan(db: &Database, options: &ReadOptions) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut iter = db.iter(options).unwrap();
    let mut out = Vec::new();
    iter.seek_to_first();
    while iter.valid() {
        out.push((iter.key().unwrap().to_vec(), iter.value().unwrap().to_vec()));
        iter.next();
    }
    out
}

#[test]
fn batches_from_threads_get_disjoint_sequences() {
    let db = Arc::new(create_db());
    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let mut firsts = Vec::new();
                for i in 0..25u8 {
                    let mut batch = WriteBatch::new();
                    batch.put(&[t, i], b"x");
                    batch.put(&[t, i, 0], b"y");
                    firsts.push(db.write(&WriteOptions::default(), &mut batch).unwrap());
                }
                firsts
            })
        })
        .collect();

    let mut firsts: Vec<SequenceNumber> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    firsts.sort();
    firsts.dedup();

    assert_eq!(firsts.len(), 100);
    // Each batch consumed two sequence numbers.
    for pair in firsts.windows(2) {
        assert_eq!(pair[1].as_u64() - pair[0].as_u64(), 2);
    }
    assert_eq!(db.latest_sequence(), SequenceNumber(200));
}

#[test]
fn readers_see_whole_batches() {
    let db = Arc::new(create_db());
    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for round in 0..200u32 {
                let value = round.to_le_bytes();
                let mut batch = WriteBatch::new();
                batch.put(b"left", &value);
                batch.put(b"right", &value);
                db.write(&WriteOptions::default(), &mut batch).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let view = scan(&db, &ReadOptions::default());
        if let [(_, left), (_, right)] = view.as_slice() {
            assert_eq!(left, right);
        } else {
            assert!(view.is_empty());
        }
    }
    writer.join().unwrap();
}

#[test]
fn submitter_records_sequence_in_header() {
    fn submit_all(submitter: &impl BatchSubmitter, batches: &mut [WriteBatch]) -> Vec<u64> {
        batches
            .iter_mut()
            .map(|batch| {
                submitter.write(&WriteOptions::default(), batch).unwrap();
                batch.sequence()
            })
            .collect()
    }

    let db = create_db();
    let mut batches = vec![WriteBatch::new(), WriteBatch::new(), WriteBatch::new()];
    batches[0].put(b"a", b"1");
    batches[0].put(b"b", b"1");
    batches[1].delete(b"a");
    batches[2].merge(b"b", b"2");

    assert_eq!(submit_all(&db, &mut batches), vec![1, 3, 4]);
}

#[test]
fn appended_batches_commit_together() {
    let db = create_db();
    let mut first = WriteBatch::new();
    first.put(b"a", b"1");
    let mut second = WriteBatch::new();
    second.put(b"b", b"2");
    second.delete(b"a");
    first.append(&second);

    db.write(&WriteOptions::default(), &mut first).unwrap();
    assert_eq!(scan(&db, &ReadOptions::default()), vec![(b"b".to_vec(), b"2".to_vec())]);
    assert_eq!(db.latest_sequence(), SequenceNumber(3));
}

#[test]
fn custom_comparator_orders_iteration() {
    let options = Options::default().comparator(Comparator::new("test.Reverse", |a: &[u8], b: &[u8]| b.cmp(a)));
    let db = Database::open_in_memory(options).unwrap();
    for key in [&b"a"[..], &b"c"[..], &b"b"[..]] {
        db.put(&WriteOptions::default(), key, b"").unwrap();
    }
    let keys: Vec<Vec<u8>> = scan(&db, &ReadOptions::default()).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
}

#[test]
fn replay_from_existing_backend() {
    // A log written by another process holding one committed batch.
    let mut batch = WriteBatch::new();
    batch.put(b"k", b"v");
    batch.set_sequence(1);
    let payload = batch.into_bytes();
    let mut log = Vec::new();
    log.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    log.extend_from_slice(&rockbatch_core::wal::frame_checksum(&payload).to_le_bytes());
    log.extend_from_slice(&payload);

    let db = Database::open_with_backend(Box::new(InMemoryBackend::with_data(log)), Options::default()).unwrap();
    assert_eq!(db.get(&ReadOptions::default(), b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(db.latest_sequence(), SequenceNumber(1));
}

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..16).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn engine_matches_model(batches in prop::collection::vec(prop::collection::vec(op_strategy(), 0..8), 0..16)) {
        let db = create_db();
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let mut snapshots = Vec::new();

        for ops in &batches {
            let mut batch = WriteBatch::new();
            for op in ops {
                match *op {
                    Op::Put(k, v) => {
                        batch.put(&[k], &[v]);
                        model.insert(vec![k], vec![v]);
                    }
                    Op::Delete(k) => {
                        batch.delete(&[k]);
                        model.remove(&[k][..]);
                    }
                }
            }
            db.write(&WriteOptions::default(), &mut batch).unwrap();
            let expected: Vec<_> = model.clone().into_iter().collect();
            snapshots.push((db.snapshot().unwrap(), expected));
        }

        let latest: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(scan(&db, &ReadOptions::default()), latest);
        for (snapshot, expected) in snapshots {
            let options = ReadOptions::new().snapshot(Some(snapshot));
            prop_assert_eq!(scan(&db, &options), expected);
        }
    }
}
