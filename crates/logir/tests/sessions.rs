//! On-disk sessions, backends, and failure handling.

use std::io::Write as _;
use std::path::Path;

use logir::{
    Backend, Config, DecodeError, DictionaryKind, Error, IrFormat, LogRecord, Session, SessionMetadata,
    SessionReader, SharedSession,
};
use tempfile::tempdir;

fn sample() -> Vec<LogRecord> {
    (0..50)
        .map(|i| {
            let message = match i % 3 {
                0 => format!("GET /api/v{} 200 in {}.{} ms", i % 2, i, i % 7),
                1 => format!("user=u{i} path=/home/u{i} id={:x}", i * 37),
                _ => "heartbeat".to_string(),
            };
            LogRecord::new(1_700_000_000_000 + i, message)
        })
        .collect()
}

fn write(config: Config, records: &[LogRecord]) -> logir::SessionSummary {
    let mut session = Session::open(config).unwrap();
    for record in records {
        session.append(record.timestamp, &record.message).unwrap();
    }
    session.close().unwrap()
}

fn file_len(dir: &Path, name: &str) -> u64 {
    std::fs::metadata(dir.join(name)).unwrap().len()
}

#[test]
fn test_disk_round_trip_all_layouts() {
    for backend in [Backend::Buffered, Backend::MemoryMapped] {
        for format in [IrFormat::Columnar, IrFormat::Stream] {
            for compact in [true, false] {
                let dir = tempdir().unwrap();
                let config = Config::persistent(dir.path())
                    .with_backend(backend)
                    .with_format(format)
                    .with_compact_encoding(compact)
                    .with_buffer_size(64 * 1024);
                let records = sample();
                let summary = write(config, &records);
                assert_eq!(summary.records(), 50);

                let reader = SessionReader::open(dir.path()).unwrap();
                assert_eq!(reader.metadata().format, format);
                assert_eq!(reader.read_all().unwrap(), records);
            }
        }
    }
}

#[test]
fn test_columnar_files() {
    let dir = tempdir().unwrap();
    let summary = write(
        Config::persistent(dir.path()),
        &[
            LogRecord::new(1, "user=42 path=/a/b id=ff"),
            LogRecord::new(2, "user=7 path=/a/b id=fe"),
        ],
    );

    assert_eq!(
        std::fs::read(dir.path().join("logtype.dict")).unwrap(),
        b"\x00\x12user=\x11 path=\x12 id=\x12"
    );
    assert_eq!(
        std::fs::read(dir.path().join("variable.dict")).unwrap(),
        b"\x00\x04/a/b\x00\x02ff\x00\x02fe"
    );
    assert_eq!(
        std::fs::read(dir.path().join("logtype.bin")).unwrap(),
        [0u8, 0, 0, 0]
    );
    assert_eq!(file_len(dir.path(), "ts.bin"), 16);
    assert_eq!(file_len(dir.path(), "variable.bin"), 24);
    assert!(!dir.path().join("ir.stream").exists());

    let on_disk: u64 = ["logtype.dict", "variable.dict", "ts.bin", "logtype.bin", "variable.bin"]
        .iter()
        .map(|name| file_len(dir.path(), name))
        .sum();
    assert_eq!(summary.total_bytes(), on_disk);
}

#[test]
fn test_mapped_files_truncated_on_close() {
    let dir = tempdir().unwrap();
    let config = Config::persistent(dir.path())
        .with_backend(Backend::MemoryMapped)
        .with_buffer_size(1024 * 1024);
    let mut session = Session::open(config).unwrap();
    session.append(3, b"disk 4 online").unwrap();
    assert_eq!(file_len(dir.path(), "ts.bin"), 1024 * 1024);

    session.close().unwrap();
    assert_eq!(file_len(dir.path(), "ts.bin"), 8);
    assert_eq!(file_len(dir.path(), "logtype.bin"), 2);
    assert_eq!(file_len(dir.path(), "variable.bin"), 4);
    assert_eq!(file_len(dir.path(), "variable.dict"), 0);
}

#[test]
fn test_mapped_files_truncated_on_drop() {
    let dir = tempdir().unwrap();
    {
        let mut session = Session::open(
            Config::persistent(dir.path())
                .with_backend(Backend::MemoryMapped)
                .with_format(IrFormat::Stream)
                .with_buffer_size(4096),
        )
        .unwrap();
        session.append(1, b"dropped without close").unwrap();
    }

    let stream = std::fs::read(dir.path().join("ir.stream")).unwrap();
    assert!(stream.len() < 4096);
    assert_eq!(stream.last(), Some(&0x00));
    assert_eq!(
        SessionReader::open(dir.path()).unwrap().read_all().unwrap(),
        [LogRecord::new(1, "dropped without close")]
    );
}

#[test]
fn test_exactly_full_stream_closes_cleanly() {
    let dir = tempdir().unwrap();
    // One 44-byte frame for "x" plus the end marker
    let config = Config::persistent(dir.path())
        .with_format(IrFormat::Stream)
        .with_backend(Backend::MemoryMapped)
        .with_buffer_size(45);
    let mut session = Session::open(config).unwrap();
    session.append(1, b"x").unwrap();
    assert!(matches!(session.append(2, b"x"), Err(Error::CapacityExceeded { .. })));

    session.close().unwrap();
    assert_eq!(file_len(dir.path(), "ir.stream"), 45);
    assert_eq!(
        SessionReader::open(dir.path()).unwrap().read_all().unwrap(),
        [LogRecord::new(1, "x")]
    );
}

#[test]
fn test_capacity_exhaustion_poisons_session() {
    let dir = tempdir().unwrap();
    let config = Config::persistent(dir.path())
        .with_backend(Backend::MemoryMapped)
        .with_buffer_size(40);
    let mut session = Session::open(config).unwrap();

    let mut accepted = Vec::new();
    let err = loop {
        let record = LogRecord::new(accepted.len() as i64, format!("tick {}", accepted.len()));
        match session.append(record.timestamp, &record.message) {
            Ok(()) => accepted.push(record),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, Error::CapacityExceeded { .. }));
    assert!(session.is_poisoned());
    assert!(matches!(session.append(0, b"more"), Err(Error::SessionPoisoned)));

    let summary = session.close().unwrap();
    assert_eq!(summary.records(), accepted.len() as u64);
    // Records written before the failure are intact
    assert_eq!(SessionReader::open(dir.path()).unwrap().read_all().unwrap(), accepted);
}

#[test]
fn test_logtype_overflow_drops_only_the_record() {
    let mut session = Session::in_memory(Config::in_memory()).unwrap();
    // Letters g..z only, so no run is hex or numeric
    let name = |mut n: usize| {
        let mut word = String::from("evt ");
        for _ in 0..4 {
            word.push(char::from(b'g' + (n % 20) as u8));
            n /= 20;
        }
        word
    };

    for n in 0..=usize::from(u16::MAX) {
        session.append(n as i64, name(n).as_bytes()).unwrap();
    }
    let before = session.stats();
    let err = session.append(-1, name(65_536).as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        Error::DictionaryOverflow {
            dictionary: DictionaryKind::Logtype,
            id: 65_536,
            max: 65_535,
        }
    ));
    assert!(session.is_open());
    assert_eq!(session.stats().stats, before.stats);
    assert_eq!(session.stats().rejected_records, 1);

    // Known templates still encode
    session.append(-2, name(0).as_bytes()).unwrap();
    let summary = session.close().unwrap();
    assert_eq!(summary.records(), 65_537);

    let reader = SessionReader::from_memory(session.memory_streams().unwrap()).unwrap();
    let last = reader.read_all().unwrap().pop().unwrap();
    assert_eq!(last, LogRecord::new(-2, name(0)));
}

#[test]
fn test_entry_too_long_is_record_fatal() {
    let mut session = Session::in_memory(Config::in_memory()).unwrap();
    let long = "x".repeat(70_000);
    let err = session.append(1, long.as_bytes()).unwrap_err();
    assert!(matches!(
        err,
        Error::EntryTooLong {
            dictionary: DictionaryKind::Logtype,
            len: 70_000
        }
    ));
    session.append(2, b"short").unwrap();
    assert_eq!(session.close().unwrap().records(), 1);
}

#[test]
fn test_shared_session_threads() {
    let dir = tempdir().unwrap();
    let shared = SharedSession::new(Session::open(Config::persistent(dir.path())).unwrap());

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let message = format!("worker={worker} request {i} done in {}.{} ms", i / 10, i % 10);
                    shared.append(worker * 1000 + i, message.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    let summary = shared.close().unwrap();
    assert_eq!(summary.records(), 800);

    let mut records = SessionReader::open(dir.path()).unwrap().read_all().unwrap();
    records.sort_by_key(|record| record.timestamp);
    for (record, (worker, i)) in records.iter().zip((0..8).flat_map(|w| (0..100).map(move |i| (w, i)))) {
        assert_eq!(record.timestamp, worker * 1000 + i);
        assert_eq!(
            record.message_lossy(),
            format!("worker={worker} request {i} done in {}.{} ms", i / 10, i % 10)
        );
    }
}

#[test]
fn test_corrupt_metadata() {
    let dir = tempdir().unwrap();
    write(Config::persistent(dir.path()), &sample());

    let meta = dir.path().join("session.meta");
    let mut frame = std::fs::read(&meta).unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    std::fs::write(&meta, &frame).unwrap();

    let err = SessionReader::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Decode(DecodeError::Corrupt(_))));
}

#[test]
fn test_metadata_describes_session() {
    let dir = tempdir().unwrap();
    write(
        Config::persistent(dir.path())
            .with_compact_encoding(false)
            .with_format(IrFormat::Stream),
        &sample(),
    );
    let metadata = SessionMetadata::read(dir.path().join("session.meta")).unwrap();
    assert!(!metadata.compact_encoding);
    assert_eq!(metadata.format, IrFormat::Stream);
}

#[test]
fn test_reopen_truncates_previous_session() {
    let dir = tempdir().unwrap();
    write(Config::persistent(dir.path()), &sample());
    write(Config::persistent(dir.path()), &[LogRecord::new(9, "fresh")]);

    assert_eq!(
        SessionReader::open(dir.path()).unwrap().read_all().unwrap(),
        [LogRecord::new(9, "fresh")]
    );
}

#[test]
fn test_render_lines() {
    let dir = tempdir().unwrap();
    write(
        Config::persistent(dir.path()),
        &[LogRecord::new(1, "first 1"), LogRecord::new(2, "second 2.5")],
    );

    let mut out = Vec::new();
    for record in SessionReader::open(dir.path()).unwrap().records().unwrap() {
        record
            .unwrap()
            .render_line(&mut out, |ts, w| write!(w, "[{ts}]"))
            .unwrap();
    }
    assert_eq!(out, b"[1] first 1\n[2] second 2.5\n");
}
