// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问记录账本
//!
//! 以规范化路径为键、最近一次访问时间为值的持久化有序键值存储。
//!
//! 底层使用 RocksDB，库中只有一个名为 `visits` 的列族（bucket）。
//! 值为 RFC 3339 格式、精确到秒、带本地时区的时间字符串，例如
//! `2026-10-16T14:03:11+08:00`。
//!
//! RocksDB 的多线程模式保证并发读写安全，同一个键以最后一次写入为准；
//! 写入启用同步 WAL，`record` 返回成功时数据已落盘。

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, SecondsFormat};
use log::{error, info};
use rocksdb::{
    BoundColumnFamily, DBWithThreadMode, IteratorMode, MultiThreaded, Options, WriteOptions,
};

use crate::{exception::Exception, param::STORE_BUCKET};

/// 访问记录账本的能力接口
pub trait VisitStore: Send + Sync {
    /// 以当前时间覆盖写入 `key` 的记录
    fn record(&self, key: &str) -> Result<(), Exception>;

    /// 读取 `key` 的原始值；不存在或读取失败时返回空值
    fn lookup(&self, key: &str) -> Vec<u8>;

    /// 按键的字典序返回全部记录，仅用于运维诊断
    fn dump(&self) -> Result<Vec<(String, String)>, Exception>;
}

/// 当前时间的账本格式字符串
pub fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// 判断账本中的原始值是否为合法时间戳
pub fn is_valid_timestamp(raw: &[u8]) -> bool {
    match std::str::from_utf8(raw) {
        Ok(s) => DateTime::parse_from_rfc3339(s).is_ok(),
        Err(_) => false,
    }
}

/// 基于 RocksDB 的账本实现
pub struct Ledger {
    db: DBWithThreadMode<MultiThreaded>,
    write_opts: WriteOptions,
}

impl Ledger {
    /// 打开（必要时创建）位于 `path` 的账本目录及其列族。
    ///
    /// 失败时返回错误，调用方应当终止启动。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Exception> {
        let path = path.as_ref();
        info!("打开访问记录账本：{}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DBWithThreadMode::<MultiThreaded>::open_cf(&opts, path, [STORE_BUCKET])?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);

        let ledger = Self { db, write_opts };
        // 列族必须在第一次读写之前存在
        ledger.bucket()?;
        Ok(ledger)
    }

    fn bucket(&self) -> Result<Arc<BoundColumnFamily<'_>>, Exception> {
        self.db
            .cf_handle(STORE_BUCKET)
            .ok_or_else(|| Exception::Store(format!("column family {} missing", STORE_BUCKET)))
    }
}

impl VisitStore for Ledger {
    fn record(&self, key: &str) -> Result<(), Exception> {
        let bucket = self.bucket()?;
        self.db
            .put_cf_opt(&bucket, key.as_bytes(), timestamp().as_bytes(), &self.write_opts)?;
        Ok(())
    }

    fn lookup(&self, key: &str) -> Vec<u8> {
        let bucket = match self.bucket() {
            Ok(b) => b,
            Err(e) => {
                error!("读取账本失败：{}", e);
                return Vec::new();
            }
        };
        match self.db.get_cf(&bucket, key.as_bytes()) {
            Ok(Some(value)) => value,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("读取账本键 {} 失败：{}", key, e);
                Vec::new()
            }
        }
    }

    fn dump(&self) -> Result<Vec<(String, String)>, Exception> {
        let bucket = self.bucket()?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&bucket, IteratorMode::Start) {
            let (key, value) = item?;
            records.push((
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            ));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_valid() {
        assert!(is_valid_timestamp(timestamp().as_bytes()));
    }

    #[test]
    fn test_invalid_timestamps() {
        assert!(!is_valid_timestamp(b""));
        assert!(!is_valid_timestamp(b"yesterday"));
        assert!(!is_valid_timestamp(b"2026-10-16"));
        assert!(!is_valid_timestamp(&[0xff, 0xfe]));
        assert!(is_valid_timestamp(b"2024-07-30T08:22:42+03:00"));
        assert!(is_valid_timestamp(b"2024-07-30T08:22:42Z"));
    }

    #[test]
    fn test_record_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("visits.db")).unwrap();

        assert!(ledger.lookup("sub/file1.txt").is_empty());
        ledger.record("sub/file1.txt").unwrap();
        assert!(is_valid_timestamp(&ledger.lookup("sub/file1.txt")));
    }

    #[test]
    fn test_record_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("visits.db")).unwrap();

        ledger.record(".").unwrap();
        ledger.record(".").unwrap();
        let records = ledger.dump().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, ".");
    }

    #[test]
    fn test_dump_is_key_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("visits.db")).unwrap();

        for key in ["zeta.txt", "alpha.txt", "sub/mid.txt", "."] {
            ledger.record(key).unwrap();
        }
        let keys: Vec<String> = ledger.dump().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![".", "alpha.txt", "sub/mid.txt", "zeta.txt"]);
    }

    #[test]
    fn test_concurrent_record_and_lookup() {
        const THREADS: usize = 8;
        const KEYS: usize = 25;

        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path().join("visits.db")).unwrap());

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for k in 0..KEYS {
                        ledger.record(&format!("t{}/k{}.txt", t, k)).unwrap();
                        ledger.record("shared.txt").unwrap();
                        // 读取其他线程的键：要么还没有记录，要么是完整的时间戳
                        let other = format!("t{}/k{}.txt", (t + 1) % THREADS, k);
                        let value = ledger.lookup(&other);
                        assert!(value.is_empty() || is_valid_timestamp(&value), "{}", other);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = ledger.dump().unwrap();
        assert_eq!(records.len(), THREADS * KEYS + 1);
        let mut keys: Vec<&str> = records.iter().map(|(k, _)| k.as_str()).collect();
        keys.dedup();
        assert_eq!(keys.len(), records.len());
        assert!(keys.contains(&"shared.txt"));
        for t in 0..THREADS {
            for k in 0..KEYS {
                let key = format!("t{}/k{}.txt", t, k);
                assert!(keys.contains(&key.as_str()), "{}", key);
            }
        }
        for (key, value) in &records {
            assert!(is_valid_timestamp(value.as_bytes()), "{} => {}", key, value);
        }
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.db");
        {
            let ledger = Ledger::open(&path).unwrap();
            ledger.record("movies/a.mkv").unwrap();
        }
        let ledger = Ledger::open(&path).unwrap();
        assert!(is_valid_timestamp(&ledger.lookup("movies/a.mkv")));
    }
}
