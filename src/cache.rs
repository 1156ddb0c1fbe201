// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 小文件内容的 LRU 缓存，以绝对路径为键，修改时间变化即失效。
///
/// 目录列表含有访问标记，每次都要重新生成，因此从不进入缓存。
pub struct FileCache {
    cache: LruCache<PathBuf, CacheEntry>,
}

impl FileCache {
    // 容量为0时按1处理
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    pub fn insert(&mut self, path: &Path, content: Bytes, modified_time: SystemTime) {
        self.cache.put(
            path.to_path_buf(),
            CacheEntry {
                content,
                modified_time,
            },
        );
    }

    // 修改时间不一致时视为未命中并移除旧条目
    pub fn lookup(&mut self, path: &Path, current_modified_time: SystemTime) -> Option<Bytes> {
        let fresh = match self.cache.get(path) {
            Some(entry) => entry.modified_time == current_modified_time,
            None => return None,
        };
        if fresh {
            self.cache.get(path).map(|entry| entry.content.clone())
        } else {
            self.cache.pop(path);
            None
        }
    }

    pub fn should_cache(file_size: u64, threshold: u64) -> bool {
        file_size <= threshold
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cache_creation() {
        let cache = FileCache::from_capacity(10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_becomes_one() {
        let mut cache = FileCache::from_capacity(0);
        let time = SystemTime::now();
        cache.insert(Path::new("/a"), Bytes::from("a"), time);
        cache.insert(Path::new("/b"), Bytes::from("b"), time);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(Path::new("/b"), time).is_some());
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut cache = FileCache::from_capacity(3);
        let time = SystemTime::now();
        let path = Path::new("/srv/file1.txt");

        cache.insert(path, Bytes::from("test content"), time);
        assert_eq!(cache.lookup(path, time), Some(Bytes::from("test content")));
    }

    #[test]
    fn test_stale_entry_is_evicted() {
        let mut cache = FileCache::from_capacity(3);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);
        let path = Path::new("/srv/file1.txt");

        cache.insert(path, Bytes::from("old"), time1);
        assert!(cache.lookup(path, time2).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = FileCache::from_capacity(2);
        let time = SystemTime::now();

        cache.insert(Path::new("/a"), Bytes::from("a"), time);
        cache.insert(Path::new("/b"), Bytes::from("b"), time);
        cache.lookup(Path::new("/a"), time);
        cache.insert(Path::new("/c"), Bytes::from("c"), time);

        assert!(cache.lookup(Path::new("/b"), time).is_none());
        assert!(cache.lookup(Path::new("/a"), time).is_some());
        assert!(cache.lookup(Path::new("/c"), time).is_some());
    }

    #[test]
    fn test_should_cache() {
        assert!(FileCache::should_cache(100, 100));
        assert!(!FileCache::should_cache(101, 100));
    }
}
