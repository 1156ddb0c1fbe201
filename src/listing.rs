// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 目录列表模块
//!
//! 枚举目录的直接子项，过滤忽略列表，查询账本得到每一项的访问标记并排序。
//!
//! 排序规则：根目录按修改时间从新到旧（"最近动态"视图），其余目录按名称升序。

use std::{
    fs,
    path::Path,
    sync::Arc,
    time::SystemTime,
};

use chrono::{DateTime, Local};
use log::{debug, warn};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{
    exception::Exception,
    param::{NOT_VISITED_MARK, ROOT_KEY, VISITED_MARK},
    resolver::{child_key, IgnoreSet},
    store::{is_valid_timestamp, VisitStore},
};

/// 路径段转义字符集：除保留字符外，`/` 也会被转义为 `%2F`
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 转义子项的账本键，作为链接目标
pub fn escape_href(key: &str) -> String {
    utf8_percent_encode(key, PATH_SEGMENT).to_string()
}

/// 访问标记
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marker {
    Visited,
    NotVisited,
}

impl Marker {
    /// 由账本原始值推导标记：只有合法时间戳才算访问过
    pub fn from_raw(raw: &[u8]) -> Self {
        if is_valid_timestamp(raw) {
            Marker::Visited
        } else {
            Marker::NotVisited
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Marker::Visited => VISITED_MARK,
            Marker::NotVisited => NOT_VISITED_MARK,
        }
    }

    pub fn is_visited(&self) -> bool {
        *self == Marker::Visited
    }
}

#[derive(Debug, Clone)]
pub struct ListingEntry {
    name: String,
    href: String,
    modified: SystemTime,
    is_dir: bool,
    marker: Marker,
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }

    pub fn formatted_time(&self) -> String {
        let local_time: DateTime<Local> = self.modified.into();
        local_time.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let local_time: DateTime<Local> = self.modified.into();
        serde_json::json!({
            "name": self.name,
            "href": self.href,
            "type": if self.is_dir { "dir" } else { "file" },
            "date": local_time.to_rfc3339(),
            "visited": self.marker.is_visited(),
            "mark": self.marker.glyph(),
        })
    }
}

pub struct ListingBuilder {
    store: Arc<dyn VisitStore>,
    ignore: Arc<IgnoreSet>,
}

impl ListingBuilder {
    pub fn new(store: Arc<dyn VisitStore>, ignore: Arc<IgnoreSet>) -> Self {
        Self { store, ignore }
    }

    /// 生成目录 `dir` 的列表，`key` 为该目录的账本键。
    pub fn build(&self, dir: &Path, key: &str) -> Result<Vec<ListingEntry>, Exception> {
        let mut entries = Vec::new();
        for item in fs::read_dir(dir)? {
            let item = match item {
                Ok(i) => i,
                Err(e) => {
                    warn!("读取目录 {} 的子项失败：{}", dir.display(), e);
                    continue;
                }
            };
            let name = item.file_name().to_string_lossy().into_owned();
            let entry_key = child_key(key, &name);
            if self.ignore.is_ignored(&entry_key) {
                debug!("跳过被忽略的子项：{}", entry_key);
                continue;
            }
            // 跟随符号链接，与文件服务时的判定保持一致
            let metadata = match fs::metadata(item.path()) {
                Ok(m) => m,
                Err(e) => {
                    warn!("无法获取 {} 的元数据：{}", item.path().display(), e);
                    continue;
                }
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let marker = Marker::from_raw(&self.store.lookup(&entry_key));
            entries.push(ListingEntry {
                href: escape_href(&entry_key),
                name,
                modified,
                is_dir: metadata.is_dir(),
                marker,
            });
        }
        sort_entries(&mut entries, key == ROOT_KEY);
        Ok(entries)
    }
}

fn sort_entries(entries: &mut [ListingEntry], is_root: bool) {
    if is_root {
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    } else {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(name: &str, secs: u64) -> ListingEntry {
        ListingEntry {
            name: name.to_string(),
            href: escape_href(name),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            is_dir: false,
            marker: Marker::NotVisited,
        }
    }

    #[test]
    fn test_escape_href() {
        assert_eq!(escape_href("file1.txt"), "file1.txt");
        assert_eq!(escape_href("sub/file1.txt"), "sub%2Ffile1.txt");
        assert_eq!(escape_href("my movie.mkv"), "my%20movie.mkv");
        assert_eq!(escape_href("100%?#"), "100%25%3F%23");
        assert_eq!(escape_href("日记.txt"), "%E6%97%A5%E8%AE%B0.txt");
    }

    #[test]
    fn test_marker_from_raw() {
        assert_eq!(Marker::from_raw(b""), Marker::NotVisited);
        assert_eq!(Marker::from_raw(b"garbage"), Marker::NotVisited);
        assert_eq!(
            Marker::from_raw(b"2024-07-30T08:22:42+03:00"),
            Marker::Visited
        );
        assert_eq!(Marker::Visited.glyph(), "✓");
        assert_eq!(Marker::NotVisited.glyph(), "✕");
    }

    #[test]
    fn test_sort_root_by_mtime_desc() {
        let mut entries = vec![entry("a", 10), entry("b", 30), entry("c", 20)];
        sort_entries(&mut entries, true);
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_root_ties_by_name() {
        let mut entries = vec![entry("b", 10), entry("a", 10)];
        sort_entries(&mut entries, true);
        assert_eq!(entries[0].name(), "a");
    }

    #[test]
    fn test_sort_subdir_by_name() {
        let mut entries = vec![entry("c", 10), entry("a", 30), entry("b", 20)];
        sort_entries(&mut entries, false);
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_entry_json() {
        let json = entry("a b.txt", 0).to_json();
        assert_eq!(json["name"], "a b.txt");
        assert_eq!(json["href"], "a%20b.txt");
        assert_eq!(json["type"], "file");
        assert_eq!(json["visited"], false);
        assert_eq!(json["mark"], "✕");
    }
}
