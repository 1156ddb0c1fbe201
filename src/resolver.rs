// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析模块
//!
//! 负责把请求路径规范化为账本键，拼接到站点根目录，并判断其类型（文件、目录或不存在）。
//!
//! 规范化采用"以根为锚"的语义：多余的 `/` 与 `.` 被丢弃，`..` 抵消前一段，
//! 位于最顶层的 `..` 直接丢弃。因此规范化结果永远不会以 `..` 开头，
//! 拼接到根目录后也不可能越出根目录。

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};

use crate::param::ROOT_KEY;

/// 将请求路径规范化为账本键。根目录规范化为 `"."`，其余键不以 `/` 开头。
///
/// 该函数是幂等的：`normalize(&normalize(p)) == normalize(p)`。
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        ROOT_KEY.to_string()
    } else {
        segments.join("/")
    }
}

/// 计算目录 `parent` 下子项 `name` 的账本键
pub fn child_key(parent: &str, name: &str) -> String {
    if parent == ROOT_KEY {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// 启动时给定的忽略列表，之后只读。
///
/// 文件服务与目录列表共用同一个判定函数 [`IgnoreSet::is_ignored`]。
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    entries: HashSet<String>,
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let entries = entries
            .iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| e != ROOT_KEY)
            .collect();
        Self { entries }
    }

    /// 键本身、它的任一祖先路径或任一路径段出现在列表中时返回 `true`。
    /// 根目录永远不会被忽略。
    pub fn is_ignored(&self, key: &str) -> bool {
        if self.entries.is_empty() || key == ROOT_KEY {
            return false;
        }
        let mut prefix_end = 0;
        for segment in key.split('/') {
            prefix_end += segment.len();
            if self.entries.contains(segment) || self.entries.contains(&key[..prefix_end]) {
                return true;
            }
            prefix_end += 1;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 路径分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceKind {
    File,
    Directory,
    NotFound,
}

/// 一次解析的完整结果
#[derive(Debug, Clone)]
pub struct Resolution {
    kind: ResourceKind,
    key: String,
    path: PathBuf,
}

impl Resolution {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// 规范化后的账本键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 文件系统中的绝对路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.kind != ResourceKind::NotFound
    }
}

pub struct PathResolver {
    root: PathBuf,
    ignore: Arc<IgnoreSet>,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, ignore: Arc<IgnoreSet>) -> Self {
        Self {
            root: root.into(),
            ignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignore_set(&self) -> &IgnoreSet {
        &self.ignore
    }

    /// 账本键对应的绝对路径
    pub fn absolute_path(&self, key: &str) -> PathBuf {
        if key == ROOT_KEY {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    /// 规范化请求路径并判断其类型
    pub fn resolve(&self, request_path: &str) -> Resolution {
        self.classify(normalize(request_path))
    }

    /// 对已规范化的键进行分类，只查询一次文件系统。
    pub fn classify(&self, key: String) -> Resolution {
        let path = self.absolute_path(&key);
        if self.ignore.is_ignored(&key) {
            debug!("路径 {} 命中忽略列表", key);
            return Resolution {
                kind: ResourceKind::NotFound,
                key,
                path,
            };
        }
        let kind = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => ResourceKind::Directory,
            Ok(meta) if meta.is_file() => ResourceKind::File,
            Ok(_) => {
                debug!("路径 {} 既不是文件也不是目录", path.display());
                ResourceKind::NotFound
            }
            Err(e) if e.kind() == ErrorKind::NotFound => ResourceKind::NotFound,
            Err(e) => {
                warn!("无法获取 {} 的元数据：{}", path.display(), e);
                ResourceKind::NotFound
            }
        };
        Resolution { kind, key, path }
    }
}
