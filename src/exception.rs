// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义服务器在启动与请求处理过程中可能出现的各类异常。
//!
//! ## 分类
//! - **协议错误**：请求报文无法解析、版本不受支持、报文过大。
//! - **路径错误**：资源不存在或被忽略列表屏蔽。
//! - **账本错误**：访问记录数据库读写失败。
//! - **启动错误**：配置、TLS 证书或账本无法初始化，此类错误是致命的。

use std::{fmt, io};

/// 服务器处理过程中发生的异常类型。
#[derive(Debug, Clone)]
pub enum Exception {
    /// 请求字节流不是合法的 UTF-8。
    RequestIsNotUtf8,
    /// 请求行格式非法（缺少方法、路径或版本）。
    MalformedRequest,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求头超过了允许的最大长度。对应 `431 Request Header Fields Too Large`。
    RequestTooLarge,
    /// 请求的资源不存在，或被忽略列表屏蔽。对应 `404 Not Found`。
    FileNotFound,
    /// 访问记录账本读写失败。
    Store(String),
    /// 配置文件无法读取。
    Config(String),
    /// 证书或私钥无法加载，或 TLS 参数非法。
    Tls(String),
    /// 其他 I/O 错误。
    Io(String),
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed request line"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            RequestTooLarge => write!(f, "Request header fields too large (431)"),
            FileNotFound => write!(f, "File not found (404)"),
            Store(e) => write!(f, "Visit ledger error: {}", e),
            Config(e) => write!(f, "Configuration error: {}", e),
            Tls(e) => write!(f, "TLS error: {}", e),
            Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Exception {}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => FileNotFound,
            _ => Io(e.to_string()),
        }
    }
}

impl From<rocksdb::Error> for Exception {
    fn from(e: rocksdb::Error) -> Self {
        Store(e.into_string())
    }
}
