// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `markserve` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 服务器使用到的 HTTP 状态码及其原因短语。
//! - MIME 类型映射表。
//! - HTTP 方法、版本及编码格式的强类型枚举。
//! - 访问记录账本与目录列表使用的固定标识。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "markserve";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 请求头的最大长度，超过该长度的请求返回 431
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// 保留路径：命中时直接返回内嵌样式表
pub const STYLESHEET_PATH: &str = "/css";

/// 内嵌样式表
pub const STYLESHEET: &str = include_str!("../static/style.css");

/// 根目录在账本中的键
pub const ROOT_KEY: &str = ".";

/// 账本中唯一的列族（bucket）名称
pub const STORE_BUCKET: &str = "visits";

/// 已访问标记
pub const VISITED_MARK: &str = "\u{2713}";

/// 未访问标记
pub const NOT_VISITED_MARK: &str = "\u{2715}";

lazy_static! {
    /// 服务器允许处理的 HTTP 方法列表，其余方法一律返回 405。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = vec![HttpRequestMethod::Get];
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(400, "Bad Request");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(431, "Request Header Fields Too Large");
        map.insert(500, "Internal Server Error");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，用于设置 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("aac", "audio/aac");
        map.insert("avi", "video/x-msvideo");
        map.insert("avif", "image/avif");
        map.insert("bin", "application/octet-stream");
        map.insert("bmp", "image/bmp");
        map.insert("bz2", "application/x-bzip2");
        map.insert("css", "text/css;charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("epub", "application/epub+zip");
        map.insert("flac", "audio/flac");
        map.insert("gif", "image/gif");
        map.insert("gz", "application/gzip");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("html", "text/html;charset=utf-8");
        map.insert("ico", "image/x-icon");
        map.insert("iso", "application/x-iso9660-image");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("json", "application/json");
        map.insert("m4a", "audio/mp4");
        map.insert("m4v", "video/mp4");
        map.insert("md", "text/markdown;charset=utf-8");
        map.insert("mkv", "video/x-matroska");
        map.insert("mov", "video/quicktime");
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("mpeg", "video/mpeg");
        map.insert("oga", "audio/ogg");
        map.insert("ogg", "audio/ogg");
        map.insert("ogv", "video/ogg");
        map.insert("opus", "audio/opus");
        map.insert("pdf", "application/pdf");
        map.insert("png", "image/png");
        map.insert("srt", "application/x-subrip");
        map.insert("svg", "image/svg+xml");
        map.insert("tar", "application/x-tar");
        map.insert("txt", "text/plain;charset=utf-8");
        map.insert("vtt", "text/vtt");
        map.insert("wav", "audio/wav");
        map.insert("webm", "video/webm");
        map.insert("webp", "image/webp");
        map.insert("xml", "text/xml");
        map.insert("zip", "application/zip");
        map.insert("7z", "application/x-7z-compressed");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

/// HTTP 请求方法。
///
/// 解析器接受任意合法的方法名（包括 PROPFIND、M-SEARCH 等扩展方法），
/// 以便方法过滤阶段能够统一返回 405。方法名大小写敏感。
#[derive(Debug, Clone, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
    Patch,
    Connect,
    Trace,
    Other(String),
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    Gzip,
    Deflate,
    Br,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Delete => "DELETE",
            HttpRequestMethod::Patch => "PATCH",
            HttpRequestMethod::Connect => "CONNECT",
            HttpRequestMethod::Trace => "TRACE",
            HttpRequestMethod::Other(name) => name.as_str(),
        };
        write!(f, "{}", name)
    }
}

impl HttpRequestMethod {
    /// 将请求行中的方法名解析为枚举，未知方法保留原文
    pub fn parse(name: &str) -> Self {
        match name {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            "PUT" => HttpRequestMethod::Put,
            "DELETE" => HttpRequestMethod::Delete,
            "PATCH" => HttpRequestMethod::Patch,
            "CONNECT" => HttpRequestMethod::Connect,
            "TRACE" => HttpRequestMethod::Trace,
            other => HttpRequestMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}
