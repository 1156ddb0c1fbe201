// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    cache::FileCache,
    config::Config,
    exception::Exception,
    listing::ListingEntry,
    param::*,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use std::{
    ffi::OsStr,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    cache_control: Option<String>,
    content: Option<Bytes>,
    /// 需要分块发送的大文件路径；为 `Some` 时 `content` 为空
    stream_path: Option<PathBuf>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            cache_control: None,
            content: None,
            stream_path: None,
        }
    }

    /// 没有响应体的响应，用于 404 等终止情形
    pub fn empty(code: u16) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response
    }

    /// 方法过滤阶段的 405 响应，附带 `Allow` 头，不含响应体
    pub fn method_not_allowed() -> Self {
        let mut response = Self::empty(405);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    /// 带 HTML 说明页面的错误响应
    pub fn from_status_code(code: u16, accept_encoding: &[HttpEncoding], id: u128) -> Self {
        let mut response = Self::new();
        let note = match code {
            400 => Some(r"<h2>噢！</h2><p>服务器无法理解这个请求。</p>"),
            431 => Some(r"<h2>噢！</h2><p>请求头太长了。</p>"),
            500 => Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
            _ => None,
        };
        let content = HtmlBuilder::from_status_code(code, note).build();
        response.set_html(content.into_bytes(), accept_encoding, id);
        response.set_code(code);
        response
    }

    /// 内嵌样式表，禁用缓存
    pub fn from_stylesheet() -> Self {
        let mut response = Self::new();
        let bytes = Bytes::from_static(STYLESHEET.as_bytes());
        response.content_type = Some("text/css;charset=utf-8".to_string());
        response.cache_control = Some("no-cache".to_string());
        response.content_length = bytes.len() as u64;
        response.content = Some(bytes);
        response
    }

    /// 目录列表响应。访问标记随时可能变化，因此总是禁用缓存。
    pub fn from_listing(
        title: &str,
        entries: &[ListingEntry],
        accept_encoding: &[HttpEncoding],
        is_json: bool,
        id: u128,
    ) -> Self {
        debug!("[ID{}]生成目录列表：{}，共{}项，json={}", id, title, entries.len(), is_json);
        let mut response = Self::new();
        if is_json {
            let json: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
            let content = match serde_json::to_vec(&json) {
                Ok(c) => c,
                Err(e) => {
                    error!("[ID{}]序列化目录列表失败：{}", id, e);
                    b"[]".to_vec()
                }
            };
            response.set_compressed(content, accept_encoding, id);
            response.content_type = Some("application/json".to_string());
        } else {
            let content = HtmlBuilder::from_listing(title, entries).build();
            response.set_html(content.into_bytes(), accept_encoding, id);
        }
        response.cache_control = Some("no-cache".to_string());
        response
    }

    /// 文件响应，使用默认缓存策略（不设置 `Cache-Control`）。
    ///
    /// 不超过阈值的文件整体读入内存并进入内容缓存，较大的文件在写出时分块发送。
    pub fn from_file(
        path: &Path,
        id: u128,
        cache: &Arc<Mutex<FileCache>>,
        config: &Config,
    ) -> Result<Self, Exception> {
        let mut response = Self::new();
        let metadata = fs::metadata(path)?;
        let file_size = metadata.len();
        let mime = get_mime(path.extension().unwrap_or_default());
        response.content_type = Some(mime.to_string());
        response.content_length = file_size;

        if !FileCache::should_cache(file_size, config.streaming_threshold()) {
            debug!(
                "[ID{}]文件大小{} bytes超过阈值{} bytes，使用流式传输",
                id,
                file_size,
                config.streaming_threshold()
            );
            response.stream_path = Some(path.to_path_buf());
            return Ok(response);
        }

        let modified = metadata.modified()?;
        // 读文件时不持有缓存锁
        let cached = lock_cache(cache, id).lookup(path, modified);
        let content = match cached {
            Some(bytes) => {
                debug!("[ID{}]缓存命中：{}", id, path.display());
                bytes
            }
            None => {
                debug!("[ID{}]缓存未命中，读取文件：{}", id, path.display());
                let mut buf = Vec::with_capacity(file_size as usize);
                File::open(path)?.read_to_end(&mut buf)?;
                let bytes = Bytes::from(buf);
                lock_cache(cache, id).insert(path, bytes.clone(), modified);
                bytes
            }
        };
        response.content_length = content.len() as u64;
        response.content = Some(content);
        Ok(response)
    }

    fn set_html(&mut self, content: Vec<u8>, accept_encoding: &[HttpEncoding], id: u128) {
        self.set_compressed(content, accept_encoding, id);
        self.content_type = Some("text/html;charset=utf-8".to_string());
    }

    fn set_compressed(&mut self, content: Vec<u8>, accept_encoding: &[HttpEncoding], id: u128) {
        self.content_encoding = decide_encoding(accept_encoding);
        let original_size = content.len();
        let content = match self.content_encoding {
            Some(encoding) => match compress(&content, encoding) {
                Ok(c) => {
                    debug!(
                        "[ID{}]使用{}压缩，原始: {} bytes -> 压缩后: {} bytes",
                        id,
                        encoding,
                        original_size,
                        c.len()
                    );
                    c
                }
                Err(e) => {
                    error!("[ID{}]压缩失败: {}，返回未压缩内容", id, e);
                    self.content_encoding = None;
                    content
                }
            },
            None => content,
        };
        self.content_length = content.len() as u64;
        self.content = Some(Bytes::from(content));
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// 状态行与响应头
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length, CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        if let Some(a) = &self.allow {
            let methods: Vec<String> = a.iter().map(|m| m.to_string()).collect();
            header.push_str(&format!("Allow: {}{}", methods.join(", "), CRLF));
        }
        if let Some(c) = &self.cache_control {
            header.push_str(&format!("Cache-Control: {}{}", c, CRLF));
        }
        header.push_str(&format!("Connection: close{}", CRLF));
        header.push_str(CRLF);
        header.into_bytes()
    }

    /// 完整报文（不含需要流式发送的文件内容）
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header_bytes();
        if let Some(c) = &self.content {
            bytes.extend_from_slice(c);
        }
        bytes
    }

    /// 把响应写入连接，大文件按 `chunk_size` 分块发送
    pub async fn write_to<W>(&self, writer: &mut W, chunk_size: usize, id: u128) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let path = match &self.stream_path {
            Some(p) => p,
            None => {
                let bytes = self.as_bytes();
                debug!("[ID{}]发送全量响应，长度: {}", id, bytes.len());
                writer.write_all(&bytes).await?;
                return writer.flush().await;
            }
        };

        writer.write_all(&self.header_bytes()).await?;
        // 响应体长度以响应头为准，文件在此期间变长也不多发
        let mut file = tokio::fs::File::open(path).await?.take(self.content_length);
        let mut buffer = vec![0u8; chunk_size.max(1)];
        let mut total_sent = 0u64;
        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).await?;
            total_sent += n as u64;
        }
        writer.flush().await?;
        if total_sent < self.content_length {
            warn!(
                "[ID{}]文件在发送过程中变短，仅发送了{}/{}字节",
                id, total_sent, self.content_length
            );
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while streaming",
            ));
        }
        debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
        Ok(())
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    pub fn allow(&self) -> Option<&[HttpRequestMethod]> {
        self.allow.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_path.is_some()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

fn lock_cache<'a>(cache: &'a Mutex<FileCache>, id: u128) -> MutexGuard<'a, FileCache> {
    match cache.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("[ID{}]缓存锁被污染，恢复并继续", id);
            poisoned.into_inner()
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: &[u8], mode: HttpEncoding) -> io::Result<Vec<u8>> {
    match mode {
        HttpEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Br => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
    }
}

// 优先 gzip，其次 deflate，最后 br
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}

fn get_mime(extension: &OsStr) -> &'static str {
    let extension = match extension.to_str() {
        Some(e) => e.to_lowercase(),
        None => return "application/octet-stream",
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => "application/octet-stream",
    }
}
