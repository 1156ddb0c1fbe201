// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理流水线
//!
//! 每个请求只经过一次、严格按顺序执行的四个阶段，任一阶段都可以提前结束：
//!
//! 1. **方法过滤**：只接受 GET，其余方法返回 405，不触碰账本。
//! 2. **样式表短路**：保留路径 `/css` 直接返回内嵌样式表，不做规范化、不查文件系统、不记账。
//! 3. **访问记录**：把规范化后的键写入账本。只有解析结果为文件或目录时才记录，
//!    不存在或被忽略的路径永远不会留下记录；写入失败只记日志，不影响响应。
//! 4. **终结解析**：文件直接发送；目录生成列表页面并禁用缓存；不存在则返回无响应体的 404。

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Notify,
    task,
};

use crate::{
    cache::FileCache,
    config::Config,
    exception::Exception,
    listing::ListingBuilder,
    param::{ALLOWED_METHODS, MAX_HEADER_SIZE, STYLESHEET_PATH},
    request::Request,
    resolver::{PathResolver, Resolution, ResourceKind},
    response::Response,
    store::VisitStore,
    util::listing_title,
};

pub struct Pipeline {
    config: Arc<Config>,
    resolver: PathResolver,
    listing: ListingBuilder,
    store: Arc<dyn VisitStore>,
    cache: Arc<Mutex<FileCache>>,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, store: Arc<dyn VisitStore>) -> Self {
        let ignore = Arc::new(config.ignore_set());
        let resolver = PathResolver::new(PathBuf::from(config.www_root()), Arc::clone(&ignore));
        let listing = ListingBuilder::new(Arc::clone(&store), ignore);
        let cache = Arc::new(Mutex::new(FileCache::from_capacity(config.cache_size())));
        Self {
            config,
            resolver,
            listing,
            store,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VisitStore> {
        &self.store
    }

    /// 按顺序执行四个阶段，返回最终响应
    pub fn handle(&self, request: &Request, id: u128) -> Response {
        if !ALLOWED_METHODS.contains(request.method()) {
            debug!("[ID{}]方法{}不被允许，返回405", id, request.method());
            return Response::method_not_allowed();
        }

        if self.config.serve_stylesheet() && request.path() == STYLESHEET_PATH {
            debug!("[ID{}]返回内嵌样式表", id);
            return Response::from_stylesheet();
        }

        let resolution = self.resolver.resolve(request.path());
        debug!(
            "[ID{}]路径{}规范化为{}，类型{:?}",
            id,
            request.path(),
            resolution.key(),
            resolution.kind()
        );
        self.record_visit(&resolution, id);

        self.terminal(&resolution, request, id)
    }

    fn record_visit(&self, resolution: &Resolution, id: u128) {
        if !resolution.exists() {
            return;
        }
        if let Err(e) = self.store.record(resolution.key()) {
            error!("[ID{}]记录访问{}失败：{}", id, resolution.key(), e);
        }
    }

    fn terminal(&self, resolution: &Resolution, request: &Request, id: u128) -> Response {
        match resolution.kind() {
            ResourceKind::File => {
                match Response::from_file(resolution.path(), id, &self.cache, &self.config) {
                    Ok(response) => response,
                    Err(Exception::FileNotFound) => {
                        warn!("[ID{}]文件{}在读取前被移除，返回404", id, resolution.path().display());
                        Response::empty(404)
                    }
                    Err(e) => {
                        error!("[ID{}]读取文件{}失败：{}", id, resolution.path().display(), e);
                        Response::from_status_code(500, request.accept_encoding(), id)
                    }
                }
            }
            ResourceKind::Directory => {
                let entries = match self.listing.build(resolution.path(), resolution.key()) {
                    Ok(entries) => entries,
                    Err(e) => {
                        error!("[ID{}]读取目录{}失败：{}", id, resolution.path().display(), e);
                        Vec::new()
                    }
                };
                Response::from_listing(
                    &listing_title(resolution.key()),
                    &entries,
                    request.accept_encoding(),
                    request.wants_json(),
                    id,
                )
            }
            ResourceKind::NotFound => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, request.path());
                Response::empty(404)
            }
        }
    }

    /// 处理一条连接上的单个请求：读取请求头、执行流水线、写出响应。
    ///
    /// 流水线中的文件系统与账本读写都是阻塞操作，放到阻塞线程池中执行。
    pub async fn serve<S>(self: &Arc<Self>, stream: &mut S, id: u128)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = match read_head(stream).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                debug!("[ID{}]客户端在发送请求前关闭了连接", id);
                return;
            }
            Err(Exception::RequestTooLarge) => {
                warn!("[ID{}]请求头过长，返回431", id);
                write_or_log(stream, &Response::from_status_code(431, &[], id), 0, id).await;
                return;
            }
            Err(e) => {
                error!("[ID{}]读取请求失败: {}", id, e);
                return;
            }
        };

        let start_time = Instant::now();
        let request = match Request::try_from(&head, id) {
            Ok(req) => req,
            Err(e) => {
                warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
                write_or_log(stream, &Response::from_status_code(400, &[], id), 0, id).await;
                return;
            }
        };

        let pipeline = Arc::clone(self);
        let (request, response) = match task::spawn_blocking(move || {
            let response = pipeline.handle(&request, id);
            (request, response)
        })
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                error!("[ID{}]请求处理任务异常终止: {}", id, e);
                write_or_log(stream, &Response::from_status_code(500, &[], id), 0, id).await;
                return;
            }
        };
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        info!(
            "[ID{}] {}, {}, {}, {}, {}, {}",
            id,
            request.version(),
            request.path(),
            request.method(),
            response.status_code(),
            response.information(),
            request.user_agent(),
        );

        write_or_log(stream, &response, self.config.chunk_size(), id).await;
    }
}

/// 在途连接计数。停机时等待计数归零，保证已接受的连接都能发送完毕。
#[derive(Default)]
pub struct Connections {
    active: Mutex<u32>,
    idle: Notify,
}

/// 连接结束（包括任务 panic）时自动减少计数
pub struct ConnectionGuard {
    connections: Arc<Connections>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> ConnectionGuard {
        *self.lock() += 1;
        ConnectionGuard {
            connections: Arc::clone(self),
        }
    }

    pub fn active(&self) -> u32 {
        *self.lock()
    }

    /// 等待所有在途连接结束
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u32> {
        match self.active.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut active = self.connections.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.connections.idle.notify_waiters();
        }
    }
}

async fn write_or_log<S>(stream: &mut S, response: &Response, chunk_size: usize, id: u128)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = response.write_to(stream, chunk_size, id).await {
        error!("[ID{}]发送响应失败: {}", id, e);
    }
    let _ = stream.shutdown().await;
}

/// 读取到请求头结束（空行）为止；连接在发送任何数据前关闭时返回 `None`
async fn read_head<S>(stream: &mut S) -> Result<Option<Vec<u8>>, Exception>
where
    S: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut buffer = [0u8; 1024];
    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            return Ok(if head.is_empty() { None } else { Some(head) });
        }
        head.extend_from_slice(&buffer[..n]);
        if let Some(end) = find_head_end(&head) {
            head.truncate(end);
            return Ok(Some(head));
        }
        if head.len() > MAX_HEADER_SIZE {
            return Err(Exception::RequestTooLarge);
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
