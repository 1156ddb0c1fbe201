// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::net::IpAddr;

use crate::exception::Exception;
use crate::resolver::IgnoreSet;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_store_path")]
    store_path: String,
    #[serde(default = "default_address")]
    address: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_true")]
    tls: bool,
    #[serde(default = "default_tls_cert")]
    tls_cert: String,
    #[serde(default = "default_tls_key")]
    tls_key: String,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default = "default_true")]
    serve_stylesheet: bool,
    #[serde(default = "default_streaming_threshold")]
    streaming_threshold: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

fn default_www_root() -> String {
    ".".to_string()
}

fn default_store_path() -> String {
    "visits.db".to_string()
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8100
}

fn default_cache_size() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_tls_cert() -> String {
    "tls.crt".to_string()
}

fn default_tls_key() -> String {
    "tls.key".to_string()
}

fn default_streaming_threshold() -> u64 {
    10485760 // 10MB
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            store_path: default_store_path(),
            address: default_address(),
            port: default_port(),
            worker_threads: 0,
            cache_size: default_cache_size(),
            tls: true,
            tls_cert: default_tls_cert(),
            tls_key: default_tls_key(),
            ignore: Vec::new(),
            serve_stylesheet: true,
            streaming_threshold: default_streaming_threshold(),
            chunk_size: default_chunk_size(),
        }
    }

    /// 从 TOML 文件读取配置。
    ///
    /// 文件无法读取时返回错误（启动失败）；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::Config(format!("no such file {}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::Config(format!("error reading {}: {}", filename, e)))?;
        Ok(Self::from_toml_str(&str_val))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        raw_config.normalize();
        raw_config
    }

    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            self.cache_size = 5;
        }
        if self.chunk_size == 0 {
            warn!("chunk_size被设置为0，该值将被改为默认的256KB。");
            self.chunk_size = default_chunk_size();
        }
    }

    pub fn with_www_root(mut self, root: &str) -> Self {
        self.www_root = root.to_string();
        self
    }

    pub fn with_store_path(mut self, path: &str) -> Self {
        self.store_path = path.to_string();
        self
    }

    pub fn with_ignore(mut self, ignore: &[&str]) -> Self {
        self.ignore = ignore.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_stylesheet(mut self, serve: bool) -> Self {
        self.serve_stylesheet = serve;
        self
    }

    pub fn with_streaming_threshold(mut self, threshold: u64) -> Self {
        self.streaming_threshold = threshold;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self::new();
        config.normalize();
        config
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    /// 监听地址；无法解析时回退到 `0.0.0.0`
    pub fn address(&self) -> IpAddr {
        match self.address.parse() {
            Ok(addr) => addr,
            Err(_) => {
                warn!("无法解析监听地址 {}，改为监听 0.0.0.0", self.address);
                IpAddr::from([0, 0, 0, 0])
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn tls_cert(&self) -> &str {
        &self.tls_cert
    }

    pub fn tls_key(&self) -> &str {
        &self.tls_key
    }

    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(&self.ignore)
    }

    pub fn serve_stylesheet(&self) -> bool {
        self.serve_stylesheet
    }

    pub fn streaming_threshold(&self) -> u64 {
        self.streaming_threshold
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
