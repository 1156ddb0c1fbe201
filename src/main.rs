// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # markserve
//!
//! 记住访问历史的 HTTPS 文件浏览服务。
//! - 每次成功访问文件或目录都会在 RocksDB 账本中留下时间戳
//! - 目录列表用 ✓ / ✕ 标记每个条目是否被访问过
//! - 后台管理控制台（stop / status / dump / help）

use std::{env, net::SocketAddr, process, sync::Arc};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
    sync::Notify,
};
use tokio_rustls::TlsAcceptor;

use markserve::{pipeline::Connections, tls, Config, Exception, Ledger, Pipeline, VisitStore};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const DEFAULT_CONFIG: &str = "config/development.toml";

fn main() {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法初始化日志系统（{}）：{}", LOG_CONFIG, e);
        process::exit(1);
    }

    // 第一个命令行参数可以指定配置文件
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!("配置文件已载入：{}", config_path);
    info!("www root: {}", config.www_root());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(Arc::new(config))) {
        error!("{}", e);
        process::exit(1);
    }
    info!("服务器已停止");
}

async fn run(config: Arc<Config>) -> Result<(), Exception> {
    let ledger = Ledger::open(config.store_path())?;
    info!("访问账本已打开：{}", config.store_path());
    let store: Arc<dyn VisitStore> = Arc::new(ledger);

    let acceptor: Option<TlsAcceptor> = match config.tls() {
        true => Some(tls::acceptor(config.tls_cert(), config.tls_key())?),
        false => {
            warn!("TLS已关闭，连接将以明文传输");
            None
        }
    };

    let socket = SocketAddr::new(config.address(), config.port());
    let listener = TcpListener::bind(socket)
        .await
        .map_err(|e| Exception::Io(format!("无法绑定地址{}：{}", socket, e)))?;
    info!("服务端开始在{}上监听Socket连接", socket);

    let pipeline = Arc::new(Pipeline::new(Arc::clone(&config), store));
    let shutdown = Arc::new(Notify::new());
    let connections = Arc::new(Connections::new());

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&connections),
        Arc::clone(&pipeline),
    ));

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let pipeline = Arc::clone(&pipeline);
        let acceptor = acceptor.clone();
        let guard = connections.enter();
        tokio::spawn(async move {
            let _guard = guard;
            match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(mut tls_stream) => pipeline.serve(&mut tls_stream, id).await,
                    Err(e) => warn!("[ID{}]TLS握手失败：{}", id, e),
                },
                None => pipeline.serve(&mut stream, id).await,
            }
        });
        id += 1;
    }

    drop(listener);
    let remaining = connections.active();
    if remaining > 0 {
        info!("等待{}个在途连接处理完毕...", remaining);
    }
    connections.wait_idle().await;
    Ok(())
}

/// 后台管理控制台，从标准输入读取指令
async fn console(shutdown: Arc<Notify>, connections: Arc<Connections>, pipeline: Arc<Pipeline>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                shutdown.notify_one();
                println!("停机指令已激活，服务器将不再接受新的连接，在途连接处理完毕后退出...");
                break;
            }
            "status" => {
                let active_count = connections.active();
                println!("== markserve 状态 ===");
                println!("当前活跃连接数: {}", active_count);
                println!("www root: {}", pipeline.config().www_root());
                println!("====================");
            }
            "dump" => match pipeline.store().dump() {
                Ok(records) => {
                    println!("== 访问记录（共{}条）==", records.len());
                    for (key, time) in records {
                        println!("{}  {}", time, key);
                    }
                    println!("====================");
                }
                Err(e) => println!("读取访问记录失败：{}", e),
            },
            "help" => {
                println!("== markserve Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("dump   - 列出全部访问记录");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
