// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # TLS 配置
//!
//! 参考 Mozilla 服务端 TLS 推荐配置：最低 TLS 1.2，只保留 AEAD 套件，
//! 密钥交换优先 P-384 再 P-256。ALPN 只声明 `http/1.1`，不做协议升级。

use std::{fs::File, io::BufReader, sync::Arc};

use log::info;
use tokio_rustls::{
    rustls::{
        crypto::{aws_lc_rs, CryptoProvider},
        pki_types::{CertificateDer, PrivateKeyDer},
        version, CipherSuite, NamedGroup, ServerConfig,
    },
    TlsAcceptor,
};

use crate::exception::Exception;

/// 允许的密码套件（TLS 1.3 全部 + TLS 1.2 的 ECDHE AEAD 套件）
const CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS13_AES_128_GCM_SHA256,
    CipherSuite::TLS13_AES_256_GCM_SHA384,
    CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
];

/// 密钥交换曲线，按优先级排列
const KX_GROUPS: &[NamedGroup] = &[NamedGroup::secp384r1, NamedGroup::secp256r1];

fn provider() -> CryptoProvider {
    let base = aws_lc_rs::default_provider();
    let cipher_suites = base
        .cipher_suites
        .iter()
        .filter(|s| CIPHER_SUITES.contains(&s.suite()))
        .copied()
        .collect();
    let kx_groups = KX_GROUPS
        .iter()
        .filter_map(|g| base.kx_groups.iter().find(|k| k.name() == *g).copied())
        .collect();
    CryptoProvider {
        cipher_suites,
        kx_groups,
        ..base
    }
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, Exception> {
    let file = File::open(path).map_err(|e| Exception::Tls(format!("{}: {}", path, e)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Exception::Tls(format!("{}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(Exception::Tls(format!("{}: no certificate found", path)));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, Exception> {
    let file = File::open(path).map_err(|e| Exception::Tls(format!("{}: {}", path, e)))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| Exception::Tls(format!("{}: {}", path, e)))?
        .ok_or_else(|| Exception::Tls(format!("{}: no private key found", path)))
}

/// 读取证书与私钥，构建 TLS 接收器
pub fn acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, Exception> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(provider()))
        .with_protocol_versions(&[&version::TLS13, &version::TLS12])
        .map_err(|e| Exception::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Exception::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!("TLS证书已载入：{}", cert_path);
    Ok(TlsAcceptor::from(Arc::new(config)))
}
