// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 将从连接中读取的原始请求头解析为 `Request` 结构体：
//! 1. 请求行（方法、路径、版本），路径在此处完成百分号解码。
//! 2. 常用 HTTP 标头（`User-Agent`、`Accept`、`Accept-Encoding`）。

use crate::{exception::Exception, param::*};
use lazy_static::lazy_static;
use log::error;
use percent_encoding::percent_decode_str;
use regex::Regex;

lazy_static! {
    /// 请求行：`<method> <target> HTTP/<major>.<minor>`，目标中允许出现空格。
    /// 方法名按 RFC 9110 的 token 字符集匹配。
    static ref REQUEST_LINE: Regex =
        Regex::new(r"^([!#$%&'*+\-.^_`|~0-9A-Za-z]+) (.+) ([Hh][Tt][Tt][Pp]/\d\.\d)$").unwrap();
}

#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 解码后的请求路径，不含查询字符串
    path: String,
    version: HttpVersion,
    user_agent: String,
    accept_encoding: Vec<HttpEncoding>,
    accept: Option<String>,
}

impl Request {
    /// 从原始请求头字节构建 `Request`。
    ///
    /// `buffer` 只需包含到空行为止的请求头部分，请求体被忽略。
    /// `id` 为连接编号，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);
        let first_line = request_lines.next().unwrap_or("");

        let captures = match REQUEST_LINE.captures(first_line) {
            Some(c) => c,
            None => {
                error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
                return Err(Exception::MalformedRequest);
            }
        };

        let method = HttpRequestMethod::parse(&captures[1]);

        let version = match captures[3].to_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 先切掉查询串与片段再解码，文件名中的 `%3F` 解码后仍属于路径
        let target = &captures[2];
        let target = target.split('#').next().unwrap_or("");
        let raw_path = target.split('?').next().unwrap_or("");
        let path = percent_decode_str(raw_path).decode_utf8_lossy().into_owned();

        let mut user_agent = "".to_string();
        let mut accept_encoding = vec![];
        let mut accept = None;
        for line in request_lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim().to_lowercase(), v.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "accept-encoding" => accept_encoding = parse_encodings(value),
                _ => {}
            }
        }

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            accept_encoding,
            accept,
        })
    }
}

fn parse_encodings(value: &str) -> Vec<HttpEncoding> {
    let mut encodings = vec![];
    for token in value.split(',') {
        let name = token.split(';').next().unwrap_or("").trim().to_lowercase();
        let encoding = match name.as_str() {
            "gzip" => HttpEncoding::Gzip,
            "deflate" => HttpEncoding::Deflate,
            "br" => HttpEncoding::Br,
            _ => continue,
        };
        if !encodings.contains(&encoding) {
            encodings.push(encoding);
        }
    }
    encodings
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    /// 客户端是否要求 JSON 格式的目录列表
    pub fn wants_json(&self) -> bool {
        self.accept
            .as_ref()
            .map_or(false, |a| a.contains("application/json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:8100\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), &HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(
            request.accept_encoding(),
            &[HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        );
    }

    #[test]
    fn test_parse_post_request() {
        let request_str =
            "POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\ntest=value";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), &HttpRequestMethod::Post);
        assert_eq!(request.path(), "/submit");
    }

    #[test]
    fn test_other_methods_are_parsed() {
        for (raw, method) in [
            ("DELETE", HttpRequestMethod::Delete),
            ("PUT", HttpRequestMethod::Put),
            ("HEAD", HttpRequestMethod::Head),
        ] {
            let request_str = format!("{} /resource HTTP/1.1\r\nHost: localhost\r\n\r\n", raw);
            let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
            assert_eq!(request.method(), &method);
        }
    }

    #[test]
    fn test_extension_methods_are_parsed() {
        for raw in ["PROPFIND", "MKCOL", "M-SEARCH", "BREW"] {
            let request_str = format!("{} /pot HTTP/1.1\r\n\r\n", raw);
            let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
            assert_eq!(request.method(), &HttpRequestMethod::Other(raw.to_string()));
        }
    }

    #[test]
    fn test_method_with_invalid_characters_is_malformed() {
        let result = Request::try_from(b"GE(T / HTTP/1.1\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequest)));
    }

    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert!(matches!(result, Err(Exception::UnsupportedHttpVersion)));
    }

    #[test]
    fn test_http_1_0() {
        let request_str = "GET / HTTP/1.0\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.version(), &HttpVersion::V1_0);
    }

    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);
        assert!(matches!(result, Err(Exception::RequestIsNotUtf8)));
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequest)));
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost\r\nuser-agent: Test\r\naccept-encoding: gzip\r\naccept: application/json\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert_eq!(request.accept_encoding(), &[HttpEncoding::Gzip]);
        assert!(request.wants_json());
    }

    #[test]
    fn test_no_encoding_header() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert!(request.accept_encoding().is_empty());
        assert!(!request.wants_json());
    }

    #[test]
    fn test_encoding_with_quality_values() {
        let request_str = "GET / HTTP/1.1\r\nAccept-Encoding: br;q=1.0, gzip;q=0.8, *;q=0.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(
            request.accept_encoding(),
            &[HttpEncoding::Br, HttpEncoding::Gzip]
        );
    }

    #[test]
    fn test_percent_decoded_path() {
        let request_str = "GET /sub%2Ffile1.txt HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.path(), "/sub/file1.txt");

        let request_str = "GET /my%20movie.mkv HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.path(), "/my movie.mkv");
    }

    #[test]
    fn test_path_with_space_is_recovered() {
        let request_str = "GET /my movie.mkv HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.path(), "/my movie.mkv");
    }

    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /page?id=123&name=test HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.path(), "/page");
    }

    #[test]
    fn test_encoded_question_mark_stays_in_path() {
        let request_str = "GET /what%3F.txt?x=1#top HTTP/1.1\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.path(), "/what?.txt");
    }

    #[test]
    fn test_lowercase_method_is_not_get() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.method(), &HttpRequestMethod::Other("get".to_string()));
    }
}
