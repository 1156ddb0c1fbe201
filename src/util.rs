// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    listing::{ListingEntry, Marker},
    param::{STATUS_CODES, STYLESHEET_PATH},
};

pub struct HtmlBuilder {
    title: String,
    head: String,
    body: String,
}

impl HtmlBuilder {
    /// 错误页面，`note` 为 HTML 片段，为空时使用状态码的原因短语
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self {
            title,
            head: "<style>body { width: 35em; margin: 0 auto; font-family: Tahoma, Verdana, Arial, sans-serif; }</style>".to_string(),
            body,
        }
    }

    /// 目录列表页面。
    ///
    /// 链接统一写成以 `/` 开头的绝对路径，`href` 本身已经过百分号转义。
    pub fn from_listing(title: &str, entries: &[ListingEntry]) -> Self {
        let mut body = String::new();
        body.push_str(&format!("<h1>{}</h1><hr>", html_escape(title)));
        body.push_str("<table>");
        for entry in entries {
            let class = match entry.marker() {
                Marker::Visited => "mark visited",
                Marker::NotVisited => "mark unvisited",
            };
            let name = match entry.is_dir() {
                true => format!("{}/", entry.name()),
                false => entry.name().to_string(),
            };
            body.push_str(&format!(
                r#"
                <tr>
                    <td class="{}">{}</td>
                    <td><a href="/{}">{}</a></td>
                    <td class="date">{}</td>
                </tr>
                "#,
                class,
                entry.marker().glyph(),
                html_escape(entry.href()),
                html_escape(&name),
                entry.formatted_time()
            ));
        }
        body.push_str("</table>");
        HtmlBuilder {
            title: title.to_string(),
            head: format!(r#"<link rel="stylesheet" href="{}">"#, STYLESHEET_PATH),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <meta name="viewport" content="width=device-width, initial-scale=1">
                    <title>{}</title>
                    {}
                </head>
                <body>
                {}
                </body>
            </html>"##,
            html_escape(&self.title),
            self.head,
            self.body
        )
    }
}

/// 转义 HTML 文本与属性值中的特殊字符
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 目录列表页面的标题
pub fn listing_title(key: &str) -> String {
    if key == crate::param::ROOT_KEY {
        "/".to_string()
    } else {
        format!("/{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a&b"), "a&amp;b");
        assert_eq!(
            html_escape("<script>\"x\"</script>"),
            "&lt;script&gt;&quot;x&quot;&lt;/script&gt;"
        );
        assert_eq!(html_escape("it's"), "it&#39;s");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_listing_title() {
        assert_eq!(listing_title("."), "/");
        assert_eq!(listing_title("sub/dir"), "/sub/dir");
    }

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(400, Some("坏请求")).build();
        assert!(html.contains("400"));
        assert!(html.contains("坏请求"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(431, None).build();
        assert!(html.contains("Request Header Fields Too Large"));
    }

    #[test]
    fn test_empty_listing_structure() {
        let html = HtmlBuilder::from_listing("/", &[]).build();
        assert!(html.contains("<title>/</title>"));
        assert!(html.contains(r#"<link rel="stylesheet" href="/css">"#));
        assert!(html.contains("<table></table>"));
        assert!(html.contains("charset=\"utf-8\""));
    }
}
