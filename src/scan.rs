use crate::client::send;
use crate::utils::{has_extension, unescape_js};
use crate::xpath::parse_html;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use url::Url;

/// 脚本中以引号包裹的绝对地址
static QUOTED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(https?:(?:\\/|/)(?:\\/|/)[^"\s]+)""#).unwrap());

/// 搜索引擎自己的缩略图
const THUMBNAIL_HOSTS: [&str; 2] = ["encrypted-tbn", "gstatic"];

/// 直接获取搜索页面的 HTML
pub async fn download_page(client: &Client, url: &str) -> Result<String> {
    debug!("获取搜索页面：{}", url);
    let response = send!(client.get(url))?;
    debug!("状态码: {}", response.status());
    let text = response.text().await?;
    trace!("返回: {}", &text[..text.char_indices().nth(100).map_or(text.len(), |(i, _)| i)]);
    Ok(text)
}

/// 不执行脚本，直接从页面中找出至多 `n_max` 个图片地址
pub fn scan_page<S: AsRef<str>>(html: &str, extensions: &[S], n_max: usize) -> Result<Vec<String>> {
    if n_max == 0 {
        return Ok(vec![]);
    }
    let document = parse_html(html)?;

    let mut candidates = document.texts("//img/@src")?;
    candidates.extend(document.texts("//img/@data-src")?);
    candidates.extend(
        document
            .texts("//a/@href")?
            .iter()
            .filter_map(|href| imgurl_param(href)),
    );
    candidates.extend(
        QUOTED_URL
            .captures_iter(html)
            .map(|cap| unescape_js(&cap[1])),
    );
    debug!("候选地址数量: {}", candidates.len());

    let mut links: Vec<String> = vec![];
    for url in candidates {
        if links.len() >= n_max {
            break;
        }
        if !url.starts_with("http")
            || THUMBNAIL_HOSTS.iter().any(|host| url.contains(host))
            || !has_extension(&url, extensions)
            || links.contains(&url)
        {
            continue;
        }
        links.push(url);
    }

    if links.is_empty() {
        bail!("页面中没有找到图片地址，可能需要执行脚本才能加载结果");
    }
    info!("静态扫描找到 {} 个图片链接", links.len());
    Ok(links)
}

/// 结果链接形如 /imgres?imgurl=...，取出其中的原图地址
fn imgurl_param(href: &str) -> Option<String> {
    static BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://www.google.com/").unwrap());
    let url = BASE.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "imgurl")
        .map(|(_, v)| v.into_owned())
}
