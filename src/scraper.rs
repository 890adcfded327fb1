use crate::browser::{scrape_image_links, Chrome};
use crate::client::build_client;
use crate::config::Config;
use crate::download::download_images;
use crate::scan::{download_page, scan_page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::task::block_in_place;

/// 默认接受的图片扩展名
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

/// 搜索请求
#[derive(Debug, Clone)]
pub struct Query {
    /// 搜索关键字，可以包含 site:xxx 之类的搜索语法
    pub query: String,
    /// 保存目录名，默认与关键字相同
    pub save_folder_name: Option<String>,
    /// 最多下载多少张图片
    pub n_images: usize,
    pub extensions: Vec<String>,
}

impl Query {
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            query: query.into(),
            save_folder_name: None,
            n_images: 1,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn folder_name(&self) -> &str {
        self.save_folder_name.as_deref().unwrap_or(&self.query)
    }
}

/// 获取图片链接的一种途径
#[async_trait]
pub trait LinkSource: Send + Sync {
    async fn links(
        &self,
        search_url: &str,
        n_images: usize,
        extensions: &[String],
    ) -> Result<Vec<String>>;
}

/// 直接请求搜索页面并扫描 HTML
pub struct StaticScanner {
    client: Client,
}

impl StaticScanner {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkSource for StaticScanner {
    async fn links(
        &self,
        search_url: &str,
        n_images: usize,
        extensions: &[String],
    ) -> Result<Vec<String>> {
        let html = download_page(&self.client, search_url).await?;
        scan_page(&html, extensions, n_images)
    }
}

/// 控制 Chrome 逐个点开缩略图
pub struct BrowserScraper {
    config: Config,
}

impl BrowserScraper {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LinkSource for BrowserScraper {
    async fn links(
        &self,
        search_url: &str,
        n_images: usize,
        extensions: &[String],
    ) -> Result<Vec<String>> {
        let config = &self.config;
        let browser = block_in_place(|| Chrome::launch(&config.browser, &config.user_agent))
            .context("无法启动浏览器")?;
        let harvest =
            scrape_image_links(browser, search_url, n_images, extensions, &self.config.browser)
                .await?;
        Ok(harvest.links)
    }
}

/// 根据关键字生成图片搜索地址
pub fn search_url(base: &str, query: &str) -> String {
    format!("{}{}&tbm=isch", base, urlencoding::encode(query))
}

/// 选择合适的途径获取图片链接
///
/// 数量较少时先尝试静态扫描，失败后改用浏览器；数量较多时直接使用浏览器
pub async fn acquire_links<S, B>(
    search_url: &str,
    query: &Query,
    static_scan_limit: usize,
    scanner: &S,
    browser: &B,
) -> Result<Vec<String>>
where
    S: LinkSource + ?Sized,
    B: LinkSource + ?Sized,
{
    let n_images = query.n_images;
    let mut links = if n_images < static_scan_limit {
        match scanner.links(search_url, n_images, &query.extensions).await {
            Ok(links) => links,
            Err(e) => {
                error!("静态扫描失败：{:#}，改用浏览器抓取", e);
                browser.links(search_url, n_images, &query.extensions).await?
            }
        }
    } else {
        browser.links(search_url, n_images, &query.extensions).await?
    };

    links.truncate(n_images);
    if links.len() < n_images {
        warn!("只找到 {} / {} 个图片链接", links.len(), n_images);
    }
    Ok(links)
}

/// 根据关键字搜索并下载图片
#[derive(Debug)]
pub struct ImageScraper {
    client: Client,
    folder_name: String,
    save_dir: PathBuf,
    links: Vec<String>,
    count: usize,
}

impl ImageScraper {
    /// 创建保存目录并获取图片链接
    pub async fn new(query: Query, config: &Config) -> Result<Self> {
        let client = build_client(config)?;
        let scanner = StaticScanner::new(client.clone());
        let browser = BrowserScraper::new(config.clone());
        Self::with_sources(query, config, client, &scanner, &browser).await
    }

    pub async fn with_sources<S, B>(
        query: Query,
        config: &Config,
        client: Client,
        scanner: &S,
        browser: &B,
    ) -> Result<Self>
    where
        S: LinkSource + ?Sized,
        B: LinkSource + ?Sized,
    {
        let folder_name = query.folder_name().to_owned();
        let save_dir = config.main_dir.join(&folder_name);
        std::fs::create_dir_all(&save_dir)
            .with_context(|| format!("无法创建目录 {}", save_dir.display()))?;

        let url = search_url(&config.search_url, &query.query);
        info!("搜索：{}", url);
        let links = acquire_links(&url, &query, config.static_scan_limit, scanner, browser).await?;

        Ok(Self {
            client,
            folder_name,
            save_dir,
            links,
            count: 0,
        })
    }

    /// 下载所有图片，返回成功下载的数量
    pub async fn download_all_images(&mut self) -> usize {
        self.count =
            download_images(&self.client, &self.links, &self.folder_name, &self.save_dir).await;
        self.count
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// 成功下载的数量，可能少于链接数量
    pub fn count(&self) -> usize {
        self.count
    }
}
