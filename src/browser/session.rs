use super::{Browser, BrowserError, By};
use crate::config;
use crate::utils::{has_extension, LogOnError};
use anyhow::Result;
use tokio::time::sleep;

/// 单个序号的抓取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// 得到了新的图片地址
    Accepted(String),
    /// 得到的地址已经存在
    Duplicate(String),
    /// 点开了预览但找不到符合扩展名的地址
    Unresolved,
    /// 该位置没有缩略图
    Missing,
    /// 点击被拦截且重试次数用尽
    Abandoned,
}

/// 浏览器抓取的结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Harvest {
    pub links: Vec<String>,
    /// 连续失败次数达到上限，且没有更多结果可以加载或加载次数已用完
    pub exhausted: bool,
}

/// 一次浏览器抓取的状态
struct SearchSession<'a, B> {
    browser: &'a B,
    config: &'a config::Browser,
    extensions: &'a [String],
    /// 当前缩略图序号，从 1 开始
    index: usize,
    links: Vec<String>,
    consecutive_fails: u32,
    show_more_clicks: u32,
}

impl<'a, B: Browser> SearchSession<'a, B> {
    fn new(browser: &'a B, config: &'a config::Browser, extensions: &'a [String]) -> Self {
        Self {
            browser,
            config,
            extensions,
            index: 1,
            links: vec![],
            consecutive_fails: 0,
            show_more_clicks: 0,
        }
    }

    async fn run(mut self, search_url: &str, n_images: usize) -> Result<Harvest> {
        self.browser.navigate(search_url).await?;
        sleep(self.config.load_time()).await;

        let max_fails = self.config.max_consecutive_fails;
        while self.links.len() < n_images && self.consecutive_fails < max_fails {
            let step = self.scrape_single_src_link().await;
            self.record(step);

            if self.config.img_per_row > 0 && self.index % self.config.img_per_row == 0 {
                let script = format!("window.scrollTo(0, {});", self.index * 60);
                self.browser.execute_script(&script).await.log_on_error();
            }
            self.index += 1;

            if self.consecutive_fails == max_fails && self.click_show_more().await {
                self.consecutive_fails = 0;
            }
        }

        Ok(Harvest {
            exhausted: self.links.len() < n_images,
            links: self.links,
        })
    }

    fn record(&mut self, step: Step) {
        match step {
            Step::Accepted(url) => {
                debug!("第 {} 张：{}", self.index, url);
                self.links.push(url);
                self.consecutive_fails = 0;
            }
            step => {
                self.consecutive_fails += 1;
                error!(
                    "第 {} 张获取失败（{:?}），连续失败 {} / {} 次",
                    self.index, step, self.consecutive_fails, self.config.max_consecutive_fails
                );
            }
        }
    }

    /// 点开当前序号的缩略图并读取大图地址
    async fn scrape_single_src_link(&self) -> Step {
        let xpath = By::XPath(self.config.thumbnail_xpath(self.index));
        let max_retries = self.config.max_retries_per_image;
        for attempt in 1..=max_retries {
            match self.find_and_click(&xpath).await {
                Ok(()) => {
                    sleep(self.config.load_time()).await;
                    return match self.valid_image_src().await {
                        Some(url) if self.links.contains(&url) => Step::Duplicate(url),
                        Some(url) => Step::Accepted(url),
                        None => Step::Unresolved,
                    };
                }
                Err(BrowserError::NoSuchElement(_)) => {
                    error!("无法点击第 {} 张图片：元素不存在", self.index);
                    return Step::Missing;
                }
                Err(BrowserError::ClickIntercepted(_)) => {
                    error!(
                        "无法点击第 {} 张图片：点击被拦截，重试 {} / {}",
                        self.index, attempt, max_retries
                    );
                    sleep(self.config.load_time()).await;
                }
                Err(e) => {
                    error!(
                        "无法点击第 {} 张图片：{}，重试 {} / {}",
                        self.index, e, attempt, max_retries
                    );
                }
            }
        }
        Step::Abandoned
    }

    async fn find_and_click(&self, by: &By) -> Result<(), BrowserError> {
        let element = self.browser.find_element(by).await?;
        self.browser.click(&element).await
    }

    /// 在打开的预览中寻找扩展名符合要求的图片地址
    async fn valid_image_src(&self) -> Option<String> {
        let by = By::ClassName(self.config.img_cls_name.clone());
        let elements = self.browser.find_elements(&by).await.log_on_error()?;
        // 可能有多个预览元素，只有一个是真正的大图
        for element in elements {
            match self.browser.attribute(&element, "src").await {
                Ok(Some(src)) if has_extension(&src, self.extensions) => return Some(src),
                Ok(_) => {}
                Err(e) => error!("无法读取图片地址：{}", e),
            }
        }
        None
    }

    /// 点击"显示更多"按钮，返回是否点击成功
    ///
    /// 点击次数达到 `max_show_more` 后不再点击
    async fn click_show_more(&mut self) -> bool {
        if self.show_more_clicks >= self.config.max_show_more {
            warn!("已点击 {} 次显示更多，不再加载", self.show_more_clicks);
            return false;
        }
        sleep(self.config.load_time()).await;
        let by = By::ClassName(self.config.show_more_btn.clone());
        match self.find_and_click(&by).await {
            Ok(()) => {
                self.show_more_clicks += 1;
                info!(
                    "已加载更多结果 ({} / {})",
                    self.show_more_clicks, self.config.max_show_more
                );
                true
            }
            Err(e) => {
                error!("无法点击显示更多按钮：{}", e);
                false
            }
        }
    }
}

/// 用浏览器抓取搜索结果中的图片地址
///
/// 无论成功与否，返回前都会关闭浏览器会话
pub async fn scrape_image_links<B: Browser>(
    browser: B,
    search_url: &str,
    n_images: usize,
    extensions: &[String],
    config: &config::Browser,
) -> Result<Harvest> {
    let result = SearchSession::new(&browser, config, extensions)
        .run(search_url, n_images)
        .await;
    browser.close().await.log_on_error();

    let harvest = result?;
    info!("共抓取到 {} 个图片链接", harvest.links.len());
    if harvest.exhausted {
        warn!("没有更多结果，只找到 {} / {} 个链接", harvest.links.len(), n_images);
    }
    Ok(harvest)
}
