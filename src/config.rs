use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 搜索地址前缀，查询词会直接拼接在后面
    pub search_url: String,
    /// 图片保存的根目录
    pub main_dir: PathBuf,
    /// 单张图片下载的超时时间（秒）
    pub timeout: u64,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 请求数量小于该值时先尝试静态扫描
    pub static_scan_limit: usize,
    pub browser: Browser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Browser {
    /// Chrome 可执行文件路径，不填则自动查找或下载
    pub chrome_path: Option<PathBuf>,
    /// 是否使用无头模式
    pub headless: bool,
    /// 是否启用 Chrome 沙盒，在容器中以 root 运行时需要关闭
    pub sandbox: bool,
    /// 浏览器窗口大小
    pub window_size: (u32, u32),
    /// 每次点击后等待页面加载的时间（毫秒）
    pub page_load_time: u64,
    /// 单张缩略图点击被拦截时的最大重试次数
    pub max_retries_per_image: u32,
    /// 连续失败多少次后尝试加载更多
    pub max_consecutive_fails: u32,
    /// 最多点击多少次"显示更多"
    pub max_show_more: u32,
    /// 每行结果数量，每经过一行滚动一次页面
    pub img_per_row: usize,
    /// "显示更多" 按钮的 class
    pub show_more_btn: String,
    /// 预览大图的 class
    pub img_cls_name: String,
    /// 缩略图的 xpath 模板，`{}` 会被替换为序号
    pub xpath_template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com/search?q=".to_owned(),
            main_dir: PathBuf::from("images"),
            timeout: 30,
            user_agent:
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0"
                    .to_owned(),
            static_scan_limit: 100,
            browser: Browser::default(),
        }
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            sandbox: true,
            window_size: (1400, 1050),
            page_load_time: 1000,
            max_retries_per_image: 3,
            max_consecutive_fails: 20,
            max_show_more: 10,
            img_per_row: 5,
            show_more_btn: "mye4qd".to_owned(),
            img_cls_name: "n3VNCb".to_owned(),
            xpath_template: r#"//*[@id="islrg"]/div[1]/div[{}]/a[1]/div[1]/img"#.to_owned(),
        }
    }
}

impl Config {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let str = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        Ok(toml::from_str(&str)?)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Browser {
    pub fn load_time(&self) -> Duration {
        Duration::from_millis(self.page_load_time)
    }

    /// 第 `index` 张缩略图的 xpath
    pub fn thumbnail_xpath(&self, index: usize) -> String {
        self.xpath_template.replace("{}", &index.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            main_dir = "out"
            [browser]
            max_consecutive_fails = 5
            window_size = [800, 600]
            chrome_path = "/usr/bin/chromium"
            "#
        )
        .unwrap();
        let config = Config::new(file.path()).unwrap();
        assert_eq!(config.main_dir, PathBuf::from("out"));
        assert_eq!(config.browser.max_consecutive_fails, 5);
        assert_eq!(config.browser.window_size, (800, 600));
        assert_eq!(config.static_scan_limit, 100);
        assert_eq!(config.browser.img_per_row, 5);
        assert_eq!(config.browser.max_show_more, 10);
        assert_eq!(
            config.browser.chrome_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert!(config.browser.sandbox);
    }

    #[test]
    fn missing_file() {
        assert!(Config::new("/nonexistent/imgscrape.toml").is_err());
    }

    #[test]
    fn thumbnail_xpath() {
        let browser = Browser::default();
        assert_eq!(
            browser.thumbnail_xpath(12),
            r#"//*[@id="islrg"]/div[1]/div[12]/a[1]/div[1]/img"#
        );
    }
}
