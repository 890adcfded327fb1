use super::{Browser, BrowserError, By, Element};
use crate::config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use tokio::task::block_in_place;

/// 元素句柄对应的 DOM 属性
const HANDLE_ATTR: &str = "data-imgscrape";

/// 通过 DevTools 协议控制的 Chrome
///
/// 未指定 `chrome_path` 时自动查找本机的 Chrome，找不到则下载一份 Chromium
pub struct Chrome {
    tab: Arc<Tab>,
    _browser: headless_chrome::Browser,
}

impl Chrome {
    pub fn launch(config: &config::Browser, user_agent: &str) -> Result<Self> {
        let user_agent = format!("--user-agent={}", user_agent);
        let options = LaunchOptions {
            headless: config.headless,
            sandbox: config.sandbox,
            window_size: Some(config.window_size),
            path: config.chrome_path.clone(),
            args: vec![OsStr::new(&user_agent)],
            ..LaunchOptions::default()
        };
        let browser = headless_chrome::Browser::new(options).context("无法启动 Chrome")?;
        let tab = browser.new_tab().context("无法打开标签页")?;
        debug!("Chrome 已启动");
        Ok(Self {
            tab,
            _browser: browser,
        })
    }

    /// 执行脚本，脚本需返回 JSON 字符串
    fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let object = block_in_place(|| self.tab.evaluate(script, false)).map_err(driver)?;
        match object.value {
            Some(Value::String(text)) => {
                serde_json::from_str(&text).map_err(|e| BrowserError::Script(e.to_string()))
            }
            other => Err(BrowserError::Script(format!("意外的返回值 {:?}", other))),
        }
    }
}

fn driver<E: std::fmt::Display>(e: E) -> BrowserError {
    BrowserError::Driver(format!("{:#}", e))
}

fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}

/// 返回匹配元素数组的 JS 表达式
fn locate(by: &By) -> String {
    match by {
        By::XPath(xpath) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()",
            js_string(xpath)
        ),
        By::ClassName(class) => format!(
            "Array.from(document.getElementsByClassName({}))",
            js_string(class)
        ),
    }
}

/// 给匹配的元素打上编号，返回编号列表
fn mark_script(by: &By) -> String {
    format!(
        "JSON.stringify({}.map(el => {{ \
         window.__imgscrape = (window.__imgscrape || 0) + 1; \
         const id = String(window.__imgscrape); el.setAttribute('{}', id); return id; }}))",
        locate(by),
        HANDLE_ATTR
    )
}

fn lookup(element: &Element) -> String {
    format!(
        "document.querySelector({})",
        js_string(&format!("[{}=\"{}\"]", HANDLE_ATTR, element.0))
    )
}

/// 点击前检查元素是否可见、是否被其他元素遮挡
fn click_script(element: &Element) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return JSON.stringify('missing'); \
         el.scrollIntoView({{block: 'center'}}); const r = el.getBoundingClientRect(); \
         if (r.width === 0 || r.height === 0) return JSON.stringify('hidden'); \
         const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
         if (top && top !== el && !el.contains(top)) return JSON.stringify('intercepted'); \
         el.click(); return JSON.stringify('ok'); }})()",
        lookup(element)
    )
}

/// 优先读取 DOM 属性（如 src 会得到绝对地址），没有再读 HTML 属性
fn attribute_script(element: &Element, name: &str) -> String {
    format!(
        "(() => {{ const el = {}; const name = {}; \
         if (!el) return JSON.stringify({{found: false, value: null}}); \
         const v = (name in el) ? el[name] : el.getAttribute(name); \
         return JSON.stringify({{found: true, value: v == null ? null : String(v)}}); }})()",
        lookup(element),
        js_string(name)
    )
}

fn click_outcome(outcome: &str, element: &Element) -> Result<(), BrowserError> {
    let id = element.0.clone();
    match outcome {
        "ok" => Ok(()),
        "missing" => Err(BrowserError::NoSuchElement(id)),
        "intercepted" => Err(BrowserError::ClickIntercepted(id)),
        "hidden" => Err(BrowserError::NotInteractable(id)),
        other => Err(BrowserError::Script(format!("未知的点击结果 {}", other))),
    }
}

#[derive(Debug, Deserialize)]
struct Attribute {
    found: bool,
    value: Option<String>,
}

fn by_name(by: &By) -> String {
    match by {
        By::XPath(xpath) => xpath.clone(),
        By::ClassName(class) => format!(".{}", class),
    }
}

#[async_trait]
impl Browser for Chrome {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        block_in_place(|| -> Result<()> {
            self.tab.navigate_to(url)?.wait_until_navigated()?;
            Ok(())
        })
        .map_err(driver)
    }

    async fn find_element(&self, by: &By) -> Result<Element, BrowserError> {
        self.find_elements(by)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NoSuchElement(by_name(by)))
    }

    async fn find_elements(&self, by: &By) -> Result<Vec<Element>, BrowserError> {
        let ids: Vec<String> = self.eval(&mark_script(by))?;
        Ok(ids.into_iter().map(Element).collect())
    }

    async fn click(&self, element: &Element) -> Result<(), BrowserError> {
        let outcome: String = self.eval(&click_script(element))?;
        click_outcome(&outcome, element)
    }

    async fn attribute(
        &self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let attribute: Attribute = self.eval(&attribute_script(element, name))?;
        if !attribute.found {
            return Err(BrowserError::NoSuchElement(element.0.clone()));
        }
        Ok(attribute.value)
    }

    async fn execute_script(&self, script: &str) -> Result<(), BrowserError> {
        block_in_place(|| self.tab.evaluate(script, false))
            .map(|_| ())
            .map_err(driver)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        block_in_place(|| self.tab.close(false))
            .map(|_| ())
            .map_err(driver)?;
        debug!("Chrome 标签页已关闭");
        Ok(())
    }
}
