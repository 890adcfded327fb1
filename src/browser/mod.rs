mod chrome;
mod session;

pub use chrome::Chrome;
pub use session::scrape_image_links;

use async_trait::async_trait;
use thiserror::Error;

/// 元素定位方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    XPath(String),
    ClassName(String),
}

/// 浏览器中某个元素的句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(pub String);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("element click intercepted: {0}")]
    ClickIntercepted(String),
    #[error("element not interactable: {0}")]
    NotInteractable(String),
    #[error("unexpected script result: {0}")]
    Script(String),
    #[error("browser error: {0}")]
    Driver(String),
}

/// 抓取时需要的浏览器操作
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn find_element(&self, by: &By) -> Result<Element, BrowserError>;

    async fn find_elements(&self, by: &By) -> Result<Vec<Element>, BrowserError>;

    async fn click(&self, element: &Element) -> Result<(), BrowserError>;

    /// 读取元素属性，属性不存在时返回 None
    async fn attribute(&self, element: &Element, name: &str)
        -> Result<Option<String>, BrowserError>;

    async fn execute_script(&self, script: &str) -> Result<(), BrowserError>;

    /// 结束会话，之后不能再调用其他方法
    async fn close(&self) -> Result<(), BrowserError>;
}
