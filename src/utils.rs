use std::fmt::Display;
use url::Url;

/// 出错时只记录日志，不再向上传递
pub trait LogOnError<T> {
    fn log_on_error(self) -> Option<T>;
}

impl<T, E: Display> LogOnError<T> for Result<T, E> {
    fn log_on_error(self) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }
}

/// 链接是否以允许的扩展名结尾
pub fn has_extension<S: AsRef<str>>(link: &str, extensions: &[S]) -> bool {
    extensions.iter().any(|ext| link.ends_with(ext.as_ref()))
}

/// 从图片链接最后一段路径中取出扩展名，忽略查询参数
pub fn url_extension(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let name = url.path_segments()?.last()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// 还原页面脚本中被转义的字符
pub fn unescape_js(s: &str) -> String {
    s.replace("\\u003d", "=")
        .replace("\\u0026", "&")
        .replace("\\/", "/")
}
