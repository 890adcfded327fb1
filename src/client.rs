use crate::config::Config;
use anyhow::Result;
use reqwest::header::*;
use reqwest::redirect::Policy;
use reqwest::Client;

/// 发送请求，并把非 2xx 状态码视为错误
macro_rules! send {
    ($e:expr) => {
        $e.send()
            .await
            .and_then(reqwest::Response::error_for_status)
    };
}

pub(crate) use send;

const DEFAULT_HEADERS: [(HeaderName, &str); 4] = [
    (
        ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    (ACCEPT_LANGUAGE, "en-US,en;q=0.7"),
    (CACHE_CONTROL, "max-age=0"),
    (UPGRADE_INSECURE_REQUESTS, "1"),
];

/// 构造带有浏览器请求头和超时的 HTTP 客户端，自动跟随重定向
pub fn build_client(config: &Config) -> Result<Client> {
    let mut headers = DEFAULT_HEADERS
        .iter()
        .map(|(k, v)| (k.clone(), HeaderValue::from_static(v)))
        .collect::<HeaderMap>();
    headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

    Ok(Client::builder()
        .default_headers(headers)
        .redirect(Policy::limited(10))
        .timeout(config.http_timeout())
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn sends_user_agent_and_follows_redirect() {
        let mut server = Server::new_async().await;
        let _redirect = server
            .mock("GET", "/old")
            .with_status(302)
            .with_header("location", "/new")
            .create_async()
            .await;
        let _target = server
            .mock("GET", "/new")
            .match_header("user-agent", "imgscrape-test")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let config = Config {
            user_agent: "imgscrape-test".to_owned(),
            ..Config::default()
        };
        let client = build_client(&config).unwrap();
        let text = send!(client.get(format!("{}/old", server.url())))
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn error_status_is_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let client = build_client(&Config::default()).unwrap();
        assert!(send!(client.get(format!("{}/missing", server.url()))).is_err());
    }
}
