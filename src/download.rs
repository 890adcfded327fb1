use crate::client::send;
use crate::utils::url_extension;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use std::path::{Path, PathBuf};

/// 下载单张图片，解码后保存为 `{save_dir}/{filename}.{扩展名}`
pub async fn download_single_image(
    client: &Client,
    url: &str,
    save_dir: &Path,
    filename: &str,
) -> Result<PathBuf> {
    debug!("下载图片中：{}", url);
    let bytes = send!(client.get(url))?.bytes().await?;
    let image = image::load_from_memory(&bytes).with_context(|| format!("无法解码图片 {}", url))?;

    // 链接里可能是 .php、.aspx 之类的扩展名，此时按文件内容判断格式
    let known = url_extension(url).filter(|ext| ImageFormat::from_extension(ext).is_some());
    let extension = match known {
        Some(ext) => ext,
        None => {
            let format = image::guess_format(&bytes)?;
            format.extensions_str()[0].to_owned()
        }
    };
    // jpeg 不支持透明通道
    let image = match extension.as_str() {
        "jpg" | "jpeg" => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    let path = save_dir.join(format!("{}.{}", filename, extension));
    image
        .save(&path)
        .with_context(|| format!("无法保存图片 {}", path.display()))?;
    trace!("已保存：{}", path.display());
    Ok(path)
}

/// 依次下载所有图片，返回成功的数量
///
/// 第 i 张图片命名为 `{prefix}_{i}`，失败的图片直接跳过，不影响后续下载
pub async fn download_images(
    client: &Client,
    links: &[String],
    prefix: &str,
    save_dir: &Path,
) -> usize {
    let mut count = 0;
    for (idx, link) in links.iter().enumerate() {
        let filename = format!("{}_{}", prefix, idx + 1);
        match download_single_image(client, link, save_dir, &filename).await {
            Ok(_) => count += 1,
            Err(e) => error!("下载失败 {}：{:#}", link, e),
        }
        info!("已成功下载 {} / {} 张图片", count, links.len());
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageOutputFormat, Rgba, RgbaImage};
    use mockito::Server;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 128])));
        let mut buf = Cursor::new(vec![]);
        image.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn skips_failed_downloads() {
        let mut server = Server::new_async().await;
        let _a = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_body(png_bytes())
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/missing.png")
            .with_status(404)
            .create_async()
            .await;
        let _c = server
            .mock("GET", "/c.jpg")
            .with_status(200)
            .with_body(png_bytes())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let links = vec![
            format!("{}/a.png", server.url()),
            format!("{}/missing.png", server.url()),
            format!("{}/c.jpg", server.url()),
        ];
        let count = download_images(&Client::new(), &links, "cats", dir.path()).await;

        assert_eq!(count, 2);
        assert!(dir.path().join("cats_1.png").exists());
        assert!(!dir.path().join("cats_2.png").exists());
        assert!(dir.path().join("cats_3.jpg").exists());
        let saved = image::open(dir.path().join("cats_3.jpg")).unwrap();
        assert_eq!(saved.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn malformed_and_undecodable_links() {
        let mut server = Server::new_async().await;
        let _text = server
            .mock("GET", "/page.png")
            .with_status(200)
            .with_body("<html>not an image</html>")
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/ok.png")
            .with_status(200)
            .with_body(png_bytes())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let links = vec![
            "not a url".to_owned(),
            format!("{}/page.png", server.url()),
            format!("{}/ok.png", server.url()),
        ];
        let count = download_images(&Client::new(), &links, "x", dir.path()).await;
        assert_eq!(count, 1);
        assert!(dir.path().join("x_3.png").exists());
    }

    #[tokio::test]
    async fn detects_extension_from_content() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/images")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(png_bytes())
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/images?id=42", server.url());
        let path = download_single_image(&Client::new(), &url, dir.path(), "dogs_1")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("dogs_1.png"));
    }

    #[tokio::test]
    async fn script_extension_uses_content_format() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/render.php")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(png_bytes())
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/render.php?img=7", server.url());
        let path = download_single_image(&Client::new(), &url, dir.path(), "dogs_2")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("dogs_2.png"));
        assert!(!dir.path().join("dogs_2.php").exists());
    }

    #[tokio::test]
    async fn empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(download_images(&Client::new(), &[], "x", dir.path()).await, 0);
    }
}
