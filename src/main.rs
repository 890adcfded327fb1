#[macro_use]
extern crate log;

use crate::config::Config;
use crate::scraper::{ImageScraper, Query};
use anyhow::{bail, Result};
use getopts::{Matches, Options};
use std::env;
use std::path::Path;

mod browser;
mod client;
mod config;
mod download;
mod scan;
mod scraper;
mod utils;
mod xpath;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] QUERY...", program);
    print!("{}", opts.usage(&brief));
}

fn parse_query(matches: &Matches) -> Result<Query> {
    if matches.free.is_empty() {
        bail!("缺少搜索关键字");
    }
    let mut query = Query::new(matches.free.join(" "));
    query.save_folder_name = matches.opt_str("output");
    if let Some(n) = matches.opt_str("count") {
        query.n_images = n.parse()?;
        if query.n_images == 0 {
            bail!("图片数量必须大于 0");
        }
    }
    let extensions = matches.opt_strs("ext");
    if !extensions.is_empty() {
        query.extensions = extensions
            .into_iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
    }
    Ok(query)
}

async fn run(query: Query, config: &Config) -> Result<usize> {
    info!("关键字：{}，数量：{}", query.query, query.n_images);
    let mut scraper = ImageScraper::new(query, config).await?;
    info!(
        "找到 {} 个链接，保存到 {}",
        scraper.links().len(),
        scraper.save_dir().display()
    );
    scraper.download_all_images().await;
    Ok(scraper.count())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("imgscrape=info"))
        .init();

    let args = env::args().collect::<Vec<_>>();
    let program = args.first().cloned().unwrap_or_else(|| "imgscrape".to_owned());

    let mut opts = Options::new();
    opts.optopt("o", "output", "保存目录名，默认与关键字相同", "NAME");
    opts.optopt("n", "count", "下载图片的数量 (默认 1)", "N");
    opts.optmulti("e", "ext", "接受的扩展名，可重复 (默认 .jpg .jpeg .png)", "EXT");
    opts.optopt("c", "config", "配置文件路径", "FILE");
    opts.optflag("h", "help", "打印帮助");

    let matches = match opts.parse(args.iter().skip(1)) {
        Ok(m) => m,
        Err(e) => {
            error!("{}", e);
            print_usage(&program, &opts);
            std::process::exit(1);
        }
    };
    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    let config = match matches.opt_str("config") {
        Some(path) => Config::new(Path::new(&path)),
        None => Ok(Config::default()),
    };
    let result = match (config, parse_query(&matches)) {
        (Ok(config), Ok(query)) => run(query, &config).await,
        (Err(e), _) | (_, Err(e)) => Err(e),
    };

    match result {
        Ok(count) => info!("完成，共下载 {} 张图片", count),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
