// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/main.rs - 检测服务主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use yangqun::{
  counter::ObjectCounter,
  history::HistoryStore,
  model::open_model,
  output::draw::Draw,
  pipeline::DetectionPipeline,
  server::{AppState, StaticLayout, create_router},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("数据库: {}", args.database_url);
  info!("静态目录: {}", args.static_dir.display());
  info!("目标类别: {}", args.target_class);

  let model = open_model(&args.model)?;
  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)
      .with_context(|| format!("无法加载字体 {}", path.display()))?,
    None => Draw::default(),
  };

  let layout = StaticLayout::new(&args.static_dir);
  layout
    .create_dirs()
    .with_context(|| format!("无法创建静态目录 {}", layout.root().display()))?;

  let counter = ObjectCounter::new(model, args.target_class.clone(), draw);
  let pipeline = DetectionPipeline::new(counter, layout.results());
  let store = HistoryStore::connect(&args.database_url).await?;

  let state = AppState::new(pipeline, store.clone(), layout, args.max_upload_bytes());
  let app = create_router(state);

  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听 {}", args.bind))?;
  info!("服务启动于 http://{}", listener.local_addr()?);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  store.close().await;
  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("收到 Ctrl-C，正在关闭服务"),
    Err(e) => warn!("无法监听 Ctrl-C 信号: {}", e),
  }
}
