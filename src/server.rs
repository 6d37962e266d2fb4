// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::{history::HistoryStore, pipeline::DetectionPipeline, report::ReportGenerator};

mod error;
pub use self::error::ApiError;

mod handlers;
pub use self::handlers::{DetectResponse, HistoryQuery};

/// 静态目录布局：`uploads/`、`results/`、`reports/`
#[derive(Debug, Clone)]
pub struct StaticLayout {
  root: PathBuf,
}

impl StaticLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn uploads(&self) -> PathBuf {
    self.root.join("uploads")
  }

  pub fn results(&self) -> PathBuf {
    self.root.join("results")
  }

  pub fn reports(&self) -> PathBuf {
    self.root.join("reports")
  }

  /// 创建上传与结果目录，报告目录在首次生成报告时创建
  pub fn create_dirs(&self) -> std::io::Result<()> {
    std::fs::create_dir_all(self.uploads())?;
    std::fs::create_dir_all(self.results())?;
    Ok(())
  }
}

#[derive(Clone)]
pub struct AppState {
  pub pipeline: Arc<DetectionPipeline>,
  pub store: HistoryStore,
  pub reports: Arc<ReportGenerator>,
  pub layout: StaticLayout,
  pub max_upload_bytes: usize,
}

impl AppState {
  pub fn new(
    pipeline: DetectionPipeline,
    store: HistoryStore,
    layout: StaticLayout,
    max_upload_bytes: usize,
  ) -> Self {
    let target_class = pipeline.counter().target_class().to_string();
    let reports = ReportGenerator::new(store.clone(), layout.reports(), &target_class);
    Self {
      pipeline: Arc::new(pipeline),
      store,
      reports: Arc::new(reports),
      layout,
      max_upload_bytes,
    }
  }
}

pub fn create_router(state: AppState) -> Router {
  info!("静态文件目录: {}", state.layout.root().display());

  Router::new()
    .route("/detect", post(handlers::detect))
    .route("/history", get(handlers::history))
    .route("/report", get(handlers::report))
    .route("/health", get(handlers::health))
    .nest_service("/static", ServeDir::new(state.layout.root()))
    .layer(DefaultBodyLimit::max(state.max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_paths() {
    let layout = StaticLayout::new("static");
    assert_eq!(layout.uploads(), PathBuf::from("static/uploads"));
    assert_eq!(layout.results(), PathBuf::from("static/results"));
    assert_eq!(layout.reports(), PathBuf::from("static/reports"));
  }

  #[test]
  fn create_dirs_skips_reports() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StaticLayout::new(dir.path().join("static"));
    layout.create_dirs().unwrap();
    assert!(layout.uploads().is_dir());
    assert!(layout.results().is_dir());
    assert!(!layout.reports().exists());
  }
}
