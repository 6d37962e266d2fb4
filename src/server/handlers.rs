// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/server/handlers.rs - HTTP 接口处理
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

use std::path::Path;

use axum::{
  Json,
  extract::{Multipart, Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::{
  history::{DEFAULT_HISTORY_LIMIT, DetectionRecord, NewDetectionRecord},
  input::is_video_extension,
  pipeline::DetectionOutcome,
};

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct DetectResponse {
  pub status: &'static str,
  pub original: String,
  pub processed: String,
  pub is_video: bool,
  #[serde(flatten)]
  pub outcome: DetectionOutcome,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
  pub limit: Option<u32>,
}

/// 以随机 UUID 重命名上传文件，仅保留由字母数字组成的扩展名
pub(crate) fn upload_name(client_name: Option<&str>) -> String {
  let id = Uuid::new_v4();
  let ext = client_name
    .and_then(|name| Path::new(name).extension())
    .and_then(|ext| ext.to_str())
    .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

  match ext {
    Some(ext) => format!("{}.{}", id, ext),
    None => id.to_string(),
  }
}

pub async fn detect(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
  let mut upload = None;
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::upload(e.to_string()))?
  {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let name = upload_name(field.file_name());
    let bytes = field
      .bytes()
      .await
      .map_err(|e| ApiError::upload(e.to_string()))?;
    upload = Some((name, bytes));
    break;
  }
  let (original, bytes) =
    upload.ok_or_else(|| ApiError::upload(format!("缺少表单字段 `{}`", UPLOAD_FIELD)))?;

  let upload_path = state.layout.uploads().join(&original);
  tokio::fs::write(&upload_path, &bytes)
    .await
    .map_err(|e| ApiError::upload(e.to_string()))?;
  info!("接收上传 {}，{} 字节", original, bytes.len());

  let is_video = is_video_extension(&original);
  let pipeline = state.pipeline.clone();
  let outcome = tokio::task::spawn_blocking(move || pipeline.run(&upload_path, is_video))
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

  let processed = outcome
    .output_path()
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  state
    .store
    .append(NewDetectionRecord {
      timestamp: None,
      original_image: original.clone(),
      processed_image: processed.clone(),
      sheep_count: outcome.count(),
      processing_time: outcome.processing_time(),
    })
    .await?;

  Ok(Json(DetectResponse {
    status: "success",
    original,
    processed,
    is_video,
    outcome,
  }))
}

pub async fn history(
  State(state): State<AppState>,
  Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DetectionRecord>>, ApiError> {
  let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
  let records = state.store.list(limit).await?;
  debug!("查询历史记录 {} 条", records.len());
  Ok(Json(records))
}

pub async fn report(State(state): State<AppState>) -> Result<Response, ApiError> {
  let Some(path) = state.reports.generate().await? else {
    return Ok(
      Json(json!({
        "status": "error",
        "message": "Report generation failed",
      }))
      .into_response(),
    );
  };

  let bytes = tokio::fs::read(&path)
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?;
  let file_name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  Ok(
    (
      [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
          header::CONTENT_DISPOSITION,
          format!("attachment; filename=\"{}\"", file_name),
        ),
      ],
      bytes,
    )
      .into_response(),
  )
}

pub async fn health() -> Json<serde_json::Value> {
  Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn upload_name_keeps_extension() {
    let name = upload_name(Some("Flock Photo.JPG"));
    let (id, ext) = name.rsplit_once('.').unwrap();
    assert_eq!(ext, "JPG");
    assert!(Uuid::parse_str(id).is_ok());
  }

  #[test]
  fn upload_name_drops_odd_extensions() {
    for client in [None, Some("noext"), Some("a.b/c"), Some("clip.mp 4"), Some("x.")] {
      let name = upload_name(client);
      assert!(Uuid::parse_str(&name).is_ok(), "{:?} -> {}", client, name);
    }
  }

  #[test]
  fn upload_names_are_unique() {
    assert_ne!(upload_name(Some("a.png")), upload_name(Some("a.png")));
  }

  #[test]
  fn video_uploads_are_detected_by_extension() {
    assert!(is_video_extension(upload_name(Some("walk.MOV"))));
    assert!(!is_video_extension(upload_name(Some("walk.png"))));
  }
}
