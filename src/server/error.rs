// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{history::StoreError, pipeline::DetectError, report::ReportError};

/// 所有处理失败都以 `{status: "error", message}` 返回
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("上传失败: {0}")]
  Upload(String),
  #[error(transparent)]
  Detect(#[from] DetectError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Report(#[from] ReportError),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn upload(msg: impl Into<String>) -> Self {
    Self::Upload(msg.into())
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::Internal(msg.into())
  }
}

#[derive(Serialize)]
struct ErrorResponse {
  status: &'static str,
  message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    error!("请求失败: {}", self);

    let body = ErrorResponse {
      status: "error",
      message: self.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::to_bytes;

  #[tokio::test]
  async fn every_error_is_a_500_with_message() {
    let response = ApiError::upload("缺少表单字段 `file`").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "上传失败: 缺少表单字段 `file`");
  }
}
