// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/model.rs - 模型
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

use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;

/// 检测模型
///
/// 模型句柄在进程启动时构建一次，并以 `Arc` 的形式传给各个请求。
/// 实现必须保证并发调用 `infer` 是安全的：要么底层推理本身可重入，
/// 要么由实现自行串行化（例如借助 [`InferWorker`] 的独立推理线程）。
pub trait Model<T: WithLabel>: Send + Sync {
  fn infer(&self, image: &RgbImage) -> Result<DetectResult<T>, ModelError>;
}

/// 进程内共享的模型句柄
pub type ModelHandle<T = CocoLabel> = Arc<dyn Model<T>>;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("推理线程已退出")]
  WorkerGone,
  #[error("模型推理失败: {0}")]
  Inference(String),
  #[error("模型加载失败: {0}")]
  Load(String),
}

#[derive(Debug, Clone)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> Default for DetectResult<T> {
  fn default() -> Self {
    Self {
      items: Box::new([]),
    }
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<T> DetectResult<T> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl<T: WithLabel> DetectResult<T> {
  /// 统计标签名与 `label` 完全一致（区分大小写）的检测框数量
  pub fn count_label(&self, label: &str) -> usize {
    self
      .items
      .iter()
      .filter(|item| item.kind.to_label_str() == label)
      .count()
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

mod coco;
pub use self::coco::{COCO_CLASSES, CocoLabel};

pub mod head;

mod worker;
pub use self::worker::{InferBackend, InferWorker};

#[cfg(test)]
pub(crate) mod fake;

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

/// 按 URL 的 scheme 构建模型句柄，目前只支持 `yolo26://`
pub fn open_model(url: &url::Url) -> Result<ModelHandle, ModelError> {
  #[cfg(feature = "model_yolo26")]
  {
    use crate::{FromUrl, FromUrlWithScheme};

    if url.scheme() == Yolo26Builder::SCHEME {
      let model = Yolo26Builder::from_url(url)
        .and_then(Yolo26Builder::build)
        .map_err(|e| ModelError::Load(e.to_string()))?;
      return Ok(Arc::new(model));
    }
  }
  Err(ModelError::Load(format!("不支持的模型地址: {}", url)))
}
