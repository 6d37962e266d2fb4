// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/counter.rs - 目标计数
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  model::{ModelError, ModelHandle},
  output::draw::Draw,
};

pub const DEFAULT_TARGET_CLASS: &str = "sheep";

#[derive(Error, Debug)]
pub enum CountError {
  #[error("无效的帧尺寸: {width}x{height}")]
  InvalidFrame { width: u32, height: u32 },
  #[error("模型推理失败: {0}")]
  ModelInference(#[from] ModelError),
}

/// 对单帧运行检测并统计目标类别数量
pub struct ObjectCounter {
  model: ModelHandle,
  target_class: String,
  draw: Draw,
}

impl ObjectCounter {
  pub fn new(model: ModelHandle, target_class: impl Into<String>, draw: Draw) -> Self {
    Self {
      model,
      target_class: target_class.into(),
      draw,
    }
  }

  pub fn target_class(&self) -> &str {
    &self.target_class
  }

  /// 返回目标数量与标注后的帧
  ///
  /// 只统计标签与目标类别完全一致的检测框，但所有检测框都会被绘制。
  pub fn count_target(&self, frame: &RgbImage) -> Result<(u32, RgbImage), CountError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
      return Err(CountError::InvalidFrame { width, height });
    }

    let result = self.model.infer(frame)?;
    let count = result.count_label(&self.target_class) as u32;
    debug!(
      "检测到 {} 个物体，其中 {} 个 {}",
      result.len(),
      count,
      self.target_class
    );

    let annotated = self.draw.annotate(frame, &result);
    Ok((count, annotated))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::fake::{COW, PERSON, SHEEP, ScriptedModel};
  use image::Rgb;

  fn frame() -> RgbImage {
    RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]))
  }

  #[test]
  fn counts_only_the_target_class() {
    let model = ScriptedModel::always(vec![SHEEP, SHEEP, COW, PERSON, SHEEP]);
    let counter = ObjectCounter::new(model, DEFAULT_TARGET_CLASS, Draw::default());

    let (count, annotated) = counter.count_target(&frame()).unwrap();
    assert_eq!(count, 3);
    assert_eq!(annotated.dimensions(), (64, 48));
    assert_ne!(annotated, frame());
  }

  #[test]
  fn other_target_classes_are_configurable() {
    let model = ScriptedModel::always(vec![SHEEP, COW, COW]);
    let counter = ObjectCounter::new(model, "cow", Draw::default());
    assert_eq!(counter.count_target(&frame()).unwrap().0, 2);
  }

  #[test]
  fn nothing_detected_returns_unchanged_frame() {
    let counter = ObjectCounter::new(ScriptedModel::always(vec![]), "sheep", Draw::default());
    let (count, annotated) = counter.count_target(&frame()).unwrap();
    assert_eq!(count, 0);
    assert_eq!(annotated, frame());
  }

  #[test]
  fn empty_frame_is_rejected() {
    let counter = ObjectCounter::new(ScriptedModel::always(vec![SHEEP]), "sheep", Draw::default());
    let err = counter.count_target(&RgbImage::new(0, 10)).unwrap_err();
    assert!(matches!(err, CountError::InvalidFrame { width: 0, height: 10 }));
  }

  #[test]
  fn model_failures_propagate() {
    let counter = ObjectCounter::new(ScriptedModel::failing("npu busy"), "sheep", Draw::default());
    let err = counter.count_target(&frame()).unwrap_err();
    assert!(matches!(err, CountError::ModelInference(_)));
    assert!(err.to_string().contains("npu busy"));
  }
}
