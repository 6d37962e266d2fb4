// 该文件是 Yangqun （羊群计数） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use yangqun::{
  counter::ObjectCounter,
  input::MediaError,
  model::{CocoLabel, DetectItem, DetectResult, Model, ModelError, ModelHandle, WithLabel},
  output::{FrameSink, draw::Draw},
};

pub const SHEEP: u32 = 18;
pub const DOG: u32 = 16;

/// 按调用次数依次返回羊的数量，用完后重复最后一个
pub struct FlockModel {
  counts: Vec<usize>,
  extra: Vec<u32>,
  calls: Mutex<usize>,
}

impl FlockModel {
  pub fn counts(counts: &[usize]) -> ModelHandle {
    Arc::new(Self {
      counts: counts.to_vec(),
      extra: Vec::new(),
      calls: Mutex::new(0),
    })
  }

  /// 每次返回 `sheep` 只羊外加若干其他类别
  pub fn with_others(sheep: usize, others: &[u32]) -> ModelHandle {
    Arc::new(Self {
      counts: vec![sheep],
      extra: others.to_vec(),
      calls: Mutex::new(0),
    })
  }
}

impl Model<CocoLabel> for FlockModel {
  fn infer(&self, _image: &RgbImage) -> Result<DetectResult<CocoLabel>, ModelError> {
    let call = {
      let mut calls = self.calls.lock().unwrap();
      *calls += 1;
      *calls - 1
    };
    let sheep = self
      .counts
      .get(call)
      .or(self.counts.last())
      .copied()
      .unwrap_or(0);

    let classes = std::iter::repeat_n(SHEEP, sheep).chain(self.extra.iter().copied());
    let items = classes
      .enumerate()
      .map(|(i, class)| {
        let x = (i % 6) as f32 * 0.15;
        DetectItem {
          kind: CocoLabel::from_label_id(class),
          score: 0.8,
          bbox: [x, 0.2, x + 0.1, 0.4],
        }
      })
      .collect::<Vec<_>>();
    Ok(DetectResult::from(items))
  }
}

pub struct BrokenModel;

impl Model<CocoLabel> for BrokenModel {
  fn infer(&self, _image: &RgbImage) -> Result<DetectResult<CocoLabel>, ModelError> {
    Err(ModelError::Inference("NPU 不可用".into()))
  }
}

pub fn counter(model: ModelHandle) -> ObjectCounter {
  ObjectCounter::new(model, "sheep", Draw::default())
}

pub fn pasture(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, 140, (y % 256) as u8]))
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
  let mut bytes = std::io::Cursor::new(Vec::new());
  image
    .write_to(&mut bytes, image::ImageFormat::Png)
    .unwrap();
  bytes.into_inner()
}

/// 把帧保存在内存中的写入器
#[derive(Default)]
pub struct MemorySink {
  pub frames: Vec<RgbImage>,
  pub finished: bool,
}

impl FrameSink for MemorySink {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), MediaError> {
    self.frames.push(image.clone());
    Ok(())
  }

  fn finish(&mut self) -> Result<(), MediaError> {
    self.finished = true;
    Ok(())
  }
}
