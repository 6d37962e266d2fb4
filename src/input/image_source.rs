// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/input/image_source.rs - 内存图片序列输入源
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

use std::collections::VecDeque;

use image::RgbImage;

use super::{Frame, FrameRate, FrameSource, MediaError};

/// 由一组内存图片组成的帧源
///
/// 所有图片尺寸以第一张为准，适合离线处理与测试。
pub struct ImageSequence {
  images: VecDeque<RgbImage>,
  rate: FrameRate,
  width: u32,
  height: u32,
  next_index: u64,
}

impl ImageSequence {
  pub fn new(images: Vec<RgbImage>, rate: FrameRate) -> Self {
    let (width, height) = images.first().map(|i| i.dimensions()).unwrap_or((0, 0));
    Self {
      images: images.into(),
      rate,
      width,
      height,
      next_index: 0,
    }
  }
}

impl FrameSource for ImageSequence {
  fn frame_rate(&self) -> FrameRate {
    self.rate
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn read_frame(&mut self) -> Result<Option<Frame>, MediaError> {
    let Some(image) = self.images.pop_front() else {
      return Ok(None);
    };

    let index = self.next_index;
    self.next_index += 1;
    let timestamp_ms = index * self.rate.frame_duration_ns() / 1_000_000;

    Ok(Some(Frame {
      image,
      index,
      timestamp_ms,
    }))
  }
}
