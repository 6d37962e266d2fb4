// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/frame.rs - NHWC 模型输入帧定义
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
use image::imageops::{self, FilterType};

/// 固定尺寸的 RGB NHWC 帧，作为模型输入张量
#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  /// 将任意尺寸的图像直接缩放到模型输入尺寸
  ///
  /// 不保持宽高比，因此模型输出的归一化坐标可直接映射回原图。
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let data = if image.dimensions() == (W, H) {
      image.as_raw().clone()
    } else {
      imageops::resize(image, W, H, FilterType::Triangle).into_raw()
    };

    Self {
      data: data.into_boxed_slice(),
    }
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn resizes_to_model_shape() {
    let image = RgbImage::from_pixel(37, 11, Rgb([10, 20, 30]));
    let frame = RgbNhwcFrame::<16, 8>::from_rgb_image(&image);
    assert_eq!(frame.as_nhwc().len(), 16 * 8 * 3);
    assert_eq!(&frame.as_nhwc()[..3], &[10, 20, 30]);
  }

  #[test]
  fn matching_shape_is_copied_verbatim() {
    let mut image = RgbImage::new(4, 2);
    image.put_pixel(3, 1, Rgb([1, 2, 3]));
    let frame = RgbNhwcFrame::<4, 2>::from_rgb_image(&image);
    assert_eq!(&frame.as_nhwc()[(4 + 3) * 3..], &[1, 2, 3]);
  }
}
