// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::{ImageFormat, RgbImage};
use tracing::{debug, info};

use crate::input::MediaError;

/// 保存图像，必要时创建父目录
///
/// 格式由扩展名决定；扩展名缺失或无法编码时写为 PNG，文件名保持不变。
pub fn save_image(path: &Path, image: &RgbImage) -> Result<(), MediaError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  let format = match ImageFormat::from_path(path) {
    Ok(format) if format.writing_enabled() => format,
    _ => {
      debug!("{} 的扩展名无法确定输出格式，使用 PNG", path.display());
      ImageFormat::Png
    }
  };
  image.save_with_format(path, format)?;
  info!("保存图像到文件: {}", path.display());
  Ok(())
}
