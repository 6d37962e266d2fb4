// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;

use crate::input::{FrameRate, MediaError};

/// 处理结果文件名前缀
pub const RESULT_PREFIX: &str = "result_";

/// 逐帧写入的视频输出
pub trait FrameSink {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), MediaError>;
  /// 结束写入并封装文件，重复调用无副作用
  fn finish(&mut self) -> Result<(), MediaError>;
}

pub mod draw;

mod codec;
pub use self::codec::{CODEC_PREFERENCE, VideoCodec, codec_candidates};

mod save_image_file;
pub use self::save_image_file::save_image;

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::VideoOutput;

/// 图像结果文件名：`result_<原文件名>`
pub fn image_output_name(media_path: &Path) -> String {
  let name = media_path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();
  format!("{}{}", RESULT_PREFIX, name)
}

/// 视频结果文件名：`result_<原文件名主干>.mp4`，与输入容器无关
pub fn video_output_name(media_path: &Path) -> String {
  let stem = media_path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  format!("{}{}.mp4", RESULT_PREFIX, stem)
}

pub fn image_output_path(results_dir: &Path, media_path: &Path) -> PathBuf {
  results_dir.join(image_output_name(media_path))
}

pub fn video_output_path(results_dir: &Path, media_path: &Path) -> PathBuf {
  results_dir.join(video_output_name(media_path))
}

/// 创建 MP4 视频写入器
pub fn create_video_sink(
  path: &Path,
  rate: FrameRate,
  width: u32,
  height: u32,
) -> Result<Box<dyn FrameSink>, MediaError> {
  #[cfg(feature = "gstreamer_output")]
  {
    Ok(Box::new(VideoOutput::open(path, rate, width, height)?))
  }
  #[cfg(not(feature = "gstreamer_output"))]
  {
    let _ = (rate, width, height);
    Err(MediaError::WriterUnavailable(format!(
      "{}: 未启用 GStreamer 输出",
      path.display()
    )))
  }
}
