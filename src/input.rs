// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/input.rs - 图像/视频输入
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

use image::RgbImage;
use thiserror::Error;

/// 按扩展名（不区分大小写）识别为视频的上传文件类型
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// 媒体读写错误
///
/// 读取失败统一归为 `UnreadableMedia`，底层原因保留在消息文本中。
#[derive(Error, Debug)]
pub enum MediaError {
  #[error("无法读取媒体文件: {0}")]
  UnreadableMedia(String),
  #[error("无法创建视频写入器: {0}")]
  WriterUnavailable(String),
  #[error("视频编码失败: {0}")]
  Encode(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
}

impl MediaError {
  pub fn unreadable(path: &Path, cause: impl std::fmt::Display) -> Self {
    MediaError::UnreadableMedia(format!("{}: {}", path.display(), cause))
  }
}

/// 解码后的一帧
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  /// 从 0 开始的帧序号
  pub index: u64,
  pub timestamp_ms: u64,
}

/// 帧率，以分数表示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
  pub numer: i32,
  pub denom: i32,
}

impl Default for FrameRate {
  fn default() -> Self {
    Self { numer: 30, denom: 1 }
  }
}

impl FrameRate {
  pub fn new(numer: i32, denom: i32) -> Self {
    if numer <= 0 || denom <= 0 {
      return Self::default();
    }
    Self { numer, denom }
  }

  pub fn as_f64(&self) -> f64 {
    self.numer as f64 / self.denom as f64
  }

  /// 单帧时长（纳秒）
  pub fn frame_duration_ns(&self) -> u64 {
    1_000_000_000u64 * self.denom as u64 / self.numer as u64
  }
}

/// 按顺序产出帧的视频源
pub trait FrameSource {
  fn frame_rate(&self) -> FrameRate;
  fn width(&self) -> u32;
  fn height(&self) -> u32;
  /// 读取下一帧，`Ok(None)` 表示已到流末尾
  fn read_frame(&mut self) -> Result<Option<Frame>, MediaError>;
}

/// 判断文件名是否带有视频扩展名
pub fn is_video_extension(name: impl AsRef<Path>) -> bool {
  name
    .as_ref()
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_ascii_lowercase();
      VIDEO_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

mod read_image_file;
pub use self::read_image_file::load_image;

mod image_source;
pub use self::image_source::ImageSequence;

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::VideoInput;

/// 打开视频文件作为帧源
pub fn open_video(path: &Path) -> Result<Box<dyn FrameSource>, MediaError> {
  #[cfg(feature = "gstreamer_input")]
  {
    Ok(Box::new(VideoInput::open(path)?))
  }
  #[cfg(not(feature = "gstreamer_input"))]
  {
    Err(MediaError::unreadable(path, "未启用 GStreamer 输入"))
  }
}
