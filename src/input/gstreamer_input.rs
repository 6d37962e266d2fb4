// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频文件输入
//!
//! 管道结构：
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! 打开时先将管道置于 `Paused` 状态完成预滚，从预滚样本中读取分辨率与帧率；
//! 预滚失败即视为文件无法读取。appsink 关闭同步且不丢帧，逐帧拉取直到 EOS。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good gstreamer1.0-libav
//! ```

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::input::{Frame, FrameRate, FrameSource, MediaError};

const PREROLL_TIMEOUT_SECS: u64 = 30;

/// 基于 GStreamer 的视频文件读取器
///
/// 管道在 `Drop` 时停止，任何提前返回都会释放解码资源。
pub struct VideoInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  rate: FrameRate,
  width: u32,
  height: u32,
  next_index: u64,
}

impl Drop for VideoInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 输入管道失败: {}", e);
    }
  }
}

impl VideoInput {
  pub fn open(path: &Path) -> Result<Self, MediaError> {
    if !path.is_file() {
      return Err(MediaError::unreadable(path, "文件不存在"));
    }

    gst::init().map_err(|e| MediaError::unreadable(path, e))?;

    let location = path.to_string_lossy().replace('"', "\\\"");
    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false drop=false",
      location
    );
    info!("GStreamer 输入管道: {}", description);

    let pipeline = gst::parse::launch(&description)
      .map_err(|e| MediaError::unreadable(path, e))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| MediaError::unreadable(path, "无法创建管道"))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| MediaError::unreadable(path, "找不到 appsink"))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| MediaError::unreadable(path, "无法转换为 appsink"))?;

    let mut input = VideoInput {
      pipeline,
      appsink,
      rate: FrameRate::default(),
      width: 0,
      height: 0,
      next_index: 0,
    };
    input.preroll(path)?;
    Ok(input)
  }

  fn preroll(&mut self, path: &Path) -> Result<(), MediaError> {
    self
      .pipeline
      .set_state(gst::State::Paused)
      .map_err(|e| MediaError::unreadable(path, e))?;

    let (result, _, _) = self
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    result.map_err(|e| MediaError::unreadable(path, e))?;

    let sample = self
      .appsink
      .pull_preroll()
      .map_err(|e| MediaError::unreadable(path, e))?;
    let caps = sample
      .caps()
      .ok_or_else(|| MediaError::unreadable(path, "预滚样本缺少 caps"))?;
    let info =
      gst_video::VideoInfo::from_caps(caps).map_err(|e| MediaError::unreadable(path, e))?;

    let fps = info.fps();
    self.rate = FrameRate::new(fps.numer(), fps.denom());
    self.width = info.width();
    self.height = info.height();

    info!(
      "视频已打开: {}x{} @ {:.2} fps",
      self.width,
      self.height,
      self.rate.as_f64()
    );

    self
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(|e| MediaError::unreadable(path, e))?;
    Ok(())
  }
}

impl FrameSource for VideoInput {
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
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) if self.appsink.is_eos() => {
        debug!("视频读取完毕，共 {} 帧", self.next_index);
        return Ok(None);
      }
      Err(e) => return Err(MediaError::UnreadableMedia(format!("拉取视频帧失败: {}", e))),
    };

    let image = sample_to_rgb_image(&sample)?;
    let timestamp_ms = sample
      .buffer()
      .and_then(|buffer| buffer.pts())
      .map(|pts| pts.mseconds())
      .unwrap_or_else(|| self.next_index * self.rate.frame_duration_ns() / 1_000_000);

    let index = self.next_index;
    self.next_index += 1;

    Ok(Some(Frame {
      image,
      index,
      timestamp_ms,
    }))
  }
}

fn sample_to_rgb_image(sample: &gst::Sample) -> Result<RgbImage, MediaError> {
  let invalid = |msg: &str| MediaError::UnreadableMedia(msg.to_string());

  let buffer = sample.buffer().ok_or_else(|| invalid("样本中没有缓冲区"))?;
  let caps = sample.caps().ok_or_else(|| invalid("样本中没有 caps"))?;
  let info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| invalid("无法从 caps 获取视频信息"))?;

  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(invalid("不支持的视频格式"));
  }

  let width = info.width() as usize;
  let height = info.height() as usize;
  let stride = info.stride()[0] as usize;
  let row_bytes = width * 3;

  let map = buffer
    .map_readable()
    .map_err(|e| MediaError::UnreadableMedia(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();

  let expected = stride * (height.saturating_sub(1)) + row_bytes;
  if data.len() < expected {
    return Err(MediaError::UnreadableMedia(format!(
      "缓冲区大小不匹配: 期望 {} 字节, 实际 {} 字节",
      expected,
      data.len()
    )));
  }

  // RGB 行按 4 字节对齐，需要逐行拷贝去掉填充
  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + row_bytes]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| invalid("帧数据长度错误"))
}
