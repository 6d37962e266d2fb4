// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 将标注后的帧编码为 MP4 文件：
//!
//! ```text
//! appsrc ! videoconvert ! video/x-raw,format=I420 ! <编码器> ! <解析器> ! mp4mux ! filesink
//! ```
//!
//! 编码器按 [`CODEC_PREFERENCE`](crate::output::CODEC_PREFERENCE) 顺序尝试，
//! 第一个能成功启动的管道被采用。

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  input::{FrameRate, MediaError},
  output::{FrameSink, VideoCodec, codec_candidates},
};

const FINISH_TIMEOUT_SECS: u64 = 60;

/// GStreamer MP4 写入器
///
/// `finish` 发送 EOS 并等待封装完成；未调用 `finish` 时 `Drop` 直接停止管道，
/// 已写出的部分文件保留在磁盘上。
pub struct VideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: gst_video::VideoInfo,
  codec: VideoCodec,
  rate: FrameRate,
  frame_count: u64,
  finished: bool,
}

impl Drop for VideoOutput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 视频输出管道失败: {}", e);
    }
    info!("视频输出关闭，共写入 {} 帧", self.frame_count);
  }
}

fn element_available(name: &str) -> bool {
  gst::ElementFactory::find(name).is_some()
}

impl VideoOutput {
  pub fn open(path: &Path, rate: FrameRate, width: u32, height: u32) -> Result<Self, MediaError> {
    let unavailable = |e: &dyn std::fmt::Display| {
      MediaError::WriterUnavailable(format!("{}: {}", path.display(), e))
    };

    gst::init().map_err(|e| unavailable(&e))?;

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
      .fps(gst::Fraction::new(rate.numer, rate.denom))
      .build()
      .map_err(|e| unavailable(&e))?;

    let mut last_error = String::from("没有可用的编码器");
    for codec in codec_candidates(element_available) {
      match Self::launch(path, codec, &info) {
        Ok((pipeline, appsrc)) => {
          info!(
            "视频输出初始化: {}x{} @ {:.2} fps, 编码 {} -> {}",
            width,
            height,
            rate.as_f64(),
            codec.fourcc(),
            path.display()
          );
          return Ok(VideoOutput {
            pipeline,
            appsrc,
            info,
            codec,
            rate,
            frame_count: 0,
            finished: false,
          });
        }
        Err(e) => {
          warn!("编码 {} 不可用: {}", codec.fourcc(), e);
          last_error = e;
        }
      }
    }

    Err(MediaError::WriterUnavailable(format!(
      "{}: {}",
      path.display(),
      last_error
    )))
  }

  fn launch(
    path: &Path,
    codec: VideoCodec,
    info: &gst_video::VideoInfo,
  ) -> Result<(gst::Pipeline, gst_app::AppSrc), String> {
    let location = path.to_string_lossy().replace('"', "\\\"");
    let description = format!(
      "appsrc name=src ! videoconvert ! video/x-raw,format=I420 ! {} ! mp4mux ! filesink location=\"{}\"",
      codec.pipeline_fragment(element_available),
      location
    );
    debug!("视频输出管道: {}", description);

    let pipeline = gst::parse::launch(&description)
      .map_err(|e| e.to_string())?
      .downcast::<gst::Pipeline>()
      .map_err(|_| "无法创建管道".to_string())?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or_else(|| "找不到 appsrc".to_string())?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| "无法转换为 appsrc".to_string())?;

    let caps = info.to_caps().map_err(|e| e.to_string())?;
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    if let Err(e) = pipeline.set_state(gst::State::Playing) {
      let _ = pipeline.set_state(gst::State::Null);
      return Err(e.to_string());
    }

    Ok((pipeline, appsrc))
  }

  pub fn codec(&self) -> VideoCodec {
    self.codec
  }

  fn push_image(&mut self, image: &RgbImage) -> Result<(), MediaError> {
    let width = self.info.width();
    let height = self.info.height();
    if image.dimensions() != (width, height) {
      return Err(MediaError::Encode(format!(
        "帧尺寸 {}x{} 与输出 {}x{} 不一致",
        image.width(),
        image.height(),
        width,
        height
      )));
    }

    // 按 GStreamer 的行跨度重新排布，RGB 行需要对齐到 4 字节
    let stride = self.info.stride()[0] as usize;
    let row_bytes = width as usize * 3;
    let mut data = vec![0u8; self.info.size()];
    for (row, chunk) in image.as_raw().chunks_exact(row_bytes).enumerate() {
      let start = row * stride;
      data[start..start + row_bytes].copy_from_slice(chunk);
    }

    let duration = self.rate.frame_duration_ns();
    let mut buffer = gst::Buffer::from_mut_slice(data);
    if let Some(buffer) = buffer.get_mut() {
      buffer.set_pts(gst::ClockTime::from_nseconds(self.frame_count * duration));
      buffer.set_duration(gst::ClockTime::from_nseconds(duration));
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| MediaError::Encode(format!("推送缓冲区失败: {:?}", e)))?;
    self.frame_count += 1;
    Ok(())
  }

  fn wait_for_eos(&self) -> Result<(), MediaError> {
    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| MediaError::Encode("管道没有消息总线".to_string()))?;

    let message = bus.timed_pop_filtered(
      gst::ClockTime::from_seconds(FINISH_TIMEOUT_SECS),
      &[gst::MessageType::Eos, gst::MessageType::Error],
    );

    match message.as_ref().map(|m| m.view()) {
      Some(gst::MessageView::Eos(..)) => Ok(()),
      Some(gst::MessageView::Error(err)) => Err(MediaError::Encode(format!(
        "编码管道错误: {}",
        err.error()
      ))),
      _ => Err(MediaError::Encode("等待编码结束超时".to_string())),
    }
  }
}

impl FrameSink for VideoOutput {
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), MediaError> {
    self.push_image(image)
  }

  fn finish(&mut self) -> Result<(), MediaError> {
    if self.finished {
      return Ok(());
    }
    self.finished = true;

    self
      .appsrc
      .end_of_stream()
      .map_err(|e| MediaError::Encode(format!("发送 EOS 失败: {:?}", e)))?;
    self.wait_for_eos()?;

    self
      .pipeline
      .set_state(gst::State::Null)
      .map_err(|e| MediaError::Encode(e.to_string()))?;
    info!("视频写入完成，共 {} 帧", self.frame_count);
    Ok(())
  }
}
