// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/pipeline.rs - 检测流程
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

//! 将一次上传的媒体文件变为 [`DetectionOutcome`]。
//!
//! 图像走 [`OneShotTask`]，视频走 [`ContinuousTask`]。失败时直接返回错误，
//! 已经写出的部分结果文件不做清理。

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  aggregate::FrameStat,
  counter::{CountError, ObjectCounter},
  input::{FrameSource, MediaError, open_video},
  output::{FrameSink, create_video_sink, image_output_path, video_output_path},
  task::{ContinuousTask, OneShotTask, Task},
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error(transparent)]
  Media(#[from] MediaError),
  #[error(transparent)]
  Count(#[from] CountError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
  pub count: u32,
  pub processing_time: f64,
  #[serde(skip)]
  pub annotated: RgbImage,
  #[serde(skip)]
  pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoOutcome {
  pub count: u32,
  pub processing_time: f64,
  pub min_count: u32,
  pub max_count: u32,
  pub total_frames: u64,
  pub frame_stats: Vec<FrameStat>,
  #[serde(skip)]
  pub representative: Option<RgbImage>,
  #[serde(skip)]
  pub output_path: PathBuf,
}

/// 一次检测的结果，视频专属字段只存在于 `Video` 中
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetectionOutcome {
  Image(ImageOutcome),
  Video(VideoOutcome),
}

impl DetectionOutcome {
  pub fn count(&self) -> u32 {
    match self {
      DetectionOutcome::Image(outcome) => outcome.count,
      DetectionOutcome::Video(outcome) => outcome.count,
    }
  }

  pub fn processing_time(&self) -> f64 {
    match self {
      DetectionOutcome::Image(outcome) => outcome.processing_time,
      DetectionOutcome::Video(outcome) => outcome.processing_time,
    }
  }

  pub fn output_path(&self) -> &Path {
    match self {
      DetectionOutcome::Image(outcome) => &outcome.output_path,
      DetectionOutcome::Video(outcome) => &outcome.output_path,
    }
  }

  pub fn is_video(&self) -> bool {
    matches!(self, DetectionOutcome::Video(_))
  }
}

/// 保留两位小数
pub fn round_seconds(seconds: f64) -> f64 {
  (seconds * 100.0).round() / 100.0
}

pub struct DetectionPipeline {
  counter: ObjectCounter,
  results_dir: PathBuf,
  frame_limit: Option<u64>,
}

impl DetectionPipeline {
  pub fn new(counter: ObjectCounter, results_dir: impl Into<PathBuf>) -> Self {
    Self {
      counter,
      results_dir: results_dir.into(),
      frame_limit: None,
    }
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.frame_limit = frame_limit;
    self
  }

  pub fn results_dir(&self) -> &Path {
    &self.results_dir
  }

  pub fn counter(&self) -> &ObjectCounter {
    &self.counter
  }

  pub fn run(&self, media_path: &Path, is_video: bool) -> Result<DetectionOutcome, DetectError> {
    let start = Instant::now();
    info!(
      "开始处理{}: {}",
      if is_video { "视频" } else { "图像" },
      media_path.display()
    );

    let result = if is_video {
      self.run_video(media_path, start).map(DetectionOutcome::Video)
    } else {
      self.run_image(media_path, start).map(DetectionOutcome::Image)
    };

    match &result {
      Ok(outcome) => info!(
        "处理完成: 数量 {}，耗时 {:.2}s，输出 {}",
        outcome.count(),
        outcome.processing_time(),
        outcome.output_path().display()
      ),
      Err(e) => warn!("处理失败 {}: {}", media_path.display(), e),
    }
    result
  }

  fn run_image(&self, media_path: &Path, start: Instant) -> Result<ImageOutcome, DetectError> {
    let output_path = image_output_path(&self.results_dir, media_path);
    let (count, annotated) = OneShotTask.run_task(media_path, &self.counter, output_path.as_path())?;

    Ok(ImageOutcome {
      count,
      processing_time: round_seconds(start.elapsed().as_secs_f64()),
      annotated,
      output_path,
    })
  }

  fn run_video(&self, media_path: &Path, start: Instant) -> Result<VideoOutcome, DetectError> {
    let mut source = open_video(media_path)?;
    let output_path = video_output_path(&self.results_dir, media_path);
    let mut sink = create_video_sink(
      &output_path,
      source.frame_rate(),
      source.width(),
      source.height(),
    )?;

    self.run_frames(source.as_mut(), sink.as_mut(), output_path, start)
  }

  /// 对任意帧源运行视频流程，结果写入 `sink`
  pub fn run_frames(
    &self,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    output_path: PathBuf,
    start: Instant,
  ) -> Result<VideoOutcome, DetectError> {
    let summary = ContinuousTask::default()
      .with_frame_limit(self.frame_limit)
      .run_task(source, &self.counter, sink)?;

    Ok(VideoOutcome {
      count: summary.mean_count,
      processing_time: round_seconds(start.elapsed().as_secs_f64()),
      min_count: summary.min_count,
      max_count: summary.max_count,
      total_frames: summary.total_frames,
      frame_stats: summary.frame_stats,
      representative: summary.representative,
      output_path,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    input::{FrameRate, ImageSequence},
    model::fake::{COW, SHEEP, ScriptedModel},
    output::draw::Draw,
  };
  use image::Rgb;

  struct NullSink;

  impl FrameSink for NullSink {
    fn write_frame(&mut self, _image: &RgbImage) -> Result<(), MediaError> {
      Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
      Ok(())
    }
  }

  fn pipeline(model: crate::model::ModelHandle, results: &Path) -> DetectionPipeline {
    DetectionPipeline::new(ObjectCounter::new(model, "sheep", Draw::default()), results)
  }

  #[test]
  fn rounds_to_two_decimals() {
    assert_eq!(round_seconds(1.23456), 1.23);
    assert_eq!(round_seconds(0.005), 0.01);
    assert_eq!(round_seconds(0.0), 0.0);
  }

  #[test]
  fn image_outcome_has_result_file() {
    let dir = tempfile::tempdir().unwrap();
    let upload = dir.path().join("flock.png");
    RgbImage::from_pixel(32, 32, Rgb([90, 120, 60])).save(&upload).unwrap();

    let results = dir.path().join("results");
    let pipeline = pipeline(ScriptedModel::always(vec![SHEEP, COW, SHEEP]), &results);
    let outcome = pipeline.run(&upload, false).unwrap();

    let DetectionOutcome::Image(image) = outcome else {
      panic!("expected an image outcome");
    };
    assert_eq!(image.count, 2);
    assert!(image.processing_time >= 0.0);
    assert_eq!(image.output_path, results.join("result_flock.png"));
    assert!(image.output_path.is_file());
  }

  #[test]
  fn unreadable_image_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(ScriptedModel::always(vec![SHEEP]), dir.path());
    let err = pipeline.run(&dir.path().join("missing.jpg"), false).unwrap_err();
    assert!(matches!(err, DetectError::Media(MediaError::UnreadableMedia(_))));
  }

  #[test]
  fn video_outcome_from_frames() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(ScriptedModel::counts(&[1, 2, 2, 5]), dir.path());
    let images = (0..4).map(|_| RgbImage::new(8, 8)).collect();
    let mut source = ImageSequence::new(images, FrameRate::default());

    let outcome = pipeline
      .run_frames(
        &mut source,
        &mut NullSink,
        dir.path().join("result_x.mp4"),
        Instant::now(),
      )
      .unwrap();

    assert_eq!(outcome.count, 2);
    assert_eq!((outcome.min_count, outcome.max_count), (1, 5));
    assert_eq!(outcome.total_frames, 4);
    assert_eq!(outcome.frame_stats.len(), 4);
    assert!(outcome.representative.is_none());

    let json = serde_json::to_value(DetectionOutcome::Video(outcome)).unwrap();
    assert_eq!(json["frame_stats"][3][1], 5);
    assert!(json.get("representative").is_none());
  }

  #[test]
  fn image_outcome_json_has_no_video_fields() {
    let outcome = DetectionOutcome::Image(ImageOutcome {
      count: 4,
      processing_time: 0.12,
      annotated: RgbImage::new(1, 1),
      output_path: PathBuf::from("static/results/result_a.jpg"),
    });
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["count"], 4);
    assert!(json.get("frame_stats").is_none());
    assert!(json.get("min_count").is_none());
    assert!(!outcome.is_video());
  }
}
