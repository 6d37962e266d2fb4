// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/task.rs - 单张图像与逐帧视频任务
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
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info};

use crate::{
  aggregate::{Aggregator, VideoSummary},
  counter::ObjectCounter,
  input::{FrameSource, load_image},
  output::{FrameSink, save_image},
  pipeline::DetectError,
};

pub trait Task<I, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, counter: &ObjectCounter, output: O)
  -> Result<Self::Output, Self::Error>;
}

/// 读取一张图像，计数并保存标注结果
pub struct OneShotTask;

impl<'a> Task<&'a Path, &'a Path> for OneShotTask {
  type Output = (u32, RgbImage);
  type Error = DetectError;

  fn run_task(
    self,
    input: &'a Path,
    counter: &ObjectCounter,
    output: &'a Path,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始图像任务: {}", input.display());
    let image = load_image(input)?;

    let now = Instant::now();
    let (count, annotated) = counter.count_target(&image)?;
    info!("推理完成，耗时: {:.2?}，{} 数量: {}", now.elapsed(), counter.target_class(), count);

    save_image(output, &annotated)?;
    Ok((count, annotated))
  }
}

/// 逐帧读取视频，计数、写出标注帧并累积统计
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_limit: Option<u64>,
}

impl ContinuousTask {
  /// 处理到指定帧数后停止
  pub fn with_frame_limit(mut self, frame_limit: Option<u64>) -> Self {
    self.frame_limit = frame_limit;
    self
  }
}

impl<'a, I, O> Task<&'a mut I, &'a mut O> for ContinuousTask
where
  I: FrameSource + ?Sized,
  O: FrameSink + ?Sized,
{
  type Output = VideoSummary;
  type Error = DetectError;

  fn run_task(
    self,
    input: &'a mut I,
    counter: &ObjectCounter,
    output: &'a mut O,
  ) -> Result<Self::Output, Self::Error> {
    info!(
      "开始视频任务: {}x{} @ {:.2} fps",
      input.width(),
      input.height(),
      input.frame_rate().as_f64()
    );

    let mut aggregator = Aggregator::new();
    let mut frame_index = 0u64;

    while let Some(frame) = input.read_frame()? {
      frame_index += 1;

      let now = Instant::now();
      let (count, annotated) = counter.count_target(&frame.image)?;
      let elapsed = now.elapsed().as_secs_f64();
      debug!(
        "第 {} 帧 ({} ms): {} 个目标，耗时 {:.3}s",
        frame_index, frame.timestamp_ms, count, elapsed
      );

      output.write_frame(&annotated)?;
      aggregator.push(frame_index, count, elapsed, annotated);

      if self.frame_limit.is_some_and(|limit| frame_index >= limit) {
        info!("达到指定帧数 {}, 停止读取", frame_index);
        break;
      }
    }

    output.finish()?;
    info!("视频任务完成，共 {} 帧", aggregator.len());
    Ok(aggregator.finish())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    input::{FrameRate, ImageSequence, MediaError},
    model::fake::ScriptedModel,
    output::draw::Draw,
  };

  #[derive(Default)]
  struct RecordingSink {
    frames: Vec<RgbImage>,
    finished: usize,
  }

  impl FrameSink for RecordingSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<(), MediaError> {
      self.frames.push(image.clone());
      Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
      self.finished += 1;
      Ok(())
    }
  }

  fn frames(n: usize) -> ImageSequence {
    let images = (0..n).map(|_| RgbImage::new(32, 24)).collect();
    ImageSequence::new(images, FrameRate::new(25, 1))
  }

  #[test]
  fn video_task_writes_every_frame_and_summarizes() {
    let counter = ObjectCounter::new(ScriptedModel::counts(&[2, 4, 3]), "sheep", Draw::default());
    let mut source = frames(3);
    let mut sink = RecordingSink::default();

    let summary = ContinuousTask::default()
      .run_task(&mut source, &counter, &mut sink)
      .unwrap();

    assert_eq!(sink.frames.len(), 3);
    assert_eq!(sink.finished, 1);
    assert_eq!(summary.total_frames, 3);
    assert_eq!((summary.min_count, summary.max_count, summary.mean_count), (2, 4, 3));
    let stats: Vec<_> = summary.frame_stats.iter().map(|s| (s.0, s.1)).collect();
    assert_eq!(stats, vec![(1, 2), (2, 4), (3, 3)]);
    assert!(summary.frame_stats.iter().all(|s| s.2 >= 0.0));
  }

  #[test]
  fn frame_limit_stops_early() {
    let counter = ObjectCounter::new(ScriptedModel::counts(&[1]), "sheep", Draw::default());
    let mut source = frames(12);
    let mut sink = RecordingSink::default();

    let summary = ContinuousTask::default()
      .with_frame_limit(Some(5))
      .run_task(&mut source, &counter, &mut sink)
      .unwrap();

    assert_eq!(summary.total_frames, 5);
    assert_eq!(sink.frames.len(), 5);
  }

  #[test]
  fn model_failure_aborts_without_finishing() {
    let counter = ObjectCounter::new(ScriptedModel::failing("boom"), "sheep", Draw::default());
    let mut source = frames(3);
    let mut sink = RecordingSink::default();

    let err = ContinuousTask::default()
      .run_task(&mut source, &counter, &mut sink)
      .unwrap_err();

    assert!(matches!(err, DetectError::Count(_)));
    assert_eq!(sink.finished, 0);
  }

  #[test]
  fn image_task_saves_annotated_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out").join("result_in.png");
    RgbImage::new(16, 16).save(&input).unwrap();

    let counter = ObjectCounter::new(ScriptedModel::counts(&[2]), "sheep", Draw::default());
    let (count, annotated) = OneShotTask
      .run_task(input.as_path(), &counter, output.as_path()).unwrap();

    assert_eq!(count, 2);
    assert_eq!(annotated.dimensions(), (16, 16));
    assert!(output.is_file());
  }
}
