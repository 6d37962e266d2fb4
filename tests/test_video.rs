// 该文件是 Yangqun （羊群计数） 项目的一部分。
// tests/test_video.rs - GStreamer 视频读写集成测试
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

#![cfg(all(feature = "gstreamer_input", feature = "gstreamer_output"))]

mod common;

use std::path::Path;

use common::{FlockModel, counter, pasture};
use yangqun::{
  input::{FrameRate, FrameSource, VideoInput},
  output::{CODEC_PREFERENCE, FrameSink, VideoOutput},
  pipeline::{DetectionOutcome, DetectionPipeline},
};

// 62 * 3 字节的行不是 4 的倍数，读写两端都要处理行跨度
const WIDTH: u32 = 62;
const HEIGHT: u32 = 46;
const FRAMES: usize = 12;

fn write_clip(path: &Path) {
  let mut output = VideoOutput::open(path, FrameRate::new(25, 1), WIDTH, HEIGHT).unwrap();
  assert!(CODEC_PREFERENCE.contains(&output.codec()));
  for i in 0..FRAMES {
    let mut frame = pasture(WIDTH, HEIGHT);
    frame.put_pixel(i as u32, 0, image::Rgb([255, 255, 255]));
    output.write_frame(&frame).unwrap();
  }
  output.finish().unwrap();
  // 重复调用不再发送 EOS
  output.finish().unwrap();
}

fn read_all(path: &Path) -> Vec<image::RgbImage> {
  let mut input = VideoInput::open(path).unwrap();
  assert_eq!((input.width(), input.height()), (WIDTH, HEIGHT));
  let mut frames = Vec::new();
  while let Some(frame) = input.read_frame().unwrap() {
    assert_eq!(frame.index as usize, frames.len());
    frames.push(frame.image);
  }
  frames
}

#[test]
fn written_clip_reads_back_frame_for_frame() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("clip.mp4");
  write_clip(&path);

  assert!(std::fs::metadata(&path).unwrap().len() > 0);
  let input = VideoInput::open(&path).unwrap();
  assert!((input.frame_rate().as_f64() - 25.0).abs() < 0.01);
  drop(input);

  let frames = read_all(&path);
  assert_eq!(frames.len(), FRAMES);
  assert!(frames.iter().all(|f| f.dimensions() == (WIDTH, HEIGHT)));
}

#[test]
fn video_pipeline_counts_every_decoded_frame() {
  let dir = tempfile::tempdir().unwrap();
  let clip = dir.path().join("clip.mp4");
  write_clip(&clip);
  let upload = dir.path().join("walk.mov");
  std::fs::copy(&clip, &upload).unwrap();

  let results = dir.path().join("results");
  let pipeline = DetectionPipeline::new(counter(FlockModel::counts(&[1, 2, 3])), &results);
  let outcome = pipeline.run(&upload, true).unwrap();

  let DetectionOutcome::Video(video) = outcome else {
    panic!("expected a video outcome");
  };
  assert_eq!(video.output_path, results.join("result_walk.mp4"));
  assert_eq!(video.total_frames, FRAMES as u64);
  assert_eq!(video.frame_stats.len(), FRAMES);
  assert_eq!((video.min_count, video.max_count), (1, 3));
  assert!(video.representative.is_some());

  assert_eq!(read_all(&video.output_path).len(), FRAMES);
}

#[test]
fn dropping_mid_stream_releases_pipelines() {
  let dir = tempfile::tempdir().unwrap();
  let clip = dir.path().join("clip.mp4");
  write_clip(&clip);

  {
    let mut input = VideoInput::open(&clip).unwrap();
    assert!(input.read_frame().unwrap().is_some());
    assert!(input.read_frame().unwrap().is_some());
  }
  assert_eq!(read_all(&clip).len(), FRAMES);

  let partial = dir.path().join("partial.mp4");
  {
    let mut output = VideoOutput::open(&partial, FrameRate::default(), WIDTH, HEIGHT).unwrap();
    output.write_frame(&pasture(WIDTH, HEIGHT)).unwrap();
  }
  assert!(partial.exists());
}

#[test]
fn mismatched_frame_size_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("clip.mp4");
  let mut output = VideoOutput::open(&path, FrameRate::default(), WIDTH, HEIGHT).unwrap();
  assert!(output.write_frame(&pasture(WIDTH + 2, HEIGHT)).is_err());
}
