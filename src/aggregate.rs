// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/aggregate.rs - 视频逐帧统计
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
use serde::Serialize;

/// 每隔多少帧保留一张标注帧作为代表帧
pub const REPRESENTATIVE_INTERVAL: u64 = 10;

/// 单帧统计：(帧序号, 目标数量, 检测耗时秒数)，序列化为三元数组
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameStat(pub u64, pub u32, pub f64);

impl FrameStat {
  pub fn frame_index(&self) -> u64 {
    self.0
  }

  pub fn count(&self) -> u32 {
    self.1
  }

  pub fn processing_time(&self) -> f64 {
    self.2
  }
}

#[derive(Debug, Clone, Default)]
pub struct VideoSummary {
  pub mean_count: u32,
  pub min_count: u32,
  pub max_count: u32,
  pub total_frames: u64,
  pub frame_stats: Vec<FrameStat>,
  pub representative: Option<RgbImage>,
}

/// 按帧顺序累积统计
#[derive(Debug, Default)]
pub struct Aggregator {
  frame_stats: Vec<FrameStat>,
  representative: Option<RgbImage>,
}

impl Aggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// 记录一帧，`frame_index` 从 1 开始
  pub fn push(&mut self, frame_index: u64, count: u32, elapsed: f64, annotated: RgbImage) {
    self.frame_stats.push(FrameStat(frame_index, count, elapsed));
    if frame_index % REPRESENTATIVE_INTERVAL == 0 {
      self.representative = Some(annotated);
    }
  }

  pub fn len(&self) -> usize {
    self.frame_stats.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frame_stats.is_empty()
  }

  pub fn finish(self) -> VideoSummary {
    if self.frame_stats.is_empty() {
      return VideoSummary::default();
    }

    let counts = self.frame_stats.iter().map(FrameStat::count);
    let min_count = counts.clone().min().unwrap_or(0);
    let max_count = counts.clone().max().unwrap_or(0);
    let sum: u64 = counts.map(u64::from).sum();
    let mean = sum as f64 / self.frame_stats.len() as f64;

    VideoSummary {
      mean_count: mean.round_ties_even() as u32,
      min_count,
      max_count,
      total_frames: self.frame_stats.len() as u64,
      frame_stats: self.frame_stats,
      representative: self.representative,
    }
  }
}
