// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/output/codec.rs - 视频编码器选择
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

/// MP4 容器中可用的视频编码，按优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
  /// H.264，x264 编码器
  Avc1,
  /// H.264，OpenH264 编码器
  H264,
  /// MPEG-4 Part 2，libav 编码器，总是作为最后的选择
  Mp4v,
}

pub const CODEC_PREFERENCE: [VideoCodec; 3] = [VideoCodec::Avc1, VideoCodec::H264, VideoCodec::Mp4v];

impl VideoCodec {
  pub fn fourcc(&self) -> &'static str {
    match self {
      VideoCodec::Avc1 => "avc1",
      VideoCodec::H264 => "h264",
      VideoCodec::Mp4v => "mp4v",
    }
  }

  pub fn encoder(&self) -> &'static str {
    match self {
      VideoCodec::Avc1 => "x264enc",
      VideoCodec::H264 => "openh264enc",
      VideoCodec::Mp4v => "avenc_mpeg4",
    }
  }

  pub fn parser(&self) -> &'static str {
    match self {
      VideoCodec::Avc1 | VideoCodec::H264 => "h264parse",
      VideoCodec::Mp4v => "mpeg4videoparse",
    }
  }

  /// 生成 `编码器 ! 解析器` 管道片段
  ///
  /// H.264 必须经过解析器才能封装为 MP4；MPEG-4 的解析器缺失时直接连接。
  pub fn pipeline_fragment(&self, available: impl Fn(&str) -> bool) -> String {
    match self {
      VideoCodec::Avc1 => format!("{} speed-preset=fast ! {}", self.encoder(), self.parser()),
      VideoCodec::H264 => format!("{} ! {}", self.encoder(), self.parser()),
      VideoCodec::Mp4v if available(self.parser()) => {
        format!("{} ! {}", self.encoder(), self.parser())
      }
      VideoCodec::Mp4v => self.encoder().to_string(),
    }
  }

  fn is_usable(&self, available: &impl Fn(&str) -> bool) -> bool {
    match self {
      VideoCodec::Mp4v => true,
      _ => available(self.encoder()) && available(self.parser()),
    }
  }
}

/// 按优先级列出可尝试的编码，`Mp4v` 始终位于末尾
pub fn codec_candidates(available: impl Fn(&str) -> bool) -> Vec<VideoCodec> {
  CODEC_PREFERENCE
    .into_iter()
    .filter(|codec| codec.is_usable(&available))
    .collect()
}
