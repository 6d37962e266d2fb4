// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/bin/count_file.rs - 离线统计单个图像或视频文件
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use url::Url;

use tracing::info;
use yangqun::{
  counter::{DEFAULT_TARGET_CLASS, ObjectCounter},
  input::is_video_extension,
  model::open_model,
  output::draw::Draw,
  pipeline::DetectionPipeline,
};

/// 统计单个文件中的目标数量，结果以 JSON 输出
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像或视频
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,
  /// 结果目录
  #[arg(long, value_name = "DIR", default_value = "results")]
  pub output_dir: PathBuf,

  #[arg(long, default_value = DEFAULT_TARGET_CLASS)]
  pub target_class: String,

  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 视频最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub max_frames: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入文件: {}", args.input.display());
  info!("结果目录: {}", args.output_dir.display());

  let model = open_model(&args.model)?;
  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)?,
    None => Draw::default(),
  };

  let counter = ObjectCounter::new(model, args.target_class, draw);
  let pipeline = DetectionPipeline::new(counter, &args.output_dir).with_frame_limit(args.max_frames);

  let is_video = is_video_extension(&args.input);
  let outcome = pipeline.run(&args.input, is_video)?;

  let mut report = serde_json::to_value(&outcome)?;
  if let Some(map) = report.as_object_mut() {
    map.insert("output".into(), json!(outcome.output_path().display().to_string()));
    map.insert("is_video".into(), json!(outcome.is_video()));
  }
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}
