// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use yangqun::counter::DEFAULT_TARGET_CLASS;

/// Yangqun 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "YANGQUN_BIND", default_value = "0.0.0.0:8000")]
  pub bind: SocketAddr,

  /// 模型地址，例如 yolo26:///opt/models/yolo26n.rknn
  #[arg(long, env = "YANGQUN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// SQLite 数据库地址
  #[arg(long, env = "YANGQUN_DATABASE_URL", default_value = "sqlite://yangqun.db")]
  pub database_url: String,

  /// 静态文件根目录，包含 uploads/、results/、reports/
  #[arg(long, env = "YANGQUN_STATIC_DIR", default_value = "static", value_name = "DIR")]
  pub static_dir: PathBuf,

  /// 计数的目标类别
  #[arg(long, env = "YANGQUN_TARGET_CLASS", default_value = DEFAULT_TARGET_CLASS)]
  pub target_class: String,

  /// 标注文字使用的 TTF 字体，不指定时只画框
  #[arg(long, env = "YANGQUN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 上传大小上限（MiB）
  #[arg(long, env = "YANGQUN_MAX_UPLOAD_MB", default_value_t = 512)]
  pub max_upload_mb: usize,
}

impl Args {
  pub fn max_upload_bytes(&self) -> usize {
    self.max_upload_mb.saturating_mul(1024 * 1024)
  }
}
