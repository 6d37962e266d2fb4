// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/model/yolo26.rs - RKNPU 上的 YOLO26 检测模型
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
use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  model::{
    DetectResult, InferBackend, InferWorker, Model, ModelError, WithLabel,
    head::{YOLO26_NUM_OUTPUTS, decode_heads},
  },
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_SCHEME: &str = "yolo26";
const YOLO26_THREAD: &str = "yolo26-infer";

type Yolo26Input = RgbNhwcFrame<640, 640>;
type Yolo26Output = Vec<Vec<f32>>;

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理线程启动失败: {0}")]
  WorkerInit(#[from] ModelError),
}

/// 运行在 RKNPU 上的 YOLO26 模型
///
/// RKNN 上下文只存在于 [`InferWorker`] 的推理线程中，所有请求经由通道排队，
/// 因此同一时刻最多只有一次推理在执行。
pub struct Yolo26 {
  worker: InferWorker<Yolo26Input, Yolo26Output>,
}

pub struct Yolo26Builder {
  model_path: String,
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != YOLO26_SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        YOLO26_SCHEME
      )));
    }

    Ok(Yolo26Builder {
      model_path: url.path().to_string(),
    })
  }
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = YOLO26_SCHEME;
}

impl Yolo26Builder {
  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let worker = InferWorker::spawn(YOLO26_THREAD, move || {
      load_context(&model_data)
        .map(|context| RknnBackend { context })
        .map_err(|e| e.to_string())
    })?;

    info!("模型加载完成");
    Ok(Yolo26 { worker })
  }
}

fn load_context(model_data: &[u8]) -> Result<Context, Yolo26Error> {
  info!("创建 RKNN 推理上下文");
  let context = Context::new(model_data, InitFlags::default())?;

  match context.sdk_version() {
    Ok(version) => {
      if let Ok(api_ver) = version.api_version() {
        debug!("模型 API 版本: {}", api_ver);
      }
      if let Ok(drv_ver) = version.driver_version() {
        debug!("模型驱动版本: {}", drv_ver);
      }
    }
    Err(e) => {
      error!("查询 SDK 版本失败: {}", e);
      return Err(Yolo26Error::ModelInvalid(format!("无法查询 SDK 版本: {}", e)));
    }
  }

  let num_inputs = context.num_inputs()?;
  let num_outputs = context.num_outputs()?;
  debug!("模型输入数量: {}, 输出数量: {}", num_inputs, num_outputs);

  if num_inputs != YOLO26_NUM_INPUTS {
    return Err(Yolo26Error::ModelInvalid(format!(
      "预期模型输入数量为 {}, 实际为 {}",
      YOLO26_NUM_INPUTS, num_inputs
    )));
  }

  if num_outputs as usize != YOLO26_NUM_OUTPUTS {
    return Err(Yolo26Error::ModelInvalid(format!(
      "预期模型输出数量为 {}, 实际为 {}",
      YOLO26_NUM_OUTPUTS, num_outputs
    )));
  }

  Ok(context)
}

struct RknnBackend {
  context: Context,
}

impl InferBackend for RknnBackend {
  type Input = Yolo26Input;
  type Output = Yolo26Output;

  fn run(&mut self, input: &Yolo26Input) -> Result<Yolo26Output, String> {
    run_once(&self.context, input).map_err(|e| e.to_string())
  }
}

fn run_once(context: &Context, input: &Yolo26Input) -> Result<Vec<Vec<f32>>, Yolo26Error> {
  context.set_input(0, input.as_nhwc(), TensorFormat::NHWC, TensorType::UInt8)?;
  context.run()?;
  let output = context.get_outputs()?;

  (0..YOLO26_NUM_OUTPUTS)
    .map(|idx| {
      output
        .get_f32(idx)
        .map(|data| data.to_vec())
        .map_err(Yolo26Error::from)
    })
    .collect()
}

impl<T: WithLabel> Model<T> for Yolo26 {
  fn infer(&self, image: &RgbImage) -> Result<DetectResult<T>, ModelError> {
    let outputs = self.worker.submit(Yolo26Input::from_rgb_image(image))?;
    Ok(decode_heads(&outputs))
  }
}
