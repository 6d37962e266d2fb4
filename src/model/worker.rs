// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/model/worker.rs - 独占推理线程
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

//! 推理后端只在一个专用线程上创建和运行，其他线程通过通道提交请求，
//! 每个请求携带自己的应答通道。后端因此不必是 `Send` 或 `Sync`，
//! 同一时刻最多只有一次 [`InferBackend::run`] 在执行。

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{error, info, warn};

use super::ModelError;

/// 只在推理线程上使用的后端
pub trait InferBackend {
  type Input: Send + 'static;
  type Output: Send + 'static;

  fn run(&mut self, input: &Self::Input) -> Result<Self::Output, String>;
}

struct Job<I, O> {
  input: I,
  reply: Sender<Result<O, String>>,
}

/// 串行推理执行器，可在线程间共享
pub struct InferWorker<I, O> {
  jobs: Sender<Job<I, O>>,
}

impl<I: Send + 'static, O: Send + 'static> InferWorker<I, O> {
  /// 启动名为 `name` 的推理线程，`init` 在该线程内构建后端
  ///
  /// 后端就绪后才返回；初始化失败时返回 [`ModelError::Load`]。
  pub fn spawn<B, F>(name: &str, init: F) -> Result<Self, ModelError>
  where
    B: InferBackend<Input = I, Output = O>,
    F: FnOnce() -> Result<B, String> + Send + 'static,
  {
    let (jobs, job_rx) = mpsc::channel::<Job<I, O>>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    thread::Builder::new()
      .name(name.to_string())
      .spawn(move || {
        let mut backend = match init() {
          Ok(backend) => {
            let _ = ready_tx.send(Ok(()));
            backend
          }
          Err(e) => {
            error!("推理后端初始化失败: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
          }
        };
        serve_jobs(&mut backend, job_rx);
      })
      .map_err(|e| ModelError::Load(e.to_string()))?;

    match ready_rx.recv() {
      Ok(Ok(())) => {
        info!("推理线程 {} 就绪", name);
        Ok(Self { jobs })
      }
      Ok(Err(msg)) => Err(ModelError::Load(msg)),
      Err(_) => Err(ModelError::Load("推理线程意外退出".to_string())),
    }
  }

  /// 提交一次推理并等待结果
  pub fn submit(&self, input: I) -> Result<O, ModelError> {
    let (reply, reply_rx) = mpsc::channel();
    self
      .jobs
      .send(Job { input, reply })
      .map_err(|_| ModelError::WorkerGone)?;

    reply_rx
      .recv()
      .map_err(|_| ModelError::WorkerGone)?
      .map_err(ModelError::Inference)
  }
}

fn serve_jobs<B: InferBackend>(backend: &mut B, jobs: Receiver<Job<B::Input, B::Output>>) {
  for job in jobs {
    let reply = backend.run(&job.input).inspect_err(|e| error!("推理失败: {}", e));
    if job.reply.send(reply).is_err() {
      warn!("推理结果无人接收");
    }
  }
  info!("推理线程退出");
}
