// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/model/fake.rs - 测试用脚本模型
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

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use image::RgbImage;

use super::{CocoLabel, DetectItem, DetectResult, Model, ModelError, ModelHandle, WithLabel};

pub const SHEEP: u32 = 18;
pub const COW: u32 = 19;
pub const PERSON: u32 = 0;

/// 按脚本依次返回检测结果的模型，脚本耗尽后重复最后一项
pub struct ScriptedModel {
  script: Mutex<VecDeque<Result<Vec<u32>, String>>>,
  last: Mutex<Result<Vec<u32>, String>>,
}

impl ScriptedModel {
  pub fn new(script: Vec<Result<Vec<u32>, String>>) -> Self {
    Self {
      script: Mutex::new(script.into()),
      last: Mutex::new(Ok(Vec::new())),
    }
  }

  pub fn always(classes: Vec<u32>) -> ModelHandle {
    Arc::new(Self::new(vec![Ok(classes)]))
  }

  pub fn counts(counts: &[usize]) -> ModelHandle {
    let script = counts.iter().map(|&n| Ok(vec![SHEEP; n])).collect();
    Arc::new(Self::new(script))
  }

  pub fn failing(message: &str) -> ModelHandle {
    Arc::new(Self::new(vec![Err(message.to_string())]))
  }
}

impl Model<CocoLabel> for ScriptedModel {
  fn infer(&self, _image: &RgbImage) -> Result<DetectResult<CocoLabel>, ModelError> {
    let step = {
      let mut script = self.script.lock().unwrap();
      let mut last = self.last.lock().unwrap();
      if let Some(step) = script.pop_front() {
        *last = step;
      }
      last.clone()
    };

    let classes = step.map_err(ModelError::Inference)?;
    let items = classes
      .into_iter()
      .enumerate()
      .map(|(i, class_id)| {
        let offset = (i % 8) as f32 * 0.1;
        DetectItem {
          kind: CocoLabel::from_label_id(class_id),
          score: 0.9,
          bbox: [offset, offset, offset + 0.15, offset + 0.15],
        }
      })
      .collect::<Vec<_>>();
    Ok(DetectResult::from(items))
  }
}
