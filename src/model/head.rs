// 该文件是 Yangqun （羊群计数） 项目的一部分。
// src/model/head.rs - YOLO26 检测头解码
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

//! YOLO26 输出为三个检测头，每个检测头包含一个回归张量（4 × H × W）
//! 与一个分类张量（80 × H × W）。YOLO26 是端到端模型，无需 NMS。

use tracing::{debug, error};

use crate::model::{DetectItem, DetectResult, WithLabel};

pub const YOLO26_NUM_OUTPUTS: usize = 6;
pub const YOLO26_CLASS_NUM: usize = 80;
pub const YOLO26_INPUT_W: f32 = 640.0;
pub const YOLO26_INPUT_H: f32 = 640.0;
pub const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
pub const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
pub const YOLO26_OBJECT_THRESH: f32 = 0.5;

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
  head_idx: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Some((tensor2, tensor1))
  } else {
    error!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}, 期望分类: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected,
      cls_expected
    );
    None
  }
}

/// 将六个输出张量解码为归一化坐标的检测结果
pub fn decode_heads<T: WithLabel, O: AsRef<[f32]>>(outputs: &[O]) -> DetectResult<T> {
  let mut items = Vec::new();

  for (head_idx, (&(map_h, map_w), stride)) in
    YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
  {
    let spatial = map_h * map_w;
    let reg_expected = 4 * spatial;
    let cls_expected = YOLO26_CLASS_NUM * spatial;

    let (Some(tensor1), Some(tensor2)) = (outputs.get(head_idx * 2), outputs.get(head_idx * 2 + 1))
    else {
      error!("缺少检测头 {} 的输出张量", head_idx);
      continue;
    };

    let Some((reg, cls)) = match_reg_cls_tensors(
      tensor1.as_ref(),
      tensor2.as_ref(),
      reg_expected,
      cls_expected,
      head_idx,
    ) else {
      continue;
    };

    for h in 0..map_h {
      for w in 0..map_w {
        let idx = h * map_w + w;

        let (score, class_id) = {
          let mut max_logit = f32::MIN;
          let mut cls_idx = 0usize;
          for c in 0..YOLO26_CLASS_NUM {
            let logit = cls[c * spatial + idx];
            if logit > max_logit {
              max_logit = logit;
              cls_idx = c;
            }
          }
          (sigmoid(max_logit), cls_idx as u32)
        };

        if score <= YOLO26_OBJECT_THRESH {
          continue;
        }

        let grid_x = (w as f32) + 0.5;
        let grid_y = (h as f32) + 0.5;

        let xmin = ((grid_x - reg[idx]) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymin = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_H);
        let xmax = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymax = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_H);

        items.push(DetectItem {
          kind: T::from_label_id(class_id),
          score,
          bbox: [
            xmin / YOLO26_INPUT_W,
            ymin / YOLO26_INPUT_H,
            xmax / YOLO26_INPUT_W,
            ymax / YOLO26_INPUT_H,
          ],
        });
      }
    }
  }

  debug!("检测到 {} 个物体", items.len());
  DetectResult::from(items)
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
