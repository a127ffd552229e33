// 该文件是 Xunshi （巡视） 项目的一部分。
// src/decoder.rs - YOLO 输出张量解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::{
  error::{DetectError, Result},
  geometry::{Xyxy, xywh_to_xyxy},
  labels::ClassNames,
  letterbox::LetterboxPlan,
  model::{Detection, RawOutputTensor},
  nms,
};

/// 每个候选的框属性个数 (x, y, w, h)
const BOX_ATTRS: usize = 4;

/// 统一布局后的候选矩阵：每行 `4 + 类别数` 个属性
struct CandidateRows {
  attrs: usize,
  data: Vec<f32>,
}

impl CandidateRows {
  /// 校验形状并统一为 (候选数, 4 + 类别数) 布局
  ///
  /// 属性轴短于候选轴时视为 (1, 4 + 类别数, 候选数) 导出格式，转置一次；
  /// 此后的解码只面对一种布局。
  fn normalize(raw: &RawOutputTensor) -> Result<Self> {
    let shape = raw.shape.as_slice();
    let &[batch, a, b] = shape else {
      return Err(DetectError::shape(shape, "期望 3 个维度"));
    };
    if batch != 1 {
      return Err(DetectError::shape(shape, "批大小必须为 1"));
    }
    if raw.data.len() != a * b {
      return Err(DetectError::shape(
        shape,
        format!("数据长度 {} 与形状不符", raw.data.len()),
      ));
    }

    if a == 0 || b == 0 {
      debug!("输出形状 {:?} 不含候选", shape);
      return Ok(Self {
        attrs: 1,
        data: Vec::new(),
      });
    }

    // 较短的轴为属性轴；候选数少于属性数时（如只有一个候选）较短的轴
    // 容纳不下框属性，此时改以较长的轴为属性轴
    let mut transposed = a < b;
    if a.min(b) <= BOX_ATTRS {
      transposed = a > b;
    }
    let (candidates, attrs) = if transposed { (b, a) } else { (a, b) };
    if attrs <= BOX_ATTRS {
      return Err(DetectError::shape(shape, "属性轴至少需要 4 个框属性和 1 个类别"));
    }

    debug!(
      "输出形状 {:?}: {} 个候选, {} 个类别, 转置: {}",
      shape,
      candidates,
      attrs - BOX_ATTRS,
      transposed
    );

    let data = if transposed {
      let mut data = vec![0.0; raw.data.len()];
      for attr in 0..attrs {
        for cand in 0..candidates {
          data[cand * attrs + attr] = raw.data[attr * candidates + cand];
        }
      }
      data
    } else {
      raw.data.clone()
    };

    Ok(Self { attrs, data })
  }

  fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(self.attrs)
  }
}

/// 最高分及其类别，同分取最小下标；NaN 分数不参与比较
fn best_class(scores: &[f32]) -> (usize, f32) {
  let mut best = (0, f32::NAN);
  for (class_id, &score) in scores.iter().enumerate() {
    if score.is_nan() {
      continue;
    }
    if best.1.is_nan() || score > best.1 {
      best = (class_id, score);
    }
  }
  best
}

/// 解码模型原始输出为原图坐标系中的检测结果
///
/// 置信度过滤后做类别无关的 NMS，再经 letterbox 逆变换映射回原图并裁剪。
/// 结果按 NMS 保留顺序排列（置信度降序，同分按候选下标）。
pub fn decode(
  raw: &RawOutputTensor,
  conf_threshold: f32,
  iou_threshold: f32,
  plan: &LetterboxPlan,
  names: &ClassNames,
) -> Result<Vec<Detection>> {
  let rows = CandidateRows::normalize(raw)?;

  let mut boxes: Vec<Xyxy> = Vec::new();
  let mut scores = Vec::new();
  let mut classes = Vec::new();

  for row in rows.rows() {
    let (class_id, score) = best_class(&row[BOX_ATTRS..]);
    // NaN 也在此被丢弃
    if !(score >= conf_threshold) {
      continue;
    }
    let (x, y, w, h) = (row[0], row[1], row[2], row[3]);
    if !(w >= 0.0 && h >= 0.0) || !x.is_finite() || !y.is_finite() {
      continue;
    }
    boxes.push(xywh_to_xyxy(x, y, w, h));
    scores.push(score);
    classes.push(class_id);
  }

  let keep = nms::suppress(&boxes, &scores, iou_threshold);
  debug!(
    "置信度过滤后 {} 个候选, NMS 后保留 {} 个",
    boxes.len(),
    keep.len()
  );

  Ok(
    keep
      .into_iter()
      .map(|i| Detection {
        bbox: plan.inverse(&boxes[i]).into(),
        label: names.label(classes[i]).to_string(),
        class_id: classes[i],
        score: scores[i],
      })
      .collect(),
  )
}
