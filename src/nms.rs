// 该文件是 Xunshi （巡视） 项目的一部分。
// src/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::geometry::{Xyxy, iou};

/// 贪心非极大值抑制
///
/// 按置信度降序（稳定排序，同分保持输入顺序）遍历，保留未被抑制的框，
/// 并抑制其后所有与之 IoU 大于 `iou_threshold` 的框。
/// 返回保留框在输入序列中的下标，顺序即保留顺序。
///
/// 不区分类别：不同类别的框重叠同样会被抑制。
pub fn suppress(boxes: &[Xyxy], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
  debug_assert_eq!(boxes.len(), scores.len());
  let n = boxes.len().min(scores.len());

  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]));

  let mut removed = vec![false; n];
  let mut keep = Vec::new();

  for (pos, &i) in order.iter().enumerate() {
    if removed[i] {
      continue;
    }
    keep.push(i);
    for &j in order[pos + 1..].iter() {
      if !removed[j] && iou(&boxes[i], &boxes[j]) > iou_threshold {
        removed[j] = true;
      }
    }
  }

  keep
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> (Vec<Xyxy>, Vec<f32>) {
    let boxes = vec![
      [0.0, 0.0, 10.0, 10.0],
      [1.0, 1.0, 11.0, 11.0],
      [50.0, 50.0, 60.0, 60.0],
      [2.0, 0.0, 12.0, 10.0],
      [52.0, 51.0, 61.0, 60.0],
      [100.0, 100.0, 120.0, 120.0],
      [0.0, 5.0, 10.0, 15.0],
    ];
    let scores = vec![0.9, 0.8, 0.7, 0.95, 0.4, 0.3, 0.85];
    (boxes, scores)
  }

  #[test]
  fn keeps_highest_scores_first() {
    let (boxes, scores) = sample();
    let keep = suppress(&boxes, &scores, 0.5);
    assert_eq!(keep, vec![3, 6, 2, 5]);
  }

  #[test]
  fn equal_scores_follow_input_order() {
    let boxes = vec![[0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 10.0, 10.0], [30.0, 30.0, 40.0, 40.0]];
    let scores = vec![0.5, 0.5, 0.5];
    assert_eq!(suppress(&boxes, &scores, 0.5), vec![0, 2]);
  }

  #[test]
  fn suppression_is_idempotent() {
    let (boxes, scores) = sample();
    for threshold in [0.1, 0.3, 0.5, 0.7] {
      let keep = suppress(&boxes, &scores, threshold);
      let kept_boxes: Vec<Xyxy> = keep.iter().map(|&i| boxes[i]).collect();
      let kept_scores: Vec<f32> = keep.iter().map(|&i| scores[i]).collect();
      let again = suppress(&kept_boxes, &kept_scores, threshold);
      assert_eq!(again, (0..keep.len()).collect::<Vec<_>>());
    }
  }

  #[test]
  fn higher_threshold_never_drops_more() {
    let (boxes, scores) = sample();
    let mut last = 0;
    for step in 0..=20 {
      let threshold = step as f32 / 20.0;
      let kept = suppress(&boxes, &scores, threshold).len();
      assert!(kept >= last, "threshold {} kept {} < {}", threshold, kept, last);
      last = kept;
    }
  }

  #[test]
  fn empty_input() {
    assert!(suppress(&[], &[], 0.5).is_empty());
  }
}
