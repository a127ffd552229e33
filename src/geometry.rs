// 该文件是 Xunshi （巡视） 项目的一部分。
// src/geometry.rs - 边界框几何
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 边界框，[x_min, y_min, x_max, y_max]
pub type Xyxy = [f32; 4];

const IOU_EPSILON: f32 = 1e-9;

/// 中心点形式 (x, y, w, h) 转为角点形式
pub fn xywh_to_xyxy(x: f32, y: f32, w: f32, h: f32) -> Xyxy {
  [x - w / 2.0, y - h / 2.0, x + w / 2.0, y + h / 2.0]
}

/// 面积，宽或高为负时视为 0
pub fn area(b: &Xyxy) -> f32 {
  (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

pub fn intersection(a: &Xyxy, b: &Xyxy) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);
  (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
}

/// 计算两个边界框的 IoU
///
/// 分母加入 1e-9，退化框（零面积）的 IoU 为 0 而不是 NaN。
pub fn iou(a: &Xyxy, b: &Xyxy) -> f32 {
  let inter = intersection(a, b);
  let union = area(a) + area(b) - inter + IOU_EPSILON;
  inter / union
}

#[cfg(test)]
mod tests {
  use super::*;

  const BOXES: [Xyxy; 6] = [
    [0.0, 0.0, 10.0, 10.0],
    [5.0, 5.0, 15.0, 15.0],
    [20.0, 20.0, 30.0, 40.0],
    [0.0, 0.0, 100.0, 1.0],
    [3.0, 3.0, 3.0, 3.0],
    [10.0, 10.0, 5.0, 5.0],
  ];

  #[test]
  fn iou_is_symmetric_and_bounded() {
    for a in BOXES.iter() {
      for b in BOXES.iter() {
        let ab = iou(a, b);
        let ba = iou(b, a);
        assert_eq!(ab, ba, "iou({:?}, {:?})", a, b);
        assert!((0.0..=1.0).contains(&ab), "iou({:?}, {:?}) = {}", a, b, ab);
      }
    }
  }

  #[test]
  fn iou_with_itself_is_one() {
    for b in BOXES.iter().take(4) {
      assert!((iou(b, b) - 1.0).abs() < 1e-6);
    }
  }

  #[test]
  fn partial_overlap() {
    // 交集 25，并集 175
    let v = iou(&BOXES[0], &BOXES[1]);
    assert!((v - 25.0 / 175.0).abs() < 1e-6);
  }

  #[test]
  fn degenerate_boxes_do_not_crash() {
    assert_eq!(area(&BOXES[4]), 0.0);
    assert_eq!(area(&BOXES[5]), 0.0);
    assert_eq!(iou(&BOXES[4], &BOXES[4]), 0.0);
    assert_eq!(iou(&BOXES[5], &BOXES[0]), 0.0);
  }

  #[test]
  fn center_to_corner() {
    assert_eq!(
      xywh_to_xyxy(320.0, 320.0, 100.0, 100.0),
      [270.0, 270.0, 370.0, 370.0]
    );
  }
}
