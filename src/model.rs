// 该文件是 Xunshi （巡视） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};

use crate::{frame::InputTensor, geometry::Xyxy};

/// 推理后端
///
/// 模型句柄由调用方持有，按引用传入流水线。
/// 实现不保证可重入时需要在内部串行化访问，ONNX 后端即以互斥锁包装会话。
pub trait Model {
  type Error;

  fn name(&self) -> &str;
  fn infer(&self, input: &InputTensor) -> Result<RawOutputTensor, Self::Error>;
}

impl<M: Model + ?Sized> Model for &M {
  type Error = M::Error;

  fn name(&self) -> &str {
    (**self).name()
  }

  fn infer(&self, input: &InputTensor) -> Result<RawOutputTensor, Self::Error> {
    (**self).infer(input)
  }
}

/// 模型原始输出，形状 (1, A, B)，{A, B} = {4 + 类别数, 候选数}
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutputTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl RawOutputTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }
}

/// 原图像素坐标系中的边界框
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl From<Xyxy> for BBox {
  fn from([x1, y1, x2, y2]: Xyxy) -> Self {
    Self { x1, y1, x2, y2 }
  }
}

impl BBox {
  pub fn to_xyxy(&self) -> Xyxy {
    [self.x1, self.y1, self.x2, self.y2]
  }

  pub fn center(&self) -> (f32, f32) {
    ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
  }

  pub fn size(&self) -> (f32, f32) {
    (self.x2 - self.x1, self.y2 - self.y1)
  }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub bbox: BBox,
  pub label: String,
  #[serde(rename = "cls_id")]
  pub class_id: usize,
  pub score: f32,
}

/// 单张图像的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetections {
  pub model: String,
  pub detections: Vec<Detection>,
}

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxModel, OnnxModelError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_serializes_with_wire_names() {
    let det = Detection {
      bbox: BBox::from([1.0, 2.0, 3.0, 4.0]),
      label: "person".to_string(),
      class_id: 0,
      score: 0.5,
    };
    let value = serde_json::to_value(&det).unwrap();
    assert_eq!(value["cls_id"], 0);
    assert_eq!(value["bbox"]["x2"], 3.0);
    assert_eq!(value["label"], "person");
  }

  #[test]
  fn bbox_center_and_size() {
    let b = BBox::from([10.0, 20.0, 30.0, 60.0]);
    assert_eq!(b.center(), (20.0, 40.0));
    assert_eq!(b.size(), (20.0, 40.0));
    assert_eq!(b.to_xyxy(), [10.0, 20.0, 30.0, 60.0]);
  }
}
