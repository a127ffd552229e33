// 该文件是 Xunshi （巡视） 项目的一部分。
// src/detector.rs - YOLO 目标检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use tracing::debug;

use crate::{
  config::DetectConfig,
  decoder,
  error::{DetectError, Result},
  frame::RawImage,
  labels::ClassNames,
  letterbox::{self, LetterboxPlan},
  model::{Detection, ImageDetections, Model},
};

/// YOLO 目标检测器
///
/// 单张图像流水线：letterbox 预处理 -> 模型推理 -> 输出解码。
/// 检测器只借用模型句柄，本身无可变状态。
pub struct YoloDetector<'m, M> {
  /// 推理后端
  model: &'m M,
  /// 阈值与输入尺寸
  config: DetectConfig,
  /// 类别名称表
  names: ClassNames,
}

impl<'m, M> YoloDetector<'m, M>
where
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  /// 创建一个新的 YOLO 检测器
  pub fn new(model: &'m M, config: DetectConfig, names: ClassNames) -> Self {
    Self {
      model,
      config,
      names,
    }
  }

  pub fn model_name(&self) -> &str {
    self.model.name()
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  /// 运行推理，返回原图坐标系中的检测结果
  pub fn detect(&self, image: &RawImage) -> Result<Vec<Detection>> {
    let now = Instant::now();

    // 预处理
    let plan = LetterboxPlan::compute(image.width(), image.height(), self.config.target_size)?;
    let input = letterbox::forward(image, &plan)?;

    // 运行推理
    let output = self.model.infer(&input).map_err(DetectError::inference)?;
    let infer_elapsed = now.elapsed();

    // 后处理
    let detections = decoder::decode(
      &output,
      self.config.conf_threshold,
      self.config.iou_threshold,
      &plan,
      &self.names,
    )?;

    debug!(
      "检测到 {} 个物体，推理耗时: {:.2?}，总耗时: {:.2?}",
      detections.len(),
      infer_elapsed,
      now.elapsed()
    );

    Ok(detections)
  }

  /// 单张图像接口的结果形态：模型名称与检测列表
  pub fn detect_image(&self, image: &RawImage) -> Result<ImageDetections> {
    Ok(ImageDetections {
      model: self.model_name().to_string(),
      detections: self.detect(image)?,
    })
  }
}
