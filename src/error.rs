// 该文件是 Xunshi （巡视） 项目的一部分。
// src/error.rs - 检测流水线错误
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 检测流水线错误
///
/// 类别未知不属于错误：标签会退化为 `"unknown"`，结果照常返回。
#[derive(Error, Debug)]
pub enum DetectError {
  /// 图像或参数非法（零尺寸、缓冲区长度不符等），不重试
  #[error("输入无效: {0}")]
  InvalidInput(String),
  /// 模型输出张量形状与解码器不匹配
  #[error("模型输出形状异常: {shape:?}, {reason}")]
  UnexpectedShape { shape: Vec<usize>, reason: String },
  /// 模型推理失败，原样透传
  #[error(transparent)]
  Inference(BoxedError),
  /// 视频源无法打开
  #[error("无法打开视频源 {source_name}: {cause}")]
  UnreadableSource {
    source_name: String,
    cause: BoxedError,
  },
  /// 读取视频帧时出错
  #[error("读取视频帧失败: {0}")]
  Source(BoxedError),
}

impl DetectError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    DetectError::InvalidInput(msg.into())
  }

  pub fn shape(shape: &[usize], reason: impl Into<String>) -> Self {
    DetectError::UnexpectedShape {
      shape: shape.to_vec(),
      reason: reason.into(),
    }
  }

  pub fn inference<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::Inference(Box::new(err))
  }

  pub fn unreadable<E>(source_name: impl Into<String>, cause: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::UnreadableSource {
      source_name: source_name.into(),
      cause: Box::new(cause),
    }
  }
}

pub type Result<T, E = DetectError> = std::result::Result<T, E>;
