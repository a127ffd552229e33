// 该文件是 Xunshi （巡视） 项目的一部分。
// src/config.rs - 检测与视频采样参数
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("{name} 必须在 [0, 1] 范围内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("输入尺寸必须大于 0")]
  ZeroTargetSize,
  #[error("采样帧率必须大于 0, 实际为 {0}")]
  InvalidFpsSample(f64),
  #[error("最大处理帧数必须大于 0")]
  ZeroMaxFrames,
}

/// 单张图像检测参数
#[derive(Args, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectConfig {
  /// 模型输入尺寸（正方形边长）
  #[arg(long, default_value_t = 640, env = "XUNSHI_TARGET_SIZE", value_name = "PIXELS")]
  pub target_size: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.25, env = "XUNSHI_CONF_THRESHOLD", value_name = "THRESHOLD")]
  pub conf_threshold: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.45, env = "XUNSHI_IOU_THRESHOLD", value_name = "THRESHOLD")]
  pub iou_threshold: f32,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      target_size: 640,
      conf_threshold: 0.25,
      iou_threshold: 0.45,
    }
  }
}

impl DetectConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.target_size == 0 {
      return Err(ConfigError::ZeroTargetSize);
    }
    check_threshold("conf_threshold", self.conf_threshold)?;
    check_threshold("iou_threshold", self.iou_threshold)?;
    Ok(())
  }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}

/// 视频采样参数
#[derive(Args, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
  /// 每秒采样帧数
  #[arg(long, default_value_t = 2.0, env = "XUNSHI_FPS_SAMPLE", value_name = "FPS")]
  pub fps_sample: f64,

  /// 最大处理帧数
  #[arg(long, default_value_t = 120, env = "XUNSHI_MAX_FRAMES", value_name = "COUNT")]
  pub max_frames: usize,

  /// 启用质心跟踪，统计去重后的目标数量
  #[arg(long, default_value_t = false)]
  pub tracking: bool,
}

impl Default for VideoConfig {
  fn default() -> Self {
    Self {
      fps_sample: 2.0,
      max_frames: 120,
      tracking: false,
    }
  }
}

impl VideoConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.fps_sample > 0.0) || !self.fps_sample.is_finite() {
      return Err(ConfigError::InvalidFpsSample(self.fps_sample));
    }
    if self.max_frames == 0 {
      return Err(ConfigError::ZeroMaxFrames);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    assert_eq!(DetectConfig::default().validate(), Ok(()));
    assert_eq!(VideoConfig::default().validate(), Ok(()));
  }

  #[test]
  fn thresholds_out_of_range() {
    let config = DetectConfig {
      conf_threshold: 1.5,
      ..Default::default()
    };
    assert_eq!(
      config.validate(),
      Err(ConfigError::ThresholdOutOfRange {
        name: "conf_threshold",
        value: 1.5
      })
    );

    let config = DetectConfig {
      iou_threshold: -0.1,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn video_limits() {
    let config = VideoConfig {
      fps_sample: 0.0,
      ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::InvalidFpsSample(0.0)));

    let config = VideoConfig {
      max_frames: 0,
      ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::ZeroMaxFrames));
  }

  #[test]
  fn deserializes_from_json() {
    let config: DetectConfig =
      serde_json::from_str(r#"{"target_size": 320, "conf_threshold": 0.5, "iou_threshold": 0.6}"#)
        .unwrap();
    assert_eq!(config.target_size, 320);
    assert_eq!(config.conf_threshold, 0.5);
  }
}
