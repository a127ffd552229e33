// 该文件是 Xunshi （巡视） 项目的一部分。
// src/lib.rs - 库主文件
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # Xunshi
//!
//! YOLO 风格目标检测的前后处理与视频采样：letterbox 预处理、输出张量解码、
//! 置信度过滤与类别无关的 NMS、坐标逆映射，以及按固定速率采样视频帧并汇总标签计数。
//! 模型推理与图像解码通过 [`model::Model`] 和 [`video::VideoSource`] 接入。

pub mod config;
pub mod decoder;
pub mod detector;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod labels;
pub mod letterbox;
pub mod model;
pub mod nms;
pub mod output;
pub mod tracker;
pub mod video;

pub use self::{
  config::{DetectConfig, VideoConfig},
  detector::YoloDetector,
  error::DetectError,
  frame::{InputTensor, RawImage},
  labels::ClassNames,
  letterbox::LetterboxPlan,
  model::{BBox, Detection, ImageDetections, Model, RawOutputTensor},
  video::{FrameResult, VideoSampler, VideoSource, VideoSummary},
};

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}
