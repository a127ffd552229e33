// 该文件是 Xunshi （巡视） 项目的一部分。
// src/video.rs - 视频采样检测流水线
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{collections::BTreeMap, time::Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl,
  config::VideoConfig,
  detector::YoloDetector,
  error::{DetectError, Result},
  frame::RawImage,
  model::{Detection, Model},
  tracker::{CentroidTracker, TrackerConfig, TrackingInfo},
};

/// 视频源未报告有效帧率时使用的帧率
pub const DEFAULT_FPS: f64 = 30.0;

/// 顺序读取的视频帧源
///
/// 源句柄由实现者持有，`Drop` 时释放。
pub trait VideoSource {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 读取下一帧，流结束时返回 `None`
  fn read(&mut self) -> Result<Option<RawImage>, Self::Error>;

  /// 跳过一帧，流结束时返回 `false`
  fn skip(&mut self) -> Result<bool, Self::Error> {
    Ok(self.read()?.is_some())
  }

  /// 容器声明的帧率，可能为 0 或 NaN
  fn reported_fps(&self) -> f64;

  /// 容器声明的总帧数，未知时为 0
  fn reported_total_frames(&self) -> u64;
}

/// 打开视频源，失败时报告 `UnreadableSource`
pub fn open_source<S>(url: &Url) -> Result<S>
where
  S: FromUrl,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  info!("打开视频源: {}", url);
  S::from_url(url).map_err(|e| DetectError::unreadable(url.as_str(), e))
}

/// 单个采样帧的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
  pub frame_index: u64,
  pub time_sec: f64,
  pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
  pub model: String,
  /// 视频源报告的总帧数，原样透传
  pub total_frames: u64,
  pub processed_frames: usize,
  pub sampling_step: u64,
  pub fps_sample: f64,
  #[serde(rename = "results")]
  pub frames: Vec<FrameResult>,
  /// 按检测计数，而非按帧
  pub counts_by_label: BTreeMap<String, usize>,
  #[serde(rename = "tracking_info", skip_serializing_if = "Option::is_none", default)]
  pub tracking: Option<TrackingInfo>,
}

/// 视频采样器
///
/// 按 `fps_sample` 换算出采样步长，对每个步长整数倍的帧运行单张图像流水线，
/// 处理满 `max_frames` 帧或视频源读尽时停止。
#[derive(Debug, Clone)]
pub struct VideoSampler {
  fps_sample: f64,
  max_frames: usize,
  tracking: Option<TrackerConfig>,
}

impl Default for VideoSampler {
  fn default() -> Self {
    Self::new(&VideoConfig::default())
  }
}

impl VideoSampler {
  pub fn new(config: &VideoConfig) -> Self {
    Self {
      fps_sample: config.fps_sample,
      max_frames: config.max_frames,
      tracking: config.tracking.then(TrackerConfig::default),
    }
  }

  pub fn with_tracking(mut self, tracking: Option<TrackerConfig>) -> Self {
    self.tracking = tracking;
    self
  }

  /// 采样步长 `max(1, round(fps / fps_sample))`，不做上采样
  pub fn sampling_step(&self, fps: f64) -> u64 {
    let step = (effective_fps(fps) / self.fps_sample).round();
    if step.is_finite() && step >= 1.0 {
      step as u64
    } else {
      1
    }
  }

  /// 用检测器处理视频源
  pub fn run<M, S>(&self, detector: &YoloDetector<'_, M>, source: S) -> Result<VideoSummary>
  where
    M: Model,
    M::Error: std::error::Error + Send + Sync + 'static,
    S: VideoSource,
  {
    self.process(source, detector.model_name(), |image| detector.detect(image))
  }

  /// 采样处理视频源
  ///
  /// `source` 在任何返回路径上都会被释放；`detect` 的错误原样返回。
  pub fn process<S, F>(&self, mut source: S, model_name: &str, mut detect: F) -> Result<VideoSummary>
  where
    S: VideoSource,
    F: FnMut(&RawImage) -> Result<Vec<Detection>>,
  {
    let reported_fps = source.reported_fps();
    let fps = effective_fps(reported_fps);
    if fps != reported_fps {
      warn!("视频源帧率无效 ({}), 使用默认帧率 {}", reported_fps, DEFAULT_FPS);
    }
    let step = self.sampling_step(fps);
    let max_frames = self.max_frames.max(1);
    let total_frames = source.reported_total_frames();
    info!(
      "开始视频采样: 帧率 {:.2}, 总帧数 {}, 采样步长 {}, 最多处理 {} 帧",
      fps, total_frames, step, max_frames
    );

    let mut tracker = self.tracking.map(CentroidTracker::new);
    let mut frames = Vec::new();
    let mut counts_by_label = BTreeMap::new();
    let now = Instant::now();

    let mut frame_index: u64 = 0;
    while frames.len() < max_frames {
      if frame_index % step != 0 {
        if !source.skip().map_err(|e| DetectError::Source(Box::new(e)))? {
          break;
        }
        frame_index += 1;
        continue;
      }

      let Some(image) = source.read().map_err(|e| DetectError::Source(Box::new(e)))? else {
        break;
      };
      let detections = detect(&image)?;
      debug!("第 {} 帧检测到 {} 个物体", frame_index, detections.len());

      for det in detections.iter() {
        *counts_by_label.entry(det.label.clone()).or_default() += 1;
      }
      if let Some(tracker) = tracker.as_mut() {
        tracker.update(&detections);
      }

      frames.push(FrameResult {
        frame_index,
        time_sec: frame_index as f64 / fps,
        detections,
      });
      frame_index += 1;
    }

    if frames.len() >= max_frames {
      info!("达到最大处理帧数 {}, 结束采样", max_frames);
    }
    info!(
      "视频采样完成: 读取 {} 帧, 处理 {} 帧, 耗时: {:.2?}",
      frame_index,
      frames.len(),
      now.elapsed()
    );

    Ok(VideoSummary {
      model: model_name.to_string(),
      total_frames,
      processed_frames: frames.len(),
      sampling_step: step,
      fps_sample: self.fps_sample,
      frames,
      counts_by_label,
      tracking: tracker.map(|t| t.info()),
    })
  }
}

fn effective_fps(fps: f64) -> f64 {
  if fps.is_finite() && fps > 0.0 {
    fps
  } else {
    DEFAULT_FPS
  }
}
