// 该文件是 Xunshi （巡视） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频文件输入
//!
//! 通过 `decodebin` 解码视频文件，逐帧输出 RGB 图像，供视频采样流水线使用。
//!
//! ## 系统依赖
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use xunshi::{FromUrl, input::GStreamerVideoSource, video::VideoSource};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/data/traffic.mp4")?;
//! let mut source = GStreamerVideoSource::from_url(&url)?;
//! println!("帧率: {}", source.reported_fps());
//! while let Some(frame) = source.read()? {
//!     println!("处理帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! 管道以 `sync=false` 运行且不丢帧。appsink 最多缓存 `max-buffers` 帧，
//! 队列满时上游阻塞等待，因此解码进度受调用方读取速度约束，内存占用有上限。

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawImage, video::VideoSource};

/// 等待管道进入暂停状态的最长时间
const PREROLL_TIMEOUT_SECS: u64 = 10;

/// appsink 队列长度
const MAX_BUFFERS: u32 = 2;

fn pipeline_description(path: &str) -> String {
  // drop=false：队列满时阻塞上游而不是丢帧，帧序号保持与源一致
  format!(
    "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false max-buffers={} drop=false",
    path.replace('"', "\\\""),
    MAX_BUFFERS
  )
}

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

/// GStreamer 视频文件源
///
/// 打开时预卷管道以读取帧率与时长；释放时将管道置为 `Null`。
pub struct GStreamerVideoSource {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  fps: f64,
  total_frames: u64,
}

impl FromUrlWithScheme for GStreamerVideoSource {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerVideoSource {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl GStreamerVideoSource {
  pub fn open(path: &str) -> Result<Self, GStreamerInputError> {
    gst::init()?;

    let description = pipeline_description(path);
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;
    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkNotFound)?;

    let mut source = GStreamerVideoSource {
      pipeline,
      appsink,
      fps: 0.0,
      total_frames: 0,
    };

    // 预卷，caps 协商完成后才能读取帧率
    source.pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = source
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    if let Err(e) = result {
      return Err(source.bus_error().unwrap_or(e.into()));
    }

    let fps = source.negotiated_fps().unwrap_or(0.0);
    // 容器不报告时长时总帧数为 0
    let total_frames = match source.pipeline.query_duration::<gst::ClockTime>() {
      Some(duration) if fps > 0.0 => (duration.nseconds() as f64 / 1e9 * fps).round() as u64,
      _ => 0,
    };
    source.fps = fps;
    source.total_frames = total_frames;
    info!(
      "视频已打开: 帧率 {:.2}, 估计总帧数 {}",
      source.fps, source.total_frames
    );

    source.pipeline.set_state(gst::State::Playing)?;
    Ok(source)
  }

  fn negotiated_fps(&self) -> Option<f64> {
    let caps = self.appsink.static_pad("sink")?.current_caps()?;
    let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
    let fps = info.fps();
    if fps.denom() == 0 {
      return None;
    }
    Some(fps.numer() as f64 / fps.denom() as f64)
  }

  /// 总线上的第一条错误消息
  fn bus_error(&self) -> Option<GStreamerInputError> {
    let message = self
      .pipeline
      .bus()?
      .pop_filtered(&[gst::MessageType::Error])?;
    match message.view() {
      gst::MessageView::Error(err) => Some(GStreamerInputError::PipelineError(format!(
        "{} ({:?})",
        err.error(),
        err.debug()
      ))),
      _ => None,
    }
  }

  fn pull_sample(&mut self) -> Result<Option<gst::Sample>, GStreamerInputError> {
    match self.appsink.pull_sample() {
      Ok(sample) => Ok(Some(sample)),
      Err(_) if self.appsink.is_eos() => {
        debug!("视频流结束");
        Ok(None)
      }
      Err(e) => Err(self.bus_error().unwrap_or(e.into())),
    }
  }
}

impl VideoSource for GStreamerVideoSource {
  type Error = GStreamerInputError;

  fn read(&mut self) -> Result<Option<RawImage>, Self::Error> {
    match self.pull_sample()? {
      Some(sample) => convert_sample(&sample).map(Some),
      None => Ok(None),
    }
  }

  fn skip(&mut self) -> Result<bool, Self::Error> {
    Ok(self.pull_sample()?.is_some())
  }

  fn reported_fps(&self) -> f64 {
    self.fps
  }

  fn reported_total_frames(&self) -> u64 {
    self.total_frames
  }
}

impl Drop for GStreamerVideoSource {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<RawImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat(video_info.format()));
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  // 行之间可能有对齐填充
  let stride = video_info.stride()[0] as usize;
  let row = width * 3;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected = stride * (height.saturating_sub(1)) + row;
  if stride < row || data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row * height);
  for y in 0..height {
    pixels.extend_from_slice(&data[y * stride..y * stride + row]);
  }

  RawImage::new(width as u32, height as u32, pixels)
    .map_err(|e| GStreamerInputError::PipelineError(e.to_string()))
}
