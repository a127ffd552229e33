// 该文件是 Xunshi （巡视） 项目的一部分。
// src/bin/detect_video.rs - 视频采样检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xunshi::{
  ClassNames, DetectConfig, FromUrl, VideoConfig, VideoSampler, YoloDetector,
  input::GStreamerVideoSource,
  model::OnnxModel,
  output::{JsonReportOutput, Publish},
  video,
};

/// 视频采样目标检测，输出 JSON 汇总报告
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 onnx:///models/yolov8n.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入视频，例如 gst://file/data/traffic.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 报告输出，默认写到标准输出
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 类别名称文件，每行一个，默认使用 COCO 类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  #[command(flatten)]
  pub detect: DetectConfig,

  #[command(flatten)]
  pub video: VideoConfig,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  args.detect.validate()?;
  args.video.validate()?;

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let names = match &args.labels {
    Some(path) => ClassNames::from_file(path)?,
    None => ClassNames::coco(),
  };
  let model = OnnxModel::from_url(&args.model)?;
  let output = match &args.output {
    Some(url) => JsonReportOutput::from_url(url)?,
    None => JsonReportOutput::stdout(),
  };

  let detector = YoloDetector::new(&model, args.detect, names);
  let source: GStreamerVideoSource = video::open_source(&args.input)?;
  let summary = VideoSampler::new(&args.video).run(&detector, source)?;
  info!(
    "处理 {} 帧, 标签计数: {:?}",
    summary.processed_frames, summary.counts_by_label
  );

  output.publish(&summary)?;

  Ok(())
}
