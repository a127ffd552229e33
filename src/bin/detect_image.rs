// 该文件是 Xunshi （巡视） 项目的一部分。
// src/bin/detect_image.rs - 单张图像检测
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
  ClassNames, DetectConfig, FromUrl, YoloDetector,
  input::ImageFileInput,
  model::OnnxModel,
  output::{JsonReportOutput, Publish},
};

/// 单张图像目标检测，输出 JSON 报告
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 onnx:///models/yolov8n.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/bus.jpg
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
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  args.detect.validate()?;

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let names = match &args.labels {
    Some(path) => ClassNames::from_file(path)?,
    None => ClassNames::coco(),
  };
  let model = OnnxModel::from_url(&args.model)?;
  let image = ImageFileInput::from_url(&args.input)?.into_image();
  let output = match &args.output {
    Some(url) => JsonReportOutput::from_url(url)?,
    None => JsonReportOutput::stdout(),
  };

  let detector = YoloDetector::new(&model, args.detect, names);
  let report = detector.detect_image(&image)?;
  info!("检测到 {} 个物体", report.detections.len());

  output.publish(&report)?;

  Ok(())
}
