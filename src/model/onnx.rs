// 该文件是 Xunshi （巡视） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::InputTensor,
  model::{Model, RawOutputTensor},
};

const ONNX_MODEL_NAME: &str = "yolov8-onnx";

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型没有输出")]
  NoOutput,
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

/// ONNX Runtime 推理后端
///
/// 会话不可重入，推理时持有互斥锁，多个调用方共享同一实例时按顺序执行。
pub struct OnnxModel {
  session: Mutex<Session>,
  name: String,
}

impl FromUrlWithScheme for OnnxModel {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModel {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let name = url
      .query_pairs()
      .find(|(k, _)| k == "name")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| ONNX_MODEL_NAME.to_string());

    Self::load(url.path(), name)
  }
}

impl OnnxModel {
  pub fn load(path: &str, name: String) -> Result<Self, OnnxModelError> {
    info!("加载模型文件: {}", path);
    let metadata = std::fs::metadata(path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let session = Session::builder()?.commit_from_file(path)?;
    debug!("模型输入数量: {}", session.inputs.len());
    debug!("模型输出数量: {}", session.outputs.len());
    info!("模型加载完成");

    Ok(Self {
      session: Mutex::new(session),
      name,
    })
  }
}

impl Model for OnnxModel {
  type Error = OnnxModelError;

  fn name(&self) -> &str {
    &self.name
  }

  fn infer(&self, input: &InputTensor) -> Result<RawOutputTensor, Self::Error> {
    debug!("设置模型输入 {:?}", input.shape());
    let tensor = Tensor::from_array((input.shape(), input.as_nchw().to_vec()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxModelError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![tensor])?;
    if outputs.len() == 0 {
      return Err(OnnxModelError::NoOutput);
    }

    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    debug!("模型输出形状: {:?}", shape);

    Ok(RawOutputTensor::new(shape, data.to_vec()))
  }
}
