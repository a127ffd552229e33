// 该文件是 Xunshi （巡视） 项目的一部分。
// src/labels.rs - 类别名称表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use tracing::{info, warn};

/// 类别 id 超出名称表时使用的标签
pub const UNKNOWN_LABEL: &str = "unknown";

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 按类别 id 索引的类别名称表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
  names: Vec<String>,
}

impl Default for ClassNames {
  fn default() -> Self {
    Self::coco()
  }
}

impl ClassNames {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn coco() -> Self {
    Self::new(COCO_CLASSES)
  }

  /// 从文本文件读取名称表，每行一个类别，忽略空行
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let names = Self::new(
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty()),
    );
    info!("从 {} 读取 {} 个类别名称", path.display(), names.len());
    Ok(names)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 查找类别名称，未知类别退化为 [`UNKNOWN_LABEL`]
  pub fn label(&self, class_id: usize) -> &str {
    match self.names.get(class_id) {
      Some(name) => name.as_str(),
      None => {
        warn!("类别 id {} 超出名称表范围 ({})", class_id, self.names.len());
        UNKNOWN_LABEL
      }
    }
  }
}
