// 该文件是 Xunshi （巡视） 项目的一部分。
// src/letterbox.rs - 保持纵横比的缩放与填充
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::{
  error::{DetectError, Result},
  frame::{InputTensor, RGB_CHANNELS, RawImage},
  geometry::Xyxy,
};

/// 单张图像的 letterbox 变换参数
///
/// 由 [`LetterboxPlan::compute`] 生成，随张量一起显式传递给解码器，
/// 用于把张量空间中的框映射回原图坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxPlan {
  pub scale: f32,
  pub pad_left: u32,
  pub pad_top: u32,
  pub orig_w: u32,
  pub orig_h: u32,
  pub target_size: u32,
}

impl LetterboxPlan {
  pub fn compute(orig_w: u32, orig_h: u32, target_size: u32) -> Result<Self> {
    if orig_w == 0 || orig_h == 0 || target_size == 0 {
      return Err(DetectError::invalid(format!(
        "letterbox 参数非法: 原图 {}x{}, 目标尺寸 {}",
        orig_w, orig_h, target_size
      )));
    }

    let t = target_size as f32;
    let scale = (t / orig_w as f32).min(t / orig_h as f32);
    let plan = LetterboxPlan {
      scale,
      pad_left: 0,
      pad_top: 0,
      orig_w,
      orig_h,
      target_size,
    };
    let (new_w, new_h) = plan.scaled_size();

    Ok(LetterboxPlan {
      pad_left: (target_size - new_w) / 2,
      pad_top: (target_size - new_h) / 2,
      ..plan
    })
  }

  /// 缩放后（填充前）的图像尺寸
  pub fn scaled_size(&self) -> (u32, u32) {
    let scaled = |dim: u32| {
      ((dim as f32 * self.scale).round() as u32).clamp(1, self.target_size)
    };
    (scaled(self.orig_w), scaled(self.orig_h))
  }

  /// 原图坐标系中的框映射到张量坐标系
  pub fn forward_box(&self, b: &Xyxy) -> Xyxy {
    let (left, top) = (self.pad_left as f32, self.pad_top as f32);
    [
      b[0] * self.scale + left,
      b[1] * self.scale + top,
      b[2] * self.scale + left,
      b[3] * self.scale + top,
    ]
  }

  /// 张量坐标系中的框映射回原图坐标系，并裁剪到 [0, dim - 1]
  pub fn inverse(&self, b: &Xyxy) -> Xyxy {
    let (left, top) = (self.pad_left as f32, self.pad_top as f32);
    let max_x = (self.orig_w - 1) as f32;
    let max_y = (self.orig_h - 1) as f32;
    let map_x = |x: f32| ((x - left) / self.scale).clamp(0.0, max_x);
    let map_y = |y: f32| ((y - top) / self.scale).clamp(0.0, max_y);
    [map_x(b[0]), map_y(b[1]), map_x(b[2]), map_y(b[3])]
  }
}

/// 按计划缩放图像、归一化并居中贴到全零画布上，输出 NCHW 张量
pub fn forward(image: &RawImage, plan: &LetterboxPlan) -> Result<InputTensor> {
  if image.width() != plan.orig_w || image.height() != plan.orig_h {
    return Err(DetectError::invalid(format!(
      "图像尺寸 {}x{} 与 letterbox 计划 {}x{} 不符",
      image.width(),
      image.height(),
      plan.orig_w,
      plan.orig_h
    )));
  }

  let (new_w, new_h) = plan.scaled_size();
  debug!(
    "letterbox: {}x{} -> {}x{}, 填充 ({}, {})",
    plan.orig_w, plan.orig_h, new_w, new_h, plan.pad_left, plan.pad_top
  );

  let resized;
  let pixels: &[u8] = if (new_w, new_h) == (plan.orig_w, plan.orig_h) {
    image.as_nhwc()
  } else {
    resized = imageops::resize(&image.as_image(), new_w, new_h, FilterType::Triangle);
    resized.as_raw().as_slice()
  };

  let mut tensor = InputTensor::zeros(plan.target_size as usize);
  let (left, top) = (plan.pad_left as usize, plan.pad_top as usize);
  let row = new_w as usize * RGB_CHANNELS;
  for y in 0..new_h as usize {
    for x in 0..new_w as usize {
      let src = y * row + x * RGB_CHANNELS;
      for c in 0..RGB_CHANNELS {
        tensor.set(c, y + top, x + left, pixels[src + c] as f32 / 255.0);
      }
    }
  }

  Ok(tensor)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wide_image_is_padded_vertically() {
    let plan = LetterboxPlan::compute(1280, 720, 640).unwrap();
    assert_eq!(plan.scale, 0.5);
    assert_eq!(plan.scaled_size(), (640, 360));
    assert_eq!((plan.pad_left, plan.pad_top), (0, 140));
  }

  #[test]
  fn odd_padding_is_floored() {
    let plan = LetterboxPlan::compute(100, 61, 100).unwrap();
    assert_eq!(plan.scaled_size(), (100, 61));
    assert_eq!(plan.pad_top, 19);
    let (w, h) = plan.scaled_size();
    assert!(plan.pad_left + w <= plan.target_size);
    assert!(plan.pad_top + h <= plan.target_size);
  }

  #[test]
  fn zero_sizes_are_rejected() {
    for (w, h, t) in [(0, 10, 10), (10, 0, 10), (10, 10, 0)] {
      assert!(matches!(
        LetterboxPlan::compute(w, h, t),
        Err(DetectError::InvalidInput(_))
      ));
    }
  }

  #[test]
  fn box_round_trip() {
    for (w, h) in [(1280, 720), (480, 640), (640, 640), (333, 1000)] {
      let plan = LetterboxPlan::compute(w, h, 640).unwrap();
      let b = [10.0, 20.0, w as f32 * 0.5, h as f32 * 0.75];
      let back = plan.inverse(&plan.forward_box(&b));
      for k in 0..4 {
        assert!((back[k] - b[k]).abs() < 1e-2, "{}x{}: {:?} vs {:?}", w, h, back, b);
      }
    }
  }

  #[test]
  fn inverse_clips_to_image() {
    let plan = LetterboxPlan::compute(1280, 720, 640).unwrap();
    let back = plan.inverse(&[-50.0, 0.0, 700.0, 640.0]);
    assert_eq!(back, [0.0, 0.0, 1279.0, 719.0]);
  }

  #[test]
  fn forward_places_image_inside_padding() {
    // 4x2 的白色图像放入 8x8 画布：缩放 2 倍，上下各填充 2 行
    let image = RawImage::new(4, 2, vec![255; 4 * 2 * 3]).unwrap();
    let plan = LetterboxPlan::compute(4, 2, 8).unwrap();
    assert_eq!((plan.pad_left, plan.pad_top), (0, 2));

    let tensor = forward(&image, &plan).unwrap();
    assert_eq!(tensor.shape(), [1, 3, 8, 8]);
    for c in 0..3 {
      for y in 0..8 {
        for x in 0..8 {
          let expected = if (2..6).contains(&y) { 1.0 } else { 0.0 };
          assert!((tensor.get(c, y, x) - expected).abs() < 1e-2, "({}, {}, {})", c, y, x);
        }
      }
    }
  }

  #[test]
  fn forward_keeps_channel_order() {
    let image = RawImage::new(2, 2, [51u8, 102, 204].repeat(4)).unwrap();
    let plan = LetterboxPlan::compute(2, 2, 2).unwrap();
    let tensor = forward(&image, &plan).unwrap();
    assert!((tensor.get(0, 0, 0) - 0.2).abs() < 1e-6);
    assert!((tensor.get(1, 1, 1) - 0.4).abs() < 1e-6);
    assert!((tensor.get(2, 0, 1) - 0.8).abs() < 1e-6);
  }

  #[test]
  fn forward_rejects_mismatched_plan() {
    let image = RawImage::new(4, 4, vec![0; 48]).unwrap();
    let plan = LetterboxPlan::compute(8, 4, 16).unwrap();
    assert!(forward(&image, &plan).is_err());
  }
}
