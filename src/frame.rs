// 该文件是 Xunshi （巡视） 项目的一部分。
// src/frame.rs - 原始图像与输入张量定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{DetectError, Result};

pub const RGB_CHANNELS: usize = 3;

/// 解码后的 RGB 图像，行优先、通道交错（HWC）
#[derive(Debug, Clone)]
pub struct RawImage {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RawImage {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
    if width == 0 || height == 0 {
      return Err(DetectError::invalid(format!(
        "图像尺寸不能为 0: {}x{}",
        width, height
      )));
    }
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(DetectError::invalid(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 解码 JPEG/PNG 等编码后的图像字节
  pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
    let image = image::load_from_memory(bytes)
      .map_err(|e| DetectError::invalid(format!("不是图像或格式不支持: {}", e)))?;
    Self::try_from(image.to_rgb8())
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 借用为 `image` 的图像视图，不复制像素
  pub fn as_image(&self) -> ImageBuffer<Rgb<u8>, &[u8]> {
    // 长度已在构造时校验
    ImageBuffer::from_raw(self.width, self.height, &self.data[..])
      .unwrap_or_else(|| unreachable!("RawImage 数据长度与尺寸不符"))
  }
}

impl TryFrom<RgbImage> for RawImage {
  type Error = DetectError;

  fn try_from(image: RgbImage) -> Result<Self> {
    let (width, height) = image.dimensions();
    Self::new(width, height, image.into_raw())
  }
}

/// 模型输入张量，NCHW，数值归一化到 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor {
  size: usize,
  data: Box<[f32]>,
}

impl InputTensor {
  /// 全零的 `1 x 3 x size x size` 画布
  pub fn zeros(size: usize) -> Self {
    Self {
      size,
      data: vec![0.0; RGB_CHANNELS * size * size].into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
    self.data[self.index(c, y, x)]
  }

  pub(crate) fn set(&mut self, c: usize, y: usize, x: usize, value: f32) {
    let idx = self.index(c, y, x);
    self.data[idx] = value;
  }

  fn index(&self, c: usize, y: usize, x: usize) -> usize {
    c * self.size * self.size + y * self.size + x
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_zero_dimensions() {
    assert!(matches!(
      RawImage::new(0, 4, vec![]),
      Err(DetectError::InvalidInput(_))
    ));
    assert!(matches!(
      RawImage::new(4, 0, vec![]),
      Err(DetectError::InvalidInput(_))
    ));
  }

  #[test]
  fn rejects_short_buffer() {
    assert!(RawImage::new(2, 2, vec![0; 11]).is_err());
    assert!(RawImage::new(2, 2, vec![0; 12]).is_ok());
  }

  #[test]
  fn image_view_shares_pixels() {
    let data: Vec<u8> = (0..12).collect();
    let raw = RawImage::new(2, 2, data).unwrap();
    let view = raw.as_image();
    assert_eq!(view.get_pixel(1, 1).0, [9, 10, 11]);
  }

  #[test]
  fn decodes_encoded_png() {
    let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
    let mut bytes = Vec::new();
    image
      .write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
      )
      .unwrap();
    let raw = RawImage::from_encoded(&bytes).unwrap();
    assert_eq!((raw.width(), raw.height()), (3, 2));
    assert_eq!(&raw.as_nhwc()[..3], &[10, 20, 30]);
  }

  #[test]
  fn garbage_bytes_are_invalid_input() {
    assert!(matches!(
      RawImage::from_encoded(b"not an image"),
      Err(DetectError::InvalidInput(_))
    ));
  }

  #[test]
  fn tensor_layout_is_channel_major() {
    let mut t = InputTensor::zeros(4);
    t.set(2, 1, 3, 0.5);
    assert_eq!(t.shape(), [1, 3, 4, 4]);
    assert_eq!(t.as_nchw()[2 * 16 + 4 + 3], 0.5);
    assert_eq!(t.get(2, 1, 3), 0.5);
  }
}
