// 该文件是 Yirong （仪容） 项目的一部分。
// src/frame.rs - 图像编码器输入帧
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{Rgb, RgbImage, imageops};

use crate::roi::RoiBox;

pub const CLIP_INPUT_SIZE: u32 = 224;
const RGB_CHANNELS: usize = 3;
/// 画布底色 #777
const LETTERBOX_GRAY: u8 = 0x77;

pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

pub trait AsNchwFrame {
  fn as_nchw(&self) -> &[f32];
}

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 送入图像编码器的 224×224 方形帧。
///
/// 以区域中心为中心取边长为 `max(w, h)` 的正方形，缩放到画布上；
/// 正方形落在原图之外的部分保持灰色。
#[derive(Debug, Clone)]
pub struct ClipFrame {
  canvas: RgbImage,
  tensor: Box<[f32]>,
}

impl ClipFrame {
  pub fn from_region(image: &RgbImage, roi: &RoiBox) -> Self {
    let size = CLIP_INPUT_SIZE;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_GRAY; 3]));

    let side = roi.w.max(roi.h);
    if side > 0.0 {
      let start_x = roi.x + roi.w / 2.0 - side / 2.0;
      let start_y = roi.y + roi.h / 2.0 - side / 2.0;
      let scale = size as f32 / side;

      // 源正方形与原图的交集
      let (iw, ih) = (image.width() as f32, image.height() as f32);
      let x0 = start_x.max(0.0).floor();
      let y0 = start_y.max(0.0).floor();
      let x1 = (start_x + side).min(iw).ceil();
      let y1 = (start_y + side).min(ih).ceil();

      if x1 > x0 && y1 > y0 {
        let src = imageops::crop_imm(
          image,
          x0 as u32,
          y0 as u32,
          (x1 - x0) as u32,
          (y1 - y0) as u32,
        )
        .to_image();

        let dst_w = (((x1 - x0) * scale).round() as u32).clamp(1, size);
        let dst_h = (((y1 - y0) * scale).round() as u32).clamp(1, size);
        let resized = imageops::resize(&src, dst_w, dst_h, imageops::FilterType::Triangle);

        let off_x = ((x0 - start_x) * scale).round() as i64;
        let off_y = ((y0 - start_y) * scale).round() as i64;
        imageops::overlay(&mut canvas, &resized, off_x, off_y);
      }
    }

    let tensor = normalize_nchw(&canvas);
    Self { canvas, tensor }
  }

  pub fn width(&self) -> usize {
    CLIP_INPUT_SIZE as usize
  }

  pub fn height(&self) -> usize {
    CLIP_INPUT_SIZE as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn canvas(&self) -> &RgbImage {
    &self.canvas
  }
}

impl AsNhwcFrame for ClipFrame {
  fn as_nhwc(&self) -> &[u8] {
    self.canvas.as_raw()
  }
}

impl AsNchwFrame for ClipFrame {
  fn as_nchw(&self) -> &[f32] {
    &self.tensor
  }
}

/// 按通道均值/方差归一化并转为 NCHW 排列
fn normalize_nchw(canvas: &RgbImage) -> Box<[f32]> {
  let (width, height) = canvas.dimensions();
  let plane = (width * height) as usize;
  let mut data = vec![0f32; plane * RGB_CHANNELS];

  for (idx, pixel) in canvas.pixels().enumerate() {
    for c in 0..RGB_CHANNELS {
      data[c * plane + idx] = (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
    }
  }

  data.into_boxed_slice()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn square_region_fills_canvas() {
    let image = RgbImage::from_pixel(100, 100, Rgb([255, 0, 0]));
    let frame = ClipFrame::from_region(&image, &RoiBox { x: 0.0, y: 0.0, w: 100.0, h: 100.0 });
    assert_eq!(frame.canvas().get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(frame.canvas().get_pixel(223, 223).0, [255, 0, 0]);
    assert_eq!(frame.as_nhwc().len(), 224 * 224 * 3);
  }

  #[test]
  fn tall_region_is_padded_with_gray() {
    let image = RgbImage::from_pixel(50, 100, Rgb([255, 255, 255]));
    let frame = ClipFrame::from_region(&image, &RoiBox { x: 0.0, y: 0.0, w: 50.0, h: 100.0 });
    // 方形取景左右各 25px 落在图像外
    assert_eq!(frame.canvas().get_pixel(5, 112).0, [LETTERBOX_GRAY; 3]);
    assert_eq!(frame.canvas().get_pixel(112, 112).0, [255, 255, 255]);
    assert_eq!(frame.canvas().get_pixel(218, 112).0, [LETTERBOX_GRAY; 3]);
  }

  #[test]
  fn tensor_is_normalized_per_channel() {
    let image = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
    let frame = ClipFrame::from_region(&image, &RoiBox { x: 0.0, y: 0.0, w: 10.0, h: 10.0 });
    let plane = 224 * 224;
    let tensor = frame.as_nchw();
    assert_eq!(tensor.len(), plane * 3);
    assert!((tensor[0] - (-CLIP_MEAN[0] / CLIP_STD[0])).abs() < 1e-5);
    assert!((tensor[plane] - (-CLIP_MEAN[1] / CLIP_STD[1])).abs() < 1e-5);
    assert!((tensor[2 * plane] - (-CLIP_MEAN[2] / CLIP_STD[2])).abs() < 1e-5);
  }
}
