// 该文件是 Yirong （仪容） 项目的一部分。
// src/raster.rs - 像素级图像处理：颜色空间、肤色掩膜
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

use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::{distance_transform::Norm, morphology};

use crate::roi::RoiBox;

// YCrCb 肤色范围 (Y, Cr, Cb)
const SKIN_LOW: [u8; 3] = [60, 133, 77];
const SKIN_HIGH: [u8; 3] = [255, 173, 127];
/// 开运算半径，LInf 范数下对应 5×5 方形结构元
const SKIN_OPEN_RADIUS: u8 = 2;

// 裤腿检查的扫描带
const LEG_SCAN_Y: f32 = 0.35;
const LEG_SCAN_H: f32 = 0.30;
const LEG_LEFT_X: f32 = 0.10;
const LEG_RIGHT_X: f32 = 0.70;
const LEG_SCAN_W: f32 = 0.20;
const ANKLE_SCAN_Y: f32 = 0.85;
const ANKLE_SCAN_H: f32 = 0.15;

/// 按区域裁剪图像，区域会先被限制在图像范围内
pub fn crop(image: &RgbImage, roi: &RoiBox) -> Option<RgbImage> {
  let (x, y, w, h) = roi.pixel_rect()?;
  let (iw, ih) = image.dimensions();
  if x >= iw || y >= ih {
    return None;
  }
  let w = w.min(iw - x);
  let h = h.min(ih - y);
  Some(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// RGB 转 HSV，采用 8 位约定：H ∈ [0, 180)，S、V ∈ [0, 255]
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
  let (rf, gf, bf) = (r as f32, g as f32, b as f32);
  let max = rf.max(gf).max(bf);
  let min = rf.min(gf).min(bf);
  let delta = max - min;

  let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

  let hue = if delta == 0.0 {
    0.0
  } else if max == rf {
    60.0 * (gf - bf) / delta
  } else if max == gf {
    120.0 + 60.0 * (bf - rf) / delta
  } else {
    240.0 + 60.0 * (rf - gf) / delta
  };
  let hue = if hue < 0.0 { hue + 360.0 } else { hue };

  let h = ((hue / 2.0).round() as u16 % 180) as u8;
  [h, s.round() as u8, max as u8]
}

/// RGB 转 YCrCb，通道顺序为 (Y, Cr, Cb)
pub fn rgb_to_ycrcb([r, g, b]: [u8; 3]) -> [u8; 3] {
  let (rf, gf, bf) = (r as f32, g as f32, b as f32);
  let y = 0.299 * rf + 0.587 * gf + 0.114 * bf;
  let cr = (rf - y) * 0.713 + 128.0;
  let cb = (bf - y) * 0.564 + 128.0;
  [
    y.round().clamp(0.0, 255.0) as u8,
    cr.round().clamp(0.0, 255.0) as u8,
    cb.round().clamp(0.0, 255.0) as u8,
  ]
}

fn is_skin(pixel: [u8; 3]) -> bool {
  let ycrcb = rgb_to_ycrcb(pixel);
  (0..3).all(|c| ycrcb[c] >= SKIN_LOW[c] && ycrcb[c] <= SKIN_HIGH[c])
}

/// 肤色掩膜，经开运算去除孤立噪点
pub fn skin_mask(image: &RgbImage) -> GrayImage {
  let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
    if is_skin(image.get_pixel(x, y).0) {
      Luma([255u8])
    } else {
      Luma([0u8])
    }
  });
  morphology::open(&mask, Norm::LInf, SKIN_OPEN_RADIUS)
}

/// 区域内肤色像素占比，区域无效时为 0
pub fn skin_ratio(image: &RgbImage, roi: &RoiBox) -> f32 {
  let Some(patch) = crop(image, roi) else {
    return 0.0;
  };
  let total = (patch.width() * patch.height()) as f32;
  if total == 0.0 {
    return 0.0;
  }
  let skin = skin_mask(&patch).pixels().filter(|p| p.0[0] > 0).count();
  skin as f32 / total
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LegSkin {
  /// 左右两条小腿扫描带中较大的肤色占比
  pub leg: f32,
  /// 裤脚扫描带的肤色占比
  pub ankle: f32,
}

/// 在下装区域中扫描小腿与裤脚两处肤色
pub fn leg_skin(image: &RgbImage, bottom: &RoiBox) -> LegSkin {
  if bottom.is_empty() {
    return LegSkin::default();
  }
  let left = bottom.sub_region(LEG_LEFT_X, LEG_SCAN_Y, LEG_SCAN_W, LEG_SCAN_H);
  let right = bottom.sub_region(LEG_RIGHT_X, LEG_SCAN_Y, LEG_SCAN_W, LEG_SCAN_H);
  let ankle = bottom.sub_region(0.0, ANKLE_SCAN_Y, 1.0, ANKLE_SCAN_H);

  LegSkin {
    leg: skin_ratio(image, &left).max(skin_ratio(image, &right)),
    ankle: skin_ratio(image, &ankle),
  }
}

#[cfg(test)]
pub(crate) mod fixtures {
  use image::{Rgb, RgbImage};

  pub const SKIN: [u8; 3] = [224, 172, 140];
  pub const NAVY: [u8; 3] = [20, 30, 90];

  pub fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
  }

  pub fn paint(image: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
    for y in y0..y1.min(image.height()) {
      for x in x0..x1.min(image.width()) {
        image.put_pixel(x, y, Rgb(color));
      }
    }
  }
}
