// 该文件是 Yirong （仪容） 项目的一部分。
// src/color.rs - 服装主色提取
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

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  pose::{Pose, PoseLandmark},
  raster::{crop, rgb_to_hsv},
  roi::RoiBox,
};

const MIN_VALUE: u8 = 40;
const LOW_SAT_MAX_S: u8 = 30;
const LOW_SAT_MIN_V: u8 = 150;
const COLOR_MIN_S: u8 = 50;
const COLOR_MIN_V: u8 = 60;
const WHITE_RATIO: f32 = 0.4;
const GRAY_RATIO: f32 = 0.05;
const HUE_BINS: usize = 180;

// 上衣取样：去掉上 25% 与下 15%，左右各取 30%，中间领带区域不参与
const TOP_CROP_TOP: f32 = 0.25;
const TOP_CROP_BOTTOM: f32 = 0.15;
const TOP_SIDE_WIDTH: f32 = 0.3;
// 下装取样：髋膝外接框的中间区域
const BOTTOM_SHRINK_W: f32 = 0.3;
const BOTTOM_SHRINK_H: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
  Black,
  White,
  Gray,
  Red,
  Brown,
  Orange,
  Kaki,
  Green,
  Blue,
  #[serde(rename = "darkblue")]
  DarkBlue,
  Purple,
  Unknown,
}

impl ColorName {
  pub fn as_str(&self) -> &'static str {
    match self {
      ColorName::Black => "black",
      ColorName::White => "white",
      ColorName::Gray => "gray",
      ColorName::Red => "red",
      ColorName::Brown => "brown",
      ColorName::Orange => "orange",
      ColorName::Kaki => "kaki",
      ColorName::Green => "green",
      ColorName::Blue => "blue",
      ColorName::DarkBlue => "darkblue",
      ColorName::Purple => "purple",
      ColorName::Unknown => "unknown",
    }
  }

  fn is_light_neutral(&self) -> bool {
    matches!(self, ColorName::White | ColorName::Gray)
  }
}

impl fmt::Display for ColorName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 色相桶与平均饱和度、亮度到颜色名
pub fn hsv_to_color(h: u8, s: f32, v: f32) -> ColorName {
  if v < 60.0 {
    return ColorName::Black;
  }
  if v > 200.0 && s < 40.0 {
    return ColorName::White;
  }
  if s < 40.0 {
    return ColorName::Gray;
  }
  match h {
    0..10 | 160.. => ColorName::Red,
    10..25 if v < 120.0 => ColorName::Brown,
    10..25 => ColorName::Orange,
    25..35 => ColorName::Kaki,
    35..85 => ColorName::Green,
    85..130 if v < 100.0 => ColorName::DarkBlue,
    85..130 => ColorName::Blue,
    130..160 => ColorName::Purple,
  }
}

/// 区域主色。高亮低饱和像素超过 40% 时直接判为白色
pub fn dominant_color(patch: &RgbImage) -> ColorName {
  let total = (patch.width() * patch.height()) as f32;
  if total == 0.0 {
    return ColorName::Unknown;
  }

  let mut hist = [0u32; HUE_BINS];
  let mut low_sat = 0u32;
  let mut included = 0u32;
  let (mut s_sum, mut v_sum) = (0f64, 0f64);

  for pixel in patch.pixels() {
    let [h, s, v] = rgb_to_hsv(pixel.0);
    if v < MIN_VALUE {
      continue;
    }
    if s < LOW_SAT_MAX_S && v > LOW_SAT_MIN_V {
      low_sat += 1;
    }
    if s > COLOR_MIN_S && v > COLOR_MIN_V {
      hist[h as usize] += 1;
      s_sum += s as f64;
      v_sum += v as f64;
      included += 1;
    }
  }

  if low_sat as f32 > total * WHITE_RATIO {
    return ColorName::White;
  }
  if (included as f32) < total * GRAY_RATIO {
    return ColorName::Gray;
  }

  // 并列时取色相值最小的桶
  let mut mode = 0usize;
  for (bin, &count) in hist.iter().enumerate() {
    if count > hist[mode] {
      mode = bin;
    }
  }
  let avg_s = (s_sum / included as f64) as f32;
  let avg_v = (v_sum / included as f64) as f32;
  debug!("主色相 {}, 平均 S {:.1}, V {:.1}", mode, avg_s, avg_v);
  hsv_to_color(mode as u8, avg_s, avg_v)
}

fn region_color(image: &RgbImage, roi: &RoiBox) -> ColorName {
  crop(image, roi)
    .map(|patch| dominant_color(&patch))
    .unwrap_or(ColorName::Unknown)
}

/// 关键点的像素外接框，裁剪到画面内
fn landmark_bounds(pose: &Pose, indices: &[PoseLandmark], width: u32, height: u32) -> (f32, f32, f32, f32) {
  let (fw, fh) = (width as f32, height as f32);
  let xs = indices.iter().map(|&i| (pose[i].x * fw).floor());
  let ys = indices.iter().map(|&i| (pose[i].y * fh).floor());
  let x1 = xs.clone().fold(f32::INFINITY, f32::min).max(0.0);
  let x2 = xs.fold(f32::NEG_INFINITY, f32::max).min(fw);
  let y1 = ys.clone().fold(f32::INFINITY, f32::min).max(0.0);
  let y2 = ys.fold(f32::NEG_INFINITY, f32::max).min(fh);
  (x1, y1, x2, y2)
}

/// 上衣颜色：分别取躯干左右两侧，两侧不一致时优先白/灰，否则取左侧
pub fn top_color(image: &RgbImage, pose: &Pose) -> ColorName {
  use PoseLandmark::*;
  let (width, height) = image.dimensions();
  let (x1, y1, x2, y2) = landmark_bounds(pose, &[LeftShoulder, RightShoulder, LeftHip, RightHip], width, height);

  let (roi_w, roi_h) = (x2 - x1, y2 - y1);
  let y1 = y1 + roi_h * TOP_CROP_TOP;
  let y2 = y2 - roi_h * TOP_CROP_BOTTOM;
  let center_left = x1 + roi_w * TOP_SIDE_WIDTH;
  let center_right = x2 - roi_w * TOP_SIDE_WIDTH;
  if center_left >= center_right || y1 >= y2 {
    return ColorName::Unknown;
  }

  let left = region_color(image, &RoiBox::from_corners(x1, y1, center_left, y2, width, height));
  let right = region_color(image, &RoiBox::from_corners(center_right, y1, x2, y2, width, height));
  debug!("上衣颜色: 左 {}, 右 {}", left, right);

  if left == right || left.is_light_neutral() {
    left
  } else if right.is_light_neutral() {
    right
  } else {
    left
  }
}

/// 下装颜色：髋到膝外接框的中心区域
pub fn bottom_color(image: &RgbImage, pose: &Pose) -> ColorName {
  use PoseLandmark::*;
  let (width, height) = image.dimensions();
  let (x1, y1, x2, y2) = landmark_bounds(pose, &[LeftHip, RightHip, LeftKnee, RightKnee], width, height);

  let (roi_w, roi_h) = (x2 - x1, y2 - y1);
  let x1 = (x1 + roi_w * BOTTOM_SHRINK_W).floor();
  let x2 = (x2 - roi_w * BOTTOM_SHRINK_W).floor();
  let y1 = (y1 + roi_h * BOTTOM_SHRINK_H).floor();
  let y2 = (y2 - roi_h * BOTTOM_SHRINK_H).floor();
  if x1 >= x2 || y1 >= y2 {
    return ColorName::Unknown;
  }

  region_color(image, &RoiBox::from_corners(x1, y1, x2, y2, width, height))
}
