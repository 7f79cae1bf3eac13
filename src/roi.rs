// 该文件是 Yirong （仪容） 项目的一部分。
// src/roi.rs - 基于关键点的感兴趣区域
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

use serde::Serialize;
use tracing::warn;

use crate::pose::{Pose, PoseLandmark};

// 以下裁剪参数会直接影响送入编码器的画面构图，修改后分类效果不可比
const LANDMARK_MIN_VISIBILITY: f32 = 0.1;

const HEAD_PAD: (f32, f32) = (0.3, 0.1);
const HEAD_EXTEND_UP: f32 = 1.2;

const CHEST_WIDTH_RATIO: f32 = 0.7;
const CHEST_HEIGHT_RATIO: f32 = 0.6;
const CHEST_LIFT_RATIO: f32 = 0.15;

const TOP_PAD: (f32, f32) = (0.15, 0.15);
const WAIST_START: f32 = 0.75;
const WAIST_HEIGHT: f32 = 0.4;
const WAIST_EXPAND_W: f32 = 0.15;
const WAIST_SPOT_WIDTH: f32 = 0.30;

const BOTTOM_PAD: (f32, f32) = (0.1, 0.05);
const FOOT_PAD: (f32, f32) = (0.5, 0.4);
const FOOT_SIDE_PAD: (f32, f32) = (0.3, 0.3);
const SLEEVE_PAD: (f32, f32) = (0.12, 0.1);

/// 像素坐标下的轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RoiBox {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

impl RoiBox {
  pub const EMPTY: RoiBox = RoiBox {
    x: 0.0,
    y: 0.0,
    w: 0.0,
    h: 0.0,
  };

  /// 由两个角点构造，并裁剪到 `[0, width] × [0, height]`
  pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32, width: u32, height: u32) -> Self {
    let (fw, fh) = (width as f32, height as f32);
    let left = x0.clamp(0.0, fw);
    let top = y0.clamp(0.0, fh);
    let right = x1.clamp(0.0, fw);
    let bottom = y1.clamp(0.0, fh);
    Self {
      x: left,
      y: top,
      w: (right - left).max(0.0),
      h: (bottom - top).max(0.0),
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.w
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.h
  }

  pub fn is_empty(&self) -> bool {
    self.w <= 0.0 || self.h <= 0.0
  }

  /// 取整后的像素矩形 `(x, y, w, h)`，面积为 0 时返回 None
  pub fn pixel_rect(&self) -> Option<(u32, u32, u32, u32)> {
    let x = self.x.floor().max(0.0) as u32;
    let y = self.y.floor().max(0.0) as u32;
    let w = self.w.floor().max(0.0) as u32;
    let h = self.h.floor().max(0.0) as u32;
    (w > 0 && h > 0).then_some((x, y, w, h))
  }

  /// 按相对比例截取子区域，比例相对于本矩形
  pub fn sub_region(&self, fx: f32, fy: f32, fw: f32, fh: f32) -> RoiBox {
    RoiBox {
      x: self.x + self.w * fx,
      y: self.y + self.h * fy,
      w: self.w * fw,
      h: self.h * fh,
    }
  }
}

/// 一次分析所需的全部区域
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RegionSet {
  pub head: RoiBox,
  pub chest: RoiBox,
  pub top: RoiBox,
  pub top_state: RoiBox,
  pub waist_left: RoiBox,
  pub waist_center: RoiBox,
  pub waist_right: RoiBox,
  pub bottom: RoiBox,
  pub foot: RoiBox,
  pub foot_left: RoiBox,
  pub foot_right: RoiBox,
  pub sleeve_left: RoiBox,
  pub sleeve_right: RoiBox,
}

impl RegionSet {
  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &RoiBox)> {
    [
      ("head", &self.head),
      ("chest", &self.chest),
      ("top", &self.top),
      ("top_state", &self.top_state),
      ("waist_left", &self.waist_left),
      ("waist_center", &self.waist_center),
      ("waist_right", &self.waist_right),
      ("bottom", &self.bottom),
      ("foot", &self.foot),
      ("foot_left", &self.foot_left),
      ("foot_right", &self.foot_right),
      ("sleeve_left", &self.sleeve_left),
      ("sleeve_right", &self.sleeve_right),
    ]
    .into_iter()
  }
}

/// 可用关键点的外接矩形，按比例向外扩展后裁剪到画面内。
///
/// 没有可用关键点时返回零面积矩形，调用方应将其视为无法分析。
pub fn padded_box(
  pose: &Pose,
  indices: &[PoseLandmark],
  width: u32,
  height: u32,
  pad_w: f32,
  pad_h: f32,
) -> RoiBox {
  let usable = indices
    .iter()
    .map(|&idx| pose[idx])
    .filter(|lm| lm.visible_above(LANDMARK_MIN_VISIBILITY));

  let mut bounds: Option<(f32, f32, f32, f32)> = None;
  for lm in usable {
    let (min_x, max_x, min_y, max_y) = bounds.unwrap_or((lm.x, lm.x, lm.y, lm.y));
    bounds = Some((
      min_x.min(lm.x),
      max_x.max(lm.x),
      min_y.min(lm.y),
      max_y.max(lm.y),
    ));
  }

  let Some((min_x, max_x, min_y, max_y)) = bounds else {
    warn!("没有可用关键点: {:?}", indices);
    return RoiBox::EMPTY;
  };

  let (fw, fh) = (width as f32, height as f32);
  let bw = (max_x - min_x) * fw;
  let bh = (max_y - min_y) * fh;

  let x = (min_x * fw - bw * pad_w).clamp(0.0, fw);
  let y = (min_y * fh - bh * pad_h).clamp(0.0, fh);
  let w = (bw * (1.0 + 2.0 * pad_w)).min(fw - x).max(0.0);
  let h = (bh * (1.0 + 2.0 * pad_h)).min(fh - y).max(0.0);

  RoiBox { x, y, w, h }
}

fn head_box(pose: &Pose, width: u32, height: u32) -> RoiBox {
  use PoseLandmark::*;
  let base = padded_box(
    pose,
    &[Nose, LeftEar, RightEar, MouthLeft, MouthRight],
    width,
    height,
    HEAD_PAD.0,
    HEAD_PAD.1,
  );
  if base.is_empty() {
    return base;
  }
  // 向上延伸以覆盖帽子
  let top = base.y - base.h * HEAD_EXTEND_UP;
  RoiBox::from_corners(base.x, top, base.right(), base.bottom(), width, height)
}

fn chest_box(pose: &Pose, width: u32, height: u32) -> RoiBox {
  use PoseLandmark::*;
  let (fw, fh) = (width as f32, height as f32);
  let (ls, rs) = (pose[LeftShoulder], pose[RightShoulder]);
  let shoulder_cx = (ls.x + rs.x) / 2.0;
  let shoulder_y = (ls.y + rs.y) / 2.0;
  let hip_y = (pose[LeftHip].y + pose[RightHip].y) / 2.0;

  let box_w = (ls.x - rs.x).abs() * fw * CHEST_WIDTH_RATIO;
  let box_h = (hip_y - shoulder_y).abs() * fh * CHEST_HEIGHT_RATIO;
  let x = shoulder_cx * fw - box_w / 2.0;
  let y = shoulder_y * fh - box_h * CHEST_LIFT_RATIO;

  RoiBox::from_corners(x, y, x + box_w, y + box_h, width, height)
}

/// 衣摆检查带及其左、中、右三个等宽子区域
fn waist_boxes(top: &RoiBox, width: u32, height: u32) -> [RoiBox; 4] {
  if top.is_empty() {
    return [RoiBox::EMPTY; 4];
  }
  let y = top.y + top.h * WAIST_START;
  let expand = top.w * WAIST_EXPAND_W;
  let band = RoiBox::from_corners(
    top.x - expand,
    y,
    top.right() + expand,
    y + top.h * WAIST_HEIGHT,
    width,
    height,
  );

  let spot = band.w * WAIST_SPOT_WIDTH;
  let spot_at = |x: f32| RoiBox::from_corners(x, band.y, x + spot, band.bottom(), width, height);
  [
    band,
    spot_at(band.x),
    spot_at(band.x + band.w / 2.0 - spot / 2.0),
    spot_at(band.right() - spot),
  ]
}

/// 根据关键点构建全部分析区域
pub fn build_regions(pose: &Pose, width: u32, height: u32) -> RegionSet {
  use PoseLandmark::*;

  let top = padded_box(
    pose,
    &[LeftShoulder, RightShoulder, LeftHip, RightHip],
    width,
    height,
    TOP_PAD.0,
    TOP_PAD.1,
  );
  let [top_state, waist_left, waist_center, waist_right] = waist_boxes(&top, width, height);

  let padded = |indices: &[PoseLandmark], pad: (f32, f32)| padded_box(pose, indices, width, height, pad.0, pad.1);

  RegionSet {
    head: head_box(pose, width, height),
    chest: chest_box(pose, width, height),
    top,
    top_state,
    waist_left,
    waist_center,
    waist_right,
    bottom: padded(&[LeftHip, RightHip, LeftAnkle, RightAnkle], BOTTOM_PAD),
    foot: padded(&[LeftAnkle, RightAnkle, LeftFootIndex, RightFootIndex], FOOT_PAD),
    foot_left: padded(&[LeftAnkle, LeftHeel, LeftFootIndex], FOOT_SIDE_PAD),
    foot_right: padded(&[RightAnkle, RightHeel, RightFootIndex], FOOT_SIDE_PAD),
    sleeve_left: padded(&[LeftShoulder, LeftElbow, LeftWrist], SLEEVE_PAD),
    sleeve_right: padded(&[RightShoulder, RightElbow, RightWrist], SLEEVE_PAD),
  }
}
