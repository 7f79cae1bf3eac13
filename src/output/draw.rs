// 该文件是 Yirong （仪容） 项目的一部分。
// src/output/draw.rs - 姿态与分析区域可视化
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut},
  rect::Rect,
};

use crate::{
  engine::FrameAnalysis,
  pose::{Pose, SKELETON_CONNECTIONS},
  roi::{RoiBox, build_regions},
};

// 只绘制可见度高于该值的关键点
const LANDMARK_VISIBILITY: f32 = 0.5;
const LANDMARK_RADIUS: i32 = 4;
const LINE_THICKNESS: i32 = 2;
const STATUS_BAR_HEIGHT: u32 = 8;

const SKELETON_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const LANDMARK_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const REGION_COLOR: [u8; 3] = [0, 128, 255];
const PASS_COLOR: [u8; 3] = [0, 200, 0];
const FAIL_COLOR: [u8; 3] = [220, 0, 0];

pub struct Draw {
  skeleton_color: [u8; 3],
  landmark_color: [u8; 3],
  region_color: [u8; 3],
  landmark_radius: i32,
  line_thickness: i32,
  draw_regions: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      skeleton_color: SKELETON_COLOR,
      landmark_color: LANDMARK_COLOR,
      region_color: REGION_COLOR,
      landmark_radius: LANDMARK_RADIUS,
      line_thickness: LINE_THICKNESS,
      draw_regions: true,
    }
  }
}

impl Draw {
  pub fn with_regions(mut self, draw_regions: bool) -> Self {
    self.draw_regions = draw_regions;
    self
  }

  /// 在帧的副本上绘制骨架、关键点与分析区域，顶部色条表示是否全身入镜
  pub fn draw_analysis(&self, frame: &RgbImage, analysis: &FrameAnalysis) -> RgbImage {
    let mut image = frame.clone();
    let (width, height) = image.dimensions();

    if self.draw_regions && analysis.result.full_body {
      let regions = build_regions(&analysis.pose, width, height);
      for (_, roi) in regions.iter() {
        self.draw_roi(&mut image, roi);
      }
    }
    self.draw_skeleton(&mut image, &analysis.pose);
    self.draw_landmarks(&mut image, &analysis.pose);

    let status = if analysis.result.full_body {
      PASS_COLOR
    } else {
      FAIL_COLOR
    };
    if width > 0 && height > 0 {
      let bar = Rect::at(0, 0).of_size(width, STATUS_BAR_HEIGHT.min(height));
      draw_filled_rect_mut(&mut image, bar, Rgb(status));
    }

    image
  }

  fn draw_skeleton(&self, image: &mut RgbImage, pose: &Pose) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    for &(a, b) in SKELETON_CONNECTIONS.iter() {
      let (p, q) = (&pose[a], &pose[b]);
      if !p.visible_above(LANDMARK_VISIBILITY) || !q.visible_above(LANDMARK_VISIBILITY) {
        continue;
      }
      let [x0, y0] = p.to_pixel(w, h);
      let [x1, y1] = q.to_pixel(w, h);
      // 沿法线方向平移以加粗线条
      for offset in 0..self.line_thickness {
        let d = offset as f32 - (self.line_thickness - 1) as f32 / 2.0;
        let (dx, dy) = if (x1 - x0).abs() > (y1 - y0).abs() {
          (0.0, d)
        } else {
          (d, 0.0)
        };
        draw_line_segment_mut(
          image,
          (x0 + dx, y0 + dy),
          (x1 + dx, y1 + dy),
          Rgb(self.skeleton_color),
        );
      }
    }
  }

  fn draw_landmarks(&self, image: &mut RgbImage, pose: &Pose) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    for landmark in pose.landmarks() {
      if !landmark.visible_above(LANDMARK_VISIBILITY) {
        continue;
      }
      let [x, y] = landmark.to_pixel(w, h);
      draw_filled_circle_mut(
        image,
        (x.round() as i32, y.round() as i32),
        self.landmark_radius,
        Rgb(self.landmark_color),
      );
    }
  }

  fn draw_roi(&self, image: &mut RgbImage, roi: &RoiBox) {
    if let Some((x, y, w, h)) = roi.pixel_rect() {
      let rect = Rect::at(x as i32, y as i32).of_size(w, h);
      draw_hollow_rect_mut(image, rect, Rgb(self.region_color));
    }
  }
}
