// 该文件是 Yirong （仪容） 项目的一部分。
// src/pose.rs - 人体关键点定义
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

use std::ops::Index;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 一个姿态包含的关键点数量，与外部检测器约定一致
pub const POSE_LANDMARK_COUNT: usize = 33;

/// 关键点索引，顺序与外部姿态检测器的文档保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
  Nose = 0,
  LeftEyeInner = 1,
  LeftEye = 2,
  LeftEyeOuter = 3,
  RightEyeInner = 4,
  RightEye = 5,
  RightEyeOuter = 6,
  LeftEar = 7,
  RightEar = 8,
  MouthLeft = 9,
  MouthRight = 10,
  LeftShoulder = 11,
  RightShoulder = 12,
  LeftElbow = 13,
  RightElbow = 14,
  LeftWrist = 15,
  RightWrist = 16,
  LeftPinky = 17,
  RightPinky = 18,
  LeftIndex = 19,
  RightIndex = 20,
  LeftThumb = 21,
  RightThumb = 22,
  LeftHip = 23,
  RightHip = 24,
  LeftKnee = 25,
  RightKnee = 26,
  LeftAnkle = 27,
  RightAnkle = 28,
  LeftHeel = 29,
  RightHeel = 30,
  LeftFootIndex = 31,
  RightFootIndex = 32,
}

impl PoseLandmark {
  pub const fn index(self) -> usize {
    self as usize
  }
}

/// 骨架连线，用于叠加绘制
pub const SKELETON_CONNECTIONS: [(PoseLandmark, PoseLandmark); 12] = [
  (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
  (PoseLandmark::LeftShoulder, PoseLandmark::LeftElbow),
  (PoseLandmark::LeftElbow, PoseLandmark::LeftWrist),
  (PoseLandmark::RightShoulder, PoseLandmark::RightElbow),
  (PoseLandmark::RightElbow, PoseLandmark::RightWrist),
  (PoseLandmark::LeftShoulder, PoseLandmark::LeftHip),
  (PoseLandmark::RightShoulder, PoseLandmark::RightHip),
  (PoseLandmark::LeftHip, PoseLandmark::RightHip),
  (PoseLandmark::LeftHip, PoseLandmark::LeftKnee),
  (PoseLandmark::LeftKnee, PoseLandmark::LeftAnkle),
  (PoseLandmark::RightHip, PoseLandmark::RightKnee),
  (PoseLandmark::RightKnee, PoseLandmark::RightAnkle),
];

/// 单个关键点，坐标为归一化图像坐标 (0..1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
  pub x: f32,
  pub y: f32,
  #[serde(default)]
  pub z: f32,
  /// 可见度，检测器未给出时为 None
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visibility: Option<f32>,
}

impl Landmark {
  pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
    Self {
      x,
      y,
      z,
      visibility: Some(visibility),
    }
  }

  /// 可见度不低于阈值，未给出可见度时视为可见
  pub fn visible_at_least(&self, threshold: f32) -> bool {
    self.visibility.is_none_or(|v| v >= threshold)
  }

  /// 可见度严格高于阈值，未给出可见度时视为可见
  pub fn visible_above(&self, threshold: f32) -> bool {
    self.visibility.is_none_or(|v| v > threshold)
  }

  pub fn xy(&self) -> [f32; 2] {
    [self.x, self.y]
  }

  pub fn xyz(&self) -> [f32; 3] {
    [self.x, self.y, self.z]
  }

  /// 转为像素坐标
  pub fn to_pixel(&self, width: f32, height: f32) -> [f32; 2] {
    [self.x * width, self.y * height]
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoseError {
  #[error("关键点数量不匹配: 期望 {expected}, 实际 {actual}")]
  LandmarkCount { expected: usize, actual: usize },
}

/// 一帧图像中单个人的完整关键点集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct Pose {
  landmarks: Box<[Landmark]>,
}

impl TryFrom<Vec<Landmark>> for Pose {
  type Error = PoseError;

  fn try_from(landmarks: Vec<Landmark>) -> Result<Self, Self::Error> {
    if landmarks.len() != POSE_LANDMARK_COUNT {
      return Err(PoseError::LandmarkCount {
        expected: POSE_LANDMARK_COUNT,
        actual: landmarks.len(),
      });
    }
    Ok(Self {
      landmarks: landmarks.into_boxed_slice(),
    })
  }
}

impl From<Pose> for Vec<Landmark> {
  fn from(pose: Pose) -> Self {
    pose.landmarks.into_vec()
  }
}

impl From<[Landmark; POSE_LANDMARK_COUNT]> for Pose {
  fn from(landmarks: [Landmark; POSE_LANDMARK_COUNT]) -> Self {
    Self {
      landmarks: Box::new(landmarks),
    }
  }
}

impl Index<PoseLandmark> for Pose {
  type Output = Landmark;

  fn index(&self, index: PoseLandmark) -> &Self::Output {
    &self.landmarks[index.index()]
  }
}

impl Pose {
  pub fn landmarks(&self) -> &[Landmark] {
    &self.landmarks
  }

  pub fn get(&self, index: usize) -> Option<&Landmark> {
    self.landmarks.get(index)
  }

  /// 两个关键点的归一化中点
  pub fn midpoint(&self, a: PoseLandmark, b: PoseLandmark) -> Landmark {
    let (a, b) = (self[a], self[b]);
    Landmark {
      x: (a.x + b.x) / 2.0,
      y: (a.y + b.y) / 2.0,
      z: (a.z + b.z) / 2.0,
      visibility: None,
    }
  }

  /// 平均可见度，保留两位小数；缺失的可见度按 0 计
  pub fn mean_visibility(&self) -> f32 {
    let sum: f32 = self
      .landmarks
      .iter()
      .map(|lm| lm.visibility.unwrap_or(0.0))
      .sum();
    round_to(sum / self.landmarks.len() as f32, 2)
  }
}

/// 按小数位数四舍五入
pub fn round_to(value: f32, digits: i32) -> f32 {
  let factor = 10f32.powi(digits);
  (value * factor).round() / factor
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  /// 站姿端正、全身入镜的正面姿态
  pub fn standing_pose() -> Pose {
    let mut lm = [Landmark::new(0.5, 0.5, 0.0, 0.9); POSE_LANDMARK_COUNT];
    let mut set = |i: PoseLandmark, x: f32, y: f32| lm[i.index()] = Landmark::new(x, y, 0.0, 0.9);
    set(PoseLandmark::Nose, 0.5, 0.12);
    set(PoseLandmark::LeftEyeInner, 0.51, 0.1);
    set(PoseLandmark::LeftEye, 0.52, 0.1);
    set(PoseLandmark::LeftEyeOuter, 0.53, 0.1);
    set(PoseLandmark::RightEyeInner, 0.49, 0.1);
    set(PoseLandmark::RightEye, 0.48, 0.1);
    set(PoseLandmark::RightEyeOuter, 0.47, 0.1);
    set(PoseLandmark::LeftEar, 0.55, 0.11);
    set(PoseLandmark::RightEar, 0.45, 0.11);
    set(PoseLandmark::MouthLeft, 0.52, 0.14);
    set(PoseLandmark::MouthRight, 0.48, 0.14);
    set(PoseLandmark::LeftShoulder, 0.6, 0.25);
    set(PoseLandmark::RightShoulder, 0.4, 0.25);
    set(PoseLandmark::LeftElbow, 0.62, 0.4);
    set(PoseLandmark::RightElbow, 0.38, 0.4);
    set(PoseLandmark::LeftWrist, 0.63, 0.55);
    set(PoseLandmark::RightWrist, 0.37, 0.55);
    set(PoseLandmark::LeftHip, 0.57, 0.55);
    set(PoseLandmark::RightHip, 0.43, 0.55);
    set(PoseLandmark::LeftKnee, 0.57, 0.72);
    set(PoseLandmark::RightKnee, 0.43, 0.72);
    set(PoseLandmark::LeftAnkle, 0.57, 0.88);
    set(PoseLandmark::RightAnkle, 0.43, 0.88);
    set(PoseLandmark::LeftHeel, 0.56, 0.9);
    set(PoseLandmark::RightHeel, 0.44, 0.9);
    set(PoseLandmark::LeftFootIndex, 0.58, 0.92);
    set(PoseLandmark::RightFootIndex, 0.42, 0.92);
    Pose::from(lm)
  }

  pub fn with_landmark(pose: &Pose, index: PoseLandmark, landmark: Landmark) -> Pose {
    let mut landmarks: Vec<Landmark> = pose.clone().into();
    landmarks[index.index()] = landmark;
    Pose::try_from(landmarks).unwrap()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pose_requires_exactly_33_landmarks() {
    let err = Pose::try_from(vec![Landmark::default(); 17]).unwrap_err();
    assert_eq!(
      err,
      PoseError::LandmarkCount {
        expected: 33,
        actual: 17
      }
    );
  }

  #[test]
  fn pose_deserializes_from_json_array() {
    let json = serde_json::to_string(&vec![Landmark::new(0.1, 0.2, 0.0, 0.5); 33]).unwrap();
    let pose: Pose = serde_json::from_str(&json).unwrap();
    assert_eq!(pose[PoseLandmark::RightFootIndex].y, 0.2);
  }

  #[test]
  fn missing_visibility_counts_as_visible_but_not_in_mean() {
    let lm = Landmark {
      x: 0.0,
      y: 0.0,
      z: 0.0,
      visibility: None,
    };
    assert!(lm.visible_at_least(0.5));
    let pose = Pose::try_from(vec![lm; 33]).unwrap();
    assert_eq!(pose.mean_visibility(), 0.0);
  }

  #[test]
  fn mean_visibility_is_rounded() {
    let pose = fixtures::with_landmark(
      &fixtures::standing_pose(),
      PoseLandmark::Nose,
      Landmark::new(0.5, 0.12, 0.0, 0.0),
    );
    // (32 * 0.9) / 33 = 0.8727...
    assert_eq!(pose.mean_visibility(), 0.87);
  }
}
