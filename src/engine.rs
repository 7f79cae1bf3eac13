// 该文件是 Yirong （仪容） 项目的一部分。
// src/engine.rs - 分析引擎：模型生命周期与单帧流水线
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

use std::time::Duration;

use chrono::Utc;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
  sync::{OnceCell, watch},
  time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{
  classifier::{
    Classification, SkinThresholds, ZeroShotClassifier, footwear_consistency, pants_condition,
    sleeve_consistency, tuck_verdict,
  },
  color::{bottom_color, top_color},
  gate::{GateConfig, is_full_body_candidate},
  geometry,
  model::{BackendLoader, ImageEncoder, ModelError, PoseDetector, TextEncoder},
  pose::{Pose, round_to},
  raster,
  report::{AnalysisResult, Angles, ClothingReport, PostureThresholds, STATUS_FULL_BODY, posture_lines},
  roi::{RegionSet, RoiBox, build_regions},
  stability::{StabilityWeights, stability_score},
  verdict::{Verdict, strip_tags},
};

#[derive(Error, Debug)]
pub enum AnalysisError {
  #[error("画面中没有检测到人")]
  NoPerson,
  #[error("模型在 {0:?} 内未能就绪")]
  LibraryLoadTimeout(Duration),
  #[error("提交帧到姿态检测器失败: {0}")]
  PoseSendFailed(#[source] ModelError),
  #[error("任务已被更新的请求取代")]
  Cancelled,
  #[error("引擎未就绪: {0}")]
  NotReady(String),
  #[error("模型错误: {0}")]
  Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum EngineStatus {
  Uninitialized,
  Loading,
  Ready,
  Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub gate: GateConfig,
  pub stability: StabilityWeights,
  pub skin: SkinThresholds,
  pub posture: PostureThresholds,
  pub load_timeout_ms: u64,
  /// 每帧分析前清除检测器的时序状态
  pub reset_detector_per_frame: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      gate: GateConfig::default(),
      stability: StabilityWeights::default(),
      skin: SkinThresholds::default(),
      posture: PostureThresholds::default(),
      load_timeout_ms: 10_000,
      reset_detector_per_frame: true,
    }
  }
}

impl EngineConfig {
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  pub fn load_timeout(&self) -> Duration {
    Duration::from_millis(self.load_timeout_ms)
  }
}

#[derive(Debug, Clone)]
pub struct FrameAnalysis {
  pub pose: Pose,
  pub result: AnalysisResult,
}

struct Loaded<L: BackendLoader> {
  detector: L::Detector,
  classifier: ZeroShotClassifier<L::Text, L::Image>,
}

/// 分析引擎。
///
/// 模型只加载一次，并发的初始化请求共享同一次加载；
/// 同一时刻只有最新提交的帧会产出结果，较早的帧返回 [`AnalysisError::Cancelled`]。
pub struct Engine<L: BackendLoader> {
  loader: L,
  config: EngineConfig,
  loaded: OnceCell<Loaded<L>>,
  status: watch::Sender<EngineStatus>,
  generation: watch::Sender<u64>,
}

impl<L: BackendLoader> Engine<L> {
  pub fn new(loader: L, config: EngineConfig) -> Self {
    Self {
      loader,
      config,
      loaded: OnceCell::new(),
      status: watch::channel(EngineStatus::Uninitialized).0,
      generation: watch::channel(0).0,
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn status(&self) -> EngineStatus {
    self.status.borrow().clone()
  }

  /// 加载全部模型；已加载时立即返回
  pub async fn initialize(&self) -> Result<(), AnalysisError> {
    self.ensure_loaded().await.map(|_| ())
  }

  async fn ensure_loaded(&self) -> Result<&Loaded<L>, AnalysisError> {
    self
      .loaded
      .get_or_try_init(|| async {
        // 失败不重试：排队等待的调用直接拿到同一个错误
        if let EngineStatus::Error(reason) = self.status() {
          return Err(AnalysisError::NotReady(reason));
        }
        self.status.send_replace(EngineStatus::Loading);
        info!("开始加载模型");
        let limit = self.config.load_timeout();
        match timeout(limit, self.loader.load()).await {
          Err(_) => {
            error!("模型加载超时: {:?}", limit);
            self
              .status
              .send_replace(EngineStatus::Error(format!("加载超时 {:?}", limit)));
            Err(AnalysisError::LibraryLoadTimeout(limit))
          }
          Ok(Err(e)) => {
            error!("模型加载失败: {}", e);
            self.status.send_replace(EngineStatus::Error(e.to_string()));
            Err(AnalysisError::Model(e))
          }
          Ok(Ok(backends)) => {
            info!("模型加载完成");
            self.status.send_replace(EngineStatus::Ready);
            Ok(Loaded {
              detector: backends.detector,
              classifier: ZeroShotClassifier::new(backends.text, backends.image, self.config.skin),
            })
          }
        }
      })
      .await
  }

  /// 清除检测器的时序状态，并取消正在进行的分析
  pub async fn reset(&self) {
    self.generation.send_modify(|g| *g += 1);
    if let Some(loaded) = self.loaded.get() {
      loaded.detector.reset().await;
    }
    debug!("引擎已重置");
  }

  fn next_job(&self) -> u64 {
    let mut job = 0;
    self.generation.send_modify(|g| {
      *g += 1;
      job = *g;
    });
    job
  }

  /// 分析一帧图像
  pub async fn analyze_frame(&self, image: &RgbImage) -> Result<AnalysisResult, AnalysisError> {
    self.analyze(image).await.map(|analysis| analysis.result)
  }

  /// 与 [`Engine::analyze_frame`] 相同，额外返回检测到的姿态，供叠加绘制使用
  pub async fn analyze(&self, image: &RgbImage) -> Result<FrameAnalysis, AnalysisError> {
    if let EngineStatus::Error(reason) = self.status() {
      return Err(AnalysisError::NotReady(reason));
    }
    let loaded = self.ensure_loaded().await?;

    if self.config.reset_detector_per_frame {
      loaded.detector.reset().await;
    }
    let job = self.next_job();
    debug!("提交任务 #{}", job);

    let pipeline = async {
      let pose = loaded
        .detector
        .detect(image)
        .await
        .map_err(AnalysisError::PoseSendFailed)?
        .ok_or(AnalysisError::NoPerson)?;
      let result = self.process(loaded, image, &pose).await;
      Ok::<_, AnalysisError>(FrameAnalysis { pose, result })
    };

    let result = tokio::select! {
      biased;
      _ = superseded(self.generation.subscribe(), job) => Err(AnalysisError::Cancelled),
      result = pipeline => result,
    };

    if *self.generation.borrow() != job {
      debug!("任务 #{} 已过期, 丢弃结果", job);
      return Err(AnalysisError::Cancelled);
    }
    result
  }

  async fn process(&self, loaded: &Loaded<L>, image: &RgbImage, pose: &Pose) -> AnalysisResult {
    let (width, height) = image.dimensions();
    let confidence = pose.mean_visibility();

    if !is_full_body_candidate(pose, &self.config.gate) {
      info!("未通过全身检查, 置信度 {}", confidence);
      return AnalysisResult::not_full_body(confidence);
    }

    let head = geometry::head_angle(pose, width, height);
    let shoulder = geometry::shoulder_tilt(pose);
    let back = geometry::back_angle(pose);
    let forward_z = geometry::forward_head(pose).z_score;
    let stability = stability_score(pose, &self.config.stability);
    let max_arm = geometry::max_arm_deviation(pose);
    let max_leg = geometry::max_leg_deviation(pose);
    debug!(
      "姿态: 头 {:.1}, 肩 {:.1}, 背 {:.1}, 前倾 {:.2}, 稳定 {:.1}",
      head, shoulder, back, forward_z, stability
    );

    let angles = Angles {
      head_deviation: round_to(head.abs(), 1),
      shoulder_tilt: round_to(shoulder.abs(), 1),
      forward_head_z: round_to(forward_z, 2),
      forward_head_degrees: round_to(geometry::forward_head_degrees(forward_z), 1),
      back_deviation: round_to(back, 1),
      back_tilt: round_to(geometry::back_tilt(pose, width, height), 1),
      arm_angles: geometry::arm_angles(pose).map(|a| round_to(a, 1)),
      leg_angles: geometry::leg_angles(pose).map(|a| round_to(a, 1)),
      max_arm_angle: round_to(max_arm, 1),
      max_leg_angle: round_to(max_leg, 1),
      stability_norm: round_to(stability / 100.0, 2),
    };

    let regions = build_regions(pose, width, height);
    let clothing = assess_clothing(&loaded.classifier, image, pose, &regions).await;

    AnalysisResult {
      full_body: true,
      person_detected: true,
      confidence,
      angles,
      stability_score: stability,
      clothing,
      status_text: STATUS_FULL_BODY.to_string(),
      posture_lines: posture_lines(back, head, forward_z, shoulder.abs(), max_leg, &self.config.posture),
      timestamp: Utc::now(),
    }
  }
}

/// 等到有更新的任务提交为止
async fn superseded(mut rx: watch::Receiver<u64>, job: u64) {
  loop {
    if *rx.borrow_and_update() != job {
      return;
    }
    if rx.changed().await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}

/// 单个类别分类失败时记为 unknown，不影响其它类别
async fn classify_or_unknown<T, I>(
  classifier: &ZeroShotClassifier<T, I>,
  image: &RgbImage,
  roi: &RoiBox,
  category: &str,
) -> Classification
where
  T: TextEncoder,
  I: ImageEncoder,
{
  match classifier.classify(image, roi, category).await {
    Ok(result) => result,
    Err(e) => {
      warn!("类别 {} 分类失败, 记为 unknown: {}", category, e);
      Classification::unknown()
    }
  }
}

fn tagged(raw: &str) -> Verdict {
  Verdict::parse(raw).unwrap_or_else(|_| Verdict::unknown())
}

async fn assess_clothing<T, I>(
  classifier: &ZeroShotClassifier<T, I>,
  image: &RgbImage,
  pose: &Pose,
  regions: &RegionSet,
) -> ClothingReport
where
  T: TextEncoder,
  I: ImageEncoder,
{
  let c = classifier;
  let top = classify_or_unknown(c, image, &regions.top, "top").await;
  let bottom = classify_or_unknown(c, image, &regions.bottom, "bottom").await;
  let foot = classify_or_unknown(c, image, &regions.foot, "foot").await;
  let head = classify_or_unknown(c, image, &regions.head, "head").await;
  let head_state = classify_or_unknown(c, image, &regions.head, "head_state").await;
  let accessory = classify_or_unknown(c, image, &regions.chest, "chest_accessory").await;
  let waist_left = classify_or_unknown(c, image, &regions.waist_left, "waist_side").await;
  let waist_center = classify_or_unknown(c, image, &regions.waist_center, "waist_side").await;
  let waist_right = classify_or_unknown(c, image, &regions.waist_right, "waist_side").await;
  let top_condition = classify_or_unknown(c, image, &regions.top, "top_condition").await;
  debug!("衣物状态: {}", top_condition.detailed());
  let foot_left = classify_or_unknown(c, image, &regions.foot_left, "foot").await;
  let foot_right = classify_or_unknown(c, image, &regions.foot_right, "foot").await;
  let sleeve_left = classify_or_unknown(c, image, &regions.sleeve_left, "sleeve_state").await;
  let sleeve_right = classify_or_unknown(c, image, &regions.sleeve_right, "sleeve_state").await;
  let bottom_type = classify_or_unknown(c, image, &regions.bottom, "bottom_type").await;

  let foot_check = footwear_consistency(&foot_left.label, &foot_right.label);
  let sleeve_check = sleeve_consistency(&sleeve_left, &sleeve_right);
  let legs = raster::leg_skin(image, &regions.bottom);

  ClothingReport {
    top: strip_tags(&top.label),
    bottom: strip_tags(&bottom.label),
    foot: strip_tags(&foot.label),
    head: strip_tags(&head.label),
    accessory: strip_tags(&accessory.label),
    top_state: tuck_verdict(&waist_left.label, &waist_center.label, &waist_right.label),
    bottom_state: pants_condition(&bottom_type.label, legs, classifier.skin_thresholds()),
    top_condition: tagged(&top_condition.raw),
    head_state: tagged(&head_state.raw),
    foot_check: foot_check.verdict,
    sleeve_check: sleeve_check.verdict,
    foot_details: foot_check.details,
    sleeve_details: sleeve_check.details,
    top_color: top_color(image, pose),
    bottom_color: bottom_color(image, pose),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use async_trait::async_trait;

  use super::*;
  use crate::{
    classifier::mock::{OneHotText, ScriptedImage, one_hot},
    model::{Backends, Embedding},
    pose::{
      Landmark, PoseLandmark,
      fixtures::{standing_pose, with_landmark},
    },
    raster::fixtures::{NAVY, solid},
  };

  struct MockDetector {
    pose: Option<Pose>,
    delays: Mutex<Vec<u64>>,
    resets: AtomicUsize,
  }

  #[async_trait]
  impl PoseDetector for MockDetector {
    async fn detect(&self, _image: &RgbImage) -> Result<Option<Pose>, ModelError> {
      let delay = {
        let mut delays = self.delays.lock().unwrap();
        if delays.is_empty() { 0 } else { delays.remove(0) }
      };
      tokio::time::sleep(Duration::from_millis(delay)).await;
      Ok(self.pose.clone())
    }

    async fn reset(&self) {
      self.resets.fetch_add(1, Ordering::SeqCst);
    }
  }

  struct MockLoader {
    pose: Option<Pose>,
    image: Vec<Embedding>,
    detect_delays: Vec<u64>,
    load_delay: u64,
    loads: AtomicUsize,
  }

  impl MockLoader {
    fn new(pose: Option<Pose>) -> Self {
      Self {
        pose,
        image: vec![one_hot(0)],
        detect_delays: Vec::new(),
        load_delay: 0,
        loads: AtomicUsize::new(0),
      }
    }
  }

  #[async_trait]
  impl BackendLoader for MockLoader {
    type Detector = MockDetector;
    type Text = OneHotText;
    type Image = ScriptedImage;

    async fn load(&self) -> Result<Backends<MockDetector, OneHotText, ScriptedImage>, ModelError> {
      self.loads.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(self.load_delay)).await;
      Ok(Backends {
        detector: MockDetector {
          pose: self.pose.clone(),
          delays: Mutex::new(self.detect_delays.clone()),
          resets: AtomicUsize::new(0),
        },
        text: OneHotText::default(),
        image: ScriptedImage::new(self.image.clone()),
      })
    }
  }

  fn frame() -> RgbImage {
    solid(400, 400, NAVY)
  }

  #[tokio::test]
  async fn full_body_frame_produces_complete_result() {
    let engine = Engine::new(MockLoader::new(Some(standing_pose())), EngineConfig::default());
    let result = engine.analyze_frame(&frame()).await.unwrap();

    assert!(result.full_body);
    assert_eq!(result.status_text, STATUS_FULL_BODY);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.stability_score, 100.0);
    assert_eq!(result.angles.max_leg_angle, 0.0);
    assert_eq!(result.angles.leg_angles, [0.0, 0.0]);
    assert_eq!(result.angles.back_tilt, 0.0);
    assert_eq!(result.angles.forward_head_degrees, 0.0);
    assert!(result.angles.arm_angles.iter().all(|&a| a > 0.0 && a < 10.0));
    assert_eq!(result.posture_lines.len(), 4);
    // 第 0 条提示词 "a short-sleeve t-shirt with no collar" 无映射
    assert_eq!(result.clothing.top, "a short-sleeve t-shirt with no collar");
    assert_eq!(result.clothing.bottom, "jeans");
    assert_eq!(result.clothing.top_state, Verdict::pass("Clothing is tucked"));
    assert_eq!(result.clothing.head_state, Verdict::pass("neatly combed hair"));
    assert_eq!(result.clothing.top_color.as_str(), "darkblue");
    assert_eq!(engine.status(), EngineStatus::Ready);
  }

  #[tokio::test]
  async fn missing_person_is_an_error() {
    let engine = Engine::new(MockLoader::new(None), EngineConfig::default());
    let err = engine.analyze_frame(&frame()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NoPerson));
  }

  #[tokio::test]
  async fn failed_gate_skips_classification() {
    let pose = with_landmark(
      &standing_pose(),
      PoseLandmark::LeftAnkle,
      Landmark::new(0.57, 0.88, 0.0, 0.3),
    );
    let engine = Engine::new(MockLoader::new(Some(pose)), EngineConfig::default());
    let result = engine.analyze_frame(&frame()).await.unwrap();
    assert!(!result.full_body);
    assert_eq!(result.angles, Angles::default());
    assert_eq!(result.clothing, ClothingReport::default());
    let loaded = engine.loaded.get().unwrap();
    assert_eq!(loaded.classifier.cached_categories().await, 0);
  }

  #[tokio::test]
  async fn encoder_failure_degrades_to_unknown() {
    let mut loader = MockLoader::new(Some(standing_pose()));
    loader.image = Vec::new();
    let engine = Engine::new(loader, EngineConfig::default());
    let result = engine.analyze_frame(&frame()).await.unwrap();
    assert!(result.full_body);
    assert_eq!(result.clothing.top, "unknown");
    assert_eq!(result.clothing.top_condition, Verdict::unknown());
    assert!(!result.clothing.top_state.passed);
  }

  #[tokio::test]
  async fn concurrent_initialization_loads_once() {
    let mut loader = MockLoader::new(None);
    loader.load_delay = 5;
    let engine = Engine::new(loader, EngineConfig::default());
    let (a, b, c) = tokio::join!(engine.initialize(), engine.initialize(), engine.initialize());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(engine.loader.loads.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_load_times_out_and_blocks_analysis() {
    let mut loader = MockLoader::new(Some(standing_pose()));
    loader.load_delay = 60_000;
    let engine = Engine::new(loader, EngineConfig::default());

    let err = engine.initialize().await.unwrap_err();
    assert!(matches!(err, AnalysisError::LibraryLoadTimeout(d) if d == Duration::from_secs(10)));
    assert!(matches!(engine.status(), EngineStatus::Error(_)));

    let err = engine.analyze_frame(&frame()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NotReady(_)));
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_callers_share_one_failed_load() {
    let mut loader = MockLoader::new(Some(standing_pose()));
    loader.load_delay = 60_000;
    let engine = Engine::new(loader, EngineConfig::default());
    let start = tokio::time::Instant::now();

    let (a, b, c) = tokio::join!(engine.initialize(), engine.initialize(), engine.initialize());
    assert!(matches!(a, Err(AnalysisError::LibraryLoadTimeout(_))));
    assert!(matches!(b, Err(AnalysisError::NotReady(_))));
    assert!(matches!(c, Err(AnalysisError::NotReady(_))));
    assert_eq!(engine.loader.loads.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(11));

    assert!(matches!(engine.initialize().await, Err(AnalysisError::NotReady(_))));
    assert_eq!(engine.loader.loads.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn newer_frame_cancels_older_one() {
    let mut loader = MockLoader::new(Some(standing_pose()));
    loader.detect_delays = vec![100, 0];
    let engine = Engine::new(loader, EngineConfig::default());
    engine.initialize().await.unwrap();

    let image = frame();
    let (first, second) = tokio::join!(engine.analyze_frame(&image), async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      engine.analyze_frame(&image).await
    });
    assert!(matches!(first, Err(AnalysisError::Cancelled)));
    assert!(second.unwrap().full_body);
  }

  #[tokio::test(start_paused = true)]
  async fn reset_cancels_pending_job_and_clears_detector() {
    let mut loader = MockLoader::new(Some(standing_pose()));
    loader.detect_delays = vec![100];
    let mut config = EngineConfig::default();
    config.reset_detector_per_frame = false;
    let engine = Engine::new(loader, config);
    engine.initialize().await.unwrap();

    let image = frame();
    let (result, _) = tokio::join!(engine.analyze_frame(&image), async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      engine.reset().await
    });
    assert!(matches!(result, Err(AnalysisError::Cancelled)));
    let resets = engine.loaded.get().unwrap().detector.resets.load(Ordering::SeqCst);
    assert_eq!(resets, 1);
  }

  #[test]
  fn config_fills_missing_fields_with_defaults() {
    let config = EngineConfig::from_json(r#"{"load_timeout_ms": 500, "skin": {"torn": 0.1}}"#).unwrap();
    assert_eq!(config.load_timeout(), Duration::from_millis(500));
    assert_eq!(config.skin.torn, 0.1);
    assert_eq!(config.skin.ankle, 0.15);
    assert!(config.reset_detector_per_frame);
    assert_eq!(config.gate, GateConfig::default());
  }
}
