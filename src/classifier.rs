// 该文件是 Yirong （仪容） 项目的一部分。
// src/classifier.rs - 零样本服饰属性分类
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

use std::{collections::HashMap, fmt, sync::Arc};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
  frame::ClipFrame,
  model::{Embedding, ImageEncoder, ModelError, TextEncoder, cosine_similarity},
  raster::{self, LegSkin},
  roi::RoiBox,
  verdict::Verdict,
};

pub const UNKNOWN_LABEL: &str = "unknown";
/// 宽度不超过该值的区域不做分类
const MIN_ROI_WIDTH: f32 = 5.0;

const DISPLAY_PREFIXES: [&str; 4] = ["a person wearing ", "a person with ", "a person's ", "completely "];

/// 与分类结果对比的肤色阈值，均为经验值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinThresholds {
  /// 脚部肤色占比高于该值时直接判定为赤脚
  pub foot_bare: f32,
  /// 模型判定赤脚但肤色占比低于该值时改判为鞋
  pub foot_floor: f32,
  pub sleeve_low: f32,
  pub sleeve_high: f32,
  pub torn: f32,
  pub ankle: f32,
}

impl Default for SkinThresholds {
  fn default() -> Self {
    Self {
      foot_bare: 0.5,
      foot_floor: 0.10,
      sleeve_low: 0.015,
      sleeve_high: 0.30,
      torn: 0.05,
      ankle: 0.15,
    }
  }
}

/// 分类后的修正规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
  None,
  /// 分类前后对照脚部肤色占比
  Foot,
  /// 按袖口肤色占比归一到 LONG / SHORT / ROLLED
  Sleeve,
}

#[derive(Debug)]
pub struct Category {
  pub name: &'static str,
  pub prompts: &'static [&'static str],
  pub correction: Correction,
}

const TOP_PROMPTS: &[&str] = &[
  "a short-sleeve t-shirt with no collar",
  "a sleeveless tank top",
  "open jacket lapels with visible shirt underneath",
  "a light blue button-down shirt with a collar and rolled-up sleeves",
  "a white button-down shirt with a collar",
  "a person wearing a polo shirt with a folded collar",
  "a person wearing a denim shirt",
  "a person wearing a formal button-down shirt",
  "a person wearing a long-sleeve button-down dress shirt with collar",
  "a person wearing a short-sleeve button-down shirt with collar",
  "a light blue casual button-down shirt with a collar",
  "a linen shirt with rolled-up sleeves",
  "a white button-down shirt",
  "a person wearing a light blue button-down shirt with a collar and rolled-up sleeves",
  "a person wearing a white button-down shirt with a collar",
  "a person wearing a hoodie",
  "a person wearing a jacket",
  "a person wearing a tank top",
  "a person with a bare torso",
  "a person wearing a windbreaker",
  "a person wearing a formal uniform jacket",
];

const WAIST_SIDE_PROMPTS: &[&str] = &[
  "waistband and belt are visibly separating shirt and pants",
  "shirt entered into the trousers",
  "a belt buckle sitting on the waist",
  "shirt hem hanging down over the hips",
  "shirt fabric covering the entire waist area",
  "no belt visible, shirt covers the pants waist",
  "untucked shirt tail",
  "messy shirt sticking out of pants",
  "uneven shirt hem line",
  "shirt pulled out of waistband",
];

const HEAD_STATE_PROMPTS: &[&str] = &[
  "neatly combed hair (true)",
  "messy unkempt hair (false)",
  "wearing a hat or cap (false)",
];

const BOTTOM_TYPE_PROMPTS: &[&str] = &[
  "long trousers covering the entire legs",
  "short pants revealing knees and calves",
  "a skirt or dress revealing legs",
];

const TOP_CONDITION_PROMPTS: &[&str] = &[
  "clean shirt with natural lighting shadows (true)",
  "intact fabric surface (true)",
  "shirt with normal fabric texture (true)",
  "heavily wrinkled unironed shirt (false)",
  "clothing with messy deep creases (false)",
  "crumpled fabric looking messy (false)",
  "clearly wrinkled shirt with visible fold lines across the torso (false)",
  "shirt with obvious wrinkles on the abdomen area (false)",
  "shirt with distinct colored stains (false)",
  "dirty clothing with mud spots (false)",
];

const SLEEVE_STATE_PROMPTS: &[&str] = &[
  "long sleeve covering the whole arm to the wrist",
  "full length dress shirt sleeve",
  "short sleeve t-shirt revealing the whole arm",
  "short sleeve polo shirt",
  "bare arm with short sleeves",
  "long sleeve shirt with rolled up sleeves",
  "folded shirt sleeves exposing the forearm",
  "sleeves rolled up to the elbow",
];

const BOTTOM_PROMPTS: &[&str] = &[
  "a person wearing blue denim jeans",
  "a person wearing white pants or white trousers",
  "a person wearing light colored chinos or khakis",
  "a person wearing denim jeans pants",
  "a person wearing formal trousers",
  "a person wearing casual long pants",
  "a person wearing shorts or short pants",
  "a person wearing joggers or sweatpants",
];

const FOOT_PROMPTS: &[&str] = &[
  "a person wearing sneakers",
  "a person wearing boots",
  "a person wearing formal shoes",
  "a person wearing leather shoes",
  "a person wearing sandals",
  "a person wearing flip-flops",
  "completely bare feet",
  "no shoes, bare feet",
];

const HEAD_PROMPTS: &[&str] = &[
  "a person wearing a straw fedora hat with a ribbon",
  "a person wearing a fedora hat",
  "a person wearing a baseball cap",
  "a person wearing a beanie",
  "a person wearing a sun hat",
  "a person with hair and no hat",
  "a person with a bald head",
  "a person's head with hair, no hat",
  "a person wearing a peaked cap",
];

const CHEST_ACCESSORY_PROMPTS: &[&str] = &[
  // 领带
  "a necktie hanging on a shirt",
  "a tie knot at the collar",
  "a person wearing a formal tie",
  "a bow tie",
  // 工牌 / 挂绳
  "a lanyard strap around the neck",
  "an identification badge hanging on the chest",
  "an employee ID card with a strap",
  "a plastic badge holder on a shirt",
  "a blue lanyard string",
  // 无配饰
  "a plain shirt without any accessories",
  "a clean chest area with no straps or ties",
  "an open collar shirt showing only skin",
  "a plain white button-down shirt",
  "just a shirt fabric, nothing else",
];

/// 全部分类类别；新增类别只需在此添加一项
pub static CATEGORIES: &[Category] = &[
  Category { name: "top", prompts: TOP_PROMPTS, correction: Correction::None },
  Category { name: "waist_side", prompts: WAIST_SIDE_PROMPTS, correction: Correction::None },
  Category { name: "head_state", prompts: HEAD_STATE_PROMPTS, correction: Correction::None },
  Category { name: "bottom_type", prompts: BOTTOM_TYPE_PROMPTS, correction: Correction::None },
  Category { name: "top_condition", prompts: TOP_CONDITION_PROMPTS, correction: Correction::None },
  Category { name: "sleeve_state", prompts: SLEEVE_STATE_PROMPTS, correction: Correction::Sleeve },
  Category { name: "bottom", prompts: BOTTOM_PROMPTS, correction: Correction::None },
  Category { name: "foot", prompts: FOOT_PROMPTS, correction: Correction::Foot },
  Category { name: "head", prompts: HEAD_PROMPTS, correction: Correction::None },
  Category { name: "chest_accessory", prompts: CHEST_ACCESSORY_PROMPTS, correction: Correction::None },
];

pub fn category(name: &str) -> Option<&'static Category> {
  CATEGORIES.iter().find(|c| c.name == name)
}

/// 展示标签到简短规范标签，键为去除前缀后的提示词
const LABEL_MAP: &[(&str, &str)] = &[
  ("a light blue button-down shirt with a collar and rolled-up sleeves", "casual shirt"),
  ("a white button-down shirt with a collar", "formal shirt"),
  ("a polo shirt with a folded collar", "shirt"),
  ("a formal button-down shirt", "formal shirt"),
  ("a tank top", "tank top"),
  ("a hoodie", "outerwear"),
  ("a jacket", "outerwear"),
  ("a windbreaker", "outerwear"),
  ("a formal uniform jacket", "outerwear"),
  ("a bare torso", "bare torso"),
  ("long trousers covering the entire legs", "long_pants"),
  ("short pants revealing knees and calves", "shorts"),
  ("a skirt or dress revealing legs", "shorts"),
  ("blue denim jeans", "jeans"),
  ("white pants or white trousers", "white pants"),
  ("light colored chinos or khakis", "khaki pants"),
  ("formal trousers", "trousers"),
  ("casual long pants", "trousers"),
  ("shorts or short pants", "shorts"),
  ("joggers or sweatpants", "joggers"),
  ("sneakers", "sneakers"),
  ("leather shoes", "leather shoes"),
  ("formal shoes", "formal shoes"),
  ("sandals", "sandals"),
  ("flip-flops", "sandals"),
  ("bare feet", "bare feet"),
  ("no shoes, bare feet", "bare feet"),
  ("a baseball cap", "baseball cap"),
  ("a beanie", "beanie"),
  ("a sun hat", "sun hat"),
  ("hair and no hat", "no hat"),
  ("a bald head", "no hat"),
  ("head with hair, no hat", "no hat"),
  ("waistband and belt are visibly separating shirt and pants", "tucked"),
  ("shirt entered into the trousers", "tucked"),
  ("a belt buckle sitting on the waist", "tucked"),
  ("shirt hem hanging down over the hips", "untucked"),
  ("shirt fabric covering the entire waist area", "untucked"),
  ("no belt visible, shirt covers the pants waist", "untucked"),
  ("untucked shirt tail", "untucked"),
  ("messy shirt sticking out of pants", "untucked"),
  ("uneven shirt hem line", "untucked"),
  ("shirt pulled out of waistband", "untucked"),
  ("a necktie hanging on a shirt", "necktie"),
  ("a tie knot at the collar", "necktie"),
  ("a bow tie", "necktie"),
  ("a lanyard strap around the neck", "lanyard"),
  ("an identification badge hanging on the chest", "id_card"),
  ("an employee ID card with a strap", "id_card"),
  ("a plastic badge holder on a shirt", "id_card"),
  ("a blue lanyard string", "id_card"),
  ("a plain shirt without any accessories", "none"),
  ("a clean chest area with no straps or ties", "none"),
  ("an open collar shirt showing only skin", "none"),
  ("a plain white button-down shirt", "none"),
  ("just a shirt fabric, nothing else", "none"),
];

/// 去掉提示词中的描述性前缀，每个前缀只去除第一次出现
pub fn display_label(prompt: &str) -> String {
  DISPLAY_PREFIXES
    .iter()
    .fold(prompt.to_string(), |label, prefix| label.replacen(prefix, "", 1))
}

/// 规范标签，无映射时返回展示标签本身
pub fn map_label(display: &str) -> &str {
  LABEL_MAP
    .iter()
    .find(|(from, _)| *from == display)
    .map(|(_, to)| *to)
    .unwrap_or(display)
}

/// 一次分类的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
  /// 相似度最高的展示标签
  pub raw: String,
  /// 映射或修正后的标签
  pub label: String,
  /// 参与修正的肤色占比
  pub skin_ratio: Option<f32>,
}

impl Classification {
  fn fixed(label: &str, skin_ratio: Option<f32>) -> Self {
    Self {
      raw: label.to_string(),
      label: label.to_string(),
      skin_ratio,
    }
  }

  pub fn unknown() -> Self {
    Self::fixed(UNKNOWN_LABEL, None)
  }

  /// `raw(label)` 形式，便于追溯
  pub fn detailed(&self) -> String {
    format!("{}({})", self.raw, self.label)
  }
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label)
  }
}

#[derive(Debug)]
struct CachedLabel {
  display: String,
  embedding: Embedding,
}

/// 基于图文嵌入相似度的分类器，持有每个类别的文本嵌入缓存
pub struct ZeroShotClassifier<T, I> {
  text: T,
  image: I,
  skin: SkinThresholds,
  cache: RwLock<HashMap<&'static str, Arc<[CachedLabel]>>>,
}

impl<T: TextEncoder, I: ImageEncoder> ZeroShotClassifier<T, I> {
  pub fn new(text: T, image: I, skin: SkinThresholds) -> Self {
    Self {
      text,
      image,
      skin,
      cache: RwLock::new(HashMap::new()),
    }
  }

  pub fn skin_thresholds(&self) -> &SkinThresholds {
    &self.skin
  }

  /// 已缓存文本嵌入的类别数
  pub async fn cached_categories(&self) -> usize {
    self.cache.read().await.len()
  }

  async fn labels(&self, category: &'static Category) -> Result<Arc<[CachedLabel]>, ModelError> {
    if let Some(labels) = self.cache.read().await.get(category.name) {
      return Ok(labels.clone());
    }

    debug!("编码类别 {} 的 {} 条提示词", category.name, category.prompts.len());
    let embeddings = self.text.encode(category.prompts).await?;
    if embeddings.len() != category.prompts.len() {
      return Err(ModelError::Inference(format!(
        "文本嵌入数量 {} 与提示词数量 {} 不一致",
        embeddings.len(),
        category.prompts.len()
      )));
    }
    let labels: Arc<[CachedLabel]> = category
      .prompts
      .iter()
      .zip(embeddings)
      .map(|(prompt, embedding)| CachedLabel {
        display: display_label(prompt),
        embedding,
      })
      .collect();

    let mut cache = self.cache.write().await;
    Ok(cache.entry(category.name).or_insert(labels).clone())
  }

  /// 对图像中的一个区域做零样本分类
  pub async fn classify(
    &self,
    image: &RgbImage,
    roi: &RoiBox,
    name: &str,
  ) -> Result<Classification, ModelError> {
    let category = category(name).ok_or_else(|| ModelError::UnknownCategory(name.to_string()))?;
    if roi.w <= MIN_ROI_WIDTH {
      debug!("{}: 区域过小 {:?}", name, roi);
      return Ok(Classification::unknown());
    }

    let mut skin_ratio = None;
    if category.correction == Correction::Foot {
      let ratio = raster::skin_ratio(image, roi);
      debug!("{}: 肤色占比 {:.3}", name, ratio);
      if ratio > self.skin.foot_bare {
        return Ok(Classification::fixed("bare feet", Some(ratio)));
      }
      skin_ratio = Some(ratio);
    }

    let labels = self.labels(category).await?;
    let frame = ClipFrame::from_region(image, roi);
    let embedding = self.image.encode(&frame).await?;

    let mut best: Option<(&CachedLabel, f32)> = None;
    for item in labels.iter() {
      let score = cosine_similarity(&embedding, &item.embedding);
      if best.is_none_or(|(_, top)| score > top) {
        best = Some((item, score));
      }
    }
    let Some((best, score)) = best else {
      return Ok(Classification::unknown());
    };
    debug!("{}: {} ({:.4})", name, best.display, score);

    let raw = best.display.clone();
    let result = match category.correction {
      Correction::None => Classification {
        label: map_label(&raw).to_string(),
        raw,
        skin_ratio,
      },
      Correction::Foot => {
        let ratio = skin_ratio.unwrap_or_default();
        if raw.contains("feet") && ratio < self.skin.foot_floor {
          warn!("{}: 模型判定赤脚但肤色占比仅 {:.3}, 改判为鞋", name, ratio);
          Classification {
            raw: "shoes".to_string(),
            label: "shoes".to_string(),
            skin_ratio,
          }
        } else {
          Classification {
            label: map_label(&raw).to_string(),
            raw,
            skin_ratio,
          }
        }
      }
      Correction::Sleeve => {
        let ratio = raster::skin_ratio(image, roi);
        Classification {
          label: correct_sleeve(&raw, ratio, &self.skin),
          raw,
          skin_ratio: Some(ratio),
        }
      }
    };
    Ok(result)
  }

  /// 返回标签字符串；`detailed` 为真时返回 `raw(label)`，区域过小时仍为 `unknown`
  pub async fn classify_label(
    &self,
    image: &RgbImage,
    roi: &RoiBox,
    name: &str,
    detailed: bool,
  ) -> Result<String, ModelError> {
    let result = self.classify(image, roi, name).await?;
    Ok(if detailed && result.raw != UNKNOWN_LABEL {
      result.detailed()
    } else {
      result.label
    })
  }
}

/// 按袖口肤色占比修正袖长标签
pub fn correct_sleeve(label: &str, skin_ratio: f32, thresholds: &SkinThresholds) -> String {
  let upper = label.to_uppercase();
  let is_long = upper.contains("LONG") || upper.contains("FULL");

  if upper.contains("SHORT") && skin_ratio < thresholds.sleeve_low {
    warn!("袖长自动修正: 标签为 SHORT 但肤色占比 {:.3}, 改为 LONG", skin_ratio);
    return "LONG".to_string();
  }
  if is_long && skin_ratio > thresholds.sleeve_high {
    warn!("袖长自动修正: 标签为 LONG 但肤色占比 {:.3}, 改为 SHORT", skin_ratio);
    return "SHORT".to_string();
  }

  if is_long {
    "LONG".to_string()
  } else if upper.contains("SHORT") || upper.contains("BARE") || upper.contains("SLEEVELESS") {
    "SHORT".to_string()
  } else if upper.contains("ROLLED") {
    "ROLLED".to_string()
  } else {
    label.to_string()
  }
}

/// 一致性检查结果及其细节说明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCheck {
  pub verdict: Verdict,
  pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootwearKind {
  Bare,
  Sandal,
  Shoe,
  Unknown,
}

impl FootwearKind {
  pub fn from_label(label: &str) -> Self {
    let label = label.to_lowercase();
    if label.contains("bare") || label.contains("feet") {
      FootwearKind::Bare
    } else if ["sandal", "flip-flop", "slipper"].iter().any(|k| label.contains(k)) {
      FootwearKind::Sandal
    } else if ["shoe", "sneaker", "boot"].iter().any(|k| label.contains(k)) {
      FootwearKind::Shoe
    } else {
      FootwearKind::Unknown
    }
  }
}

impl fmt::Display for FootwearKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FootwearKind::Bare => "BARE",
      FootwearKind::Sandal => "SANDAL",
      FootwearKind::Shoe => "SHOE",
      FootwearKind::Unknown => "UNKNOWN",
    };
    f.write_str(name)
  }
}

/// 左右脚穿着是否一致
pub fn footwear_consistency(left: &str, right: &str) -> PairCheck {
  use FootwearKind::*;

  let (lk, rk) = (FootwearKind::from_label(left), FootwearKind::from_label(right));
  let details = format!("Left: {} ({}) - Right: {} ({})", left, lk, right, rk);

  let verdict = match (lk, rk) {
    (Bare, other) | (other, Bare) if other != Bare => Verdict::fail("One foot is bare, the other has footwear!"),
    (Shoe, Sandal) | (Sandal, Shoe) => Verdict::fail("Mismatched footwear type (Shoe vs Sandal)!"),
    (l, r) if l == r && l != Bare && left != right => {
      Verdict::fail(format!("Mismatched style ({} vs {})!", left, right))
    }
    _ => Verdict::pass("Pass"),
  };

  if !verdict.passed {
    warn!("鞋履不一致: {} {}", verdict.text, details);
  }
  PairCheck { verdict, details }
}

/// 单个衣摆位置的得分
pub fn tuck_vote(label: &str) -> i32 {
  match label {
    "tucked" => 1,
    "untucked" | "messy" => -3,
    _ => 0,
  }
}

/// 左、中、右三处衣摆得分相加，总分大于 0 才算塞好
pub fn tuck_verdict(left: &str, center: &str, right: &str) -> Verdict {
  let score = tuck_vote(left) + tuck_vote(center) + tuck_vote(right);
  debug!("衣摆得分: L({}) + C({}) + R({}) = {}", left, center, right, score);
  if score > 0 {
    Verdict::pass("Clothing is tucked")
  } else {
    Verdict::fail("Clothing is untucked")
  }
}

/// 裤装状态：短裤直接判定整齐，否则依次检查破洞和挽裤脚
pub fn pants_condition(bottom_type: &str, legs: LegSkin, thresholds: &SkinThresholds) -> Verdict {
  if bottom_type == "shorts" {
    return Verdict::pass("neat pants");
  }
  debug!("裤装肤色: 小腿 {:.3}, 裤脚 {:.3}", legs.leg, legs.ankle);
  if legs.leg > thresholds.torn {
    Verdict::fail("torn pants (hole detected)")
  } else if legs.ankle > thresholds.ankle {
    Verdict::fail("The pants are rolled up.")
  } else {
    Verdict::pass("neat pants")
  }
}

/// 左右袖长是否一致，输入为修正后的标签
pub fn sleeve_consistency(left: &Classification, right: &Classification) -> PairCheck {
  let details = format!(
    "L: {} ({:.3}) - R: {} ({:.3})",
    left.label,
    left.skin_ratio.unwrap_or_default(),
    right.label,
    right.skin_ratio.unwrap_or_default()
  );
  let verdict = if left.label == right.label {
    Verdict::pass("Sleeves matched")
  } else {
    warn!("袖长不一致: {}", details);
    Verdict::fail("WARNING: Mismatched sleeve style!")
  };
  PairCheck { verdict, details }
}


#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use super::mock::*;
  use super::*;
  use crate::raster::fixtures::{NAVY, SKIN, paint, solid};

  fn whole(image: &RgbImage) -> RoiBox {
    RoiBox {
      x: 0.0,
      y: 0.0,
      w: image.width() as f32,
      h: image.height() as f32,
    }
  }

  fn classifier(image_embedding: Embedding) -> ZeroShotClassifier<OneHotText, ScriptedImage> {
    ZeroShotClassifier::new(
      OneHotText::default(),
      ScriptedImage::constant(image_embedding),
      SkinThresholds::default(),
    )
  }

  #[test]
  fn display_label_strips_prefixes() {
    assert_eq!(display_label("a person wearing a hoodie"), "a hoodie");
    assert_eq!(display_label("a person's head with hair, no hat"), "head with hair, no hat");
    assert_eq!(display_label("completely bare feet"), "bare feet");
    assert_eq!(map_label("a hoodie"), "outerwear");
    assert_eq!(map_label("a denim shirt"), "a denim shirt");
  }

  #[test]
  fn every_category_has_prompts() {
    for name in [
      "top",
      "waist_side",
      "head_state",
      "bottom_type",
      "top_condition",
      "sleeve_state",
      "bottom",
      "foot",
      "head",
      "chest_accessory",
    ] {
      let c = category(name).unwrap();
      assert!(!c.prompts.is_empty());
      assert!(c.prompts.len() <= DIM);
    }
  }

  #[tokio::test]
  async fn narrow_region_is_unknown_without_encoding() {
    let c = classifier(one_hot(0));
    let image = solid(100, 100, NAVY);
    let roi = RoiBox { x: 10.0, y: 10.0, w: 5.0, h: 50.0 };
    let out = c.classify(&image, &roi, "top").await.unwrap();
    assert_eq!(out.label, UNKNOWN_LABEL);
    assert_eq!(c.image.calls.load(Ordering::SeqCst), 0);
    assert_eq!(c.text.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn picks_highest_similarity_and_maps_label() {
    // 第 15 条: "a person wearing a hoodie"
    let c = classifier(one_hot(15));
    let image = solid(64, 64, NAVY);
    let out = c.classify(&image, &whole(&image), "top").await.unwrap();
    assert_eq!(out.raw, "a hoodie");
    assert_eq!(out.label, "outerwear");
    assert_eq!(out.detailed(), "a hoodie(outerwear)");
  }

  #[tokio::test]
  async fn label_string_plain_or_detailed() {
    // 第 2 条: "a person wearing a formal tie"，展示标签没有映射
    let c = classifier(one_hot(2));
    let image = solid(64, 64, NAVY);
    let roi = whole(&image);
    let plain = c.classify_label(&image, &roi, "chest_accessory", false).await.unwrap();
    let detailed = c.classify_label(&image, &roi, "chest_accessory", true).await.unwrap();
    assert_eq!(plain, "a formal tie");
    assert_eq!(detailed, "a formal tie(a formal tie)");

    // 第 0 条: "a necktie hanging on a shirt" → necktie
    let c = classifier(one_hot(0));
    let plain = c.classify_label(&image, &roi, "chest_accessory", false).await.unwrap();
    let detailed = c.classify_label(&image, &roi, "chest_accessory", true).await.unwrap();
    assert_eq!(plain, "necktie");
    assert_eq!(detailed, "a necktie hanging on a shirt(necktie)");

    let narrow = RoiBox { x: 0.0, y: 0.0, w: 4.0, h: 64.0 };
    let out = c.classify_label(&image, &narrow, "chest_accessory", true).await.unwrap();
    assert_eq!(out, UNKNOWN_LABEL);
  }

  #[tokio::test]
  async fn ties_keep_first_label() {
    let mut v = vec![0.0; DIM];
    v[1] = 1.0;
    v[2] = 1.0;
    let c = classifier(v.into_boxed_slice());
    let image = solid(64, 64, NAVY);
    let out = c.classify(&image, &whole(&image), "bottom_type").await.unwrap();
    assert_eq!(out.label, "shorts");
    assert_eq!(out.raw, "short pants revealing knees and calves");
  }

  #[tokio::test]
  async fn text_embeddings_are_cached_per_category() {
    let c = classifier(one_hot(0));
    let image = solid(64, 64, NAVY);
    for _ in 0..3 {
      c.classify(&image, &whole(&image), "waist_side").await.unwrap();
    }
    c.classify(&image, &whole(&image), "head").await.unwrap();
    assert_eq!(c.text.calls.load(Ordering::SeqCst), 2);
    assert_eq!(c.cached_categories().await, 2);
    assert_eq!(c.image.calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn bare_skin_short_circuits_foot() {
    let c = classifier(one_hot(0));
    let mut image = solid(100, 100, NAVY);
    paint(&mut image, 0, 0, 100, 60, SKIN);
    let out = c.classify(&image, &whole(&image), "foot").await.unwrap();
    assert_eq!(out.label, "bare feet");
    assert_eq!(c.image.calls.load(Ordering::SeqCst), 0);
    assert_eq!(c.text.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn bare_feet_without_skin_becomes_shoes() {
    // 第 6 条: "completely bare feet"
    let c = classifier(one_hot(6));
    let image = solid(100, 100, NAVY);
    let out = c.classify(&image, &whole(&image), "foot").await.unwrap();
    assert_eq!(out.label, "shoes");
  }

  #[tokio::test]
  async fn short_sleeve_without_skin_becomes_long() {
    // 第 2 条: "short sleeve t-shirt revealing the whole arm"
    let c = classifier(one_hot(2));
    let image = solid(100, 100, NAVY);
    let out = c.classify(&image, &whole(&image), "sleeve_state").await.unwrap();
    assert_eq!(out.label, "LONG");
    assert_eq!(out.skin_ratio, Some(0.0));
  }

  #[tokio::test]
  async fn unknown_category_is_an_error() {
    let c = classifier(one_hot(0));
    let image = solid(64, 64, NAVY);
    let err = c.classify(&image, &whole(&image), "gloves").await.unwrap_err();
    assert!(matches!(err, ModelError::UnknownCategory(_)));
  }

  #[test]
  fn sleeve_correction_rules() {
    let t = SkinThresholds::default();
    assert_eq!(correct_sleeve("full length dress shirt sleeve", 0.5, &t), "SHORT");
    assert_eq!(correct_sleeve("full length dress shirt sleeve", 0.1, &t), "LONG");
    assert_eq!(correct_sleeve("bare arm with short sleeves", 0.2, &t), "SHORT");
    assert_eq!(correct_sleeve("sleeves rolled up to the elbow", 0.2, &t), "ROLLED");
    assert_eq!(correct_sleeve("folded shirt sleeves exposing the forearm", 0.2, &t), "folded shirt sleeves exposing the forearm");
  }

  #[test]
  fn footwear_pairs() {
    assert!(footwear_consistency("sneakers", "sneakers").verdict.passed);
    assert!(!footwear_consistency("bare feet", "sneakers").verdict.passed);
    assert!(!footwear_consistency("sandals", "leather shoes").verdict.passed);

    let style = footwear_consistency("sneakers", "leather shoes");
    assert_eq!(style.verdict, Verdict::fail("Mismatched style (sneakers vs leather shoes)!"));
    assert_eq!(style.details, "Left: sneakers (SHOE) - Right: leather shoes (SHOE)");

    assert!(footwear_consistency("bare feet", "bare feet").verdict.passed);
    assert_eq!(footwear_consistency("shoes", "shoes").verdict.to_string(), "Pass (true)");
  }

  #[test]
  fn untucked_votes_dominate() {
    assert_eq!(tuck_verdict("tucked", "untucked", "tucked"), Verdict::fail("Clothing is untucked"));
    assert_eq!(tuck_verdict("tucked", "tucked", "unknown"), Verdict::pass("Clothing is tucked"));
    assert_eq!(tuck_verdict("unknown", "unknown", "unknown"), Verdict::fail("Clothing is untucked"));
    assert!(tuck_vote("untucked") * 3 + tuck_vote("tucked") < 0);
  }

  #[test]
  fn pants_rules_in_order() {
    let t = SkinThresholds::default();
    let legs = |leg, ankle| LegSkin { leg, ankle };
    assert!(pants_condition("shorts", legs(0.9, 0.9), &t).passed);
    assert_eq!(pants_condition("long_pants", legs(0.06, 0.9), &t).text, "torn pants (hole detected)");
    assert_eq!(pants_condition("long_pants", legs(0.0, 0.2), &t).text, "The pants are rolled up.");
    assert_eq!(pants_condition("long_pants", legs(0.0, 0.0), &t), Verdict::pass("neat pants"));
  }

  #[test]
  fn sleeves_match_on_corrected_label() {
    let side = |label: &str, skin| Classification {
      raw: label.to_string(),
      label: label.to_string(),
      skin_ratio: Some(skin),
    };
    let ok = sleeve_consistency(&side("LONG", 0.0), &side("LONG", 0.01));
    assert_eq!(ok.verdict.to_string(), "Sleeves matched (true)");
    assert_eq!(ok.details, "L: LONG (0.000) - R: LONG (0.010)");
    assert!(!sleeve_consistency(&side("LONG", 0.0), &side("SHORT", 0.4)).verdict.passed);
  }
}
