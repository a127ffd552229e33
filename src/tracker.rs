// 该文件是 Xunshi （巡视） 项目的一部分。
// src/tracker.rs - 基于质心的目标跟踪
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # 质心跟踪
//!
//! 在相邻的采样帧之间按质心距离关联检测结果，用于统计视频中去重后的目标数量。
//! 只有标签相同且距离不超过 `max_distance` 的检测才会被关联到已有目标；
//! 连续 `max_disappeared` 帧未出现的目标会被移除。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
  pub max_disappeared: u32,
  pub max_distance: f32,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      max_disappeared: 30,
      max_distance: 100.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
  pub centroid: (f32, f32),
  pub size: (f32, f32),
  pub label: String,
  pub disappeared: u32,
}

/// 跟踪统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingInfo {
  /// 每个标签注册过的目标数量
  pub unique_counts_by_label: BTreeMap<String, usize>,
  pub total_unique_objects: usize,
  /// 当前仍在跟踪的目标数量
  pub active_objects: usize,
}

#[derive(Debug, Default)]
pub struct CentroidTracker {
  config: TrackerConfig,
  next_id: u64,
  objects: BTreeMap<u64, TrackedObject>,
  registered: BTreeMap<String, usize>,
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
  ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

impl CentroidTracker {
  pub fn new(config: TrackerConfig) -> Self {
    Self {
      config,
      ..Default::default()
    }
  }

  pub fn objects(&self) -> &BTreeMap<u64, TrackedObject> {
    &self.objects
  }

  pub fn info(&self) -> TrackingInfo {
    TrackingInfo {
      unique_counts_by_label: self.registered.clone(),
      total_unique_objects: self.registered.values().sum(),
      active_objects: self.objects.len(),
    }
  }

  /// 用一帧的检测结果更新跟踪状态
  pub fn update(&mut self, detections: &[Detection]) {
    if detections.is_empty() {
      let ids: Vec<u64> = self.objects.keys().copied().collect();
      for id in ids {
        self.mark_disappeared(id);
      }
      return;
    }

    let inputs: Vec<TrackedObject> = detections
      .iter()
      .map(|d| TrackedObject {
        centroid: d.bbox.center(),
        size: d.bbox.size(),
        label: d.label.clone(),
        disappeared: 0,
      })
      .collect();

    if self.objects.is_empty() {
      for input in inputs {
        self.register(input);
      }
    } else {
      self.associate(inputs);
    }
  }

  fn associate(&mut self, inputs: Vec<TrackedObject>) {
    let ids: Vec<u64> = self.objects.keys().copied().collect();
    let centroids: Vec<(f32, f32)> = self.objects.values().map(|o| o.centroid).collect();

    // 距离矩阵：行为已有目标，列为新检测
    let dist: Vec<Vec<f32>> = centroids
      .iter()
      .map(|&c| inputs.iter().map(|i| distance(c, i.centroid)).collect())
      .collect();

    let nearest: Vec<(usize, f32)> = dist
      .iter()
      .map(|row| {
        row
          .iter()
          .copied()
          .enumerate()
          .fold((0, f32::INFINITY), |best, (j, d)| if d < best.1 { (j, d) } else { best })
      })
      .collect();

    // 按每行最小距离升序处理
    let mut rows: Vec<usize> = (0..ids.len()).collect();
    rows.sort_by(|&a, &b| nearest[a].1.total_cmp(&nearest[b].1));

    let mut used_rows = vec![false; ids.len()];
    let mut used_cols = vec![false; inputs.len()];

    for row in rows {
      let (col, d) = nearest[row];
      if used_rows[row] || used_cols[col] {
        continue;
      }
      let id = ids[row];
      let Some(object) = self.objects.get_mut(&id) else {
        continue;
      };
      if d <= self.config.max_distance && object.label == inputs[col].label {
        object.centroid = inputs[col].centroid;
        object.size = inputs[col].size;
        object.disappeared = 0;
        used_rows[row] = true;
        used_cols[col] = true;
      }
    }

    if ids.len() >= inputs.len() {
      for (row, used) in used_rows.iter().enumerate() {
        if !used {
          self.mark_disappeared(ids[row]);
        }
      }
    } else {
      for (col, input) in inputs.into_iter().enumerate() {
        if used_cols[col] {
          continue;
        }
        let nearest_existing = centroids
          .iter()
          .map(|&c| distance(c, input.centroid))
          .fold(f32::INFINITY, f32::min);
        if nearest_existing > self.config.max_distance * 0.5 {
          self.register(input);
        }
      }
    }
  }

  fn register(&mut self, object: TrackedObject) {
    debug!("注册目标 {}: {} @ {:?}", self.next_id, object.label, object.centroid);
    *self.registered.entry(object.label.clone()).or_default() += 1;
    self.objects.insert(self.next_id, object);
    self.next_id += 1;
  }

  fn mark_disappeared(&mut self, id: u64) {
    let Some(object) = self.objects.get_mut(&id) else {
      return;
    };
    object.disappeared += 1;
    if object.disappeared > self.config.max_disappeared {
      debug!("移除目标 {}: {}", id, object.label);
      self.objects.remove(&id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BBox;

  fn det(label: &str, cx: f32, cy: f32) -> Detection {
    Detection {
      bbox: BBox::from([cx - 10.0, cy - 10.0, cx + 10.0, cy + 10.0]),
      label: label.to_string(),
      class_id: 0,
      score: 0.9,
    }
  }

  #[test]
  fn moving_object_keeps_identity() {
    let mut tracker = CentroidTracker::new(TrackerConfig::default());
    for step in 0..5 {
      tracker.update(&[det("person", 100.0 + 20.0 * step as f32, 100.0)]);
    }
    let info = tracker.info();
    assert_eq!(info.total_unique_objects, 1);
    assert_eq!(info.active_objects, 1);
    let object = &tracker.objects()[&0];
    assert_eq!(object.centroid, (180.0, 100.0));
  }

  #[test]
  fn distant_objects_are_registered_separately() {
    let mut tracker = CentroidTracker::new(TrackerConfig::default());
    tracker.update(&[det("car", 100.0, 100.0)]);
    tracker.update(&[det("car", 105.0, 100.0), det("car", 500.0, 500.0)]);
    let info = tracker.info();
    assert_eq!(info.unique_counts_by_label.get("car"), Some(&2));
    assert_eq!(info.active_objects, 2);
  }

  #[test]
  fn labels_must_match() {
    let mut tracker = CentroidTracker::new(TrackerConfig {
      max_disappeared: 0,
      max_distance: 100.0,
    });
    tracker.update(&[det("cat", 100.0, 100.0)]);
    tracker.update(&[det("dog", 102.0, 100.0)]);
    // 同等数量时未匹配的旧目标记为消失，新检测不注册
    assert_eq!(tracker.info().active_objects, 0);
    assert_eq!(tracker.info().unique_counts_by_label.get("dog"), None);
  }

  #[test]
  fn objects_expire_after_max_disappeared() {
    let mut tracker = CentroidTracker::new(TrackerConfig {
      max_disappeared: 2,
      max_distance: 100.0,
    });
    tracker.update(&[det("person", 50.0, 50.0)]);
    tracker.update(&[]);
    tracker.update(&[]);
    assert_eq!(tracker.info().active_objects, 1);
    tracker.update(&[]);
    assert_eq!(tracker.info().active_objects, 0);
    assert_eq!(tracker.info().total_unique_objects, 1);
  }
}
