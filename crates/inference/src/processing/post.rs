use crate::errors::FilterError;
use ndarray::{Array, IxDyn};
use schema::{DType, Tensor};
use std::str::FromStr;

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Axis-aligned box: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union; 0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            (intersection / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: i32,
    pub probability: f32,
    pub bbox: BoundingBox,
}

/// Per-box model predictions for one frame, as parallel sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetectionBatch {
    classes: Vec<i32>,
    scores: Vec<f32>,
    bboxes: Vec<BoundingBox>,
}

impl RawDetectionBatch {
    pub fn new(
        classes: Vec<i32>,
        scores: Vec<f32>,
        bboxes: Vec<BoundingBox>,
    ) -> Result<Self, FilterError> {
        if classes.len() != scores.len() || classes.len() != bboxes.len() {
            return Err(FilterError::MalformedOutput(format!(
                "Parallel outputs differ in length: classes={}, scores={}, boxes={}",
                classes.len(),
                scores.len(),
                bboxes.len()
            )));
        }
        Ok(Self {
            classes,
            scores,
            bboxes,
        })
    }

    /// Flatten the class, score and box output tensors of a detection head.
    pub fn from_outputs(
        classes: &Tensor,
        scores: &Tensor,
        bboxes: &Tensor,
    ) -> Result<Self, FilterError> {
        let coords = bboxes.to_f32_vec();
        if coords.len() % 4 != 0 {
            return Err(FilterError::MalformedOutput(format!(
                "Box output has {} values, not a multiple of 4",
                coords.len()
            )));
        }

        Self::new(
            classes.to_f32_vec().into_iter().map(|c| c as i32).collect(),
            scores.to_f32_vec(),
            coords
                .chunks_exact(4)
                .map(|b| BoundingBox::new(b[0], b[1], b[2], b[3]))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn detection(&self, i: usize) -> Detection {
        Detection {
            class_id: self.classes[i],
            probability: self.scores[i],
            bbox: self.bboxes[i],
        }
    }
}

/// Order in which candidates take part in the greedy suppression pass.
///
/// `Ascending` reproduces the deployed behaviour: low-confidence boxes are
/// visited first and can suppress a higher-confidence duplicate.
/// `Descending` is conventional NMS, where the most confident box survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SuppressionOrder {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Ok(SuppressionOrder::Ascending),
            "descending" | "desc" => Ok(SuppressionOrder::Descending),
            other => Err(FilterError::Config(format!(
                "Unknown suppression order '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessConfig {
    /// Candidates need a score strictly above this.
    pub confidence_threshold: f32,
    /// Stop collecting candidates once this many passed the threshold.
    pub max_candidates: Option<usize>,
    pub iou_threshold: f32,
    pub order: SuppressionOrder,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0,
            max_candidates: None,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            order: SuppressionOrder::default(),
        }
    }
}

pub struct PostProcessor {
    config: PostProcessConfig,
}

impl PostProcessor {
    pub fn new(config: PostProcessConfig) -> Self {
        Self { config }
    }

    /// Score filtering followed by greedy IoU suppression.
    #[tracing::instrument(skip_all, fields(raw = batch.len()))]
    pub fn process(&self, batch: &RawDetectionBatch) -> Vec<Detection> {
        let candidates = self.filter_scores(batch);
        let candidate_count = candidates.len();
        let detections = self.suppress(candidates);

        tracing::trace!(
            candidates = candidate_count,
            kept = detections.len(),
            "Detections reduced"
        );
        detections
    }

    /// Entries with `score > confidence_threshold`, in detection order.
    pub fn filter_scores(&self, batch: &RawDetectionBatch) -> Vec<Detection> {
        let limit = self.config.max_candidates.unwrap_or(usize::MAX);
        (0..batch.len())
            .filter(|&i| batch.scores[i] > self.config.confidence_threshold)
            .take(limit)
            .map(|i| batch.detection(i))
            .collect()
    }

    /// Greedy pairwise suppression; survivors keep their input order.
    pub fn suppress(&self, candidates: Vec<Detection>) -> Vec<Detection> {
        let mut visit: Vec<usize> = (0..candidates.len()).collect();
        // Stable sorts, so equal probabilities keep source order.
        match self.config.order {
            SuppressionOrder::Ascending => visit.sort_by(|&a, &b| {
                candidates[a]
                    .probability
                    .total_cmp(&candidates[b].probability)
            }),
            SuppressionOrder::Descending => visit.sort_by(|&a, &b| {
                candidates[b]
                    .probability
                    .total_cmp(&candidates[a].probability)
            }),
        }

        let mut suppressed = vec![false; candidates.len()];
        for (pos, &i) in visit.iter().enumerate() {
            if suppressed[i] {
                continue;
            }
            for &j in &visit[pos + 1..] {
                if candidates[i].bbox.iou(&candidates[j].bbox) > self.config.iou_threshold {
                    suppressed[j] = true;
                }
            }
        }

        candidates
            .into_iter()
            .zip(suppressed)
            .filter_map(|(detection, gone)| (!gone).then_some(detection))
            .collect()
    }
}

/// Encode detections as the filter's `[classes, scores, boxes]` outputs,
/// shaped `[1, M, 1]`, `[1, M, 1]`, `[1, M, 4]`.
pub fn to_output_tensors(
    detections: &[Detection],
    dtypes: [DType; 3],
) -> Result<Vec<Tensor>, FilterError> {
    let m = detections.len();
    let classes: Vec<f32> = detections.iter().map(|d| d.class_id as f32).collect();
    let scores: Vec<f32> = detections.iter().map(|d| d.probability).collect();
    let boxes: Vec<f32> = detections
        .iter()
        .flat_map(|d| [d.bbox.x, d.bbox.y, d.bbox.width, d.bbox.height])
        .collect();

    let shaped = |data: Vec<f32>, last: usize| {
        Array::from_shape_vec(IxDyn(&[1, m, last]), data)
            .map(Tensor::F32)
            .map_err(|e| FilterError::MalformedOutput(e.to_string()))
    };

    Ok(vec![
        shaped(classes, 1)?.cast(dtypes[0]),
        shaped(scores, 1)?.cast(dtypes[1]),
        shaped(boxes, 4)?.cast(dtypes[2]),
    ])
}
