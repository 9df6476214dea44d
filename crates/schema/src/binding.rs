use crate::descriptor::{DType, TensorDescriptor, format_shape};
use crate::errors::BindingError;
use std::collections::HashSet;
use std::fmt;

/// Per-direction slot limit of the host tensor contract.
pub const MAX_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Parsed but not yet validated shapes/types/names of one direction.
#[derive(Debug, Clone, Default)]
pub struct SlotSpec {
    pub shapes: Vec<Vec<usize>>,
    pub dtypes: Vec<DType>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSlot {
    pub name: String,
    pub descriptor: TensorDescriptor,
}

/// The fixed, named input and output slots of a compiled model.
///
/// Only obtainable through [`ModelBinding::new`], so every instance holds
/// between 1 and [`MAX_SLOTS`] uniquely named slots per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBinding {
    inputs: Vec<TensorSlot>,
    outputs: Vec<TensorSlot>,
}

fn build_slots(direction: Direction, spec: SlotSpec) -> Result<Vec<TensorSlot>, BindingError> {
    let SlotSpec {
        shapes,
        dtypes,
        names,
    } = spec;

    if shapes.len() != dtypes.len() || shapes.len() != names.len() {
        return Err(BindingError::CountMismatch {
            direction,
            shapes: shapes.len(),
            types: dtypes.len(),
            names: names.len(),
        });
    }

    if shapes.is_empty() || shapes.len() > MAX_SLOTS {
        return Err(BindingError::InvalidCount {
            direction,
            count: shapes.len(),
            max: MAX_SLOTS,
        });
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(BindingError::DuplicateName {
                direction,
                name: name.clone(),
            });
        }
    }

    let slots: Vec<TensorSlot> = shapes
        .into_iter()
        .zip(dtypes)
        .zip(names)
        .map(|((dims, dtype), name)| TensorSlot {
            name,
            descriptor: TensorDescriptor::new(dims, dtype),
        })
        .collect();

    // A bound descriptor's element count and byte size never overflow.
    if let Some(slot) = slots.iter().find(|s| s.descriptor.byte_len().is_none()) {
        return Err(BindingError::ShapeOverflow {
            direction,
            name: slot.name.clone(),
            shape: format_shape(&slot.descriptor.dims),
        });
    }

    Ok(slots)
}

impl ModelBinding {
    pub fn new(inputs: SlotSpec, outputs: SlotSpec) -> Result<Self, BindingError> {
        Ok(Self {
            inputs: build_slots(Direction::Input, inputs)?,
            outputs: build_slots(Direction::Output, outputs)?,
        })
    }

    pub fn inputs(&self) -> &[TensorSlot] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorSlot] {
        &self.outputs
    }

    pub fn input_descriptors(&self) -> Vec<TensorDescriptor> {
        self.inputs.iter().map(|s| s.descriptor.clone()).collect()
    }

    pub fn output_descriptors(&self) -> Vec<TensorDescriptor> {
        self.outputs.iter().map(|s| s.descriptor.clone()).collect()
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|s| s.name.as_str())
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(count: usize) -> SlotSpec {
        SlotSpec {
            shapes: (0..count).map(|i| vec![i + 1, 4]).collect(),
            dtypes: vec![DType::Float32; count],
            names: (0..count).map(|i| format!("t{}", i)).collect(),
        }
    }

    #[test]
    fn test_all_valid_counts_succeed() {
        for inputs in 1..=MAX_SLOTS {
            for outputs in 1..=MAX_SLOTS {
                let binding = ModelBinding::new(spec(inputs), spec(outputs))
                    .unwrap_or_else(|e| panic!("({inputs},{outputs}) should bind: {e}"));
                assert_eq!(binding.inputs().len(), inputs);
                assert_eq!(binding.outputs().len(), outputs);
            }
        }
    }

    #[test]
    fn test_count_above_limit_fails_per_direction() {
        let err = ModelBinding::new(spec(5), spec(1)).unwrap_err();
        assert_eq!(
            err,
            BindingError::InvalidCount {
                direction: Direction::Input,
                count: 5,
                max: MAX_SLOTS
            }
        );

        let err = ModelBinding::new(spec(1), spec(5)).unwrap_err();
        assert!(matches!(
            err,
            BindingError::InvalidCount {
                direction: Direction::Output,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_direction_fails() {
        let err = ModelBinding::new(SlotSpec::default(), spec(1)).unwrap_err();
        assert!(matches!(err, BindingError::InvalidCount { count: 0, .. }));
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let mut inputs = spec(2);
        inputs.dtypes.pop();
        let err = ModelBinding::new(inputs, spec(1)).unwrap_err();
        assert_eq!(
            err,
            BindingError::CountMismatch {
                direction: Direction::Input,
                shapes: 2,
                types: 1,
                names: 2
            }
        );

        let mut outputs = spec(3);
        outputs.names.push("extra".to_string());
        assert!(matches!(
            ModelBinding::new(spec(1), outputs),
            Err(BindingError::CountMismatch {
                direction: Direction::Output,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_names_fail() {
        let mut outputs = spec(2);
        outputs.names = vec!["scores".to_string(), "scores".to_string()];
        assert!(matches!(
            ModelBinding::new(spec(1), outputs),
            Err(BindingError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_overflowing_shape_fails() {
        let inputs = SlotSpec {
            shapes: crate::parse_shapes("3:4294967296:4294967296:4294967296").unwrap(),
            dtypes: vec![DType::UInt8],
            names: vec!["image".to_string()],
        };
        assert_eq!(
            ModelBinding::new(inputs, spec(1)).unwrap_err(),
            BindingError::ShapeOverflow {
                direction: Direction::Input,
                name: "image".to_string(),
                shape: "3:4294967296:4294967296:4294967296".to_string(),
            }
        );

        // Fits as elements, overflows once multiplied by the element size.
        let outputs = SlotSpec {
            shapes: vec![vec![usize::MAX / 2]],
            dtypes: vec![DType::Float32],
            names: vec!["scores".to_string()],
        };
        assert!(matches!(
            ModelBinding::new(spec(1), outputs),
            Err(BindingError::ShapeOverflow {
                direction: Direction::Output,
                ..
            })
        ));
    }

    #[test]
    fn test_slots_keep_insertion_order() {
        let outputs = SlotSpec {
            shapes: vec![vec![1, 100, 1], vec![1, 100, 1], vec![4, 100, 1]],
            dtypes: vec![DType::Float32, DType::Float32, DType::Float32],
            names: vec![
                "detection_classes".to_string(),
                "detection_scores".to_string(),
                "detection_boxes".to_string(),
            ],
        };
        let binding = ModelBinding::new(spec(1), outputs).unwrap();
        let names: Vec<_> = binding.output_names().collect();
        assert_eq!(
            names,
            ["detection_classes", "detection_scores", "detection_boxes"]
        );
        assert_eq!(binding.output_descriptors()[2].dims, vec![4, 100, 1]);
    }
}
