//! Tensor contracts shared by every stage of the detection filter: element
//! types, shape descriptors, the named input/output binding of a compiled
//! model, and the dtype-tagged tensor container passed between stages.

pub mod binding;
pub mod descriptor;
pub mod errors;
pub mod tensor;

pub use binding::{Direction, ModelBinding, SlotSpec, TensorSlot};
pub use descriptor::{
    DType, TensorDescriptor, format_shape, parse_dtypes, parse_names, parse_shapes,
};
pub use errors::{BindingError, DescriptorError};
pub use tensor::Tensor;
