// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use ndarray::{arr0, ArrayD};

/// Scalar type used throughout the parameter graph.
pub type Scalar = f64;

/// Concrete parameter value. Scalars are carried as zero-dimensional arrays
/// so packing can treat every value uniformly.
pub type Value = ArrayD<Scalar>;

/// Wraps a plain scalar into a [`Value`].
pub fn scalar_value(value: Scalar) -> Value {
    arr0(value).into_dyn()
}

/// Dynamic/static state of a parameter. Dynamic parameters receive their
/// value at call time through a resolved context; static parameters hold a
/// fixed value assigned at configuration time.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamState {
    Dynamic,
    Static(Value),
}

/// A named value slot owned by a module node.
///
/// The shape is locked by the first concrete value ever assigned and every
/// later assignment (static or via a resolved context) must match it.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    state: ParamState,
    shape: Option<Vec<usize>>,
}

impl Parameter {
    pub(crate) fn new(name: impl Into<String>, initial: Option<Value>) -> Self {
        let shape = initial.as_ref().map(|value| value.shape().to_vec());
        let state = match initial {
            Some(value) => ParamState::Static(value),
            None => ParamState::Dynamic,
        };
        Self {
            name: name.into(),
            state,
            shape,
        }
    }

    /// Returns the identifier assigned to the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the parameter must be supplied at call time.
    pub fn is_dynamic(&self) -> bool {
        matches!(self.state, ParamState::Dynamic)
    }

    /// Current state of the parameter.
    pub fn state(&self) -> &ParamState {
        &self.state
    }

    /// Fixed value, when static.
    pub fn static_value(&self) -> Option<&Value> {
        match &self.state {
            ParamState::Static(value) => Some(value),
            ParamState::Dynamic => None,
        }
    }

    /// Locked shape, once a concrete value has been seen. `[]` is a scalar.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// Number of elements a flat packing must supply for this parameter.
    /// Unbound shapes pack as a single scalar element.
    pub fn element_count(&self) -> usize {
        match &self.shape {
            Some(shape) => shape.iter().product(),
            None => 1,
        }
    }

    pub(crate) fn set(&mut self, value: Option<Value>) -> Result<(), (Vec<usize>, Vec<usize>)> {
        match value {
            None => {
                self.state = ParamState::Dynamic;
                Ok(())
            }
            Some(value) => {
                if let Some(shape) = &self.shape {
                    if shape.as_slice() != value.shape() {
                        return Err((shape.clone(), value.shape().to_vec()));
                    }
                } else {
                    self.shape = Some(value.shape().to_vec());
                }
                self.state = ParamState::Static(value);
                Ok(())
            }
        }
    }

    pub(crate) fn lock_shape(&mut self, shape: &[usize]) {
        if self.shape.is_none() {
            self.shape = Some(shape.to_vec());
        }
    }
}

impl core::fmt::Display for Parameter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Parameter(name={},dynamic={},shape={:?})",
            self.name,
            self.is_dynamic(),
            self.shape
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_value_locks_shape_and_state() {
        let param = Parameter::new("q", Some(scalar_value(0.5)));
        assert!(!param.is_dynamic());
        assert_eq!(param.shape(), Some(&[][..]));
        assert_eq!(param.element_count(), 1);
    }

    #[test]
    fn unset_parameter_is_dynamic_until_assigned() {
        let mut param = Parameter::new("q", None);
        assert!(param.is_dynamic());
        assert!(param.shape().is_none());
        param.set(Some(scalar_value(1.0))).unwrap();
        assert!(!param.is_dynamic());
        param.set(None).unwrap();
        assert!(param.is_dynamic());
        // The shape stays locked across the flip back to dynamic.
        assert_eq!(param.shape(), Some(&[][..]));
    }

    #[test]
    fn shape_conflicts_are_rejected() {
        let mut param = Parameter::new("grid", Some(Value::zeros(ndarray::IxDyn(&[2, 2]))));
        let err = param.set(Some(scalar_value(1.0))).unwrap_err();
        assert_eq!(err, (vec![2, 2], vec![]));
    }
}
