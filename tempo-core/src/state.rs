//! The view a component has of the model while it is being solved.

use crate::array::{AxisIndex, Storage, TimeAddress};
use crate::errors::{TempoError, TempoResult};
use crate::model::types::{BoundParameter, ComponentInstance};
use crate::timestep::{FloatValue, Timestep};
use ndarray::ArrayD;
use std::cell::RefCell;

enum Target<'s> {
    Parameter(&'s BoundParameter),
    Variable(usize),
}

/// Access to a single component's parameters and variables.
///
/// Parameters are read straight from the storage of whatever they are bound to,
/// with the binding's lead or lag applied.
/// Variables belong to the component and are the only thing it may write.
///
/// Time addresses are always expressed on the component's own grid;
/// translation to the grid of the bound source happens here.
pub struct ComponentState<'a> {
    instance: &'a ComponentInstance,
    storage: &'a [RefCell<Storage>],
}

impl<'a> ComponentState<'a> {
    pub(crate) fn new(instance: &'a ComponentInstance, storage: &'a [RefCell<Storage>]) -> Self {
        Self { instance, storage }
    }

    /// Name the component was registered under
    pub fn component(&self) -> &str {
        &self.instance.name
    }

    fn target(&self, name: &str) -> TempoResult<Target<'_>> {
        if let Some(parameter) = self.instance.parameter(name) {
            return Ok(Target::Parameter(parameter));
        }
        self.instance
            .variable_slot(name)
            .map(Target::Variable)
            .ok_or_else(|| TempoError::UnknownVariable {
                component: self.instance.name.clone(),
                name: name.to_string(),
            })
    }

    fn variable_slot(&self, name: &str) -> TempoResult<usize> {
        match self.target(name)? {
            Target::Variable(slot) => Ok(slot),
            Target::Parameter(_) => Err(TempoError::ReadOnlyParameter {
                component: self.instance.name.clone(),
                parameter: name.to_string(),
            }),
        }
    }

    fn not_a_series(&self, storage: &Storage, addressed: usize) -> TempoError {
        TempoError::DimensionMismatch {
            target: storage.name().to_string(),
            expected: storage.shape().len(),
            got: addressed + 1,
        }
    }

    fn not_static(&self, storage: &Storage, addressed: usize) -> TempoError {
        TempoError::DimensionMismatch {
            target: storage.name().to_string(),
            expected: storage.shape().len(),
            got: addressed,
        }
    }

    /// Read a single value of a time-indexed parameter or variable.
    pub fn get(
        &self,
        name: &str,
        address: TimeAddress<'_>,
        indices: &[usize],
    ) -> TempoResult<FloatValue> {
        match self.target(name)? {
            Target::Parameter(parameter) => {
                let storage = self.storage[parameter.slot].borrow();
                match &*storage {
                    Storage::Series(array) => {
                        let ordinal = array.resolve_shifted(
                            address,
                            parameter.grid_offset,
                            parameter.offset,
                        )?;
                        array.get_at(ordinal, indices)
                    }
                    Storage::Static(_) => Err(self.not_a_series(&storage, indices.len())),
                }
            }
            Target::Variable(slot) => {
                let storage = self.storage[slot].borrow();
                match &*storage {
                    Storage::Series(array) => array.get(address, indices),
                    Storage::Static(_) => Err(self.not_a_series(&storage, indices.len())),
                }
            }
        }
    }

    /// Read a scalar time-indexed value at a position on the component's grid.
    pub fn get_current(&self, name: &str, t: &Timestep) -> TempoResult<FloatValue> {
        self.get(name, TimeAddress::Current(t), &[])
    }

    /// Read a block of values at a single period.
    pub fn select(
        &self,
        name: &str,
        address: TimeAddress<'_>,
        selection: &[AxisIndex],
    ) -> TempoResult<ArrayD<FloatValue>> {
        let (slot, shift) = match self.target(name)? {
            Target::Parameter(parameter) => {
                (parameter.slot, Some((parameter.grid_offset, parameter.offset)))
            }
            Target::Variable(slot) => (slot, None),
        };
        let storage = self.storage[slot].borrow();
        match (&*storage, shift) {
            (Storage::Series(array), Some((frame, offset))) => {
                let ordinal = array.resolve_shifted(address, frame, offset)?;
                array.select_at(ordinal, selection)
            }
            (Storage::Series(array), None) => array.select(address, selection),
            (Storage::Static(_), _) => Err(self.not_a_series(&storage, selection.len())),
        }
    }

    /// Read a single value of a parameter or variable without a time axis.
    pub fn value(&self, name: &str, indices: &[usize]) -> TempoResult<FloatValue> {
        let slot = match self.target(name)? {
            Target::Parameter(parameter) => parameter.slot,
            Target::Variable(slot) => slot,
        };
        let storage = self.storage[slot].borrow();
        match &*storage {
            Storage::Static(array) => array.get(indices),
            Storage::Series(_) => Err(self.not_static(&storage, indices.len())),
        }
    }

    /// Read a plain scalar parameter or variable.
    pub fn scalar(&self, name: &str) -> TempoResult<FloatValue> {
        self.value(name, &[])
    }

    /// Read a block of a parameter or variable without a time axis.
    pub fn select_value(
        &self,
        name: &str,
        selection: &[AxisIndex],
    ) -> TempoResult<ArrayD<FloatValue>> {
        let slot = match self.target(name)? {
            Target::Parameter(parameter) => parameter.slot,
            Target::Variable(slot) => slot,
        };
        let storage = self.storage[slot].borrow();
        match &*storage {
            Storage::Static(array) => array.select(selection),
            Storage::Series(_) => Err(self.not_static(&storage, selection.len())),
        }
    }

    /// Whether [`ComponentState::get`] would succeed for the same arguments.
    pub fn has_value(&self, name: &str, address: TimeAddress<'_>, indices: &[usize]) -> bool {
        self.get(name, address, indices).is_ok()
    }

    /// Write a single value of a time-indexed variable.
    pub fn set(
        &self,
        name: &str,
        address: TimeAddress<'_>,
        indices: &[usize],
        value: FloatValue,
    ) -> TempoResult<()> {
        let slot = self.variable_slot(name)?;
        let mut storage = self.storage[slot].borrow_mut();
        match &mut *storage {
            Storage::Series(array) => array.set(address, indices, value),
            Storage::Static(array) => Err(TempoError::DimensionMismatch {
                target: array.name().to_string(),
                expected: array.shape().len(),
                got: indices.len() + 1,
            }),
        }
    }

    /// Write a scalar time-indexed variable at a position on the component's grid.
    pub fn set_current(&self, name: &str, t: &Timestep, value: FloatValue) -> TempoResult<()> {
        self.set(name, TimeAddress::Current(t), &[], value)
    }

    /// Write a single value of a variable without a time axis.
    pub fn set_value(&self, name: &str, indices: &[usize], value: FloatValue) -> TempoResult<()> {
        let slot = self.variable_slot(name)?;
        let mut storage = self.storage[slot].borrow_mut();
        match &mut *storage {
            Storage::Static(array) => array.set(indices, value),
            Storage::Series(array) => Err(TempoError::DimensionMismatch {
                target: array.name().to_string(),
                expected: array.ndim(),
                got: indices.len(),
            }),
        }
    }
}
