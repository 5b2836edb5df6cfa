//! Storage for component parameters and variables.
//!
//! A [`TimeIndexedArray`] holds one value per period of its [`TimeGrid`] along a
//! distinguished time axis, and any number of fixed-size axes besides.
//! Cells start out unset; reading an unset cell is an error rather than a default value.
//!
//! Every read or write starts by resolving a [`TimeAddress`] to a single 1-based ordinal
//! along the time axis:
//!
//! 1. [`TimeAddress::Current`] - a [`Timestep`], translated by period label if it lives on
//!    a different grid.
//! 2. [`TimeAddress::Absolute`] - a period label plus a lead (positive) or lag (negative).
//! 3. [`TimeAddress::Index`] - a raw 1-based ordinal.
//! 4. [`TimeAddress::Legacy`] - a raw integer, resolved like `Index` after a deprecation warning.
//!
//! The ordinal is then bounds-checked, and reads finally check that the cell has been set.
//! Non-time axes use ordinary 0-based indices.

use crate::errors::{TempoError, TempoResult};
use crate::timestep::{FloatValue, Period, TimeGrid, Timestep};
use log::warn;
use ndarray::{ArrayD, Axis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

/// How a caller addresses the time axis of an array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeAddress<'a> {
    /// The position handed to a component by the clock
    Current(&'a Timestep),
    /// A period label, shifted by `offset` periods
    Absolute { period: Period, offset: i64 },
    /// A 1-based ordinal along the time axis
    Index(usize),
    /// A raw integer ordinal from components written before typed addresses existed.
    ///
    /// Deprecated: every resolution logs a warning. Use `Index` or `Current` instead.
    Legacy(i64),
}

impl TimeAddress<'_> {
    /// Address a period label directly.
    pub fn at_period(period: Period) -> Self {
        TimeAddress::Absolute { period, offset: 0 }
    }

    /// Address the period `offset` periods after `period`.
    pub fn lead(period: Period, offset: i64) -> Self {
        TimeAddress::Absolute { period, offset }
    }
}

impl<'a> From<&'a Timestep> for TimeAddress<'a> {
    fn from(value: &'a Timestep) -> Self {
        TimeAddress::Current(value)
    }
}

/// Selection along a single non-time axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisIndex {
    At(usize),
    List(Vec<usize>),
    Range(Range<usize>),
    All,
}

/// Expand a full selection into explicit indices per axis.
fn expand_axes(
    target: &str,
    dims: &[usize],
    selection: &[AxisIndex],
) -> TempoResult<Vec<Vec<usize>>> {
    selection
        .iter()
        .zip(dims)
        .map(|(index, &len)| {
            let indices: Vec<usize> = match index {
                AxisIndex::At(i) => vec![*i],
                AxisIndex::List(list) => list.clone(),
                AxisIndex::Range(range) => range.clone().collect(),
                AxisIndex::All => (0..len).collect(),
            };
            match indices.iter().find(|&&i| i >= len) {
                Some(&i) => Err(TempoError::OutOfRange {
                    target: target.to_string(),
                    index: i as i64,
                    len,
                }),
                None => Ok(indices),
            }
        })
        .collect()
}

/// Check a set of non-time indices against the non-time axis lengths.
///
/// Omitting every index is only accepted when all of those axes have length one;
/// silently flattening a multi-dimensional array is never done.
fn check_indices<'i>(
    target: &str,
    dims: &[usize],
    indices: &'i [usize],
    addressed: usize,
) -> TempoResult<Cow<'i, [usize]>> {
    if indices.is_empty() && dims.iter().all(|&len| len == 1) {
        return Ok(Cow::Owned(vec![0; dims.len()]));
    }
    if indices.len() != dims.len() {
        return Err(TempoError::DimensionMismatch {
            target: target.to_string(),
            expected: dims.len() + addressed,
            got: indices.len() + addressed,
        });
    }
    for (&i, &len) in indices.iter().zip(dims) {
        if i >= len {
            return Err(TempoError::OutOfRange {
                target: target.to_string(),
                index: i as i64,
                len,
            });
        }
    }
    Ok(Cow::Borrowed(indices))
}

fn check_selection<'s>(
    target: &str,
    dims: &[usize],
    selection: &'s [AxisIndex],
    addressed: usize,
) -> TempoResult<Cow<'s, [AxisIndex]>> {
    if selection.is_empty() && dims.iter().all(|&len| len == 1) {
        return Ok(Cow::Owned(vec![AxisIndex::At(0); dims.len()]));
    }
    if selection.len() != dims.len() {
        return Err(TempoError::DimensionMismatch {
            target: target.to_string(),
            expected: dims.len() + addressed,
            got: selection.len() + addressed,
        });
    }
    Ok(Cow::Borrowed(selection))
}

/// Per-period storage keyed along a time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeIndexedArray {
    name: String,
    grid: Arc<TimeGrid>,
    /// 0-based position of the time axis within `data`
    time_axis: usize,
    data: ArrayD<Option<FloatValue>>,
}

impl TimeIndexedArray {
    /// Create an unset array.
    ///
    /// `other_dims` are the lengths of the non-time axes, in order;
    /// the time axis is inserted at `time_axis` (0-based).
    pub fn new(
        name: &str,
        grid: Arc<TimeGrid>,
        time_axis: usize,
        other_dims: &[usize],
    ) -> TempoResult<Self> {
        if time_axis > other_dims.len() {
            return Err(TempoError::DimensionMismatch {
                target: name.to_string(),
                expected: other_dims.len() + 1,
                got: time_axis + 1,
            });
        }
        let mut shape = other_dims.to_vec();
        shape.insert(time_axis, grid.period_count());

        Ok(Self {
            name: name.to_string(),
            grid,
            time_axis,
            data: ArrayD::from_elem(IxDyn(&shape), None),
        })
    }

    /// Create an unset one-dimensional timeseries.
    pub fn new_series(name: &str, grid: Arc<TimeGrid>) -> Self {
        let len = grid.period_count();
        Self {
            name: name.to_string(),
            grid,
            time_axis: 0,
            data: ArrayD::from_elem(IxDyn(&[len]), None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &Arc<TimeGrid> {
        &self.grid
    }

    /// 0-based position of the time axis
    pub fn time_axis(&self) -> usize {
        self.time_axis
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of periods along the time axis
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(self.time_axis))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw cells, `None` where unset.
    pub fn values(&self) -> &ArrayD<Option<FloatValue>> {
        &self.data
    }

    /// Lengths of the non-time axes
    fn other_dims(&self) -> Vec<usize> {
        let mut dims = self.data.shape().to_vec();
        dims.remove(self.time_axis);
        dims
    }

    fn full_index(&self, ordinal: usize, cell: &[usize]) -> Vec<usize> {
        let mut index = Vec::with_capacity(cell.len() + 1);
        index.extend_from_slice(&cell[..self.time_axis]);
        index.push(ordinal - 1);
        index.extend_from_slice(&cell[self.time_axis..]);
        index
    }

    fn anchor(&self, period: Period) -> TempoResult<i64> {
        self.grid
            .lattice_position(period)
            .ok_or_else(|| TempoError::NotFound {
                target: self.name.clone(),
                period,
            })
    }

    /// Ordinal of a timestep that may live on a different grid.
    fn translate(&self, timestep: &Timestep) -> TempoResult<i64> {
        if Arc::ptr_eq(timestep.grid(), &self.grid) || **timestep.grid() == *self.grid {
            Ok(timestep.t() as i64)
        } else {
            self.anchor(timestep.period())
        }
    }

    /// Unchecked ordinal for an address.
    ///
    /// With a `frame` offset, `Current`, `Index` and `Legacy` addresses are taken to be
    /// ordinals on a grid that starts `frame` periods into this array's grid.
    /// Without one, `Current` addresses are translated through their period label.
    fn locate(&self, address: TimeAddress<'_>, frame: Option<i64>) -> TempoResult<i64> {
        let ordinal = match address {
            TimeAddress::Current(timestep) => match frame {
                Some(frame) => self.step(timestep.t() as i64, frame)?,
                None => self.translate(timestep)?,
            },
            TimeAddress::Absolute { period, offset } => self.step(self.anchor(period)?, offset)?,
            TimeAddress::Index(t) => {
                self.step(i64::try_from(t).unwrap_or(i64::MAX), frame.unwrap_or(0))?
            }
            TimeAddress::Legacy(t) => {
                warn!(
                    "{}: raw integer time index {} is deprecated, use TimeAddress::Index or TimeAddress::Current",
                    self.name, t
                );
                self.step(t, frame.unwrap_or(0))?
            }
        };
        Ok(ordinal)
    }

    /// Move `by` periods from `ordinal`. Overflow is out of range.
    fn step(&self, ordinal: i64, by: i64) -> TempoResult<i64> {
        ordinal.checked_add(by).ok_or_else(|| TempoError::OutOfRange {
            target: format!("{} time axis", self.name),
            index: ordinal.saturating_add(by),
            len: self.len(),
        })
    }

    fn check_ordinal(&self, ordinal: i64) -> TempoResult<usize> {
        if ordinal < 1 || ordinal as usize > self.len() {
            return Err(TempoError::OutOfRange {
                target: format!("{} time axis", self.name),
                index: ordinal,
                len: self.len(),
            });
        }
        Ok(ordinal as usize)
    }

    /// Resolve an address to a 1-based ordinal along the time axis.
    pub fn resolve(&self, address: TimeAddress<'_>) -> TempoResult<usize> {
        self.check_ordinal(self.locate(address, None)?)
    }

    /// Resolve an address made on a grid starting `frame` periods into this one,
    /// then move `shift` periods.
    pub(crate) fn resolve_shifted(
        &self,
        address: TimeAddress<'_>,
        frame: i64,
        shift: i64,
    ) -> TempoResult<usize> {
        let ordinal = self.locate(address, Some(frame))?;
        self.check_ordinal(self.step(ordinal, shift)?)
    }

    fn read_cell(&self, ordinal: usize, cell: &[usize]) -> TempoResult<FloatValue> {
        self.data[IxDyn(&self.full_index(ordinal, cell))].ok_or_else(|| {
            TempoError::UnsetValue {
                target: self.name.clone(),
                ordinal,
                period: self.grid.label_unchecked(ordinal),
            }
        })
    }

    /// Read a single cell at a resolved ordinal.
    pub(crate) fn get_at(&self, ordinal: usize, indices: &[usize]) -> TempoResult<FloatValue> {
        let cell = check_indices(&self.name, &self.other_dims(), indices, 1)?;
        self.read_cell(ordinal, &cell)
    }

    /// Read a single value.
    ///
    /// `indices` address the non-time axes and may be empty for a plain timeseries.
    pub fn get(&self, address: TimeAddress<'_>, indices: &[usize]) -> TempoResult<FloatValue> {
        let ordinal = self.resolve(address)?;
        self.get_at(ordinal, indices)
    }

    /// Read a block of values at a single period.
    ///
    /// The result has one axis per entry of `selection`.
    pub(crate) fn select_at(
        &self,
        ordinal: usize,
        selection: &[AxisIndex],
    ) -> TempoResult<ArrayD<FloatValue>> {
        let dims = self.other_dims();
        let selection = check_selection(&self.name, &dims, selection, 1)?;
        let axes = expand_axes(&self.name, &dims, &selection)?;
        let shape: Vec<usize> = axes.iter().map(Vec::len).collect();

        let mut values = Vec::with_capacity(shape.iter().product());
        for position in ndarray::indices(IxDyn(&shape)) {
            let cell: Vec<usize> = position
                .slice()
                .iter()
                .enumerate()
                .map(|(axis, &i)| axes[axis][i])
                .collect();
            values.push(self.read_cell(ordinal, &cell)?);
        }
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| TempoError::Error(format!("{}: {}", self.name, e)))
    }

    pub fn select(
        &self,
        address: TimeAddress<'_>,
        selection: &[AxisIndex],
    ) -> TempoResult<ArrayD<FloatValue>> {
        let ordinal = self.resolve(address)?;
        self.select_at(ordinal, selection)
    }

    pub(crate) fn set_at(
        &mut self,
        ordinal: usize,
        indices: &[usize],
        value: FloatValue,
    ) -> TempoResult<()> {
        let cell = check_indices(&self.name, &self.other_dims(), indices, 1)?;
        let index = self.full_index(ordinal, &cell);
        self.data[IxDyn(&index)] = Some(value);
        Ok(())
    }

    /// Write a single value.
    ///
    /// Writes resolve and bounds-check the address exactly like reads,
    /// but never fail because the cell is unset.
    pub fn set(
        &mut self,
        address: TimeAddress<'_>,
        indices: &[usize],
        value: FloatValue,
    ) -> TempoResult<()> {
        let ordinal = self.resolve(address)?;
        self.set_at(ordinal, indices, value)
    }

    /// Whether a read of the same address would succeed.
    pub fn has_value(&self, address: TimeAddress<'_>, indices: &[usize]) -> bool {
        self.get(address, indices).is_ok()
    }

    /// The timeseries at a fixed position on the non-time axes, as `(period, value)` pairs.
    pub fn series(&self, indices: &[usize]) -> TempoResult<Vec<(Period, Option<FloatValue>)>> {
        let cell = check_indices(&self.name, &self.other_dims(), indices, 1)?;
        Ok((1..=self.len())
            .map(|t| {
                (
                    self.grid.label_unchecked(t),
                    self.data[IxDyn(&self.full_index(t, &cell))],
                )
            })
            .collect())
    }

    /// Mark every cell as unset.
    pub fn clear(&mut self) {
        self.data.fill(None);
    }

    /// Set every cell to the same value.
    pub fn fill(&mut self, value: FloatValue) {
        self.data.fill(Some(value));
    }

    /// Copy values from a dense array of the same shape.
    ///
    /// NaN values are stored as unset cells.
    pub fn fill_from(&mut self, values: &ArrayD<FloatValue>) -> TempoResult<()> {
        if values.shape() != self.data.shape() {
            return Err(TempoError::ShapeMismatch {
                producer: format!("array of shape {:?}", values.shape()),
                consumer: self.name.clone(),
                reason: format!("expected shape {:?}", self.data.shape()),
            });
        }
        self.data.zip_mut_with(values, |cell, &value| {
            *cell = (!value.is_nan()).then_some(value);
        });
        Ok(())
    }
}

/// Storage for values without a time axis.
///
/// A plain scalar is a 0-dimensional array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticArray {
    name: String,
    data: ArrayD<Option<FloatValue>>,
}

impl StaticArray {
    pub fn new(name: &str, dims: &[usize]) -> Self {
        Self {
            name: name.to_string(),
            data: ArrayD::from_elem(IxDyn(dims), None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn values(&self) -> &ArrayD<Option<FloatValue>> {
        &self.data
    }

    pub fn get(&self, indices: &[usize]) -> TempoResult<FloatValue> {
        let cell = check_indices(&self.name, self.data.shape(), indices, 0)?;
        self.data[IxDyn(&cell)].ok_or_else(|| TempoError::UnsetValue {
            target: self.name.clone(),
            ordinal: 0,
            period: 0,
        })
    }

    pub fn select(&self, selection: &[AxisIndex]) -> TempoResult<ArrayD<FloatValue>> {
        let dims = self.data.shape().to_vec();
        let selection = check_selection(&self.name, &dims, selection, 0)?;
        let axes = expand_axes(&self.name, &dims, &selection)?;
        let shape: Vec<usize> = axes.iter().map(Vec::len).collect();

        let mut values = Vec::with_capacity(shape.iter().product());
        for position in ndarray::indices(IxDyn(&shape)) {
            let cell: Vec<usize> = position
                .slice()
                .iter()
                .enumerate()
                .map(|(axis, &i)| axes[axis][i])
                .collect();
            values.push(self.get(&cell)?);
        }
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| TempoError::Error(format!("{}: {}", self.name, e)))
    }

    pub fn set(&mut self, indices: &[usize], value: FloatValue) -> TempoResult<()> {
        let cell = check_indices(&self.name, self.data.shape(), indices, 0)?;
        self.data[IxDyn(&cell)] = Some(value);
        Ok(())
    }

    pub fn has_value(&self, indices: &[usize]) -> bool {
        self.get(indices).is_ok()
    }

    pub fn clear(&mut self) {
        self.data.fill(None);
    }

    pub fn fill(&mut self, value: FloatValue) {
        self.data.fill(Some(value));
    }

    pub fn fill_from(&mut self, values: &ArrayD<FloatValue>) -> TempoResult<()> {
        if values.shape() != self.data.shape() {
            return Err(TempoError::ShapeMismatch {
                producer: format!("array of shape {:?}", values.shape()),
                consumer: self.name.clone(),
                reason: format!("expected shape {:?}", self.data.shape()),
            });
        }
        self.data.zip_mut_with(values, |cell, &value| {
            *cell = (!value.is_nan()).then_some(value);
        });
        Ok(())
    }
}

/// The backing storage of a single parameter or variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Storage {
    Static(StaticArray),
    Series(TimeIndexedArray),
}

impl Storage {
    pub fn name(&self) -> &str {
        match self {
            Storage::Static(array) => array.name(),
            Storage::Series(array) => array.name(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Storage::Static(array) => array.shape(),
            Storage::Series(array) => array.shape(),
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Storage::Series(_))
    }

    pub fn as_series(&self) -> Option<&TimeIndexedArray> {
        match self {
            Storage::Series(array) => Some(array),
            Storage::Static(_) => None,
        }
    }

    pub fn as_static(&self) -> Option<&StaticArray> {
        match self {
            Storage::Static(array) => Some(array),
            Storage::Series(_) => None,
        }
    }

    pub fn clear(&mut self) {
        match self {
            Storage::Static(array) => array.clear(),
            Storage::Series(array) => array.clear(),
        }
    }

    pub fn fill(&mut self, value: FloatValue) {
        match self {
            Storage::Static(array) => array.fill(value),
            Storage::Series(array) => array.fill(value),
        }
    }

    pub fn fill_from(&mut self, values: &ArrayD<FloatValue>) -> TempoResult<()> {
        match self {
            Storage::Static(array) => array.fill_from(values),
            Storage::Series(array) => array.fill_from(values),
        }
    }
}
