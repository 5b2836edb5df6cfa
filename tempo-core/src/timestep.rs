//! Time grids and positions on them.
//!
//! A [`TimeGrid`] is the full, ordered set of periods a model (or a single component)
//! is solved over.
//! Grids are either uniform, defined by a first period and a fixed step, or
//! defined by an explicit, strictly increasing list of period labels.
//!
//! A [`Timestep`] is a cursor on a grid.
//! Ordinals are 1-based: the first period of a grid is at `t = 1`.

use crate::errors::{TempoError, TempoResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Label of a single period, e.g. a year.
pub type Period = i64;
/// Type of the values held by the model.
pub type FloatValue = f64;

/// The ordered sequence of periods that a model is solved over.
///
/// Deserialised grids go through the same checks as [`TimeGrid::uniform`] and
/// [`TimeGrid::from_labels`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "TimeGridRepr")]
pub enum TimeGrid {
    /// `count` periods starting at `first`, `step` apart
    Uniform {
        first: Period,
        step: Period,
        count: usize,
    },
    /// An explicit, strictly increasing list of period labels
    Labels { labels: Vec<Period> },
}

/// Unchecked wire form of a [`TimeGrid`].
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TimeGridRepr {
    Uniform {
        first: Period,
        step: Period,
        count: usize,
    },
    Labels {
        labels: Vec<Period>,
    },
}

impl TryFrom<TimeGridRepr> for TimeGrid {
    type Error = TempoError;

    fn try_from(repr: TimeGridRepr) -> TempoResult<Self> {
        match repr {
            TimeGridRepr::Uniform { first, step, count } => Self::uniform(first, step, count),
            TimeGridRepr::Labels { labels } => Self::from_labels(labels),
        }
    }
}

impl TimeGrid {
    /// Create a uniform grid of `count` periods.
    pub fn uniform(first: Period, step: Period, count: usize) -> TempoResult<Self> {
        if step <= 0 {
            return Err(TempoError::InvalidTimeGrid(format!(
                "step must be positive, got {step}"
            )));
        }
        if count == 0 {
            return Err(TempoError::InvalidTimeGrid(
                "a time grid needs at least one period".to_string(),
            ));
        }
        Ok(Self::Uniform { first, step, count })
    }

    /// Create a uniform grid covering `first..=last`.
    ///
    /// `last` must be reachable from `first` in whole steps.
    pub fn from_range(first: Period, last: Period, step: Period) -> TempoResult<Self> {
        if step <= 0 {
            return Err(TempoError::InvalidTimeGrid(format!(
                "step must be positive, got {step}"
            )));
        }
        if last < first {
            return Err(TempoError::InvalidTimeGrid(format!(
                "last period {last} is before the first period {first}"
            )));
        }
        if (last - first) % step != 0 {
            return Err(TempoError::InvalidTimeGrid(format!(
                "last period {last} is not reachable from {first} in steps of {step}"
            )));
        }
        Self::uniform(first, step, ((last - first) / step + 1) as usize)
    }

    /// Create a grid from explicit period labels.
    pub fn from_labels(labels: Vec<Period>) -> TempoResult<Self> {
        if labels.is_empty() {
            return Err(TempoError::InvalidTimeGrid(
                "a time grid needs at least one period".to_string(),
            ));
        }
        if let Some(pair) = labels.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(TempoError::InvalidTimeGrid(format!(
                "period labels must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self::Labels { labels })
    }

    pub fn first_period(&self) -> Period {
        match self {
            TimeGrid::Uniform { first, .. } => *first,
            TimeGrid::Labels { labels } => labels[0],
        }
    }

    pub fn last_period(&self) -> Period {
        self.label_unchecked(self.period_count())
    }

    pub fn period_count(&self) -> usize {
        match self {
            TimeGrid::Uniform { count, .. } => *count,
            TimeGrid::Labels { labels } => labels.len(),
        }
    }

    /// The fixed step between periods, if the grid is uniform.
    pub fn step(&self) -> Option<Period> {
        match self {
            TimeGrid::Uniform { step, .. } => Some(*step),
            TimeGrid::Labels { .. } => None,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, TimeGrid::Uniform { .. })
    }

    /// Materialise every period label in order.
    pub fn labels(&self) -> Vec<Period> {
        match self {
            TimeGrid::Uniform { first, step, count } => {
                (0..*count).map(|k| first + k as Period * step).collect()
            }
            TimeGrid::Labels { labels } => labels.clone(),
        }
    }

    pub fn contains(&self, period: Period) -> bool {
        self.position_of(period).is_ok()
    }

    /// Find the 1-based ordinal of a period label.
    ///
    /// Uniform grids compute this directly, explicit grids use a binary search.
    pub fn position_of(&self, period: Period) -> TempoResult<usize> {
        let not_found = || TempoError::NotFound {
            target: format!("grid {self}"),
            period,
        };
        match self {
            TimeGrid::Uniform { count, .. } => match self.lattice_position(period) {
                Some(t) if t >= 1 && t as usize <= *count => Ok(t as usize),
                _ => Err(not_found()),
            },
            TimeGrid::Labels { labels } => labels
                .binary_search(&period)
                .map(|i| i + 1)
                .map_err(|_| not_found()),
        }
    }

    /// The period label at a 1-based ordinal.
    pub fn label_at(&self, t: usize) -> TempoResult<Period> {
        if t == 0 || t > self.period_count() {
            return Err(TempoError::OutOfRange {
                target: format!("grid {self}"),
                index: t as i64,
                len: self.period_count(),
            });
        }
        Ok(self.label_unchecked(t))
    }

    /// Ordinal that a label would have on this grid, without a range check.
    ///
    /// For uniform grids any label on the lattice `first + k * step` has a position,
    /// including labels before the first or after the last period.
    /// Explicit grids only know the labels they hold.
    pub(crate) fn lattice_position(&self, period: Period) -> Option<i64> {
        match self {
            TimeGrid::Uniform { first, step, .. } => {
                let diff = period.checked_sub(*first)?;
                (diff % step == 0).then(|| diff / step + 1)
            }
            TimeGrid::Labels { labels } => {
                labels.binary_search(&period).ok().map(|i| i as i64 + 1)
            }
        }
    }

    /// Label at `t`, which must be in `1..=period_count()`.
    pub(crate) fn label_unchecked(&self, t: usize) -> Period {
        match self {
            TimeGrid::Uniform { first, step, .. } => first + (t as Period - 1) * step,
            TimeGrid::Labels { labels } => labels[t - 1],
        }
    }

    /// Two grids are shape-compatible if both are uniform with the same step,
    /// or both are explicit with identical labels.
    pub fn is_shape_compatible(&self, other: &TimeGrid) -> bool {
        match (self, other) {
            (TimeGrid::Uniform { step: a, .. }, TimeGrid::Uniform { step: b, .. }) => a == b,
            (TimeGrid::Labels { labels: a }, TimeGrid::Labels { labels: b }) => a == b,
            _ => false,
        }
    }

    /// Number of periods of `other` that precede this grid's first period.
    ///
    /// Adding the offset to an ordinal on this grid gives the ordinal of the same
    /// period on `other`.
    /// Fails if `other` does not contain this grid's first period, or if the periods
    /// the two grids share do not line up.
    pub fn offset_within(&self, other: &TimeGrid) -> TempoResult<usize> {
        let mismatch = |reason: String| TempoError::ShapeMismatch {
            producer: format!("grid {other}"),
            consumer: format!("grid {self}"),
            reason,
        };

        let start = other.position_of(self.first_period()).map_err(|_| {
            mismatch(format!(
                "first period {} is not part of the target grid",
                self.first_period()
            ))
        })?;
        let offset = start - 1;

        match (self, other) {
            (TimeGrid::Uniform { step: a, .. }, TimeGrid::Uniform { step: b, .. }) => {
                if a != b {
                    return Err(mismatch(format!("steps differ ({a} and {b})")));
                }
            }
            _ => {
                let shared = self.period_count().min(other.period_count() - offset);
                for t in 1..=shared {
                    let ours = self.label_unchecked(t);
                    let theirs = other.label_unchecked(t + offset);
                    if ours != theirs {
                        return Err(mismatch(format!(
                            "period {ours} does not line up with period {theirs}"
                        )));
                    }
                }
            }
        }
        Ok(offset)
    }
}

impl fmt::Display for TimeGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeGrid::Uniform { step, .. } => write!(
                f,
                "{}..={} step {}",
                self.first_period(),
                self.last_period(),
                step
            ),
            TimeGrid::Labels { labels } if labels.len() <= 6 => write!(f, "{labels:?}"),
            TimeGrid::Labels { labels } => write!(
                f,
                "[{}, {}, ..., {}] ({} periods)",
                labels[0],
                labels[1],
                labels[labels.len() - 1],
                labels.len()
            ),
        }
    }
}

/// A position on a [`TimeGrid`].
///
/// This is the only notion of "now" that a component sees while it is being solved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestep {
    t: usize,
    grid: Arc<TimeGrid>,
}

impl Timestep {
    /// The first period of a grid.
    pub fn first(grid: Arc<TimeGrid>) -> Self {
        Self { t: 1, grid }
    }

    /// The position at a 1-based ordinal.
    pub fn new(grid: Arc<TimeGrid>, t: usize) -> TempoResult<Self> {
        grid.label_at(t)?;
        Ok(Self { t, grid })
    }

    /// Caller guarantees `t` is in `1..=grid.period_count()`.
    pub(crate) fn new_unchecked(grid: Arc<TimeGrid>, t: usize) -> Self {
        Self { t, grid }
    }

    /// The position of a period label.
    pub fn at_period(grid: Arc<TimeGrid>, period: Period) -> TempoResult<Self> {
        let t = grid.position_of(period)?;
        Ok(Self { t, grid })
    }

    /// 1-based ordinal on the grid
    pub fn t(&self) -> usize {
        self.t
    }

    pub fn period(&self) -> Period {
        self.grid.label_unchecked(self.t)
    }

    pub fn grid(&self) -> &Arc<TimeGrid> {
        &self.grid
    }

    pub fn is_first(&self) -> bool {
        self.t == 1
    }

    pub fn is_last(&self) -> bool {
        self.t == self.grid.period_count()
    }

    /// The position `n` periods later (or earlier, for negative `n`).
    pub fn offset(&self, n: i64) -> TempoResult<Self> {
        // Saturating keeps an overflowing step past the end of the grid
        let t = (self.t as i64).saturating_add(n);
        if t < 1 || t as usize > self.grid.period_count() {
            return Err(TempoError::OutOfRange {
                target: format!("grid {}", self.grid),
                index: t,
                len: self.grid.period_count(),
            });
        }
        Ok(Self {
            t: t as usize,
            grid: self.grid.clone(),
        })
    }

    pub fn next(&self) -> TempoResult<Self> {
        self.offset(1)
    }

    pub fn previous(&self) -> TempoResult<Self> {
        self.offset(-1)
    }

    /// Order two positions.
    ///
    /// Positions are only comparable if their grids are shape-compatible.
    pub fn try_cmp(&self, other: &Timestep) -> TempoResult<Ordering> {
        if !self.grid.is_shape_compatible(&other.grid) {
            return Err(TempoError::ShapeMismatch {
                producer: format!("grid {}", other.grid),
                consumer: format!("grid {}", self.grid),
                reason: "timesteps on incompatible grids cannot be compared".to_string(),
            });
        }
        Ok(self.period().cmp(&other.period()))
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (t={})", self.period(), self.t)
    }
}
