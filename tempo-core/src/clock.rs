use crate::errors::{TempoError, TempoResult};
use crate::timestep::{Period, TimeGrid, Timestep};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Drives a run by stepping across a [`TimeGrid`].
///
/// The clock starts at the first period of its grid and stops at the last;
/// it never moves past the end of the grid.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tempo_core::clock::Clock;
/// use tempo_core::timestep::TimeGrid;
///
/// let mut clock = Clock::new(Arc::new(TimeGrid::uniform(2020, 1, 3).unwrap()));
/// let mut periods = vec![clock.current_period()];
/// while clock.advance().is_ok() {
///     periods.push(clock.current_period());
/// }
/// assert_eq!(periods, vec![2020, 2021, 2022]);
/// assert!(clock.is_last());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    grid: Arc<TimeGrid>,
    t: usize,
}

impl Clock {
    pub fn new(grid: Arc<TimeGrid>) -> Self {
        Self { grid, t: 1 }
    }

    pub fn grid(&self) -> &Arc<TimeGrid> {
        &self.grid
    }

    /// 1-based ordinal of the current period
    pub fn t(&self) -> usize {
        self.t
    }

    pub fn current_period(&self) -> Period {
        self.grid.label_unchecked(self.t)
    }

    /// The current position, handed to components while they are solved.
    pub fn timestep(&self) -> Timestep {
        Timestep::new_unchecked(self.grid.clone(), self.t)
    }

    /// Move to the next period.
    ///
    /// Fails without moving if the clock is already at the last period.
    pub fn advance(&mut self) -> TempoResult<()> {
        if self.is_last() {
            return Err(TempoError::ClockFinished(self.current_period()));
        }
        self.t += 1;
        Ok(())
    }

    pub fn is_first(&self) -> bool {
        self.t == 1
    }

    pub fn is_last(&self) -> bool {
        self.t == self.grid.period_count()
    }

    /// Return to the first period.
    pub fn reset(&mut self) {
        self.t = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> Clock {
        Clock::new(Arc::new(TimeGrid::from_labels(vec![2000, 2010, 2015]).unwrap()))
    }

    #[test]
    fn new_clock() {
        let clock = clock();
        assert_eq!(clock.t(), 1);
        assert_eq!(clock.current_period(), 2000);
        assert!(clock.is_first());
        assert!(!clock.is_last());
    }

    #[test]
    fn advance_until_last() {
        let mut clock = clock();
        clock.advance().unwrap();
        assert_eq!(clock.current_period(), 2010);
        assert_eq!(clock.timestep().t(), 2);
        clock.advance().unwrap();
        assert!(clock.is_last());

        assert!(matches!(
            clock.advance(),
            Err(TempoError::ClockFinished(2015))
        ));
        assert_eq!(clock.current_period(), 2015);
    }

    #[test]
    fn reset() {
        let mut clock = clock();
        clock.advance().unwrap();
        clock.reset();
        assert!(clock.is_first());
        assert_eq!(clock.timestep().period(), 2000);
    }

    #[test]
    fn single_period_grid() {
        let clock = Clock::new(Arc::new(TimeGrid::uniform(2020, 1, 1).unwrap()));
        assert!(clock.is_first());
        assert!(clock.is_last());
    }
}
