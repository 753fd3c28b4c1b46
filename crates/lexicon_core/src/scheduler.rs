//! SM-2 style spaced-repetition scheduling.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout
//! - 1: Incorrect, but the answer was recognised
//! - 2: Incorrect, but the answer seemed easy to recall
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect recall
//!
//! Everything here is pure: callers turn the returned interval into an absolute
//! timestamp with the current time.

use crate::domain::DEFAULT_EASE_FACTOR;
use crate::error::{CoreError, CoreResult};

/// Ratings below this reset the learning progress.
pub const PASSING_QUALITY: i32 = 3;
pub const MAX_QUALITY: i32 = 5;

pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Interval after the first passing review, and after any failure.
pub const BASE_INTERVAL_DAYS: u32 = 1;
/// Interval after the second consecutive passing review.
pub const SECOND_INTERVAL_DAYS: u32 = 6;
/// Intervals are capped at roughly a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// The scheduling state carried by a journal entry between reviews.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewState {
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 0,
        }
    }
}

pub fn validate_quality(quality: i32) -> CoreResult<()> {
    if (0..=MAX_QUALITY).contains(&quality) {
        Ok(())
    } else {
        Err(CoreError::InvalidQuality(quality))
    }
}

/// `EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))`, never below the floor.
pub fn adjust_ease(ease_factor: f64, quality: i32) -> f64 {
    let miss = (MAX_QUALITY - quality) as f64;
    (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR)
}

/// Stateless form of the schedule: given how many times in a row the word has been
/// recalled and the new rating, returns `(new_repetitions, new_interval_days)`.
///
/// Without a stored ease factor the default one, adjusted by this rating, drives
/// the geometric growth from the second interval onward.
pub fn next_interval(current_repetitions: u32, quality: i32) -> CoreResult<(u32, u32)> {
    validate_quality(quality)?;

    if quality < PASSING_QUALITY {
        return Ok((0, BASE_INTERVAL_DAYS));
    }

    let repetitions = current_repetitions.saturating_add(1);
    let interval = match current_repetitions {
        0 => BASE_INTERVAL_DAYS,
        1 => SECOND_INTERVAL_DAYS,
        n => {
            let ease = adjust_ease(DEFAULT_EASE_FACTOR, quality);
            grow(SECOND_INTERVAL_DAYS, ease.powi(i32::try_from(n - 1).unwrap_or(i32::MAX)))
        }
    };
    Ok((repetitions, interval))
}

/// Stateful form used by the journal: applies one review to a stored state.
pub fn review(state: &ReviewState, quality: i32) -> CoreResult<ReviewState> {
    validate_quality(quality)?;

    let ease_factor = adjust_ease(state.ease_factor, quality);

    if quality < PASSING_QUALITY {
        return Ok(ReviewState {
            repetitions: 0,
            ease_factor,
            interval_days: BASE_INTERVAL_DAYS,
        });
    }

    let interval_days = match state.repetitions {
        0 => BASE_INTERVAL_DAYS,
        1 => SECOND_INTERVAL_DAYS,
        _ => grow(state.interval_days.max(BASE_INTERVAL_DAYS), ease_factor),
    };

    Ok(ReviewState {
        repetitions: state.repetitions.saturating_add(1),
        ease_factor,
        interval_days,
    })
}

fn grow(days: u32, factor: f64) -> u32 {
    let grown = (days as f64 * factor).round();
    if grown >= MAX_INTERVAL_DAYS as f64 {
        MAX_INTERVAL_DAYS
    } else {
        (grown as u32).max(BASE_INTERVAL_DAYS)
    }
}
