//! Credit-weighted grade point average.

use common::{Entry, Grade};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed entry handed to [`compute`]; aborts the whole computation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("entries[{index}].{field} {reason}")]
pub struct ValidationError {
    pub index: usize,
    pub field: &'static str,
    pub reason: &'static str,
}

/// Per-entry trace of what went into the average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub name: String,
    pub grade: Grade,
    pub point: f64,
    pub credits: f64,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GpaReport {
    pub gpa: f64,
    pub total_credits_counted: f64,
    pub details: Vec<DetailRow>,
}

/// Rounds half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// GPA = Σ(point × credits) / Σ(credits), rounded to two decimals.
///
/// Failing grades add zero points but still count in the denominator.
/// Callers are expected to have dropped unresolved entries already, so any
/// empty name or non-positive credit value is an error rather than a skip.
pub fn compute(entries: &[Entry]) -> Result<GpaReport, ValidationError> {
    let mut weighted = 0.0;
    let mut credits_total = 0.0;
    let mut details = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(ValidationError {
                index,
                field: "name",
                reason: "is empty",
            });
        }
        if !entry.credits.is_finite() || entry.credits <= 0.0 {
            return Err(ValidationError {
                index,
                field: "credits",
                reason: "must be > 0",
            });
        }

        let point = entry.grade.point();
        weighted += point * entry.credits;
        credits_total += entry.credits;
        details.push(DetailRow {
            name: name.to_owned(),
            grade: entry.grade,
            point,
            credits: entry.credits,
            field: entry.subcategory.clone(),
        });
    }

    let gpa = if credits_total > 0.0 {
        round2(weighted / credits_total)
    } else {
        0.0
    };

    Ok(GpaReport {
        gpa,
        total_credits_counted: credits_total,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(grade: Grade, credits: f64) -> Entry {
        Entry::new("科目", grade, credits, "7")
    }

    #[test]
    fn weighted_average_rounds_to_two_places() {
        let report = compute(&[entry(Grade::A, 2.0), entry(Grade::B, 4.0)]).unwrap();

        assert_eq!(report.gpa, 3.33);
        assert_eq!(report.total_credits_counted, 6.0);
        assert_eq!(report.details.len(), 2);
        assert_eq!(report.details[1].point, 3.0);

        let heavier_a = compute(&[entry(Grade::A, 4.0), entry(Grade::B, 2.0)]).unwrap();
        assert_eq!(heavier_a.gpa, 3.67);
    }

    #[test]
    fn empty_input_is_zero() {
        let report = compute(&[]).unwrap();
        assert_eq!(report, GpaReport::default());
        assert_eq!(report.gpa, 0.0);
    }

    #[test]
    fn failing_grade_counts_in_denominator() {
        let report = compute(&[entry(Grade::A, 2.0), entry(Grade::F, 2.0)]).unwrap();

        assert_eq!(report.gpa, 2.0);
        assert_eq!(report.total_credits_counted, 4.0);
    }

    #[test]
    fn rejects_non_positive_credits_with_index() {
        let err = compute(&[entry(Grade::A, 2.0), entry(Grade::B, 0.0)]).unwrap_err();

        assert_eq!(err.index, 1);
        assert_eq!(err.to_string(), "entries[1].credits must be > 0");
    }

    #[test]
    fn rejects_blank_name() {
        let blank = Entry::new(" ", Grade::A, 2.0, "7");
        let err = compute(&[blank]).unwrap_err();
        assert_eq!(err.to_string(), "entries[0].name is empty");
    }

    #[test]
    fn half_rounds_away_from_zero() {
        assert_eq!(round2(2.675_000_1), 2.68);
        assert_eq!(round2(3.125), 3.13);
    }
}
