use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Letter grade on the five-step A..F scale. There are no +/- grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("grade '{0}' not supported (A/B/C/D/F)")]
pub struct GradeParseError(pub String);

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    /// Grade points used for the weighted average.
    pub fn point(self) -> f64 {
        match self {
            Grade::A => 4.0,
            Grade::B => 3.0,
            Grade::C => 2.0,
            Grade::D => 1.0,
            Grade::F => 0.0,
        }
    }

    /// A failing grade earns no credit towards graduation requirements.
    pub fn is_passing(self) -> bool {
        self != Grade::F
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl FromStr for Grade {
    type Err = GradeParseError;

    /// Accepts surrounding whitespace and lower case letters.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim().to_uppercase();
        match token.as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            _ => Err(GradeParseError(token)),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_lowercase_tokens() {
        assert_eq!(" b ".parse::<Grade>(), Ok(Grade::B));
        assert_eq!("f".parse::<Grade>(), Ok(Grade::F));
    }

    #[test]
    fn rejects_plus_minus_grades() {
        let err = "a+".parse::<Grade>().unwrap_err();
        assert_eq!(err, GradeParseError("A+".into()));
        assert_eq!(err.to_string(), "grade 'A+' not supported (A/B/C/D/F)");
    }

    #[test]
    fn points_descend_from_a_to_f() {
        let points: Vec<f64> = Grade::ALL.iter().map(|grade| grade.point()).collect();
        assert_eq!(points, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
        assert!(!Grade::F.is_passing());
        assert!(Grade::D.is_passing());
    }
}
