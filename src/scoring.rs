use std::fmt;

use crate::models::{Idea, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    StrongBuild,
    Exploring,
    Caution,
    Skip,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::StrongBuild => "STRONG_BUILD",
            Verdict::Exploring => "EXPLORING",
            Verdict::Caution => "CAUTION",
            Verdict::Skip => "SKIP",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Displayed total for an idea. A structured `score` is summed component-wise
/// and never trusted as a pre-computed total.
pub fn compute_total(idea: &Idea) -> f64 {
    match &idea.score {
        Some(Score::Breakdown(breakdown)) => breakdown.sum(),
        Some(Score::Total(total)) => *total,
        None => idea
            .score_breakdown
            .as_ref()
            .map(|breakdown| breakdown.sum())
            .unwrap_or(0.0),
    }
}

/// Lower bounds are inclusive. Out-of-range totals are not clamped.
pub fn classify(total: f64) -> Verdict {
    if total >= 75.0 {
        Verdict::StrongBuild
    } else if total >= 50.0 {
        Verdict::Exploring
    } else if total >= 30.0 {
        Verdict::Caution
    } else {
        Verdict::Skip
    }
}

pub fn grade(total: f64) -> &'static str {
    if total >= 90.0 {
        "A+"
    } else if total >= 80.0 {
        "A"
    } else if total >= 70.0 {
        "B"
    } else if total >= 60.0 {
        "C"
    } else if total >= 50.0 {
        "D"
    } else {
        "F"
    }
}
