use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalizer::NormalizedIndicators;
use crate::rules::{matching_rule, Indicator, ScoringRule, SCORING_RULES};

/// Discrete valuation grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    Weak,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl Rating {
    /// Lower bounds are inclusive.
    pub fn from_points(points: i32) -> Self {
        match points {
            p if p >= 18 => Rating::Excellent,
            p if p >= 14 => Rating::VeryGood,
            p if p >= 10 => Rating::Good,
            p if p >= 6 => Rating::Fair,
            _ => Rating::Weak,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::VeryGood => "Very Good",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::Weak => "Weak",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Points contributed by one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub indicator: Indicator,
    pub value: Option<f64>,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub rating: Rating,
    pub points: i32,
    pub contributions: Vec<Contribution>,
}

impl ScoreCard {
    /// `+3 PEG, +2 Beta, -1 P/E` style summary of the non-zero contributions.
    pub fn reason(&self) -> String {
        let parts: Vec<String> = self
            .contributions
            .iter()
            .filter(|c| c.points != 0)
            .map(|c| format!("{:+} {}", c.points, c.indicator.label()))
            .collect();
        if parts.is_empty() {
            "No scoring indicator matched".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Sums table points over the normalized indicators. Pure and deterministic.
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine {
    rules: &'static [ScoringRule],
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self {
            rules: SCORING_RULES,
        }
    }

    pub fn with_rules(rules: &'static [ScoringRule]) -> Self {
        Self { rules }
    }

    pub fn score(&self, indicators: &NormalizedIndicators) -> (Rating, i32) {
        let card = self.score_card(indicators);
        (card.rating, card.points)
    }

    pub fn score_card(&self, indicators: &NormalizedIndicators) -> ScoreCard {
        let contributions: Vec<Contribution> = Indicator::ALL
            .iter()
            .map(|&indicator| {
                let value = indicator.value(indicators);
                let points = value
                    .and_then(|v| matching_rule(self.rules, indicator, v))
                    .map(|r| r.points)
                    .unwrap_or(0);
                Contribution {
                    indicator,
                    value,
                    points,
                }
            })
            .collect();

        let points = contributions.iter().map(|c| c.points).sum();
        ScoreCard {
            rating: Rating::from_points(points),
            points,
            contributions,
        }
    }
}
