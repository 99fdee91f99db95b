//! Compliance scoring
//!
//! Domain score: `max(0, 100 - penalty * open_records)`. Zero open records
//! scores 100, more open records never score higher, and the floor is 0.
//!
//! Overall score: weighted mean of the domains that returned data. Failed
//! domains are left out instead of counting as 0.

use std::collections::BTreeMap;

use crate::models::{DatasetResult, DomainSummary};
use crate::registry::Domain;

#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    /// Points lost per open record
    pub penalties: BTreeMap<Domain, f64>,
    /// Relative weight in the overall score
    pub weights: BTreeMap<Domain, f64>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let penalties = [
            (Domain::HpdViolations, 10.0),
            (Domain::DobViolations, 15.0),
            (Domain::ElevatorInspections, 5.0),
            (Domain::BoilerInspections, 10.0),
            (Domain::ElectricalPermits, 5.0),
            (Domain::FdnyViolations, 15.0),
        ];
        let weights = [
            (Domain::HpdViolations, 0.25),
            (Domain::DobViolations, 0.25),
            (Domain::ElevatorInspections, 0.15),
            (Domain::BoilerInspections, 0.15),
            (Domain::ElectricalPermits, 0.10),
            (Domain::FdnyViolations, 0.10),
        ];
        Self {
            penalties: penalties.into_iter().collect(),
            weights: weights.into_iter().collect(),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl ScoringPolicy {
    /// Score in [0, 100] for `active` open records
    pub fn domain_score(&self, domain: Domain, active: usize) -> f64 {
        let penalty = self.penalties.get(&domain).copied().unwrap_or(10.0);
        round1((100.0 - penalty * active as f64).max(0.0))
    }

    /// Counts and score for one domain result
    pub fn summarize(&self, result: &DatasetResult) -> DomainSummary {
        let active = result.active_count();
        DomainSummary {
            total: result.count,
            active,
            by_status: result.status_counts(),
            score: if result.is_failed() {
                None
            } else {
                Some(self.domain_score(result.domain, active))
            },
        }
    }

    /// Weighted mean of scored domains; `None` if no domain has a score
    pub fn overall(&self, summary: &BTreeMap<Domain, DomainSummary>) -> Option<f64> {
        let (weighted, total_weight) = summary
            .iter()
            .filter_map(|(domain, s)| s.score.map(|score| (score, self.weights.get(domain).copied().unwrap_or(0.1))))
            .fold((0.0, 0.0), |(sum, weights), (score, weight)| (sum + score * weight, weights + weight));

        if total_weight > 0.0 {
            Some(round1(weighted / total_weight))
        } else {
            None
        }
    }
}
