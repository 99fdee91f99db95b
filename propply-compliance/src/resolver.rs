//! Address/Identifier Resolver
//!
//! Turns a free-text address into candidate property identifiers by
//! querying the address-capable datasets. Strategies run in order (exact,
//! fuzzy, zip-scoped); within a strategy datasets run in registry order.
//! The first query that yields an accepted row ends the search.
//!
//! Finding nothing is a normal outcome and returns an empty list. Only when
//! every query failed upstream is the lookup reported as an error.

use std::collections::HashSet;
use std::sync::Arc;

use propply_common::property::{compose_bbl, is_placeholder_bin, pad_numeric, CANONICAL_BLOCK_WIDTH, CANONICAL_LOT_WIDTH};
use propply_common::{Borough, PropertyIdentifier};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::{distinctive_token, parse_address, street_key, street_similarity, ParsedAddress};
use crate::models::{MatchStrategy, SearchMatch};
use crate::registry::{DatasetDescriptor, DatasetRegistry, SemanticField};
use crate::soda::{FilterClause, RawRecord, SodaClient, SodaError};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// No dataset could be queried at all
    #[error("Address lookup unavailable: {0}")]
    Unavailable(SodaError),
}

impl ResolveError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ResolveError::Unavailable(err) => err.is_timeout(),
        }
    }
}

/// Acceptance thresholds for street-name similarity
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub fuzzy_threshold: f64,
    /// Looser, since the zip already narrows the candidates
    pub zip_scoped_threshold: f64,
    /// Rows requested by the exact pass
    pub candidate_limit: usize,
    /// Rows requested by the substring passes, whose `like` also hits
    /// neighbouring numbers ("28" in "128")
    pub substring_candidate_limit: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.88,
            zip_scoped_threshold: 0.75,
            candidate_limit: 25,
            substring_candidate_limit: 200,
        }
    }
}

pub struct Resolver {
    client: SodaClient,
    registry: Arc<DatasetRegistry>,
    settings: ResolverSettings,
}

impl Resolver {
    pub fn new(client: SodaClient, registry: Arc<DatasetRegistry>) -> Self {
        Self::with_settings(client, registry, ResolverSettings::default())
    }

    pub fn with_settings(client: SodaClient, registry: Arc<DatasetRegistry>, settings: ResolverSettings) -> Self {
        Self {
            client,
            registry,
            settings,
        }
    }

    /// Resolve an address to ranked candidate identifiers, best first
    pub async fn resolve(&self, address: &str, zip_code: Option<&str>) -> Result<Vec<SearchMatch>, ResolveError> {
        let Some(parsed) = parse_address(address, zip_code) else {
            info!(address, "Address has no house number and street, nothing to search");
            return Ok(Vec::new());
        };

        info!(
            house_number = %parsed.house_number,
            street = %parsed.street,
            zip_code = ?parsed.zip_code,
            "Resolving address"
        );

        let datasets = self.registry.address_datasets();
        let mut any_succeeded = false;
        let mut last_error = None;

        for strategy in MatchStrategy::ORDER {
            for descriptor in &datasets {
                let Some(filters) = strategy_filters(strategy, &parsed, descriptor) else {
                    continue;
                };
                let limit = match strategy {
                    MatchStrategy::Exact => self.settings.candidate_limit,
                    MatchStrategy::Fuzzy | MatchStrategy::ZipScoped => self.settings.substring_candidate_limit,
                };

                match self.client.fetch(descriptor, &filters, &[], limit, 0).await {
                    Ok(rows) => {
                        any_succeeded = true;
                        let matches = self.accept(strategy, &parsed, descriptor, &rows);
                        debug!(
                            strategy = ?strategy,
                            dataset = descriptor.key,
                            rows = rows.len(),
                            accepted = matches.len(),
                            "Resolver query finished"
                        );
                        if !matches.is_empty() {
                            info!(
                                strategy = ?strategy,
                                dataset = descriptor.key,
                                matches = matches.len(),
                                "Address resolved"
                            );
                            return Ok(matches);
                        }
                    }
                    Err(err) => {
                        warn!(
                            strategy = ?strategy,
                            dataset = descriptor.key,
                            error = %err,
                            "Resolver query failed, trying next dataset"
                        );
                        last_error = Some(err);
                    }
                }
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(err)) => Err(ResolveError::Unavailable(err)),
            _ => {
                info!(address, "No properties found");
                Ok(Vec::new())
            }
        }
    }

    /// Rows that pass the strategy's street check, deduplicated and ranked
    fn accept(
        &self,
        strategy: MatchStrategy,
        parsed: &ParsedAddress,
        descriptor: &DatasetDescriptor,
        rows: &[RawRecord],
    ) -> Vec<SearchMatch> {
        let threshold = match strategy {
            MatchStrategy::Exact => 1.0,
            MatchStrategy::Fuzzy => self.settings.fuzzy_threshold,
            MatchStrategy::ZipScoped => self.settings.zip_scoped_threshold,
        };

        let mut seen = HashSet::new();
        let mut matches: Vec<SearchMatch> = rows
            .iter()
            .filter_map(|row| {
                let house = descriptor.text(row, SemanticField::HouseNumber)?;
                if !house.eq_ignore_ascii_case(&parsed.house_number) {
                    return None;
                }
                let street = descriptor.text(row, SemanticField::StreetName)?;
                let similarity = street_similarity(&parsed.street_key, &street_key(&street));
                if similarity < threshold {
                    return None;
                }
                let identifier = identifier_from_row(descriptor, row, &house, &street);
                let dedup_key = (
                    identifier.bin.clone(),
                    identifier.borough,
                    identifier.block.clone(),
                    identifier.lot.clone(),
                );
                if !seen.insert(dedup_key) {
                    return None;
                }
                Some(SearchMatch {
                    identifier,
                    dataset: descriptor.key.to_string(),
                    strategy,
                    confidence: strategy.confidence(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches
    }
}

/// Filters for one strategy against one dataset; `None` if the strategy
/// does not apply to this dataset
fn strategy_filters(
    strategy: MatchStrategy,
    parsed: &ParsedAddress,
    descriptor: &DatasetDescriptor,
) -> Option<Vec<FilterClause>> {
    let house = FilterClause::eq(SemanticField::HouseNumber, parsed.house_number.clone());
    match strategy {
        // Datasets spell numbered streets both ways ("WEST 28TH STREET", "WEST 28 STREET")
        MatchStrategy::Exact => Some(vec![
            house,
            FilterClause::one_of_ignore_case(
                SemanticField::StreetName,
                [parsed.street.clone(), parsed.street_key.clone()],
            ),
        ]),
        MatchStrategy::Fuzzy => {
            let token = distinctive_token(&parsed.street_key)?;
            Some(vec![house, FilterClause::contains(SemanticField::StreetName, token)])
        }
        MatchStrategy::ZipScoped => {
            let zip = parsed.zip_code.as_ref()?;
            if !descriptor.has_column(SemanticField::ZipCode) {
                return None;
            }
            let token = distinctive_token(&parsed.street_key)?;
            Some(vec![
                house,
                FilterClause::contains(SemanticField::StreetName, token),
                FilterClause::eq(SemanticField::ZipCode, zip.clone()),
            ])
        }
    }
}

/// Whatever identifiers the row carries, in canonical form
fn identifier_from_row(descriptor: &DatasetDescriptor, row: &RawRecord, house: &str, street: &str) -> PropertyIdentifier {
    let borough = descriptor
        .text(row, SemanticField::Borough)
        .and_then(|b| b.parse::<Borough>().ok());
    let block = descriptor
        .text(row, SemanticField::Block)
        .and_then(|b| pad_numeric(&b, CANONICAL_BLOCK_WIDTH));
    let lot = descriptor
        .text(row, SemanticField::Lot)
        .and_then(|l| pad_numeric(&l, CANONICAL_LOT_WIDTH));
    let bbl = descriptor.text(row, SemanticField::Bbl).or_else(|| match (borough, &block, &lot) {
        (Some(borough), Some(block), Some(lot)) => compose_bbl(borough, block, lot),
        _ => None,
    });

    PropertyIdentifier {
        address: Some(format!("{} {}", house, street.split_whitespace().collect::<Vec<_>>().join(" "))),
        bin: descriptor
            .text(row, SemanticField::Bin)
            .filter(|bin| !is_placeholder_bin(bin)),
        bbl,
        borough,
        block,
        lot,
        zip_code: descriptor.text(row, SemanticField::ZipCode),
    }
}
