//! Search-key selection
//!
//! For each dataset, the keys the identifier can form, most specific first,
//! limited to the kinds the descriptor supports. A key kind the dataset
//! does not support is never produced.

use propply_common::{Borough, PropertyIdentifier};

use crate::address::{distinctive_token, parse_address, street_key, street_similarity, ParsedAddress};
use crate::registry::{BoroughFormat, DatasetDescriptor, SearchKeyKind, SemanticField};
use crate::soda::{FilterClause, RawRecord};

/// Street similarity an address-keyed row needs to count as the property
pub const ADDRESS_MATCH_THRESHOLD: f64 = 0.75;

/// A concrete key with the values to filter on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    Bin(String),
    Bbl(String),
    BoroughBlockLot {
        borough: Borough,
        block: String,
        lot: String,
    },
    Address(ParsedAddress),
}

impl SearchKey {
    pub fn kind(&self) -> SearchKeyKind {
        match self {
            SearchKey::Bin(_) => SearchKeyKind::Bin,
            SearchKey::Bbl(_) => SearchKeyKind::Bbl,
            SearchKey::BoroughBlockLot { .. } => SearchKeyKind::BoroughBlockLot,
            SearchKey::Address(_) => SearchKeyKind::Address,
        }
    }

    /// Filters rendered in this dataset's encoding; `None` if a value cannot be rendered
    pub fn filters(&self, descriptor: &DatasetDescriptor) -> Option<Vec<FilterClause>> {
        let filters = match self {
            SearchKey::Bin(bin) => vec![FilterClause::eq(SemanticField::Bin, bin.clone())],
            SearchKey::Bbl(bbl) => vec![FilterClause::eq(SemanticField::Bbl, bbl.clone())],
            SearchKey::BoroughBlockLot { borough, block, lot } => {
                let borough_value = descriptor.format_borough(*borough);
                let borough_filter = match descriptor.borough_format {
                    BoroughFormat::Code => FilterClause::eq(SemanticField::Borough, borough_value),
                    BoroughFormat::Name => FilterClause::eq_ignore_case(SemanticField::Borough, borough_value),
                };
                vec![
                    borough_filter,
                    FilterClause::eq(SemanticField::Block, descriptor.format_block(block)?),
                    FilterClause::eq(SemanticField::Lot, descriptor.format_lot(lot)?),
                ]
            }
            SearchKey::Address(parsed) => {
                let mut filters = vec![
                    FilterClause::eq(SemanticField::HouseNumber, parsed.house_number.clone()),
                    FilterClause::contains(SemanticField::StreetName, distinctive_token(&parsed.street_key)?),
                ];
                if let Some(zip) = &parsed.zip_code {
                    if descriptor.has_column(SemanticField::ZipCode) {
                        filters.push(FilterClause::eq(SemanticField::ZipCode, zip.clone()));
                    }
                }
                filters
            }
        };
        Some(filters)
    }

    /// Whether a returned row belongs to the property
    ///
    /// Identifier keys are exact on the server side. An address query is a
    /// substring match, so its rows are checked against the street key.
    pub fn accepts(&self, descriptor: &DatasetDescriptor, row: &RawRecord) -> bool {
        match self {
            SearchKey::Address(parsed) => match descriptor.text(row, SemanticField::StreetName) {
                Some(street) => street_similarity(&parsed.street_key, &street_key(&street)) >= ADDRESS_MATCH_THRESHOLD,
                None => false,
            },
            _ => true,
        }
    }
}

/// Candidate keys for one dataset, in priority order BIN > BBL > BOROUGH_BLOCK_LOT > ADDRESS
pub fn candidate_keys(descriptor: &DatasetDescriptor, identifier: &PropertyIdentifier) -> Vec<SearchKey> {
    SearchKeyKind::PRIORITY
        .into_iter()
        .filter(|kind| descriptor.supports(*kind))
        .filter_map(|kind| form_key(kind, identifier))
        .collect()
}

fn form_key(kind: SearchKeyKind, identifier: &PropertyIdentifier) -> Option<SearchKey> {
    match kind {
        SearchKeyKind::Bin => identifier.bin.clone().map(SearchKey::Bin),
        SearchKeyKind::Bbl => identifier.effective_bbl().map(SearchKey::Bbl),
        SearchKeyKind::BoroughBlockLot => identifier
            .borough_block_lot()
            .map(|(borough, block, lot)| SearchKey::BoroughBlockLot { borough, block, lot }),
        SearchKeyKind::Address => identifier
            .address
            .as_deref()
            .and_then(|address| parse_address(address, identifier.zip_code.as_deref()))
            .map(SearchKey::Address),
    }
}

/// Human-readable reason no key could be formed
pub fn unsearchable_reason(descriptor: &DatasetDescriptor, identifier: &PropertyIdentifier) -> String {
    let supported: Vec<String> = descriptor.search_keys.iter().map(|k| k.to_string()).collect();
    let mut available = Vec::new();
    if identifier.bin.is_some() {
        available.push("BIN");
    }
    if identifier.borough_block_lot().is_some() {
        available.push("BOROUGH_BLOCK_LOT");
    }
    if identifier.address.is_some() {
        available.push("ADDRESS");
    }
    let available = if available.is_empty() {
        "nothing".to_string()
    } else {
        available.join(", ")
    };
    format!(
        "{} can only be searched by {}; property identifier provides {}",
        descriptor.name,
        supported.join(", "),
        available
    )
}
