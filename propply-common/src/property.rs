//! NYC property identifiers
//!
//! A property can be addressed three ways in NYC Open Data: by BIN (one
//! building), by borough/block/lot (one tax lot, also packed as a 10-digit
//! BBL), or by street address. Datasets disagree on how they encode each of
//! these, so the identifier keeps canonical values and the per-dataset
//! rendering happens at query time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Canonical block width (as in a BBL)
pub const CANONICAL_BLOCK_WIDTH: usize = 5;

/// Canonical lot width (as in a BBL)
pub const CANONICAL_LOT_WIDTH: usize = 4;

/// The five NYC boroughs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Borough {
    Manhattan,
    Bronx,
    Brooklyn,
    Queens,
    StatenIsland,
}

impl Borough {
    pub const ALL: [Borough; 5] = [
        Borough::Manhattan,
        Borough::Bronx,
        Borough::Brooklyn,
        Borough::Queens,
        Borough::StatenIsland,
    ];

    /// Numeric borough code used by DOB and HPD (1-5)
    pub fn code(self) -> u8 {
        match self {
            Borough::Manhattan => 1,
            Borough::Bronx => 2,
            Borough::Brooklyn => 3,
            Borough::Queens => 4,
            Borough::StatenIsland => 5,
        }
    }

    /// Upper-case borough name as most datasets spell it
    pub fn name(self) -> &'static str {
        match self {
            Borough::Manhattan => "MANHATTAN",
            Borough::Bronx => "BRONX",
            Borough::Brooklyn => "BROOKLYN",
            Borough::Queens => "QUEENS",
            Borough::StatenIsland => "STATEN ISLAND",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Borough {
    type Err = Error;

    /// Accepts numeric codes, full names, county names and two-letter abbreviations
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let borough = match upper.as_str() {
            "1" | "MN" | "MANHATTAN" | "NEW YORK" => Borough::Manhattan,
            "2" | "BX" | "BRONX" | "THE BRONX" => Borough::Bronx,
            "3" | "BK" | "BROOKLYN" | "KINGS" => Borough::Brooklyn,
            "4" | "QN" | "QUEENS" => Borough::Queens,
            "5" | "SI" | "STATEN ISLAND" | "RICHMOND" => Borough::StatenIsland,
            _ => return Err(Error::InvalidInput(format!("Unknown borough: {}", s.trim()))),
        };
        Ok(borough)
    }
}

impl TryFrom<String> for Borough {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Borough> for String {
    fn from(borough: Borough) -> Self {
        borough.name().to_string()
    }
}

/// Left-zero-pad a numeric string to `width`
///
/// Returns `None` for blank or non-numeric input. Values already at or beyond
/// `width` digits are returned unchanged, so padding is idempotent.
pub fn pad_numeric(value: &str, width: usize) -> Option<String> {
    let digits = numeric(value)?;
    Some(format!("{:0>width$}", digits, width = width))
}

/// Strip leading zeros from a numeric string ("00001" -> "1", "0000" -> "0")
pub fn strip_leading_zeros(value: &str) -> Option<String> {
    let digits = numeric(value)?;
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

/// Render a block or lot at a dataset-specific width (`None` = unpadded)
pub fn format_numeric(value: &str, width: Option<usize>) -> Option<String> {
    match width {
        Some(width) => pad_numeric(value, width),
        None => strip_leading_zeros(value),
    }
}

fn numeric(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(trimmed)
}

/// Pack borough/block/lot into a 10-digit BBL
pub fn compose_bbl(borough: Borough, block: &str, lot: &str) -> Option<String> {
    let block = pad_numeric(block, CANONICAL_BLOCK_WIDTH)?;
    let lot = pad_numeric(lot, CANONICAL_LOT_WIDTH)?;
    if block.len() != CANONICAL_BLOCK_WIDTH || lot.len() != CANONICAL_LOT_WIDTH {
        return None;
    }
    Some(format!("{}{}{}", borough.code(), block, lot))
}

/// Split a 10-digit BBL into canonical borough/block/lot
pub fn split_bbl(bbl: &str) -> Option<(Borough, String, String)> {
    let digits = numeric(bbl)?;
    if digits.len() != 10 {
        return None;
    }
    let borough = Borough::from_code(digits[0..1].parse().ok()?)?;
    Some((borough, digits[1..6].to_string(), digits[6..10].to_string()))
}

/// BINs of the form `N000000` are DOB placeholders for lots without an
/// assigned building number and identify nothing.
pub fn is_placeholder_bin(bin: &str) -> bool {
    let bytes = bin.trim().as_bytes();
    bytes.len() == 7 && (b'1'..=b'5').contains(&bytes[0]) && bytes[1..].iter().all(|&b| b == b'0')
}

/// Identifier set for one property
///
/// At least one of BIN, borough+block+lot (directly or through a BBL), or
/// an address must be present for the property to be searchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borough: Option<Borough>,
    /// Canonical 5-digit block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    /// Canonical 4-digit lot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl PropertyIdentifier {
    /// Clean up raw identifier input
    ///
    /// Blank strings become `None`, block/lot are padded to canonical width,
    /// placeholder BINs are dropped and a missing BBL is composed when the
    /// discrete parts are known. Non-numeric block/lot values are rejected.
    pub fn normalized(mut self) -> Result<Self> {
        self.address = non_blank(self.address).map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "));
        self.bin = non_blank(self.bin).filter(|bin| !is_placeholder_bin(bin));
        self.bbl = non_blank(self.bbl);
        self.zip_code = non_blank(self.zip_code);

        self.block = match non_blank(self.block) {
            Some(block) => Some(
                pad_numeric(&block, CANONICAL_BLOCK_WIDTH)
                    .ok_or_else(|| Error::InvalidInput(format!("Block must be numeric: {}", block)))?,
            ),
            None => None,
        };
        self.lot = match non_blank(self.lot) {
            Some(lot) => Some(
                pad_numeric(&lot, CANONICAL_LOT_WIDTH)
                    .ok_or_else(|| Error::InvalidInput(format!("Lot must be numeric: {}", lot)))?,
            ),
            None => None,
        };

        if let Some(bin) = &self.bin {
            if numeric(bin).is_none() {
                return Err(Error::InvalidInput(format!("BIN must be numeric: {}", bin)));
            }
        }

        if self.bbl.is_none() {
            if let (Some(borough), Some(block), Some(lot)) = (self.borough, &self.block, &self.lot) {
                self.bbl = compose_bbl(borough, block, lot);
            }
        }

        Ok(self)
    }

    /// Borough, block and lot, taken from the discrete fields or unpacked from the BBL
    pub fn borough_block_lot(&self) -> Option<(Borough, String, String)> {
        if let (Some(borough), Some(block), Some(lot)) = (self.borough, &self.block, &self.lot) {
            return Some((borough, block.clone(), lot.clone()));
        }
        self.bbl.as_deref().and_then(split_bbl)
    }

    /// A valid 10-digit BBL, composed from the parts if not given directly
    pub fn effective_bbl(&self) -> Option<String> {
        if let Some(bbl) = self.bbl.as_deref() {
            if split_bbl(bbl).is_some() {
                return Some(bbl.trim().to_string());
            }
        }
        let (borough, block, lot) = self.borough_block_lot()?;
        compose_bbl(borough, &block, &lot)
    }

    /// Whether any search key can be formed from this identifier
    pub fn is_searchable(&self) -> bool {
        self.bin.is_some() || self.borough_block_lot().is_some() || self.address.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
