//! Address normalization
//!
//! Free-text addresses are reduced to a house number, an expanded street
//! name and a comparison key. Matching is equality or similarity on the
//! comparison key, so two spellings of the same street ("W 28TH ST",
//! "WEST 28 STREET") meet at the same key.

use propply_common::Borough;

/// A free-text address broken into searchable parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// "140", "45-17"
    pub house_number: String,
    /// Upper-case street with abbreviations expanded ("WEST 28TH STREET")
    pub street: String,
    /// Comparison key: expanded street without ordinal suffixes ("WEST 28 STREET")
    pub street_key: String,
    pub zip_code: Option<String>,
    pub borough: Option<Borough>,
}

const UNIT_MARKERS: &[&str] = &["APT", "APARTMENT", "UNIT", "SUITE", "STE", "FL", "FLOOR", "RM", "ROOM"];

const CITY_SUFFIXES: &[&[&str]] = &[
    &["USA"],
    &["NY"],
    &["NEW", "YORK"],
    &["NYC"],
    &["MANHATTAN"],
    &["BROOKLYN"],
    &["BRONX"],
    &["QUEENS"],
    &["STATEN", "ISLAND"],
];

/// Street-type and direction abbreviations
fn expand_token(token: &str) -> Option<&'static str> {
    let expanded = match token {
        "ST" | "STR" => "STREET",
        "AVE" | "AV" | "AVN" => "AVENUE",
        "BLVD" => "BOULEVARD",
        "PL" => "PLACE",
        "RD" => "ROAD",
        "PKWY" | "PKY" => "PARKWAY",
        "DR" => "DRIVE",
        "LN" => "LANE",
        "CT" => "COURT",
        "TER" | "TERR" => "TERRACE",
        "HWY" => "HIGHWAY",
        "EXPY" => "EXPRESSWAY",
        "SQ" => "SQUARE",
        "CIR" => "CIRCLE",
        "TPKE" => "TURNPIKE",
        "BWAY" => "BROADWAY",
        _ => return None,
    };
    Some(expanded)
}

fn expand_direction(token: &str) -> Option<&'static str> {
    match token {
        "N" => Some("NORTH"),
        "S" => Some("SOUTH"),
        "E" => Some("EAST"),
        "W" => Some("WEST"),
        _ => None,
    }
}

/// Upper-case, punctuation to spaces (hyphens kept), whitespace collapsed
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expand abbreviations in an already-normalized street name
///
/// A leading single-letter direction becomes a word; a leading "ST"
/// followed by more words is "SAINT" ("ST MARKS PLACE").
pub fn expand_street(street: &str) -> String {
    let tokens: Vec<&str> = street.split_whitespace().collect();
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if i == 0 {
                if let Some(direction) = expand_direction(token) {
                    return direction;
                }
                if *token == "ST" && tokens.len() > 2 {
                    return "SAINT";
                }
            }
            expand_token(token).unwrap_or(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop ordinal suffixes from numeric tokens ("28TH" -> "28")
fn strip_ordinal(token: &str) -> &str {
    for suffix in ["ST", "ND", "RD", "TH"] {
        if let Some(number) = token.strip_suffix(suffix) {
            if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) {
                return number;
            }
        }
    }
    token
}

/// Comparison key for a street name in any spelling
pub fn street_key(street: &str) -> String {
    expand_street(&normalize_text(street))
        .split_whitespace()
        .map(strip_ordinal)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two street keys in [0, 1]
///
/// Numbered streets must carry the same numbers: "WEST 28 STREET" and
/// "WEST 128 STREET" score 0 however close the strings are.
pub fn street_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let numbers = |key: &str| -> Vec<String> {
        key.split_whitespace()
            .filter(|t| t.starts_with(|c: char| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    };
    if numbers(a) != numbers(b) {
        return 0.0;
    }
    strsim::jaro_winkler(a, b)
}

/// Most selective token of a street key for a substring query
///
/// Skips directions and street types; falls back to the longest token.
pub fn distinctive_token(street_key: &str) -> Option<&str> {
    const GENERIC: &[&str] = &[
        "NORTH", "SOUTH", "EAST", "WEST", "STREET", "AVENUE", "BOULEVARD", "PLACE", "ROAD",
        "PARKWAY", "DRIVE", "LANE", "COURT", "TERRACE", "HIGHWAY", "SQUARE",
    ];
    street_key
        .split_whitespace()
        .find(|t| !GENERIC.contains(t))
        .or_else(|| street_key.split_whitespace().max_by_key(|t| t.len()))
}

fn is_zip(token: &str) -> bool {
    let base = token.split('-').next().unwrap_or(token);
    base.len() == 5 && base.bytes().all(|b| b.is_ascii_digit())
}

fn ends_with(tokens: &[&str], suffix: &[&str]) -> bool {
    tokens.len() >= suffix.len() && &tokens[tokens.len() - suffix.len()..] == suffix
}

/// Parse a free-text address
///
/// Returns `None` when there is no house number or no street: a bare
/// house number is never searchable. A supplied zip takes precedence over
/// one found in the text.
pub fn parse_address(text: &str, zip_code: Option<&str>) -> Option<ParsedAddress> {
    let upper = text.to_uppercase();
    let mut segments = upper.split(',');
    let first = segments.next().unwrap_or_default();
    let trailing: Vec<String> = segments.map(normalize_text).collect();

    let normalized = normalize_text(first);
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut found_zip = None;
    let mut borough = None;

    for segment in &trailing {
        for token in segment.split_whitespace() {
            if is_zip(token) {
                found_zip = Some(token[..5].to_string());
            }
        }
        if borough.is_none() {
            borough = segment.parse::<Borough>().ok();
        }
    }

    // Strip trailing zip / city / borough tokens, keeping at least house + one street word
    loop {
        if tokens.len() > 2 && tokens.last().is_some_and(|t| is_zip(t)) {
            let zip = tokens.pop().unwrap_or_default();
            found_zip = Some(zip[..5].to_string());
            continue;
        }
        let suffix = CITY_SUFFIXES
            .iter()
            .find(|s| ends_with(&tokens, s) && tokens.len() > s.len() + 1);
        match suffix {
            Some(suffix) => {
                if borough.is_none() {
                    borough = suffix.join(" ").parse::<Borough>().ok();
                }
                tokens.truncate(tokens.len() - suffix.len());
            }
            None => break,
        }
    }

    if let Some(pos) = tokens.iter().position(|t| UNIT_MARKERS.contains(t)) {
        tokens.truncate(pos);
    }

    let (house_number, street_tokens) = tokens.split_first()?;
    if !house_number.starts_with(|c: char| c.is_ascii_digit()) || street_tokens.is_empty() {
        return None;
    }

    let street = expand_street(&street_tokens.join(" "));
    let key = street_key(&street);

    let zip_code = zip_code
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_string)
        .or(found_zip);

    Some(ParsedAddress {
        house_number: house_number.to_string(),
        street,
        street_key: key,
        zip_code,
        borough,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  140 w. 28th   st. "), "140 W 28TH ST");
        assert_eq!(normalize_text("45-17 Vernon Blvd."), "45-17 VERNON BLVD");
        assert_eq!(normalize_text("O'Brien - Pl"), "O BRIEN PL");
    }

    #[test]
    fn test_expand_street() {
        assert_eq!(expand_street("W 28TH ST"), "WEST 28TH STREET");
        assert_eq!(expand_street("ST MARKS PL"), "SAINT MARKS PLACE");
        assert_eq!(expand_street("PARK AVE S"), "PARK AVENUE S");
        assert_eq!(expand_street("E 14 STREET"), "EAST 14 STREET");
    }

    #[test]
    fn test_street_key_unifies_spellings() {
        let a = street_key("W 28th St");
        let b = street_key("WEST 28 STREET");
        let c = street_key("West 28th Street");
        assert_eq!(a, "WEST 28 STREET");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_address("140 West 28th Street, New York, NY 10001", None).unwrap();
        assert_eq!(parsed.house_number, "140");
        assert_eq!(parsed.street, "WEST 28TH STREET");
        assert_eq!(parsed.street_key, "WEST 28 STREET");
        assert_eq!(parsed.zip_code.as_deref(), Some("10001"));
        assert_eq!(parsed.borough, Some(Borough::Manhattan));
    }

    #[test]
    fn test_parse_without_commas() {
        let parsed = parse_address("140 W 28 ST NEW YORK NY 10001", None).unwrap();
        assert_eq!(parsed.house_number, "140");
        assert_eq!(parsed.street, "WEST 28 STREET");
        assert_eq!(parsed.zip_code.as_deref(), Some("10001"));
    }

    #[test]
    fn test_parse_keeps_streets_named_like_suffixes() {
        let parsed = parse_address("120-55 Queens Blvd, Queens", None).unwrap();
        assert_eq!(parsed.house_number, "120-55");
        assert_eq!(parsed.street, "QUEENS BOULEVARD");
        assert_eq!(parsed.borough, Some(Borough::Queens));
    }

    #[test]
    fn test_parse_drops_unit() {
        let parsed = parse_address("350 5th Ave Apt 12B", None).unwrap();
        assert_eq!(parsed.street, "5TH AVENUE");
        assert_eq!(parsed.street_key, "5 AVENUE");
    }

    #[test]
    fn test_supplied_zip_wins() {
        let parsed = parse_address("140 West 28th Street 10002", Some("10001")).unwrap();
        assert_eq!(parsed.zip_code.as_deref(), Some("10001"));
    }

    #[test]
    fn test_house_number_only_is_rejected() {
        assert!(parse_address("140", None).is_none());
        assert!(parse_address("140, New York, NY", None).is_none());
        assert!(parse_address("West 28th Street", None).is_none());
        assert!(parse_address("   ", None).is_none());
    }

    #[test]
    fn test_distinctive_token() {
        assert_eq!(distinctive_token("WEST 28 STREET"), Some("28"));
        assert_eq!(distinctive_token("PARK AVENUE"), Some("PARK"));
        assert_eq!(distinctive_token("WEST STREET"), Some("STREET"));
    }

    #[test]
    fn test_street_similarity() {
        assert_eq!(street_similarity("WEST 28 STREET", "WEST 28 STREET"), 1.0);
        assert!(street_similarity("WEST 28 STREET", "W 28 STREET") > 0.75);
        assert_eq!(street_similarity("WEST 28 STREET", "WEST 128 STREET"), 0.0);
        assert_eq!(street_similarity("WEST 28 STREET", "WEST 29 STREET"), 0.0);
        assert!(street_similarity("PARK AVENUE", "BROADWAY") < 0.6);
    }
}
