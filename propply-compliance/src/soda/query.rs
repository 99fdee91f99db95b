//! SoQL query construction
//!
//! Filters are written against semantic fields and translated to the
//! dataset's own column names here. Values only ever reach the query string
//! as quoted literals.

use super::SodaError;
use crate::registry::{DatasetDescriptor, SemanticField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `col = 'v'`
    Eq,
    /// `col like '%v%'`
    Contains,
    /// `col in ('v', ...)`
    In,
}

/// One `semantic field <op> value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: SemanticField,
    pub op: FilterOp,
    pub value: String,
    /// Further literals for `In`
    pub alternatives: Vec<String>,
    /// Compare against `upper(col)` with an upper-cased value
    pub case_insensitive: bool,
}

impl FilterClause {
    pub fn eq(field: SemanticField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Eq,
            value: value.into(),
            alternatives: Vec::new(),
            case_insensitive: false,
        }
    }

    pub fn eq_ignore_case(field: SemanticField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Eq,
            value: value.into(),
            alternatives: Vec::new(),
            case_insensitive: true,
        }
    }

    /// Case-insensitive substring match
    pub fn contains(field: SemanticField, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Contains,
            value: value.into(),
            alternatives: Vec::new(),
            case_insensitive: true,
        }
    }

    /// Case-insensitive match against any of `values`
    ///
    /// Duplicates are dropped; a single distinct value is a plain equality.
    pub fn one_of_ignore_case(field: SemanticField, values: impl IntoIterator<Item = String>) -> Self {
        let mut distinct: Vec<String> = Vec::new();
        for value in values {
            if !distinct.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                distinct.push(value);
            }
        }
        let mut distinct = distinct.into_iter();
        let first = distinct.next().unwrap_or_default();
        let alternatives: Vec<String> = distinct.collect();
        Self {
            field,
            op: if alternatives.is_empty() { FilterOp::Eq } else { FilterOp::In },
            value: first,
            alternatives,
            case_insensitive: true,
        }
    }

    fn literal(&self, value: &str) -> String {
        if self.case_insensitive {
            value.to_uppercase()
        } else {
            value.to_string()
        }
    }

    fn to_soql(&self, descriptor: &DatasetDescriptor) -> Result<String, SodaError> {
        let column = column_for(descriptor, self.field)?;
        let lhs = if self.case_insensitive {
            format!("upper({})", column)
        } else {
            column.to_string()
        };
        let value = self.literal(&self.value);
        Ok(match self.op {
            FilterOp::Eq => format!("{} = {}", lhs, quote_literal(&value)),
            FilterOp::Contains => format!("{} like {}", lhs, quote_literal(&format!("%{}%", value))),
            FilterOp::In => {
                let literals = std::iter::once(&self.value)
                    .chain(&self.alternatives)
                    .map(|v| quote_literal(&self.literal(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} in ({})", lhs, literals)
            }
        })
    }
}

/// A paged query against one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SodaQuery {
    pub filters: Vec<FilterClause>,
    /// Empty selects the descriptor's default field list
    pub select: Vec<SemanticField>,
    pub limit: usize,
    pub offset: usize,
}

impl SodaQuery {
    pub fn new(filters: Vec<FilterClause>) -> Self {
        Self {
            filters,
            select: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }
}

/// Quote a SoQL string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn column_for(descriptor: &DatasetDescriptor, field: SemanticField) -> Result<&'static str, SodaError> {
    descriptor.column(field).ok_or_else(|| SodaError::UnmappedField {
        dataset_id: descriptor.dataset_id.to_string(),
        field,
    })
}

/// `$where` expression: the dataset scope and the caller's filters, ANDed
pub fn build_where(descriptor: &DatasetDescriptor, filters: &[FilterClause]) -> Result<Option<String>, SodaError> {
    let parts = descriptor
        .scope
        .iter()
        .chain(filters.iter())
        .map(|clause| clause.to_soql(descriptor))
        .collect::<Result<Vec<_>, _>>()?;

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join(" AND ")))
    }
}

/// Full query-string parameters for one page
///
/// Fails with `UnmappedField` before any I/O if a filter or select field has
/// no column in this dataset.
pub fn build_params(descriptor: &DatasetDescriptor, query: &SodaQuery) -> Result<Vec<(String, String)>, SodaError> {
    let mut params = Vec::new();

    if let Some(where_clause) = build_where(descriptor, &query.filters)? {
        params.push(("$where".to_string(), where_clause));
    }

    let select = if query.select.is_empty() {
        &descriptor.select
    } else {
        &query.select
    };
    if !select.is_empty() {
        let columns = select
            .iter()
            .map(|field| column_for(descriptor, *field))
            .collect::<Result<Vec<_>, _>>()?;
        params.push(("$select".to_string(), columns.join(",")));
    }

    if let Some(order_by) = descriptor.order_by {
        params.push((
            "$order".to_string(),
            format!("{} DESC", column_for(descriptor, order_by)?),
        ));
    }

    let limit = if query.limit == 0 {
        descriptor.default_limit
    } else {
        query.limit
    };
    params.push(("$limit".to_string(), limit.to_string()));
    params.push(("$offset".to_string(), query.offset.to_string()));

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DatasetRegistry, Domain};

    fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("O'BRIEN PLACE"), "'O''BRIEN PLACE'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }

    #[test]
    fn test_bin_filter_uses_dataset_column() {
        let registry = DatasetRegistry::nyc().unwrap();
        let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();

        let where_clause = build_where(boiler, &[FilterClause::eq(SemanticField::Bin, "4433339")])
            .unwrap()
            .unwrap();
        assert_eq!(where_clause, "bin_number = '4433339'");
    }

    #[test]
    fn test_unmapped_field_is_rejected() {
        let registry = DatasetRegistry::nyc().unwrap();
        let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();

        let err = build_where(boiler, &[FilterClause::eq(SemanticField::HouseNumber, "140")]).unwrap_err();
        assert!(matches!(
            err,
            SodaError::UnmappedField { field: SemanticField::HouseNumber, .. }
        ));
    }

    #[test]
    fn test_contains_is_case_folded() {
        let registry = DatasetRegistry::nyc().unwrap();
        let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();

        let where_clause = build_where(
            hpd,
            &[
                FilterClause::eq(SemanticField::HouseNumber, "140"),
                FilterClause::contains(SemanticField::StreetName, "28th"),
            ],
        )
        .unwrap()
        .unwrap();
        assert_eq!(where_clause, "housenumber = '140' AND upper(streetname) like '%28TH%'");
    }

    #[test]
    fn test_one_of_lists_each_spelling_once() {
        let registry = DatasetRegistry::nyc().unwrap();
        let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();

        let street = FilterClause::one_of_ignore_case(
            SemanticField::StreetName,
            ["West 28th Street".to_string(), "WEST 28 STREET".to_string(), "west 28 street".to_string()],
        );
        assert_eq!(street.op, FilterOp::In);
        let where_clause = build_where(hpd, &[street]).unwrap().unwrap();
        assert_eq!(where_clause, "upper(streetname) in ('WEST 28TH STREET', 'WEST 28 STREET')");

        let single = FilterClause::one_of_ignore_case(
            SemanticField::StreetName,
            ["BROADWAY".to_string(), "Broadway".to_string()],
        );
        assert_eq!(single.op, FilterOp::Eq);
        assert_eq!(
            build_where(hpd, &[single]).unwrap().unwrap(),
            "upper(streetname) = 'BROADWAY'"
        );
    }

    #[test]
    fn test_scope_filters_are_prepended() {
        let registry = DatasetRegistry::nyc().unwrap();
        let fdny = registry.descriptor_for_domain(Domain::FdnyViolations).unwrap();

        let where_clause = build_where(fdny, &[FilterClause::eq(SemanticField::Block, "01073")])
            .unwrap()
            .unwrap();
        assert_eq!(
            where_clause,
            "upper(issuing_agency) = 'FIRE DEPARTMENT OF NYC' AND violation_location_block_no = '01073'"
        );
    }

    #[test]
    fn test_params_include_paging_and_order() {
        let registry = DatasetRegistry::nyc().unwrap();
        let hpd = registry.descriptor_for_domain(Domain::HpdViolations).unwrap();

        let mut query = SodaQuery::new(vec![FilterClause::eq(SemanticField::Bin, "1")]);
        query.limit = 25;
        query.offset = 50;
        let params = build_params(hpd, &query).unwrap();

        assert_eq!(param(&params, "$limit"), Some("25"));
        assert_eq!(param(&params, "$offset"), Some("50"));
        assert_eq!(param(&params, "$order"), Some("inspectiondate DESC"));
        assert!(param(&params, "$select").unwrap().starts_with("violationid,bin,"));
    }

    #[test]
    fn test_zero_limit_uses_descriptor_default() {
        let registry = DatasetRegistry::nyc().unwrap();
        let boiler = registry.descriptor_for_domain(Domain::BoilerInspections).unwrap();

        let params = build_params(boiler, &SodaQuery::new(Vec::new())).unwrap();
        assert_eq!(param(&params, "$limit"), Some("500"));
        assert_eq!(param(&params, "$where"), None);
    }
}
