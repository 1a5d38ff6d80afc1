//! Tests for the table-name algebra

use chrono::NaiveDate;

use crate::error::{Classify, ErrorKind};
use crate::names::{
    NameError, Platform, TableName, TableType, convert, forwarding_decisions_name, platform,
    table_type, to_results, to_routes,
};

const MEASUREMENT: &str = "ab01cd23_4567_89ef_0123_456789abcdef";
const AGENT: &str = "cd45ef67_89ab_cdef_0123_456789abcdef";

fn iris_results() -> String {
    format!("results__{MEASUREMENT}__{AGENT}")
}

// =============================================================================
// type / platform
// =============================================================================

#[test]
fn test_type_detection() {
    assert_eq!(table_type(&iris_results()), TableType::Results);
    assert_eq!(table_type(&format!("routes__{MEASUREMENT}__{AGENT}")), TableType::Routes);
    assert_eq!(table_type("ark_results__cycle20240131"), TableType::Results);
    assert_eq!(table_type("ark_routes__cycle20240131"), TableType::Routes);
    assert_eq!(table_type("events_v1"), TableType::Unknown);
    assert_eq!(table_type(""), TableType::Unknown);
}

#[test]
fn test_platform_detection() {
    assert_eq!(platform(&iris_results()), Platform::Iris);
    assert_eq!(platform("ark_results__cycle20240131"), Platform::Ark);
    assert_eq!(platform(""), Platform::Unknown);
    assert_eq!(platform("results__not_a_uuid__either"), Platform::Unknown);
}

#[test]
fn test_platform_is_deterministic() {
    let name = iris_results();
    assert_eq!(platform(&name), platform(&name));
}

// =============================================================================
// convert
// =============================================================================

#[test]
fn test_convert_iris_results_to_routes() {
    let routes = to_routes(&iris_results()).unwrap();
    assert_eq!(routes, format!("routes__{MEASUREMENT}__{AGENT}"));
    assert_eq!(routes, iris_results().replacen("results", "routes", 1));
}

#[test]
fn test_convert_ark_results_to_routes() {
    assert_eq!(
        to_routes("ark_results__cycle20240101").unwrap(),
        "ark_routes__cycle20240101"
    );
}

#[test]
fn test_convert_round_trip() {
    for name in [iris_results(), "ark_results__cycle20240101".to_string()] {
        let routes = convert(&name, TableType::Routes).unwrap();
        assert_eq!(convert(&routes, table_type(&name)).unwrap(), name);
        assert_eq!(to_results(&routes).unwrap(), name);
    }
}

#[test]
fn test_convert_same_type_is_identity() {
    let name = iris_results();
    assert_eq!(convert(&name, TableType::Results).unwrap(), name);
}

#[test]
fn test_convert_unknown_type_fails() {
    let err = to_routes("events_v1").unwrap_err();
    assert_eq!(err, NameError::UnknownType("events_v1".into()));
    assert_eq!(err.kind(), ErrorKind::UnknownTableType);

    assert!(convert(&iris_results(), TableType::Unknown).is_err());
}

#[test]
fn test_forwarding_decisions_name() {
    assert_eq!(
        forwarding_decisions_name("ark_results__cycle20240101").unwrap(),
        "ark_forwarding_decisions__cycle20240101"
    );
    assert!(forwarding_decisions_name("ark_routes__cycle20240101").is_err());
}

// =============================================================================
// TableName::parse
// =============================================================================

#[test]
fn test_parse_valid_names() {
    let iris = TableName::parse(&iris_results()).unwrap();
    assert_eq!(iris.platform(), Platform::Iris);
    assert_eq!(iris.table_type(), TableType::Results);
    assert!(iris.cycle().is_none());

    let ark: TableName = "ark_routes__cycle20240229".parse().unwrap();
    assert_eq!(ark.platform(), Platform::Ark);
    assert_eq!(ark.table_type(), TableType::Routes);
    assert_eq!(ark.cycle(), NaiveDate::from_ymd_opt(2024, 2, 29));
}

#[test]
fn test_parse_rejects_bad_grammar() {
    assert!(matches!(
        TableName::parse("results__abc__def"),
        Err(NameError::Invalid { .. })
    ));
    assert!(matches!(
        TableName::parse("ark_results__cycle20230230"),
        Err(NameError::Invalid { reason: "cycle is not a calendar date", .. })
    ));
    assert!(matches!(
        TableName::parse(&format!("{}__extra", iris_results())),
        Err(NameError::Invalid { .. })
    ));
    assert!(matches!(
        TableName::parse("logs_v1"),
        Err(NameError::UnknownType(_))
    ));
}

#[test]
fn test_parsed_name_converts() {
    let name = TableName::parse("ark_results__cycle20240101").unwrap();
    let routes = name.convert(TableType::Routes).unwrap();
    assert_eq!(routes.as_str(), "ark_routes__cycle20240101");
    assert_eq!(routes.table_type(), TableType::Routes);
    assert_eq!(routes.platform(), Platform::Ark);
}

#[test]
fn test_ark_results_constructor() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let name = TableName::ark_results(date);
    assert_eq!(name.to_string(), "ark_results__cycle20240131");
    assert_eq!(TableName::parse(name.as_str()).unwrap(), name);
}
