use chrono::NaiveDate;
use url::Url;

use super::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_parse_cycle_date() {
    assert_eq!(parse_cycle_date("2024-01-31").unwrap(), date(2024, 1, 31));
    assert_eq!(parse_cycle_date("20240131").unwrap(), date(2024, 1, 31));
    assert!(matches!(
        parse_cycle_date("2024-02-30"),
        Err(IngestError::InvalidDate(_))
    ));
    assert!(parse_cycle_date("yesterday").is_err());
}

#[test]
fn test_cycle_url() {
    let base = Url::parse(DEFAULT_ARK_BASE_URL).unwrap();
    let url = cycle_url(&base, date(2024, 1, 31)).unwrap();
    assert_eq!(
        url.as_str(),
        "https://data.caida.org/datasets/topology/ark/ipv4/probe-data/team-1/daily/2024/cycle-20240131/"
    );

    let with_slash = Url::parse("https://example.org/daily/").unwrap();
    assert_eq!(
        cycle_url(&with_slash, date(2023, 12, 1)).unwrap().as_str(),
        "https://example.org/daily/2023/cycle-20231201/"
    );
}

#[test]
fn test_extract_links() {
    let index = Url::parse("https://example.org/daily/2024/cycle-20240131/").unwrap();
    let html = r#"
        <a href="?C=N;O=D">Name</a>
        <a href="../">Parent Directory</a>
        <a href="daily.l7.t1.c011146.20240131.ams-nl.warts.gz">ams</a>
        <a href='daily.l7.t1.c011146.20240131.bcn-es.warts.gz'>bcn</a>
        <a href="daily.l7.t1.c011146.20240131.ams-nl.warts.gz">dup</a>
        <a href="README.txt">readme</a>
        <a HREF=https://mirror.example.net/x.warts.gz>mirror</a>
    "#;

    let links = extract_links(&index, html).unwrap();
    let links: Vec<&str> = links.iter().map(Url::as_str).collect();
    assert_eq!(
        links,
        vec![
            "https://example.org/daily/2024/cycle-20240131/daily.l7.t1.c011146.20240131.ams-nl.warts.gz",
            "https://example.org/daily/2024/cycle-20240131/daily.l7.t1.c011146.20240131.bcn-es.warts.gz",
            "https://mirror.example.net/x.warts.gz",
        ]
    );
}

#[test]
fn test_extract_links_empty_page() {
    let index = Url::parse("https://example.org/").unwrap();
    assert!(extract_links(&index, "<html></html>").unwrap().is_empty());
}
