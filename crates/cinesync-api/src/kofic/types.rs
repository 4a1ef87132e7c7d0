//! KOFIC box-office response types.

use serde::Deserialize;

use crate::RawItem;

/// Response envelope of `searchDailyBoxOfficeList.json`.
///
/// KOFIC answers errors with HTTP 200 and a `faultInfo` document instead of
/// a `boxOfficeResult`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KoficBoxOfficeResponse {
    /// Ranking result.
    pub box_office_result: Option<KoficBoxOffice>,
    /// Fault description.
    pub fault_info: Option<KoficFault>,
}

/// Daily ranking for one target date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KoficBoxOffice {
    /// Ranking type label.
    pub boxoffice_type: Option<String>,
    /// Date range label (`YYYYMMDD~YYYYMMDD`).
    pub show_range: Option<String>,
    /// Ranking entries.
    #[serde(default)]
    pub daily_box_office_list: Vec<RawItem>,
}

/// Fault document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KoficFault {
    /// Fault message.
    #[serde(default)]
    pub message: String,
    /// Fault code.
    #[serde(default)]
    pub error_code: String,
}

/// One ranking entry. KOFIC sends every number as a string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KoficDailyEntry {
    /// Rank.
    pub rank: String,
    /// KOFIC movie code.
    pub movie_cd: String,
    /// Movie name.
    pub movie_nm: String,
    /// Opening date (`YYYY-MM-DD`, may be empty).
    #[serde(default)]
    pub open_dt: String,
    /// Sales amount of the day.
    #[serde(default)]
    pub sales_amt: String,
    /// Audience count of the day.
    #[serde(default)]
    pub audi_cnt: String,
    /// Audience change from the previous day.
    #[serde(default)]
    pub audi_inten: String,
    /// Accumulated audience.
    #[serde(default)]
    pub audi_acc: String,
}

/// Parses a KOFIC numeric string, ignoring thousands separators.
///
/// Empty or unparsable values yield 0.
#[must_use]
pub fn parse_count(raw: &str) -> i64 {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.trim().parse().unwrap_or(0)
}
