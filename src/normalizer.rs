use crate::model::{RawTransaction, TransactionRecord};
use crate::utils::{parse_decimal, parse_grouped_int};
use chrono::NaiveDate;

/// Turns raw API rows into records, keeping the raw fields alongside.
pub fn normalize_all(rows: Vec<RawTransaction>, queried_code: &str) -> Vec<TransactionRecord> {
    rows.into_iter()
        .map(|raw| normalize_row(raw, queried_code))
        .collect()
}

fn normalize_row(raw: RawTransaction, queried_code: &str) -> TransactionRecord {
    // sggCd is authoritative when present; the queried code otherwise.
    let region_code = raw
        .get("sggCd")
        .filter(|c| c.len() == 5 && c.chars().all(|ch| ch.is_ascii_digit()))
        .unwrap_or(queried_code)
        .to_string();

    let number = |name: &str| raw.get(name).and_then(|v| v.trim().parse::<i32>().ok());
    let deal_date = match (number("dealYear"), number("dealMonth"), number("dealDay")) {
        (Some(y), Some(m), Some(d)) if m > 0 && d > 0 => {
            NaiveDate::from_ymd_opt(y, m as u32, d as u32)
        }
        _ => None,
    };

    TransactionRecord {
        region_code,
        deal_date,
        deal_amount: raw.get("dealAmount").and_then(parse_grouped_int),
        exclusive_area: raw.get("excluUseAr").and_then(parse_decimal),
        floor: number("floor"),
        build_year: number("buildYear"),
        apartment_name: raw.get("aptNm").unwrap_or_default().to_string(),
        province_name: None,
        district_name: None,
        source: raw,
    }
}
