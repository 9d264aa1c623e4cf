// Region reference table loading
use crate::model::{ConfigError, RegionCode};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs;
use std::path::Path;
use tracing::info;

const LEGAL_DONG_HEADER: &str = "법정동코드";

/// Loads the 시군구 table, either a plain region CSV or the national
/// 법정동코드 dump (tab separated). Codes are unique and sorted.
pub fn load_region_table(path: &Path) -> Result<Vec<RegionCode>, ConfigError> {
    let table_error = |reason: String| ConfigError::RegionTable {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| table_error(e.to_string()))?;
    let content = content.trim_start_matches('\u{feff}');

    let is_legal_dong = content
        .lines()
        .next()
        .is_some_and(|header| header.contains(LEGAL_DONG_HEADER));
    let regions = if is_legal_dong {
        parse_legal_dong(content)
    } else {
        parse_region_csv(content)
    }
    .map_err(table_error)?;

    if regions.is_empty() {
        return Err(table_error("no region codes found".into()));
    }

    info!("Loaded {} region codes from {}", regions.len(), path.display());
    Ok(regions)
}

/// `code,province,district` or `시군구코드,시도명,시군구명`, any column order.
fn parse_region_csv(content: &str) -> Result<Vec<RegionCode>, String> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let code_idx = column(&headers, &["code", "시군구코드"])?;
    let province_idx = column(&headers, &["province", "시도명"])?;
    let district_idx = column(&headers, &["district", "시군구명"])?;

    let mut regions = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let code = record.get(code_idx).unwrap_or_default();
        if !is_region_code(code) {
            return Err(format!("line {}: invalid region code '{}'", n + 2, code));
        }
        regions.push(RegionCode::new(
            code,
            record.get(province_idx).unwrap_or_default(),
            record.get(district_idx).unwrap_or_default(),
        ));
    }

    Ok(dedup_sorted(regions))
}

/// Derives 시군구 entries from 10-digit 법정동 codes. Only district-level
/// rows (`SSGGG00000` with `GGG != 000`) that are still in force count.
fn parse_legal_dong(content: &str) -> Result<Vec<RegionCode>, String> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let code_idx = column(&headers, &[LEGAL_DONG_HEADER])?;
    let name_idx = column(&headers, &["법정동명"])?;
    let status_idx = headers.iter().position(|h| h == "폐지여부");

    let mut regions = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let code = record.get(code_idx).unwrap_or_default();
        if code.len() != 10 || !code.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let abolished = status_idx
            .and_then(|i| record.get(i))
            .is_some_and(|s| s == "폐지");
        if abolished || &code[2..5] == "000" || &code[5..] != "00000" {
            continue;
        }

        let name = record.get(name_idx).unwrap_or_default();
        let (province, district) = name.split_once(' ').unwrap_or((name, name));
        regions.push(RegionCode::new(&code[..5], province, district.trim()));
    }

    Ok(dedup_sorted(regions))
}

fn column(headers: &StringRecord, names: &[&str]) -> Result<usize, String> {
    headers
        .iter()
        .position(|h| names.contains(&h))
        .ok_or_else(|| format!("missing column {}", names.join(" / ")))
}

fn is_region_code(code: &str) -> bool {
    code.len() == 5 && code.chars().all(|c| c.is_ascii_digit())
}

fn dedup_sorted(mut regions: Vec<RegionCode>) -> Vec<RegionCode> {
    // Stable sort, so the first occurrence of a code survives dedup.
    regions.sort_by(|a, b| a.code.cmp(&b.code));
    regions.dedup_by(|later, earlier| later.code == earlier.code);
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn write_table(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_english_csv_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "regions.csv",
            "code,province,district\n\
             11140,서울특별시,중구\n\
             11110,서울특별시,종로구\n\
             11140,서울특별시,DUPLICATE\n",
        );
        let regions = load_region_table(&path).unwrap();
        assert_eq!(
            regions,
            vec![
                RegionCode::new("11110", "서울특별시", "종로구"),
                RegionCode::new("11140", "서울특별시", "중구"),
            ]
        );
    }

    #[test]
    fn loads_korean_headers_in_any_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "regions.csv",
            "\u{feff}시도명,시군구명,시군구코드\n부산광역시,해운대구,26350\n",
        );
        let regions = load_region_table(&path).unwrap();
        assert_eq!(regions, vec![RegionCode::new("26350", "부산광역시", "해운대구")]);
    }

    #[test]
    fn derives_districts_from_legal_dong_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            &dir,
            "bdong.txt",
            "법정동코드\t법정동명\t폐지여부\n\
             1100000000\t서울특별시\t존재\n\
             1111000000\t서울특별시 종로구\t존재\n\
             1111010100\t서울특별시 종로구 청운동\t존재\n\
             4111100000\t경기도 수원시 장안구\t존재\n\
             4113000000\t경기도 성남시\t폐지\n\
             3611000000\t세종특별자치시\t존재\n",
        );
        let regions = load_region_table(&path).unwrap();
        assert_eq!(
            regions,
            vec![
                RegionCode::new("11110", "서울특별시", "종로구"),
                RegionCode::new("36110", "세종특별자치시", "세종특별자치시"),
                RegionCode::new("41111", "경기도", "수원시 장안구"),
            ]
        );
    }

    #[test]
    fn bundled_table_covers_the_whole_country() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/region_codes.csv");
        let regions = load_region_table(&path).unwrap();
        assert!(regions.len() > 200, "only {} region codes", regions.len());

        let provinces: HashSet<&str> = regions.iter().map(|r| r.province_name.as_str()).collect();
        assert_eq!(provinces.len(), 17);
        assert!(provinces.contains("세종특별자치시"));
        assert!(provinces.contains("제주특별자치도"));
        assert!(regions.iter().any(|r| r.code == "11110" && r.district_name == "종로구"));
    }

    #[test]
    fn rejects_bad_codes_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(&dir, "bad.csv", "code,province,district\n1111,서울,종로구\n");
        let err = load_region_table(&path).unwrap_err();
        assert!(err.to_string().contains("invalid region code '1111'"));

        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            load_region_table(&missing),
            Err(ConfigError::RegionTable { .. })
        ));

        let empty = write_table(&dir, "empty.csv", "code,province,district\n");
        assert!(load_region_table(&empty).is_err());
    }
}
