//! Export files on disk
//!
//! Exports are written as `qualtrics_data_{survey_id}_{YYYYMMDDHHMMSS}.csv`;
//! the newest one per survey is found by that trailing timestamp.

use chrono::{DateTime, Utc};
use qdp_common::time::{file_timestamp, file_timestamp_suffix};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{EtlError, Result};

pub fn export_file_name(survey_id: &str, at: DateTime<Utc>) -> String {
    format!("qualtrics_data_{}_{}.csv", survey_id, file_timestamp(at))
}

/// Hex SHA-256 of file content
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write an export into `dir`, creating the directory when missing
pub fn write_export(dir: &Path, survey_id: &str, bytes: &[u8], at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(survey_id, at));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Newest export for `survey_id` in `dir`
///
/// Candidates are `*.csv` files whose name contains the survey id and whose
/// stem ends in `_` plus 14 digits; the greatest timestamp wins.
pub fn find_latest_export(dir: &Path, survey_id: &str) -> Result<PathBuf> {
    let not_found = || EtlError::FileNotFound {
        survey_id: survey_id.to_string(),
        dir: dir.to_path_buf(),
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<(String, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem.contains(survey_id) {
            continue;
        }
        let Some(stamp) = file_timestamp_suffix(stem) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(best, _)| stamp > best.as_str()) {
            latest = Some((stamp.to_string(), path.clone()));
        }
    }

    latest.map(|(_, path)| path).ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"h\n").unwrap();
    }

    #[test]
    fn test_file_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 0).unwrap();
        assert_eq!(
            export_file_name("SV_abc", at),
            "qualtrics_data_SV_abc_20240229130500.csv"
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("exports");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let path = write_export(&dir, "SV_1", b"a,b\n", at).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n");
        assert_eq!(find_latest_export(&dir, "SV_1").unwrap(), path);
    }

    #[test]
    fn test_latest_by_timestamp_not_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        touch(dir, "qualtrics_data_SV_1_20240301000000.csv");
        touch(dir, "qualtrics_data_SV_1_20240115000000.csv");
        touch(dir, "qualtrics_data_SV_1_20231231235959.csv");
        touch(dir, "qualtrics_data_SV_2_20250101000000.csv");
        touch(dir, "qualtrics_data_SV_1_latest.csv");
        touch(dir, "qualtrics_data_SV_1_20990101000000.txt");

        let latest = find_latest_export(dir, "SV_1").unwrap();
        assert_eq!(
            latest.file_name().and_then(|n| n.to_str()),
            Some("qualtrics_data_SV_1_20240301000000.csv")
        );
    }

    #[test]
    fn test_no_candidates_is_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "qualtrics_data_SV_other_20240301000000.csv");

        let err = find_latest_export(tmp.path(), "SV_1").unwrap_err();
        assert!(matches!(err, EtlError::FileNotFound { .. }));

        let err = find_latest_export(&tmp.path().join("absent"), "SV_1").unwrap_err();
        assert!(matches!(err, EtlError::FileNotFound { .. }));
    }
}
