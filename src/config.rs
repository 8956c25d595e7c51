//! INI config loading: upload mapping, credentials, transfer tuning

use crate::error::UploadError;
use crate::upload::TransferSettings;
use ini::{Ini, Properties};
use std::path::{Path, PathBuf};

/// Static key pair read once at startup, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

/// One configured upload: a destination bucket and the local files bound for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub bucket: String,
    pub files: Vec<PathBuf>,
}

/// Ordered list of upload entries, in config-index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMapping {
    pub entries: Vec<UploadEntry>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub mapping: UploadMapping,
    pub transfer: TransferSettings,
}

/// Load and parse the config file at `path`.
pub fn load(path: &Path) -> Result<Config, UploadError> {
    let ini = Ini::load_from_file(path)
        .map_err(|e| UploadError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse(&ini)
}

pub fn parse(ini: &Ini) -> Result<Config, UploadError> {
    let aws = ini
        .section(Some("AWS"))
        .ok_or_else(|| UploadError::Config("missing [AWS] section".into()))?;
    let credentials = Credentials {
        access_key: require_key(aws, "AWS", "access")?,
        secret_key: require_key(aws, "AWS", "secret")?,
    };

    // An absent [Uploads] section means nothing to upload, not a broken config.
    let mapping = parse_uploads(ini.section(Some("Uploads")));
    let transfer = parse_transfer(ini.section(Some("Transfer")))?;

    Ok(Config {
        credentials,
        mapping,
        transfer,
    })
}

fn require_key(section: &Properties, section_name: &str, key: &str) -> Result<String, UploadError> {
    section
        .get(key)
        .map(str::to_string)
        .ok_or_else(|| UploadError::Config(format!("missing key '{}' in [{}]", key, section_name)))
}

/// Entries are enumerated positionally: `bucket0`/`files0`, `bucket1`/`files1`, …
/// Enumeration stops at the first index where either key is missing, even if
/// later indices exist. Compatibility contract with existing config files;
/// do not make this order-independent.
fn parse_uploads(section: Option<&Properties>) -> UploadMapping {
    let mut entries = Vec::new();
    if let Some(section) = section {
        let mut index = 0usize;
        while let (Some(bucket), Some(files)) = (
            section.get(format!("bucket{}", index)),
            section.get(format!("files{}", index)),
        ) {
            entries.push(UploadEntry {
                bucket: bucket.to_string(),
                files: split_file_list(files),
            });
            index += 1;
        }
    }
    UploadMapping { entries }
}

/// Comma-separated paths, each trimmed of surrounding whitespace.
fn split_file_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_transfer(section: Option<&Properties>) -> Result<TransferSettings, UploadError> {
    let mut settings = TransferSettings::default();
    let Some(section) = section else {
        return Ok(settings);
    };

    if let Some(raw) = section.get("chunk_size") {
        let chunk_size: u64 = raw.trim().parse().map_err(|_| {
            UploadError::Config(format!("invalid chunk_size in [Transfer]: '{}'", raw))
        })?;
        if chunk_size == 0 {
            return Err(UploadError::Config("chunk_size must be non-zero".into()));
        }
        settings.chunk_size = chunk_size;
    }

    if let Some(raw) = section.get("concurrency") {
        let concurrency: usize = raw.trim().parse().map_err(|_| {
            UploadError::Config(format!("invalid concurrency in [Transfer]: '{}'", raw))
        })?;
        if concurrency == 0 {
            return Err(UploadError::Config("concurrency must be non-zero".into()));
        }
        settings.concurrency = concurrency;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};

    fn parse_str(contents: &str) -> Result<Config, UploadError> {
        let ini = Ini::load_from_str(contents).expect("valid ini");
        parse(&ini)
    }

    #[test]
    fn loads_credentials_and_contiguous_entries() {
        let config = parse_str(
            "[AWS]\n\
             access = AKIAEXAMPLE\n\
             secret = hushhush\n\
             [Uploads]\n\
             bucket0 = alpha\n\
             files0 = a.txt\n\
             bucket1 = beta\n\
             files1 = b.txt, c.txt\n",
        )
        .unwrap();

        assert_eq!(config.credentials.access_key, "AKIAEXAMPLE");
        assert_eq!(config.credentials.secret_key, "hushhush");
        assert_eq!(config.mapping.entries.len(), 2);
        assert_eq!(config.mapping.entries[0].bucket, "alpha");
        assert_eq!(
            config.mapping.entries[1].files,
            vec![PathBuf::from("b.txt"), PathBuf::from("c.txt")]
        );
    }

    #[test]
    fn enumeration_stops_at_first_gap_even_if_later_indices_exist() {
        let config = parse_str(
            "[AWS]\n\
             access = k\n\
             secret = s\n\
             [Uploads]\n\
             bucket0 = alpha\n\
             files0 = a.txt\n\
             bucket1 = beta\n\
             files1 = b.txt\n\
             bucket3 = gamma\n\
             files3 = d.txt\n",
        )
        .unwrap();

        assert_eq!(config.mapping.entries.len(), 2);
    }

    #[test]
    fn entry_with_missing_files_key_terminates_enumeration() {
        let config = parse_str(
            "[AWS]\n\
             access = k\n\
             secret = s\n\
             [Uploads]\n\
             bucket0 = alpha\n\
             files0 = a.txt\n\
             bucket1 = beta\n",
        )
        .unwrap();

        assert_eq!(config.mapping.entries.len(), 1);
    }

    #[test]
    fn file_list_splits_on_commas_and_trims_whitespace() {
        assert_eq!(
            split_file_list("a.txt, b.txt , c.txt"),
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt")
            ]
        );
    }

    #[test]
    fn empty_elements_in_file_list_are_skipped() {
        assert_eq!(
            split_file_list("a.txt,, b.txt ,"),
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
    }

    #[test]
    fn missing_aws_section_is_a_config_error() {
        let err = parse_str("[Uploads]\nbucket0 = alpha\nfiles0 = a.txt\n").unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn missing_secret_key_is_a_config_error() {
        let err = parse_str("[AWS]\naccess = k\n").unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn missing_uploads_section_yields_empty_mapping() {
        let config = parse_str("[AWS]\naccess = k\nsecret = s\n").unwrap();
        assert!(config.mapping.entries.is_empty());
    }

    #[test]
    fn transfer_section_overrides_defaults() {
        let config = parse_str(
            "[AWS]\n\
             access = k\n\
             secret = s\n\
             [Transfer]\n\
             chunk_size = 25600\n\
             concurrency = 2\n",
        )
        .unwrap();

        assert_eq!(config.transfer.chunk_size, 25_600);
        assert_eq!(config.transfer.concurrency, 2);
    }

    #[test]
    fn absent_transfer_section_uses_defaults() {
        let config = parse_str("[AWS]\naccess = k\nsecret = s\n").unwrap();
        assert_eq!(config.transfer.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.transfer.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn malformed_chunk_size_is_a_config_error() {
        let err =
            parse_str("[AWS]\naccess = k\nsecret = s\n[Transfer]\nchunk_size = twenty\n")
                .unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = parse_str("[AWS]\naccess = k\nsecret = s\n[Transfer]\nconcurrency = 0\n")
            .unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn load_reads_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[AWS]\naccess = k\nsecret = s\n[Uploads]\nbucket0 = alpha\nfiles0 = a.txt\n",
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.mapping.entries.len(), 1);
    }

    #[test]
    fn unreadable_config_file_is_a_config_error() {
        let err = load(Path::new("/nonexistent/config.ini")).unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }
}
