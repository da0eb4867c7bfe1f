use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Object storage backend holding source documents and rendered page artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

/// Backend for the short-lived render dispatch locks.
///
/// `Memory` only de-duplicates within one process; use `Redis` when more than
/// one API instance serves the same tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchLockBackend {
    Memory,
    Redis,
}

impl FromStr for DispatchLockBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(DispatchLockBackend::Memory),
            "redis" => Ok(DispatchLockBackend::Redis),
            _ => Err(anyhow::anyhow!("Invalid dispatch lock backend: {}", s)),
        }
    }
}

impl Display for DispatchLockBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DispatchLockBackend::Memory => write!(f, "memory"),
            DispatchLockBackend::Redis => write!(f, "redis"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "local".parse::<StorageBackend>().unwrap(),
            StorageBackend::Local
        );
        assert!("nfs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn lock_backend_display_matches_env_value() {
        assert_eq!(DispatchLockBackend::Redis.to_string(), "redis");
        assert_eq!(
            "Memory".parse::<DispatchLockBackend>().unwrap(),
            DispatchLockBackend::Memory
        );
    }
}
