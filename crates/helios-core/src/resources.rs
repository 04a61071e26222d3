use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;

/// Resource caps requested at submission. `cpu_cores` and `mem_bytes`
/// are applied disjointly to the container runtime's CPU quota and
/// memory limit respectively, never to each other. Either or both may
/// be absent, meaning "no cap from Helios".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: Option<u32>,
    pub mem_bytes: Option<u64>,
}

/// Metadata's raw `resources` object as received over the wire, before
/// the string sizes are parsed into bytes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResources {
    pub cpu: Option<i64>,
    pub mem: Option<String>,
}

impl RawResources {
    pub fn parse(self) -> Result<Resources, AdmissionError> {
        let cpu_cores = match self.cpu {
            None => None,
            Some(cpu) if cpu > 0 => Some(cpu as u32),
            Some(cpu) => {
                return Err(AdmissionError::BadMetadata(format!(
                    "resources.cpu must be positive, got {cpu}"
                )))
            }
        };
        let mem_bytes = match self.mem {
            None => None,
            Some(raw) => Some(parse_mem(&raw)?),
        };
        Ok(Resources {
            cpu_cores,
            mem_bytes,
        })
    }
}

/// Parse a size like `512m` or `4g` into a byte count. Accepts `k`,
/// `m`, `g` suffixes (case-insensitive, binary multiples) or a bare
/// integer byte count.
pub fn parse_mem(raw: &str) -> Result<u64, AdmissionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AdmissionError::BadMetadata("resources.mem is empty".into()));
    }
    let (digits, multiplier) = match raw.chars().last().unwrap().to_ascii_lowercase() {
        'k' => (&raw[..raw.len() - 1], 1024u64),
        'm' => (&raw[..raw.len() - 1], 1024 * 1024),
        'g' => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    let value: u64 = digits.parse().map_err(|_| {
        AdmissionError::BadMetadata(format!("resources.mem is not a valid size: {raw:?}"))
    })?;
    if value == 0 {
        return Err(AdmissionError::BadMetadata(
            "resources.mem must be positive".into(),
        ));
    }
    value
        .checked_mul(multiplier)
        .ok_or_else(|| AdmissionError::BadMetadata(format!("resources.mem overflows: {raw:?}")))
}
