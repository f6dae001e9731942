//! Cache fingerprints.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::id::SnapshotVersion;

/// Stable hash identifying one (record-set version, parameter set) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct FingerprintInput<'a, P: ?Sized> {
    version: &'a SnapshotVersion,
    namespace: &'a str,
    params: &'a P,
}

impl Fingerprint {
    /// Hash the canonical JSON of `(version, namespace, params)`.
    ///
    /// `params` must serialize deterministically (ordered maps, no
    /// `HashMap`s); the `namespace` keeps KPI and model entries apart even
    /// when their parameters coincide.
    pub fn compute<P>(version: &SnapshotVersion, namespace: &str, params: &P) -> EngineResult<Self>
    where
        P: Serialize + ?Sized,
    {
        let input = FingerprintInput {
            version,
            namespace,
            params,
        };
        let bytes = serde_json::to_vec(&input)
            .map_err(|e| EngineError::computation(format!("fingerprint serialization: {e}")))?;
        Ok(Self(blake3::hash(&bytes).to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl core::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn same_inputs_same_fingerprint() {
        let v = SnapshotVersion::from_bytes(b"batch-1");
        let params: BTreeMap<&str, f64> = [("threshold", 0.7), ("horizon", 6.0)].into_iter().collect();
        let a = Fingerprint::compute(&v, "kpi", &params).unwrap();
        let b = Fingerprint::compute(&v, "kpi", &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn namespace_version_and_params_all_matter() {
        let v1 = SnapshotVersion::from_bytes(b"batch-1");
        let v2 = SnapshotVersion::from_bytes(b"batch-2");
        let base = Fingerprint::compute(&v1, "kpi", &0.7).unwrap();
        assert_ne!(base, Fingerprint::compute(&v2, "kpi", &0.7).unwrap());
        assert_ne!(base, Fingerprint::compute(&v1, "turnover", &0.7).unwrap());
        assert_ne!(base, Fingerprint::compute(&v1, "kpi", &0.8).unwrap());
    }
}
