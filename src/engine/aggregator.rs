use std::collections::HashMap;

use crate::core::result::Finding;

/// Deduplicates findings across chunk variants and detector calls before
/// they are handed to the reporting layer.
///
/// Two findings are the same logical secret when detector type, raw value,
/// and composite key (for multi-part credentials) all agree. Duplicates are
/// merged rather than dropped: extra metadata is combined and the strongest
/// verification outcome wins, so a finding confirmed on the decoded variant
/// of a chunk is not shadowed by the unverified plain variant.
#[derive(Default)]
pub struct Aggregator {
    index: HashMap<(crate::core::result::DetectorType, String, Option<String>), usize>,
    findings: Vec<Finding>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, finding: Finding) {
        let key = finding.dedup_key();
        match self.index.get(&key) {
            None => {
                self.index.insert(key, self.findings.len());
                self.findings.push(finding);
            }
            Some(&idx) => {
                let existing = &mut self.findings[idx];
                for (k, v) in finding.extra_data {
                    existing.extra_data.entry(k).or_insert(v);
                }
                for (k, v) in finding.analysis_info {
                    existing.analysis_info.entry(k).or_insert(v);
                }
                if finding.verification.strength() > existing.verification.strength() {
                    existing.verification = finding.verification;
                    existing.verified_at = finding.verified_at;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
