use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use aho_corasick::AhoCorasick;

use crate::core::error::{Result, ScanError};
use crate::core::traits::Detector;

/// Single-pass keyword prefilter over every registered detector.
///
/// One case-insensitive Aho-Corasick automaton is built over the union of
/// all detectors' keyword sets, with a mapping from each keyword back to the
/// detectors that registered it. Scanning a chunk yields the subset of
/// detectors worth running full regex matching on, avoiding
/// O(detectors × regex) work per chunk.
///
/// This is a superset filter: it never excludes a detector whose keyword is
/// present, but admission does not imply the detector's pattern will match.
pub struct KeywordPrefilter {
    automaton: AhoCorasick,
    /// Owning detector indices per automaton pattern, aligned by pattern id.
    owners: Vec<Vec<usize>>,
    detector_count: usize,
}

impl KeywordPrefilter {
    /// Build the automaton over `detectors`. Fails fast when any detector
    /// registers an empty keyword set; that is a configuration error that
    /// must never reach scan time.
    pub fn build(detectors: &[Arc<dyn Detector>]) -> Result<Self> {
        // Keyword -> owning detector indices. A keyword shared by several
        // detectors (e.g. two versions of the same provider) maps to all of
        // them; the BTreeMap keeps automaton construction deterministic.
        let mut keyword_owners: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, detector) in detectors.iter().enumerate() {
            let keywords = detector.keywords();
            if keywords.is_empty() {
                return Err(ScanError::Config(format!(
                    "detector {} v{} registered no keywords",
                    detector.detector_type(),
                    detector.version()
                )));
            }
            for keyword in keywords {
                keyword_owners
                    .entry(keyword.to_lowercase())
                    .or_default()
                    .push(idx);
            }
        }

        let patterns: Vec<&String> = keyword_owners.keys().collect();
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| ScanError::Config(format!("keyword automaton: {}", e)))?;
        let owners = keyword_owners.values().cloned().collect();

        Ok(Self {
            automaton,
            owners,
            detector_count: detectors.len(),
        })
    }

    /// Scan `data` once and return the indices of every detector with at
    /// least one keyword present. Overlapping matches are reported so a
    /// keyword nested inside another detector's keyword still counts.
    pub fn matching_detectors(&self, data: &[u8]) -> BTreeSet<usize> {
        let mut matching = BTreeSet::new();
        for m in self.automaton.find_overlapping_iter(data) {
            for &owner in &self.owners[m.pattern().as_usize()] {
                matching.insert(owner);
            }
            // Every detector already admitted; no point scanning further.
            if matching.len() == self.detector_count {
                break;
            }
        }
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::core::result::{DetectorType, Finding};
    use async_trait::async_trait;

    struct FakeDetector {
        keywords: Vec<&'static str>,
        version: u32,
    }

    #[async_trait]
    impl Detector for FakeDetector {
        fn detector_type(&self) -> DetectorType {
            DetectorType::Github
        }

        fn keywords(&self) -> &[&str] {
            &self.keywords
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn version(&self) -> u32 {
            self.version
        }

        async fn from_data(&self, _verify: bool, _data: &[u8]) -> Result<Vec<Finding>> {
            Ok(Vec::new())
        }
    }

    fn fake(keywords: Vec<&'static str>, version: u32) -> Arc<dyn Detector> {
        Arc::new(FakeDetector { keywords, version })
    }

    #[test]
    fn test_keyword_presence_selects_detector() {
        let detectors = vec![
            fake(vec!["ghp_"], 1),
            fake(vec!["gitlab"], 1),
            fake(vec!["essu_"], 1),
        ];
        let prefilter = KeywordPrefilter::build(&detectors).unwrap();

        let matching = prefilter.matching_detectors(b"config: GITLAB_TOKEN=glpat123");
        assert_eq!(matching, BTreeSet::from([1]));
    }

    #[test]
    fn test_case_insensitive_soundness() {
        let detectors = vec![fake(vec!["github_pat_"], 2)];
        let prefilter = KeywordPrefilter::build(&detectors).unwrap();

        for text in [
            "token=github_pat_abc",
            "token=GITHUB_PAT_abc",
            "token=GiThUb_PaT_abc",
        ] {
            assert!(
                prefilter.matching_detectors(text.as_bytes()).contains(&0),
                "keyword presence must never be missed: {}",
                text
            );
        }
    }

    #[test]
    fn test_shared_and_nested_keywords() {
        // "pat" is nested inside "github_pat_"; both owners must be reported
        // for a chunk containing the longer keyword.
        let detectors = vec![fake(vec!["pat"], 1), fake(vec!["github_pat_"], 2)];
        let prefilter = KeywordPrefilter::build(&detectors).unwrap();

        let matching = prefilter.matching_detectors(b"x=github_pat_12345");
        assert_eq!(matching, BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_shared_keyword_selects_all_versions() {
        let detectors = vec![fake(vec!["gitlab"], 1), fake(vec!["gitlab"], 2)];
        let prefilter = KeywordPrefilter::build(&detectors).unwrap();

        let matching = prefilter.matching_detectors(b"gitlab token here");
        assert_eq!(matching, BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_no_keyword_no_detector() {
        let detectors = vec![fake(vec!["ghp_"], 1)];
        let prefilter = KeywordPrefilter::build(&detectors).unwrap();
        assert!(prefilter.matching_detectors(b"nothing to see").is_empty());
    }

    #[test]
    fn test_empty_keywords_is_config_error() {
        let detectors = vec![fake(Vec::new(), 1)];
        assert!(KeywordPrefilter::build(&detectors).is_err());
    }
}
