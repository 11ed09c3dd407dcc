use super::types::BackSideReport;
use crate::pipeline_config::BackSideConfig;

/// Looks for the issuing-authority markers printed on the back of a card.
pub struct BackSideAnalyzer {
    keywords: Vec<String>,
    min_matches: usize,
}

impl BackSideAnalyzer {
    pub fn new(config: BackSideConfig) -> Self {
        let mut keywords: Vec<String> = Vec::with_capacity(config.keywords.len());
        for kw in config.keywords {
            let kw = kw.trim().to_lowercase();
            if !kw.is_empty() && !keywords.contains(&kw) {
                keywords.push(kw);
            }
        }
        Self {
            keywords,
            min_matches: config.min_matches,
        }
    }

    /// Case-insensitive substring search; each distinct keyword counts once.
    pub fn analyze(&self, raw_text: &str) -> BackSideReport {
        let haystack = raw_text.to_lowercase();
        let matched_keywords: Vec<String> = self
            .keywords
            .iter()
            .filter(|kw| haystack.contains(kw.as_str()))
            .cloned()
            .collect();

        BackSideReport {
            raw_text: raw_text.to_string(),
            has_required_elements: matched_keywords.len() >= self.min_matches,
            matched_keywords,
        }
    }
}

impl Default for BackSideAnalyzer {
    fn default() -> Self {
        Self::new(BackSideConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_distinct_keywords_are_enough() {
        let report = BackSideAnalyzer::default()
            .analyze("CỤC TRƯỞNG CỤC CẢNH SÁT\nDIRECTOR GENERAL OF THE POLICE DEPARTMENT");
        assert!(report.has_required_elements);
        assert_eq!(report.matched_keywords, vec!["police", "cục trưởng", "director"]);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let report = BackSideAnalyzer::default().analyze("Police police POLICE");
        assert!(!report.has_required_elements);
        assert_eq!(report.matched_keywords, vec!["police"]);
    }

    #[test]
    fn unrelated_text_has_no_markers() {
        let report = BackSideAnalyzer::default().analyze("hello world");
        assert!(!report.has_required_elements);
        assert!(report.matched_keywords.is_empty());
        assert_eq!(report.raw_text, "hello world");
    }

    #[test]
    fn keywords_are_normalized_and_deduplicated() {
        let analyzer = BackSideAnalyzer::new(BackSideConfig {
            keywords: vec!["  Valid ".into(), "valid".into(), "".into(), "Until".into()],
            min_matches: 2,
        });
        assert!(analyzer.analyze("VALID UNTIL 2035").has_required_elements);
        assert!(!analyzer.analyze("valid valid valid").has_required_elements);
    }
}
