use crate::types::DocumentProfile;

const FORM_KEYWORDS: [&str; 4] = ["form", "application", "declaration", "proforma"];

/// Classify a document from the text of its first page.
///
/// Substring match, so "information" counts as a form keyword. The profile is
/// advisory: nothing downstream branches on it.
pub fn classify_document(first_page_text: &str) -> DocumentProfile {
    let lower = first_page_text.to_lowercase();
    if FORM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DocumentProfile::Form
    } else {
        DocumentProfile::Report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_keywords() {
        assert_eq!(classify_document("APPLICATION FOR LEAVE"), DocumentProfile::Form);
        assert_eq!(classify_document("Customs Declaration"), DocumentProfile::Form);
        assert_eq!(classify_document("Proforma invoice"), DocumentProfile::Form);
    }

    #[test]
    fn test_report_by_default() {
        assert_eq!(classify_document("Quarterly Results Overview"), DocumentProfile::Report);
        assert_eq!(classify_document(""), DocumentProfile::Report);
    }

    #[test]
    fn test_substring_match() {
        assert_eq!(classify_document("General information"), DocumentProfile::Form);
    }
}
