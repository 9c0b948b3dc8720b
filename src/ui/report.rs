//! Plain-text renderings of artifacts for the terminal.

use crate::artifacts::{ArchitectureMap, ArtifactStatus, AuditReport, Category};

/// Characters per estimated SRS page.
pub const CHARS_PER_PAGE: usize = 3000;

/// First `limit` characters of `text`, with a marker when cut short.
pub fn preview(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}\n...", head.trim_end())
    } else {
        head
    }
}

/// Estimated page count of an SRS document.
pub fn estimated_pages(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_PAGE)
}

/// Summary lines for an SRS document.
pub fn srs_summary(text: &str) -> Vec<String> {
    vec![
        format!("Length: {} characters", text.chars().count()),
        format!("Estimated pages: {}", estimated_pages(text)),
    ]
}

/// Architecture tree: one line per category with its component names,
/// listing at most `limit` names before folding the rest into a count.
pub fn architecture_summary(map: &ArchitectureMap, limit: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(Category::ALL.len() + 1);
    for category in Category::ALL {
        let names = map.names(category);
        let mut listed = names[..names.len().min(limit)].join(", ");
        if names.len() > limit {
            listed.push_str(&format!(", +{} more", names.len() - limit));
        }
        let line = format!("{:<12} {:>3}  {}", category.plural(), names.len(), listed);
        lines.push(line.trim_end().to_string());
    }
    lines.push(format!("{:<12} {:>3}", "total", map.total()));
    lines
}

/// Audit verdict followed by the top findings.
pub fn audit_summary(report: &AuditReport, limit: usize) -> Vec<String> {
    if report.passed {
        return vec!["Status: PASSED - No violations detected".to_string()];
    }

    let mut lines = vec![format!(
        "Status: FAILED - {} violation(s) found",
        report.recommendations.len()
    )];
    let (top, rest) = report.top(limit);
    for (i, rec) in top.iter().enumerate() {
        lines.push(format!(
            "{}. {} in {}: {}",
            i + 1,
            rec.violation_type(),
            rec.file(),
            rec.problem()
        ));
    }
    if rest > 0 {
        lines.push(format!("... and {} more", rest));
    }
    lines
}

/// One ledger line: presence marker, name, and modification time.
pub fn ledger_line(status: &ArtifactStatus) -> String {
    let when = status
        .modified
        .filter(|_| status.exists)
        .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "missing".to_string());
    format!(
        "[{}] {:<36} {}",
        if status.exists { "x" } else { " " },
        status.artifact.name(),
        when
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Artifact, Recommendation};
    use std::path::PathBuf;

    #[test]
    fn test_preview_cuts_long_text() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 10), "abcdefghij");
        assert_eq!(preview("abcdefghijk", 10), "abcdefghij\n...");
        assert_eq!(preview("çççç", 2), "çç\n...");
    }

    #[test]
    fn test_estimated_pages() {
        assert_eq!(estimated_pages(""), 0);
        assert_eq!(estimated_pages(&"a".repeat(1)), 1);
        assert_eq!(estimated_pages(&"a".repeat(3000)), 1);
        assert_eq!(estimated_pages(&"a".repeat(3001)), 2);
        assert_eq!(
            srs_summary(&"a".repeat(6500)),
            vec!["Length: 6500 characters", "Estimated pages: 3"]
        );
    }

    #[test]
    fn test_audit_summary_passed() {
        let report = AuditReport {
            passed: true,
            recommendations: Vec::new(),
        };
        assert_eq!(
            audit_summary(&report, 3),
            vec!["Status: PASSED - No violations detected"]
        );
    }

    #[test]
    fn test_audit_summary_failed_shows_top_three() {
        let rec = |file: &str| Recommendation {
            violation_type: Some("ViewAccessesModel".to_string()),
            file: Some(file.to_string()),
            problem: None,
        };
        let report = AuditReport {
            passed: false,
            recommendations: vec![rec("a.py"), rec("b.py"), rec("c.py"), rec("d.py"), rec("e.py")],
        };
        let lines = audit_summary(&report, 3);
        assert_eq!(lines[0], "Status: FAILED - 5 violation(s) found");
        assert_eq!(lines[1], "1. ViewAccessesModel in a.py: Issue detected");
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "... and 2 more");
    }

    #[test]
    fn test_architecture_summary_lists_names() {
        let json = br#"{
            "model": [{"name": "Book"}, {"name": "Member"}, {"name": "Loan"}],
            "view": [{"name": "CatalogView"}]
        }"#;
        let map = ArchitectureMap::from_slice(json).unwrap();
        assert_eq!(
            architecture_summary(&map, 2),
            vec![
                "models         3  Book, Member, +1 more",
                "views          1  CatalogView",
                "controllers    0",
                "total          4",
            ]
        );
    }

    #[test]
    fn test_ledger_line_for_missing_artifact() {
        let status = ArtifactStatus {
            artifact: Artifact::SrsDocument,
            path: PathBuf::from("/p/data/srs_document.txt"),
            exists: false,
            modified: None,
        };
        let line = ledger_line(&status);
        assert!(line.starts_with("[ ] srs_document.txt"));
        assert!(line.ends_with("missing"));
    }
}
