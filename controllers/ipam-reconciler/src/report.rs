//! Per-entity outcome of a controller run

use crate::error::ReconcileError;
use crate::reconciler::Action;
use crate::state::Lifecycle;
use ipam_declarations::ResourceKind;
use std::fmt;

#[derive(Debug)]
pub struct ReportEntry {
    pub kind: ResourceKind,
    pub label: String,
    pub action: Action,
    /// Lifecycle reached, or why the entity failed
    pub outcome: Result<Lifecycle, ReconcileError>,
    /// Field changes behind a planned action
    pub details: Vec<String>,
}

impl ReportEntry {
    pub fn new(kind: ResourceKind, label: String, action: Action, outcome: Result<Lifecycle, ReconcileError>) -> Self {
        Self {
            kind,
            label,
            action,
            outcome,
            details: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(lifecycle) => write!(f, "{} {}: {} ({})", self.kind, self.label, self.action, lifecycle)?,
            Err(e) => write!(f, "{} {}: {} FAILED: {}", self.kind, self.label, self.action, e)?,
        }
        for detail in &self.details {
            write!(f, "\n    {detail}")?;
        }
        Ok(())
    }
}

/// Outcome of one controller command, in the order entities were handled
#[derive(Debug, Default)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
    /// Set when the run stopped early on cancellation
    pub cancelled: bool,
}

impl Report {
    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(ReportEntry::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_failure())
    }

    /// Entries that will or did call the service
    pub fn changes(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| !matches!(e.action, Action::NoOp | Action::Read))
    }

    pub fn find(&self, kind: ResourceKind, label: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.kind == kind && e.label == label)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} entities, {} changed, {} failed",
            self.entries.len(),
            self.changes().count(),
            failed
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use ipam_declarations::ValidationError;

    #[test]
    fn test_report_counts_failures_and_changes() {
        let mut report = Report::default();
        report.push(ReportEntry {
            kind: ResourceKind::Block,
            label: "edge".to_string(),
            action: Action::Create,
            outcome: Ok(Lifecycle::Created),
            details: Vec::new(),
        });
        report.push(ReportEntry {
            kind: ResourceKind::Pool,
            label: "main".to_string(),
            action: Action::NoOp,
            outcome: Ok(Lifecycle::Created),
            details: Vec::new(),
        });
        report.push(ReportEntry {
            kind: ResourceKind::Allocation,
            label: "web".to_string(),
            action: Action::Create,
            outcome: Err(ReconcileError::validation(
                Operation::Plan,
                ResourceKind::Allocation,
                "web",
                ValidationError::MissingOneOf {
                    kind: ResourceKind::Allocation,
                    first: "cidr",
                    second: "prefix_length",
                },
            )),
            details: Vec::new(),
        });

        assert!(report.has_failures());
        assert_eq!(report.changes().count(), 2);
        assert_eq!(report.failures().next().unwrap().label, "web");
        let text = report.to_string();
        assert!(text.contains("block edge: create (Created)"));
        assert!(text.ends_with("3 entities, 2 changed, 1 failed"));
    }
}
