//! Required fields and section layout

use super::{Finding, Rule, RuleCategory, RuleContext};
use crate::model::{ContextLevel, SectionKind};

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Decision, risk level and action must be present
///
/// Every missing field is reported; nothing short-circuits.
pub struct RequiredFieldsRule;

impl RequiredFieldsRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequiredFieldsRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RequiredFieldsRule {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn description(&self) -> &'static str {
        "Decision, risk level, action and schema must be declared"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Required
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let trace = ctx.trace;
        let mut findings = Vec::new();

        for field in ctx.rules.required_fields() {
            let missing = match *field {
                "decision" => is_blank(trace.decision.text.as_deref()),
                "risk_level" => is_blank(trace.risk_assessment.risk_level.as_deref()),
                "action" => is_blank(trace.action.as_deref()),
                _ => false,
            };
            if missing {
                findings.push(Finding::fail(format!("MISSING_REQUIRED_FIELD:{}", field)));
            }
        }
        if is_blank(trace.schema_version.as_deref()) {
            findings.push(Finding::fail("MISSING_REQUIRED_FIELD:schema"));
        }
        if trace.validation_required && trace.evidence_items.is_empty() {
            findings.push(Finding::fail("MISSING_REQUIRED_FIELD:evidence_items"));
        }
        findings
    }
}

/// Advisory layout checks carried over from the trace template
pub struct StructureRule;

impl StructureRule {
    pub fn new() -> Self {
        Self
    }

    const EXPECTED_SECTIONS: [SectionKind; 3] = [
        SectionKind::EvidenceCollection,
        SectionKind::Analysis,
        SectionKind::Validation,
    ];
}

impl Default for StructureRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for StructureRule {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn description(&self) -> &'static str {
        "Expected sections, analysis rationale, action directive and context level"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Structure
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let trace = ctx.trace;
        let mut findings = Vec::new();

        for kind in Self::EXPECTED_SECTIONS {
            if !trace.has_section(kind) {
                findings.push(Finding::warn(format!("MISSING_SECTION:{}", kind.as_str())));
            }
        }
        if let Some(analysis) = &trace.analysis {
            if is_blank(analysis.primary_rationale.as_deref()) {
                findings.push(Finding::warn("ANALYSIS_INCOMPLETE:primary_rationale"));
            }
        }
        if trace.action.is_some() && !trace.action_directive {
            findings.push(Finding::warn("ACTION_FORMAT: expected 'Therefore, I will:' directive"));
        }
        if let Some(ContextLevel::Other(raw)) = &trace.context_level {
            findings.push(Finding::warn(format!("UNRECOGNIZED_CONTEXT_LEVEL:{}", raw)));
        }
        if is_blank(trace.runtime_contract.as_deref()) {
            findings.push(Finding::warn("RUNTIME_CONTRACT_UNDECLARED"));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::test_support::{reasons, run};
    use crate::model::{Analysis, Decision, RiskAssessment, Trace};

    fn complete() -> Trace {
        Trace {
            schema_version: Some("chain_of_thought/v7.0.0".to_string()),
            runtime_contract: Some("2.0.0".to_string()),
            decision: Decision {
                text: Some("Add an index".to_string()),
                id: None,
            },
            risk_assessment: RiskAssessment {
                risk_level: Some("low".to_string()),
                ..Default::default()
            },
            action: Some("create the index".to_string()),
            action_directive: true,
            analysis: Some(Analysis {
                primary_rationale: Some("queries are slow".to_string()),
                ..Default::default()
            }),
            sections: vec![
                SectionKind::Decision,
                SectionKind::EvidenceCollection,
                SectionKind::Analysis,
                SectionKind::Validation,
                SectionKind::Action,
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_trace_has_no_findings() {
        assert!(run(&RequiredFieldsRule::new(), &complete()).is_empty());
        assert!(run(&StructureRule::new(), &complete()).is_empty());
    }

    #[test]
    fn test_all_missing_fields_are_collected() {
        let trace = Trace::default();
        let findings = run(&RequiredFieldsRule::new(), &trace);
        assert_eq!(
            reasons(&findings),
            vec![
                "MISSING_REQUIRED_FIELD:decision",
                "MISSING_REQUIRED_FIELD:risk_level",
                "MISSING_REQUIRED_FIELD:action",
                "MISSING_REQUIRED_FIELD:schema",
            ]
        );
    }

    #[test]
    fn test_validation_required_needs_evidence() {
        let mut trace = complete();
        trace.validation_required = true;
        let findings = run(&RequiredFieldsRule::new(), &trace);
        assert_eq!(reasons(&findings), vec!["MISSING_REQUIRED_FIELD:evidence_items"]);
    }

    #[test]
    fn test_structure_warnings() {
        let mut trace = complete();
        trace.sections = vec![SectionKind::Decision, SectionKind::Analysis, SectionKind::Action];
        trace.analysis = Some(Analysis::default());
        trace.action_directive = false;
        trace.context_level = Some(ContextLevel::Other("psychic".to_string()));
        trace.runtime_contract = None;

        let findings = run(&StructureRule::new(), &trace);
        let reasons = reasons(&findings);
        assert!(reasons.contains(&"MISSING_SECTION:evidence_collection"));
        assert!(reasons.contains(&"MISSING_SECTION:validation"));
        assert!(!reasons.contains(&"MISSING_SECTION:analysis"));
        assert!(reasons.contains(&"ANALYSIS_INCOMPLETE:primary_rationale"));
        assert!(reasons.contains(&"UNRECOGNIZED_CONTEXT_LEVEL:psychic"));
        assert!(reasons.contains(&"RUNTIME_CONTRACT_UNDECLARED"));
        assert!(findings.iter().all(|f| f.status == crate::engine::rules::Verdict::Warn));
    }
}
