//! Validation of raw report JSON against the generated schema and the
//! report's own integrity rules.
//!
//! Validation runs in three passes, each collecting every violation it finds:
//!
//! 1. **Shape**: required fields are walked using the generated JSON Schema
//!    itself, so the document handed to the assistant is also the one that
//!    judges its answer.
//! 2. **Charts**: every `chart_data` object must carry a known `chart_type`
//!    and only the fields that tag allows.
//! 3. **Integrity**: after typed deserialization, value sequences must line up
//!    with their labels and section references must be dotted identifiers.

use log::debug;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{AnalysisResponse, ChartPayload, CHART_TAG_FIELD};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Report failed validation: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }
}

/// Validate a raw JSON value and convert it into a typed report.
pub fn validate(raw: &Value) -> Result<AnalysisResponse, ValidationError> {
    let schema = AnalysisResponse::function_parameters()
        .map_err(|e| ValidationError::new(vec![format!("schema generation failed: {}", e)]))?;
    let definitions = schema
        .get("definitions")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut violations = Vec::new();
    check_required(&schema, raw, "", &definitions, &mut violations);
    check_chart_fields(raw, "", &mut violations);
    if !violations.is_empty() {
        return Err(ValidationError::new(violations));
    }

    let report: AnalysisResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::new(vec![e.to_string()]))?;

    let violations = check_integrity(&report);
    if !violations.is_empty() {
        return Err(ValidationError::new(violations));
    }

    Ok(report)
}

/// Parse a JSON string and validate it. Parse failures are reported as a single violation.
pub fn validate_str(raw: &str) -> Result<AnalysisResponse, ValidationError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ValidationError::new(vec![format!("invalid JSON: {}", e)]))?;
    validate(&value)
}

fn resolve<'a>(node: &'a Value, definitions: &'a Map<String, Value>) -> &'a Value {
    match node.get("$ref").and_then(Value::as_str) {
        Some(reference) => {
            let name = reference.rsplit('/').next().unwrap_or(reference);
            definitions.get(name).unwrap_or(node)
        }
        None => node,
    }
}

fn check_required(
    node: &Value,
    value: &Value,
    path: &str,
    definitions: &Map<String, Value>,
    violations: &mut Vec<String>,
) {
    let node = resolve(node, definitions);

    if let Some(branches) = node.get("allOf").and_then(Value::as_array) {
        for branch in branches {
            check_required(branch, value, path, definitions, violations);
        }
    }

    if let Some(branches) = node.get("anyOf").and_then(Value::as_array) {
        if !value.is_null() {
            let refs: Vec<&Value> = branches
                .iter()
                .filter(|b| b.get("$ref").is_some())
                .collect();
            if let [only] = refs.as_slice() {
                check_required(only, value, path, definitions, violations);
            }
        }
    }

    let is_object_schema = node.get("type").and_then(Value::as_str) == Some("object");
    let Some(object) = value.as_object() else {
        if is_object_schema {
            violations.push(format!("{}: expected an object", display_path(path)));
        }
        return;
    };

    if let Some(required) = node.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                violations.push(format!(
                    "{}: missing required field `{}`",
                    display_path(path),
                    key
                ));
            }
        }
    }

    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        for (key, child_schema) in properties {
            if let Some(child) = object.get(key) {
                let child_path = format!("{}/{}", path, key);
                check_required(child_schema, child, &child_path, definitions, violations);
            }
        }
    }
}

fn check_chart_fields(value: &Value, path: &str, violations: &mut Vec<String>) {
    let Some(object) = value.as_object() else {
        return;
    };

    for (key, child) in object {
        let child_path = format!("{}/{}", path, key);
        if key == "chart_data" {
            if let Some(chart) = child.as_object() {
                check_chart_object(chart, &child_path, violations);
            }
        } else {
            check_chart_fields(child, &child_path, violations);
        }
    }
}

fn check_chart_object(chart: &Map<String, Value>, path: &str, violations: &mut Vec<String>) {
    let Some(tag) = chart.get(CHART_TAG_FIELD).and_then(Value::as_str) else {
        violations.push(format!("{}: missing `{}` tag", path, CHART_TAG_FIELD));
        return;
    };

    let Some(allowed) = ChartPayload::allowed_fields(tag) else {
        violations.push(format!("{}: unknown chart type `{}`", path, tag));
        return;
    };

    for key in chart.keys() {
        if !allowed.contains(&key.as_str()) {
            violations.push(format!(
                "{}: field `{}` does not belong to a `{}` chart",
                path, key, tag
            ));
        }
    }
}

/// Cross-field rules serde cannot express: sequence lengths and section references.
pub fn check_integrity(report: &AnalysisResponse) -> Vec<String> {
    let mut violations = Vec::new();

    for (key, section) in report.sections() {
        let Some(chart) = &section.chart_data else {
            continue;
        };
        let prefix = format!("section {} ({} chart)", key, chart.tag());

        if !is_dotted_identifier(chart.section()) {
            violations.push(format!(
                "{}: section reference `{}` is not a dotted identifier",
                prefix,
                chart.section()
            ));
        } else if chart.section() != key {
            debug!(
                "Chart in section {} references section {}",
                key,
                chart.section()
            );
        }

        match chart {
            ChartPayload::BarGrouped(c) => {
                expect_len(&mut violations, &prefix, "values_1", c.values_1.len(), c.labels.len());
                let mut series = 1;
                if let Some(values_2) = &c.values_2 {
                    series += 1;
                    expect_len(
                        &mut violations,
                        &prefix,
                        "values_2",
                        values_2.len(),
                        c.labels.len(),
                    );
                }
                if let Some(legend) = &c.legend {
                    expect_len(&mut violations, &prefix, "legend", legend.len(), series);
                }
            }
            ChartPayload::Pie(c) => {
                expect_len(&mut violations, &prefix, "values", c.values.len(), c.labels.len());
            }
            ChartPayload::BarStacked(c) => {
                expect_len(&mut violations, &prefix, "values_1", c.values_1.len(), c.labels.len());
                expect_len(&mut violations, &prefix, "values_2", c.values_2.len(), c.labels.len());
                expect_len(&mut violations, &prefix, "legend", c.legend.len(), 2);
            }
            ChartPayload::Heatmap(c) => {
                expect_len(&mut violations, &prefix, "values", c.values.len(), c.rows.len());
                for (idx, row) in c.values.iter().enumerate() {
                    let field = format!("values[{}]", idx);
                    expect_len(&mut violations, &prefix, &field, row.len(), c.columns.len());
                }
            }
            ChartPayload::Line(c) => {
                expect_len(&mut violations, &prefix, "y", c.y.len(), c.x.len());
            }
        }
    }

    violations
}

fn expect_len(
    violations: &mut Vec<String>,
    prefix: &str,
    field: &str,
    actual: usize,
    expected: usize,
) {
    if actual != expected {
        violations.push(format!(
            "{}: `{}` has {} entries, expected {}",
            prefix, field, actual, expected
        ));
    }
}

fn is_dotted_identifier(reference: &str) -> bool {
    !reference.is_empty()
        && reference
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn example_value() -> Value {
        serde_json::to_value(AnalysisResponse::example()).unwrap()
    }

    fn one_of_each_chart() -> Vec<ChartPayload> {
        vec![
            ChartPayload::BarGrouped(BarGroupedChart {
                section: "1.1".into(),
                labels: vec!["Orçado".into(), "Pago".into()],
                values_1: vec![Some(10.0), None],
                values_2: Some(vec![Some(8.0), Some(7.5)]),
                legend: Some(vec!["2022".into(), "2023".into()]),
            }),
            ChartPayload::Pie(PieChart {
                section: "1.2".into(),
                labels: vec!["IPTU".into(), "ISS".into()],
                values: vec![Some(3.0), Some(2.5)],
            }),
            ChartPayload::BarStacked(BarStackedChart {
                section: "1.3".into(),
                labels: vec!["Educação".into()],
                values_1: vec![Some(95.0)],
                values_2: vec![None],
                legend: vec!["Orçado".into(), "Pago".into()],
            }),
            ChartPayload::Heatmap(HeatmapChart {
                section: "1.4".into(),
                rows: vec!["Cultura".into(), "Esporte".into()],
                columns: vec!["Q1".into(), "Q2".into()],
                values: vec![vec![Some(0.25), None], vec![Some(0.2), Some(0.1)]],
            }),
            ChartPayload::Line(LineChart {
                section: "3.1".into(),
                x: vec![AxisValue::Number(2022), AxisValue::Label("2023*".into())],
                y: vec![Some(1.0), Some(1.03)],
                label: "Receita".into(),
            }),
        ]
    }

    #[test]
    fn test_example_is_valid() {
        let report = validate(&example_value()).unwrap();
        assert_eq!(report, AnalysisResponse::example());
    }

    #[test]
    fn test_every_chart_variant_survives_validation() {
        for chart in one_of_each_chart() {
            let mut report = AnalysisResponse::example();
            report.financial_analysis.revenue_vs_expenses.chart_data = Some(chart.clone());
            let value = serde_json::to_value(&report).unwrap();

            let validated = validate(&value).unwrap();
            let back = validated
                .financial_analysis
                .revenue_vs_expenses
                .chart_data
                .unwrap();
            assert_eq!(back.tag(), chart.tag());
            assert_eq!(back, chart);
        }
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let mut value = example_value();
        value.as_object_mut().unwrap().remove("conclusao");
        value["analise_financeira"]
            .as_object_mut()
            .unwrap()
            .remove("1.3");
        value["avaliacao_riscos"].as_object_mut().unwrap().remove("text");

        let err = validate(&value).unwrap_err();
        assert_eq!(err.violations.len(), 3);
        assert!(err
            .violations
            .iter()
            .any(|v| v.contains("/analise_financeira") && v.contains("`1.3`")));
        assert!(err.violations.iter().any(|v| v.contains("`conclusao`")));
        assert!(err
            .violations
            .iter()
            .any(|v| v.contains("/avaliacao_riscos") && v.contains("`text`")));
    }

    #[test]
    fn test_chart_tag_must_match_fields() {
        let mut value = example_value();
        value["analise_financeira"]["1.2"]["chart_data"] = json!({
            "chart_type": "pie",
            "section": "1.2",
            "labels": ["IPTU"],
            "values_1": [1.0],
            "values_2": [2.0]
        });

        let err = validate(&value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("`values_1`")));
        assert!(err.violations.iter().any(|v| v.contains("`values_2`")));
    }

    #[test]
    fn test_unknown_chart_type_rejected() {
        let mut value = example_value();
        value["conclusao"]["chart_data"] = json!({
            "chart_type": "scatter",
            "section": "4",
        });

        let err = validate(&value).unwrap_err();
        assert_eq!(
            err.violations,
            vec!["/conclusao/chart_data: unknown chart type `scatter`".to_string()]
        );
    }

    #[test]
    fn test_variant_fields_missing_for_tag() {
        let mut value = example_value();
        value["analise_financeira"]["1.1"]["chart_data"] = json!({
            "chart_type": "line",
            "section": "1.1",
            "x": [2022, 2023],
        });

        let err = validate(&value).unwrap_err();
        assert_eq!(err.violations.len(), 1);
    }

    #[test]
    fn test_sequence_lengths_checked() {
        let mut value = example_value();
        value["analise_financeira"]["1.2"]["chart_data"]["values"] = json!([1.0, 2.0]);

        let err = validate(&value).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains("section 1.2 (pie chart)"));
        assert!(err.violations[0].contains("has 2 entries, expected 4"));
    }

    #[test]
    fn test_heatmap_grid_checked() {
        let mut report = AnalysisResponse::example();
        report.risk_assessment.chart_data = Some(ChartPayload::Heatmap(HeatmapChart {
            section: "2".into(),
            rows: vec!["A".into(), "B".into()],
            columns: vec!["X".into(), "Y".into(), "Z".into()],
            values: vec![vec![Some(1.0), Some(2.0), Some(3.0)], vec![Some(4.0)]],
        }));

        let violations = check_integrity(&report);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("values[1]"));
    }

    #[test]
    fn test_section_reference_must_be_dotted() {
        let mut report = AnalysisResponse::example();
        report.conclusion.chart_data = Some(ChartPayload::Pie(PieChart {
            section: "conclusion".into(),
            labels: vec![],
            values: vec![],
        }));

        let violations = check_integrity(&report);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("not a dotted identifier"));
        assert!(is_dotted_identifier("3.1"));
        assert!(is_dotted_identifier("4"));
        assert!(!is_dotted_identifier("1."));
    }

    #[test]
    fn test_wrong_type_reported_by_serde() {
        let mut value = example_value();
        value["municipio_nome"] = json!(42);

        let err = validate(&value).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert!(err.violations[0].contains("invalid type"));
    }

    #[test]
    fn test_validate_str_rejects_non_json() {
        let err = validate_str("not json").unwrap_err();
        assert!(err.violations[0].starts_with("invalid JSON"));
    }
}
