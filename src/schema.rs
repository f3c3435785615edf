use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BarGroupedChart {
    #[schemars(description = "Section this chart belongs to (e.g. \"1.1\").")]
    pub section: String,

    #[schemars(description = "Labels for the bars/groups.")]
    pub labels: Vec<String>,

    #[schemars(description = "First set of values for the bars.")]
    pub values_1: Vec<Option<f64>>,

    #[serde(default)]
    #[schemars(description = "Second set of values for grouped bars (optional).")]
    pub values_2: Option<Vec<Option<f64>>>,

    #[serde(default)]
    #[schemars(
        description = "Legend labels if multiple value sets are used (e.g., ['Orçado', 'Pago'])."
    )]
    pub legend: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PieChart {
    #[schemars(description = "Section this chart belongs to (e.g. \"1.2\").")]
    pub section: String,

    #[schemars(description = "Labels for the pie slices.")]
    pub labels: Vec<String>,

    #[schemars(description = "Values for the pie slices.")]
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BarStackedChart {
    #[schemars(description = "Section this chart belongs to.")]
    pub section: String,

    #[schemars(description = "Labels for the bars.")]
    pub labels: Vec<String>,

    #[schemars(description = "Values for the first stack layer.")]
    pub values_1: Vec<Option<f64>>,

    #[schemars(description = "Values for the second stack layer.")]
    pub values_2: Vec<Option<f64>>,

    #[schemars(
        description = "Legend labels for the stack layers (e.g., ['Orçado', 'Pago'])."
    )]
    pub legend: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HeatmapChart {
    #[schemars(description = "Section this chart belongs to.")]
    pub section: String,

    #[schemars(description = "Row labels for the heatmap.")]
    pub rows: Vec<String>,

    #[schemars(description = "Column labels for the heatmap.")]
    pub columns: Vec<String>,

    #[schemars(
        description = "Heatmap cell values, one inner list per row with one entry per column."
    )]
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LineChart {
    #[schemars(description = "Section this chart belongs to.")]
    pub section: String,

    #[schemars(description = "X-axis values (e.g., years).")]
    pub x: Vec<AxisValue>,

    #[schemars(description = "Y-axis values.")]
    pub y: Vec<Option<f64>>,

    #[schemars(description = "Label for the line.")]
    pub label: String,
}

/// A point on a line chart's x axis: usually a year, sometimes a free label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum AxisValue {
    Number(i64),
    Label(String),
}

/// Chart data attached to a report section. The `chart_type` tag selects the geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "chart_type", rename_all = "snake_case")]
pub enum ChartPayload {
    BarGrouped(BarGroupedChart),
    Pie(PieChart),
    BarStacked(BarStackedChart),
    Heatmap(HeatmapChart),
    Line(LineChart),
}

pub const CHART_TAG_FIELD: &str = "chart_type";

impl ChartPayload {
    pub fn tag(&self) -> &'static str {
        match self {
            ChartPayload::BarGrouped(_) => "bar_grouped",
            ChartPayload::Pie(_) => "pie",
            ChartPayload::BarStacked(_) => "bar_stacked",
            ChartPayload::Heatmap(_) => "heatmap",
            ChartPayload::Line(_) => "line",
        }
    }

    pub fn section(&self) -> &str {
        match self {
            ChartPayload::BarGrouped(c) => &c.section,
            ChartPayload::Pie(c) => &c.section,
            ChartPayload::BarStacked(c) => &c.section,
            ChartPayload::Heatmap(c) => &c.section,
            ChartPayload::Line(c) => &c.section,
        }
    }

    /// Field names a chart of the given tag may carry, tag included.
    /// Returns `None` for an unknown tag.
    pub fn allowed_fields(tag: &str) -> Option<&'static [&'static str]> {
        let fields: &'static [&'static str] = match tag {
            "bar_grouped" => &[
                CHART_TAG_FIELD,
                "section",
                "labels",
                "values_1",
                "values_2",
                "legend",
            ],
            "pie" => &[CHART_TAG_FIELD, "section", "labels", "values"],
            "bar_stacked" => &[
                CHART_TAG_FIELD,
                "section",
                "labels",
                "values_1",
                "values_2",
                "legend",
            ],
            "heatmap" => &[CHART_TAG_FIELD, "section", "rows", "columns", "values"],
            "line" => &[CHART_TAG_FIELD, "section", "x", "y", "label"],
            _ => return None,
        };
        Some(fields)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ReportSection {
    #[schemars(description = "The textual analysis for this section.")]
    pub text: String,

    #[serde(default)]
    #[schemars(
        description = "Data required to render the chart for this section, if applicable."
    )]
    pub chart_data: Option<ChartPayload>,
}

impl ReportSection {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chart_data: None,
        }
    }

    pub fn with_chart(text: impl Into<String>, chart: ChartPayload) -> Self {
        Self {
            text: text.into(),
            chart_data: Some(chart),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FinancialAnalysisSubsections {
    #[serde(rename = "1.1")]
    #[schemars(description = "Analysis of Revenue vs Expenses.")]
    pub revenue_vs_expenses: ReportSection,

    #[serde(rename = "1.2")]
    #[schemars(description = "Analysis of Main Revenue Sources.")]
    pub main_revenue_sources: ReportSection,

    #[serde(rename = "1.3")]
    #[schemars(description = "Analysis of High-Execution Areas (>= 70%).")]
    pub high_execution_areas: ReportSection,

    #[serde(rename = "1.4")]
    #[schemars(description = "Analysis of Low-Execution Areas (<= 30%).")]
    pub low_execution_areas: ReportSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProjectionsSubsections {
    #[serde(rename = "3.1")]
    #[schemars(description = "Projections Discussion.")]
    pub projections: ReportSection,

    #[serde(rename = "3.2")]
    #[schemars(description = "Recommendations List (Text Only).")]
    pub recommendations: ReportSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum FiscalYear {
    Year(i64),
    Label(String),
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiscalYear::Year(year) => write!(f, "{}", year),
            FiscalYear::Label(label) => f.write_str(label),
        }
    }
}

/// Structured financial analysis report including text and chart data.
///
/// The serialized field names (including the dotted subsection keys) are the
/// contract shared with the remote assistant and must not change without
/// regenerating the schema and reconfiguring the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(example = "AnalysisResponse::example")]
pub struct AnalysisResponse {
    #[serde(rename = "municipio_nome")]
    #[schemars(description = "Name of the municipality.")]
    pub municipality_name: String,

    #[serde(rename = "exercicio_ano")]
    #[schemars(description = "The fiscal year of the analysis.")]
    pub fiscal_year: FiscalYear,

    #[serde(rename = "fonte_pdf_nome")]
    #[schemars(description = "Filename of the source PDF/CSV provided.")]
    pub source_document: String,

    #[serde(rename = "analise_financeira")]
    #[schemars(description = "Section 1: Financial Analysis")]
    pub financial_analysis: FinancialAnalysisSubsections,

    #[serde(rename = "avaliacao_riscos")]
    #[schemars(description = "Section 2: Risk Assessment")]
    pub risk_assessment: ReportSection,

    #[serde(rename = "projecoes_recomendacoes")]
    #[schemars(description = "Section 3: Projections and Recommendations")]
    pub projections_recommendations: ProjectionsSubsections,

    #[serde(rename = "conclusao")]
    #[schemars(description = "Section 4: Conclusion")]
    pub conclusion: ReportSection,
}

impl AnalysisResponse {
    pub fn generate_json_schema() -> RootSchema {
        schemars::schema_for!(AnalysisResponse)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    /// The schema as a JSON value, ready to be sent as a function's `parameters`.
    pub fn function_parameters() -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(Self::generate_json_schema())
    }

    /// Every section with its dotted identifier, in report order.
    pub fn sections(&self) -> [(&'static str, &ReportSection); 8] {
        [
            ("1.1", &self.financial_analysis.revenue_vs_expenses),
            ("1.2", &self.financial_analysis.main_revenue_sources),
            ("1.3", &self.financial_analysis.high_execution_areas),
            ("1.4", &self.financial_analysis.low_execution_areas),
            ("2", &self.risk_assessment),
            ("3.1", &self.projections_recommendations.projections),
            ("3.2", &self.projections_recommendations.recommendations),
            ("4", &self.conclusion),
        ]
    }

    pub fn example() -> Self {
        Self {
            municipality_name: "Exemploville".to_string(),
            fiscal_year: FiscalYear::Year(2023),
            source_document: "orcamento_2023.csv".to_string(),
            financial_analysis: FinancialAnalysisSubsections {
                revenue_vs_expenses: ReportSection::with_chart(
                    "A receita total orçada foi de R$ 10.000.000,00. As despesas empenhadas somaram R$ 9.500.000,00 (95,0% do orçado), as liquidadas R$ 9.000.000,00 (90,0%) e as pagas R$ 8.800.000,00 (88,0%).",
                    ChartPayload::BarGrouped(BarGroupedChart {
                        section: "1.1".to_string(),
                        labels: vec![
                            "Receita orçada".to_string(),
                            "Despesas empenhadas".to_string(),
                            "Despesas liquidadas".to_string(),
                            "Despesas pagas".to_string(),
                        ],
                        values_1: vec![
                            Some(10_000_000.0),
                            Some(9_500_000.0),
                            Some(9_000_000.0),
                            Some(8_800_000.0),
                        ],
                        values_2: None,
                        legend: None,
                    }),
                ),
                main_revenue_sources: ReportSection::with_chart(
                    "As principais fontes foram IPTU (R$ 3M pagos / 98% exec), ISS (R$ 2.5M / 95%), FPM (R$ 2M / 100%) e ICMS (R$ 1.5M / 90%).",
                    ChartPayload::Pie(PieChart {
                        section: "1.2".to_string(),
                        labels: vec![
                            "IPTU".to_string(),
                            "ISS".to_string(),
                            "FPM".to_string(),
                            "ICMS".to_string(),
                        ],
                        values: vec![
                            Some(3_000_000.0),
                            Some(2_500_000.0),
                            Some(2_000_000.0),
                            Some(1_500_000.0),
                        ],
                    }),
                ),
                high_execution_areas: ReportSection::text_only(
                    "Educação (95%), Saúde (92%), Urbanismo (88%) tiveram alta execução.",
                ),
                low_execution_areas: ReportSection::text_only(
                    "Cultura (25%), Esporte (20%), Meio Ambiente (15%) tiveram baixa execução.",
                ),
            },
            risk_assessment: ReportSection::text_only(
                "Riscos Financeiros: ... Riscos Operacionais: ... Riscos Externos: ...",
            ),
            projections_recommendations: ProjectionsSubsections {
                projections: ReportSection::text_only("Projeta-se crescimento de 3% na receita..."),
                recommendations: ReportSection::text_only(
                    "1. Diversificar Receitas... 2. Fortalecer Controles...",
                ),
            },
            conclusion: ReportSection::text_only(
                "O município apresenta boa execução orçamentária geral, mas precisa diversificar receitas e melhorar a execução em áreas de menor desempenho.",
            ),
        }
    }
}
