pub const ANALYSIS_FUNCTION_NAME: &str = "submit_financial_analysis";

pub const ANALYSIS_FUNCTION_DESCRIPTION: &str =
    "Submits the structured financial analysis based on the provided CSV.";

pub const DEFAULT_ASSISTANT_NAME: &str = "Analista Financeiro Municipal v1";

pub const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4.1";

pub const CHAT_ASSISTANT_NAME: &str = "Financial Analyst Assistant";

pub const CHAT_ASSISTANT_INSTRUCTIONS: &str = "You are a seasoned financial analyst. Your job is to analyse any provided financial statements \
(balance sheets, income statements, cash-flow statements, etc.) and produce clear, comprehensive \
reports. Your reports should cover profitability, liquidity, solvency, efficiency ratios, trend analysis, \
and notable risks. Cite figures directly from the statements when relevant and explain their meaning.";

pub fn analysis_request(filename: &str) -> String {
    format!(
        "Analyze the financial data in the attached file: {}",
        filename
    )
}
