use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall verdict for a single health-check line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Recommendation {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO-GO")]
    NoGo,
    #[serde(rename = "WAIT")]
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ScenarioType {
    Conservative,
    Base,
    Optimistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SentimentTrend {
    Bullish,
    Neutral,
    Bearish,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum HeatStatus {
    Cold,
    Neutral,
    Hot,
    #[serde(rename = "Very Hot")]
    VeryHot,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Report language requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    /// Human-readable name used inside prompts.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Zh => "Simplified Chinese",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DimensionScore {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoringModel {
    pub total_score: f64,
    pub dimensions: Vec<DimensionScore>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthCheckItem {
    pub id: String,
    pub label: String,
    pub status: HealthStatus,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketSentiment {
    pub international_subscription: String,
    pub public_subscription: String,
    pub sentiment_score: f64,
    pub sentiment_trend: SentimentTrend,
    pub analyst_consensus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningMetrics {
    pub sector: String,
    pub listing_rule: String,
    pub revenue_growth: String,
    pub gross_margin: String,
    pub valuation_band: String,
    pub peg_ratio: String,
    pub key_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpoRadar {
    pub market_sentiment: MarketSentiment,
    pub screening_metrics: ScreeningMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnchorHeatIndex {
    pub score: f64,
    pub status: HeatStatus,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockUpRisk {
    pub risk_level: RiskLevel,
    pub selling_pressure: String,
    pub market_volatility_prediction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetailSentiment {
    pub subscription_multiple: String,
    pub clawback_prediction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityAnalysis {
    pub anchor_heat_index: AnchorHeatIndex,
    pub lock_up_risk: LockUpRisk,
    pub retail_sentiment: RetailSentiment,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeerComparison {
    pub name: String,
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValuationData {
    pub peers: Vec<PeerComparison>,
    pub fair_value_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fair_price: Option<String>,
    pub valuation_comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExitStrategy {
    pub investor_type: String,
    pub horizon: String,
    pub primary_action: String,
    pub key_observation_points: Vec<String>,
    pub stop_loss_or_hedge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    pub subscription_multiple: String,
    pub expected_return: String,
    pub liquidity: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionAdvice {
    pub recommendation: Recommendation,
    pub rationale: String,
    pub max_drawdown_tolerance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PreIpoRound {
    pub round: String,
    pub investors: Vec<String>,
    pub date: String,
    pub amount: String,
    pub valuation: String,
    pub discount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreIpoInfo {
    pub status: String,
    pub underwriters: Vec<String>,
    pub financing_rounds: Vec<PreIpoRound>,
    pub key_investors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceInfo {
    pub total_shares: String,
    pub public_tranche_pct: String,
    pub international_tranche_pct: String,
    pub cornerstone_pct_of_offer: String,
    pub greenshoe_option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub description: String,
    pub main_products: Vec<String>,
    pub industry_position: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialYearData {
    pub year: String,
    pub revenue: String,
    pub net_profit: String,
    pub gross_margin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInfo {
    pub yearly_data: Vec<FinancialYearData>,
    pub cagr: String,
    pub revenue_structure: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CornerstoneItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockup: Option<String>,
}

/// The full research report: the parse target for schema-constrained
/// generation. The wire schema sent to the model is generated from this
/// same declaration, so a conforming response always deserializes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpoAnalysis {
    pub company_name: String,
    pub stock_code: String,
    pub sector: String,
    pub listing_date: String,
    pub price_range: String,
    pub market_cap: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prospectus_url: Option<String>,
    pub business: BusinessInfo,
    pub financials: FinancialInfo,
    pub issuance_info: IssuanceInfo,
    pub cornerstones: Vec<CornerstoneItem>,
    pub pre_ipo: PreIpoInfo,
    pub ipo_radar: IpoRadar,
    pub liquidity_analysis: LiquidityAnalysis,
    pub valuation: ValuationData,
    pub exit_strategies: Vec<ExitStrategy>,
    pub health_check: Vec<HealthCheckItem>,
    pub scoring: ScoringModel,
    pub scenarios: Vec<ScenarioResult>,
    pub position_advice: PositionAdvice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_follow_ups: Option<Vec<String>>,
    pub last_updated: String,
    pub data_sources: Vec<String>,
}

/// Account record as exposed over the wire. The password hash lives only in
/// the store layer and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub is_premium: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub usage_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    SearchAttempt,
    SearchSuccess,
    SearchFailure,
    UpgradeSuccess,
    Login,
    Logout,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogAction::SearchAttempt => "SEARCH_ATTEMPT",
            LogAction::SearchSuccess => "SEARCH_SUCCESS",
            LogAction::SearchFailure => "SEARCH_FAILURE",
            LogAction::UpgradeSuccess => "UPGRADE_SUCCESS",
            LogAction::Login => "LOGIN",
            LogAction::Logout => "LOGOUT",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for LogAction {
    type Err = crate::IpoLensError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SEARCH_ATTEMPT" => Ok(LogAction::SearchAttempt),
            "SEARCH_SUCCESS" => Ok(LogAction::SearchSuccess),
            "SEARCH_FAILURE" => Ok(LogAction::SearchFailure),
            "UPGRADE_SUCCESS" => Ok(LogAction::UpgradeSuccess),
            "LOGIN" => Ok(LogAction::Login),
            "LOGOUT" => Ok(LogAction::Logout),
            other => Err(crate::IpoLensError::InvalidOperation(format!(
                "unknown log action: {other}"
            ))),
        }
    }
}

/// One line of the append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: LogAction,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_wire_values_match_contract() {
        assert_eq!(
            serde_json::to_value(Recommendation::NoGo).unwrap(),
            serde_json::json!("NO-GO")
        );
        assert_eq!(
            serde_json::to_value(HeatStatus::VeryHot).unwrap(),
            serde_json::json!("Very Hot")
        );
        assert_eq!(
            serde_json::to_value(HealthStatus::Green).unwrap(),
            serde_json::json!("GREEN")
        );
        assert_eq!(
            serde_json::to_value(LogAction::SearchAttempt).unwrap(),
            serde_json::json!("SEARCH_ATTEMPT")
        );
        assert_eq!(serde_json::to_value(Language::Zh).unwrap(), serde_json::json!("zh"));
    }

    #[test]
    fn report_fields_are_camel_case() {
        let advice = PositionAdvice {
            recommendation: Recommendation::Go,
            rationale: "Strong cornerstone coverage".into(),
            max_drawdown_tolerance: "-15%".into(),
        };
        let v = serde_json::to_value(&advice).unwrap();
        assert!(v.get("maxDrawdownTolerance").is_some());
        assert!(v.get("max_drawdown_tolerance").is_none());
    }

    #[test]
    fn scenario_type_uses_type_key() {
        let s = ScenarioResult {
            scenario_type: ScenarioType::Base,
            subscription_multiple: "25x".into(),
            expected_return: "+12%".into(),
            liquidity: "Normal".into(),
            action: "Hold through stabilization".into(),
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["type"], "Base");
    }
}
