//! Wire schema for the research report.
//!
//! The schema handed to the model is generated from the same `IpoAnalysis`
//! declaration the response is deserialized into, so the contract cannot
//! drift between the two sides.

use ipolens_core::IpoAnalysis;
use schemars::generate::SchemaSettings;
use schemars::transform::AddNullable;
use serde_json::Value;

use crate::llm_provider::{ResponseFormat, SchemaSpec};

/// Fully inlined JSON schema for [`IpoAnalysis`]. Gemini's `responseSchema`
/// is OpenAPI-flavored: it does not resolve `$ref` and `type` must be a
/// single value, so subschemas are expanded in place, optional fields are
/// marked `nullable` instead of `["T","null"]`, and the draft metadata keys
/// are stripped.
pub fn report_schema_value() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.transforms.push(Box::new(AddNullable::default()));
    });
    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<IpoAnalysis>();

    let mut value = schema.to_value();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// Response format constraining synthesis output to the report schema.
pub fn report_response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: SchemaSpec {
            name: "ipo_analysis".to_string(),
            schema: report_schema_value(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_required_report_fields() {
        let schema = report_schema_value();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("top-level required array")
            .iter()
            .filter_map(|v| v.as_str())
            .collect();

        for field in [
            "companyName",
            "stockCode",
            "financials",
            "issuanceInfo",
            "liquidityAnalysis",
            "scoring",
            "scenarios",
            "positionAdvice",
            "dataSources",
        ] {
            assert!(required.contains(&field), "missing required field {field}");
        }
    }

    #[test]
    fn schema_is_fully_inlined() {
        let schema = report_schema_value();
        let text = schema.to_string();
        assert!(!text.contains("$ref"), "schema must not contain $ref");
        assert!(!text.contains("$schema"));
    }

    #[test]
    fn enum_constraints_survive_generation() {
        let schema = report_schema_value();
        let trend =
            &schema["properties"]["ipoRadar"]["properties"]["marketSentiment"]["properties"]
                ["sentimentTrend"]["enum"];
        let values: Vec<&str> = trend
            .as_array()
            .expect("sentimentTrend enum")
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(values, vec!["Bullish", "Neutral", "Bearish", "Pending"]);
    }

    // Walk the schema tree the way Gemini reads it: the `type` keyword of
    // every subschema must be a single value, never an array.
    fn assert_single_types(schema: &Value) {
        let Some(obj) = schema.as_object() else {
            return;
        };
        if let Some(t) = obj.get("type") {
            assert!(t.is_string(), "type must be a single value, got {t}");
        }
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            props.values().for_each(assert_single_types);
        }
        if let Some(items) = obj.get("items") {
            assert_single_types(items);
        }
    }

    #[test]
    fn optional_fields_are_nullable_with_single_type() {
        let schema = report_schema_value();

        let prospectus = &schema["properties"]["prospectusUrl"];
        assert_eq!(prospectus["type"], "string");
        assert_eq!(prospectus["nullable"], true);

        let peer = &schema["properties"]["valuation"]["properties"]["peers"]["items"];
        assert_eq!(peer["properties"]["pe"]["type"], "string");

        assert_single_types(&schema);
    }

    #[test]
    fn conforming_document_round_trips_into_typed_report() {
        // A document shaped by the schema must deserialize into IpoAnalysis.
        let doc = sample_report_json();
        let report: IpoAnalysis = serde_json::from_value(doc).unwrap();
        assert_eq!(report.company_name, "Acme Robotics");
        assert_eq!(report.scenarios.len(), 1);
    }

    fn sample_report_json() -> Value {
        serde_json::json!({
            "companyName": "Acme Robotics",
            "stockCode": "9999.HK",
            "sector": "Industrial Automation",
            "listingDate": "2026-09-15",
            "priceRange": "HK$18.00 - HK$22.00",
            "marketCap": "HK$12.4B",
            "business": {
                "description": "Industrial robot arms",
                "mainProducts": ["Robot arms"],
                "industryPosition": "Top 3 domestic"
            },
            "financials": {
                "yearlyData": [
                    {"year": "2025", "revenue": "1.2B", "netProfit": "140M", "grossMargin": "38%"}
                ],
                "cagr": "41%",
                "revenueStructure": ["Hardware 80%", "Services 20%"],
                "summary": "Fast-growing, thin margins"
            },
            "issuanceInfo": {
                "totalShares": "120M",
                "publicTranchePct": "10%",
                "internationalTranchePct": "90%",
                "cornerstonePctOfOffer": "45%",
                "greenshoeOption": "15%"
            },
            "cornerstones": [{"name": "Sovereign Fund A", "lockup": "6 months"}],
            "preIpo": {
                "status": "Completed Series D",
                "underwriters": ["Bank A"],
                "financingRounds": [],
                "keyInvestors": ["Fund B"]
            },
            "ipoRadar": {
                "marketSentiment": {
                    "internationalSubscription": "3.1x",
                    "publicSubscription": "45x",
                    "sentimentScore": 72.0,
                    "sentimentTrend": "Bullish",
                    "analystConsensus": "Subscribe"
                },
                "screeningMetrics": {
                    "sector": "Industrial Automation",
                    "listingRule": "Main Board 8A",
                    "revenueGrowth": "41%",
                    "grossMargin": "38%",
                    "valuationBand": "28-34x P/E",
                    "pegRatio": "0.8",
                    "keyTags": ["robotics"]
                }
            },
            "liquidityAnalysis": {
                "anchorHeatIndex": {"score": 68.0, "status": "Hot", "comment": "Strong anchor book"},
                "lockUpRisk": {
                    "riskLevel": "Medium",
                    "sellingPressure": "Moderate at day 180",
                    "marketVolatilityPrediction": "Elevated"
                },
                "retailSentiment": {
                    "subscriptionMultiple": "45x",
                    "clawbackPrediction": "30% reallocation"
                }
            },
            "valuation": {
                "peers": [{"name": "PeerCo", "ticker": "1234.HK", "pe": "30x"}],
                "fairValueRange": "HK$19 - HK$24",
                "valuationComment": "Priced at the low end"
            },
            "exitStrategies": [{
                "investorType": "Anchor (Short-Term)",
                "horizon": "T+5",
                "primaryAction": "Trim into strength",
                "keyObservationPoints": ["Day-1 turnover"],
                "stopLossOrHedge": "-8% hard stop"
            }],
            "healthCheck": [{
                "id": "hc-1", "label": "Cash runway", "status": "GREEN", "value": "36 months"
            }],
            "scoring": {
                "totalScore": 74.5,
                "dimensions": [
                    {"name": "Fundamentals", "score": 70.0, "weight": 0.4, "comment": "Solid"}
                ],
                "summary": "Above-average candidate"
            },
            "scenarios": [{
                "type": "Base",
                "subscriptionMultiple": "45x",
                "expectedReturn": "+12%",
                "liquidity": "Normal",
                "action": "Hold through stabilization"
            }],
            "positionAdvice": {
                "recommendation": "GO",
                "rationale": "Cornerstone coverage and reasonable pricing",
                "maxDrawdownTolerance": "-15%"
            },
            "lastUpdated": "2026-08-30",
            "dataSources": ["HKEX prospectus"]
        })
    }
}
