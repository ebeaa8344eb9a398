//! Report synthesis on top of an [`LlmProvider`].
//!
//! This is where "schema-constrained generation" happens end to end: a
//! deterministic prompt and the report schema go out, and the JSON that
//! comes back is deserialized straight into [`IpoAnalysis`].

use async_trait::async_trait;
use ipolens_core::{IpoAnalysis, IpoLensError, Language, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm_provider::{GenerationConfig, LlmProvider, Message};
use crate::report_schema::report_response_format;

/// Parameters for a full report synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub company_name: String,
    pub subscription_multiple: Option<String>,
    pub language: Language,
}

/// One turn of an assistant conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// Parameters for a follow-up question about an existing report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub company_name: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub language: Language,
}

/// The seam between HTTP handlers and the generative backend. Tests plug a
/// stub in here; production wires up [`crate::GeminiProvider`].
#[async_trait]
pub trait ResearchEngine: Send + Sync {
    /// Synthesize a complete research report for one IPO candidate.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<IpoAnalysis>;

    /// Answer a follow-up question grounded in a prior report.
    async fn ask_assistant(&self, request: &AssistantRequest) -> Result<String>;
}

/// Provider-backed [`ResearchEngine`].
pub struct SynthesisEngine {
    provider: Arc<dyn LlmProvider>,
}

impl SynthesisEngine {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ResearchEngine for SynthesisEngine {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<IpoAnalysis> {
        let prompt = synthesis_prompt(request);
        let config = GenerationConfig {
            temperature: 0.0,
            response_format: report_response_format(),
            grounded: true,
            ..GenerationConfig::default()
        };

        info!(
            company = %request.company_name,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            "starting report synthesis"
        );

        let response = self
            .provider
            .generate_chat(&[Message::user(prompt)], &config)
            .await
            .map_err(|e| IpoLensError::Llm(e.to_string()))?;

        debug!(
            total_tokens = ?response.total_tokens,
            finish_reason = ?response.finish_reason,
            "synthesis response received"
        );

        let json = unfence(&response.content);
        let report: IpoAnalysis = serde_json::from_str(json)
            .map_err(|e| IpoLensError::Llm(format!("response violated report schema: {e}")))?;

        Ok(report)
    }

    async fn ask_assistant(&self, request: &AssistantRequest) -> Result<String> {
        let mut messages = vec![Message::system(format!(
            "You are an institutional research analyst. Provide consistent, repeatable \
             analysis for {}. Respond in {}.",
            request.company_name,
            request.language.prompt_name()
        ))];

        for turn in &request.history {
            messages.push(match turn.role {
                ChatRole::User => Message::user(turn.text.clone()),
                ChatRole::Model => Message::assistant(turn.text.clone()),
            });
        }
        messages.push(Message::user(request.message.clone()));

        let config = GenerationConfig {
            temperature: 0.0,
            ..GenerationConfig::default()
        };

        let response = self
            .provider
            .generate_chat(&messages, &config)
            .await
            .map_err(|e| IpoLensError::Llm(e.to_string()))?;

        Ok(response.content)
    }
}

/// Deterministic synthesis prompt. The subscription multiple is the primary
/// anchor for liquidity and scenario modeling; when the caller does not
/// supply one the model falls back to the latest market estimate.
fn synthesis_prompt(request: &AnalysisRequest) -> String {
    let multiple = request
        .subscription_multiple
        .as_deref()
        .unwrap_or("Latest Market Estimate");

    format!(
        "TASK: INSTITUTIONAL RESEARCH SYNTHESIS PRO\n\
         ENTITY: \"{company}\".\n\
         USER PARAMETER - SUBSCRIPTION MULTIPLE: {multiple}\n\
         \n\
         SYSTEM INSTRUCTIONS (DETERMINISM FIRST):\n\
         1. STRICT REPRODUCIBILITY: Your output must be clinical, factual, and deterministic.\n\
         2. GROUNDING: Mandatory web search for official filings (HKEX Prospectus/PHIP). \
         Rely ONLY on public disclosures.\n\
         3. PARAMETER WEIGHT: Use the \"{multiple}\" value as the primary anchor for \
         Liquidity Risk and Scenarios modeling.\n\
         4. HKEX RULES: Apply standard HKEX clawback rules \
         (10x-50x -> 30%, 50x-100x -> 40%, 100x+ -> 50%) based on the multiple.\n\
         5. LANGUAGE: Respond entirely in {language}.",
        company = request.company_name,
        multiple = multiple,
        language = request.language.prompt_name(),
    )
}

/// Strip a markdown code fence the model occasionally wraps around the JSON
/// body despite the mime-type constraint.
fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
