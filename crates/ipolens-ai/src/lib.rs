pub mod gemini_provider;
pub mod llm_provider;
pub mod report_schema;
pub mod research;

pub use gemini_provider::GeminiProvider;
pub use llm_provider::*;
pub use report_schema::{report_response_format, report_schema_value};
pub use research::{
    AnalysisRequest, AssistantRequest, ChatRole, ChatTurn, ResearchEngine, SynthesisEngine,
};
