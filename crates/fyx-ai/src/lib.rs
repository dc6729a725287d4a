pub mod ai_provider;
pub mod decision;
pub mod fallback;
pub mod http;
pub mod providers;
pub mod quiz;

pub use ai_provider::{create_provider, AiConfig, AiProvider, AiProviderTrait};
pub use decision::{
    DecisionRequest, DecisionResponse, DecisionRoute, DecisionService, HttpDecisionService,
    PageContext,
};
pub use fallback::Sourced;
pub use quiz::{
    HttpQuizService, LlmQuizService, Quiz, QuizChain, QuizRequest, QuizService, FALLBACK_QUESTION,
};
