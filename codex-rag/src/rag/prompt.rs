//! Prompt texts for both query modes

pub struct PromptService;

impl PromptService {
    pub fn rag_system_prompt() -> &'static str {
        "You are a WordPress expert assistant. Answer questions using ONLY the provided context. \
         Keep responses SHORT and FOCUSED (2-3 sentences maximum). \
         If the context doesn't contain the answer, say 'I don't have enough information in the provided context.' \
         Do not add extra details or go beyond what's in the context."
    }

    pub fn llm_only_system_prompt() -> &'static str {
        "You are a WordPress expert assistant. Answer questions about WordPress development, \
         plugin creation, theme development, and WordPress best practices. \
         Keep responses concise and focused (2-3 sentences maximum). \
         If you don't know the answer, say 'I don't have enough information to answer this question.'"
    }

    pub fn rag_user_prompt<S: AsRef<str>>(question: &str, contexts: &[S]) -> String {
        let context_block = contexts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("Question: {}\n\nContext:\n{}", question, context_block)
    }

    pub fn llm_only_user_prompt(question: &str) -> String {
        format!("Question: {}", question)
    }
}
