//! Boundary to the language model that answers questions.

use async_trait::async_trait;

/// Wraps retrieved code in the assistant instructions.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are CodeInsight, an AI-powered codebase assistant. You help developers understand code, \
         find relevant documentation, and solve programming problems with up-to-date information.\n\n\
         Context:\n{context}\n\n\
         Question: {query}\n\n\
         Please provide a helpful, accurate, and detailed response:"
    )
}

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    async fn generate_with_context(&self, query: &str, context: &str) -> anyhow::Result<String> {
        self.generate(&build_prompt(query, context)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("what does add do?", "def add(a, b): ...");
        assert!(prompt.starts_with("You are CodeInsight"));
        assert!(prompt.contains("Context:\ndef add(a, b): ...\n\nQuestion: what does add do?\n\n"));
        assert!(prompt.ends_with("detailed response:"));
    }

    #[tokio::test]
    async fn test_default_generate_with_context() {
        let answer = Echo.generate_with_context("q", "ctx").await.unwrap();
        assert_eq!(answer, build_prompt("q", "ctx"));
    }
}
