//! Prompt construction for book-grounded answers

use bookrag_core::{ChatMessage, ConversationTurn, ScoredChunk};

/// System instruction sent with every question
pub const SYSTEM_INSTRUCTION: &str = "You are an expert assistant for the Physical AI & Humanoid Robotics book. \
Answer the user's question based ONLY on the context from the book provided to you. \
Do not use any external knowledge or general information. \
If the context does not contain enough information to answer the question, \
clearly state that the information is not available in the book.";

/// Builder for constructing RAG prompts
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_instruction: String,
    context_sections: Vec<String>,
    history: Vec<ConversationTurn>,
    question: String,
    max_context_length: usize,
}

impl PromptBuilder {
    /// Create a new prompt builder with the default book instruction
    pub fn new() -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            context_sections: Vec::new(),
            history: Vec::new(),
            question: String::new(),
            max_context_length: usize::MAX,
        }
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Add a context section
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context_sections.push(context.into());
        self
    }

    /// Add retrieved chunks as numbered context sections
    pub fn add_chunks(mut self, chunks: &[ScoredChunk]) -> Self {
        for (i, scored) in chunks.iter().enumerate() {
            let content = scored.chunk.content.trim();
            if content.is_empty() {
                continue;
            }
            let metadata = &scored.chunk.metadata;
            let label = match &metadata.section {
                Some(section) => format!("{} / {}", metadata.file_path, section),
                None => metadata.file_path.clone(),
            };
            self.context_sections
                .push(format!("[{}] ({})\n{}", i + 1, label, content));
        }
        self
    }

    /// Keep only the last `turns` exchanges of `history`
    pub fn history(mut self, history: &[ConversationTurn], turns: usize) -> Self {
        let start = history.len().saturating_sub(turns);
        self.history = history[start..].to_vec();
        self
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Limit the total characters of context included
    pub fn max_context_length(mut self, max: usize) -> Self {
        self.max_context_length = max;
        self
    }

    /// Build the system and user messages
    pub fn build(self) -> Vec<ChatMessage> {
        let mut prompt = String::new();

        prompt.push_str("<context>\n");
        let mut total_length = 0;
        for section in &self.context_sections {
            let remaining = self.max_context_length.saturating_sub(total_length);
            if remaining == 0 {
                break;
            }
            let len = section.chars().count();
            if len > remaining {
                prompt.extend(section.chars().take(remaining));
                prompt.push_str("\n\n");
                break;
            }
            prompt.push_str(section);
            prompt.push_str("\n\n");
            total_length += len;
        }
        prompt.push_str("</context>\n\n");

        if !self.history.is_empty() {
            prompt.push_str("<history>\n");
            for turn in &self.history {
                prompt.push_str(&format!(
                    "User: {}\nAssistant: {}\n\n",
                    turn.user, turn.assistant
                ));
            }
            prompt.push_str("</history>\n\n");
        }

        prompt.push_str("<question>\n");
        prompt.push_str(&self.question);
        prompt.push_str("\n</question>\n");

        vec![
            ChatMessage::system(self.system_instruction),
            ChatMessage::user(prompt),
        ]
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookrag_core::{ChatRole, ChunkMetadata, ContentChunk};

    fn scored(text: &str, section: Option<&str>) -> ScoredChunk {
        let mut metadata = ChunkMetadata::paragraph("book/ch1.md", 1);
        metadata.section = section.map(str::to_string);
        ScoredChunk {
            chunk: ContentChunk::new(text, metadata),
            score: 0.9,
        }
    }

    fn turn(n: usize) -> ConversationTurn {
        ConversationTurn {
            user: format!("question {n}"),
            assistant: format!("answer {n}"),
        }
    }

    #[test]
    fn test_prompt_builder() {
        let messages = PromptBuilder::new()
            .add_chunks(&[scored("Robots have joints.", Some("Anatomy"))])
            .question("What do robots have?")
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("ONLY"));
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1]
            .content
            .contains("[1] (book/ch1.md / Anatomy)\nRobots have joints."));
        assert!(messages[1].content.contains("What do robots have?"));
        assert!(!messages[1].content.contains("<history>"));
    }

    #[test]
    fn test_history_keeps_last_turns() {
        let history: Vec<_> = (1..=5).map(turn).collect();
        let messages = PromptBuilder::new()
            .history(&history, 3)
            .question("next")
            .build();

        let user = &messages[1].content;
        assert!(!user.contains("question 2"));
        assert!(user.contains("question 3"));
        assert!(user.contains("answer 5"));
    }

    #[test]
    fn test_context_truncated() {
        let messages = PromptBuilder::new()
            .add_context("a".repeat(50))
            .add_context("b".repeat(50))
            .max_context_length(60)
            .question("q")
            .build();

        let user = &messages[1].content;
        assert_eq!(user.matches('a').count(), 50);
        assert_eq!(user.matches('b').count(), 10);
    }

    #[test]
    fn test_blank_chunks_skipped() {
        let messages = PromptBuilder::new()
            .add_chunks(&[scored("   ", None), scored("Lidar.", None)])
            .build();

        assert!(messages[1].content.contains("[2] (book/ch1.md)\nLidar."));
        assert!(!messages[1].content.contains("[1]"));
    }
}
