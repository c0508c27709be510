//! Prompt assembly.
//!
//! A template holds exactly one `{context}` and one `{question}` placeholder.
//! Rendering is a single pass over the pre-split template, so placeholder-like
//! text inside the context or the question is inserted literally.

use reportqa_core::{Error, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "You are an AI analyst that answers questions about hotel booking data.
Answer the following question using only the retrieved documents. If the documents do not contain the answer, say so.
Retrieved documents:
{context}

Question: {question}

Answer:
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Context,
    Question,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Literal text around the two slots: `[head, middle, tail]`.
    literals: [String; 3],
    order: [Slot; 2],
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let context_at = single_occurrence(template, CONTEXT_PLACEHOLDER)?;
        let question_at = single_occurrence(template, QUESTION_PLACEHOLDER)?;

        let (first, first_len, second, second_len, order) = if context_at < question_at {
            (context_at, CONTEXT_PLACEHOLDER.len(), question_at, QUESTION_PLACEHOLDER.len(), [Slot::Context, Slot::Question])
        } else {
            (question_at, QUESTION_PLACEHOLDER.len(), context_at, CONTEXT_PLACEHOLDER.len(), [Slot::Question, Slot::Context])
        };
        let literals = [
            template[..first].to_string(),
            template[first + first_len..second].to_string(),
            template[second + second_len..].to_string(),
        ];
        Ok(Self { literals, order })
    }

    /// Substitute both inputs verbatim. Nothing is escaped or truncated.
    pub fn assemble(&self, context: &str, question: &str) -> String {
        let pick = |slot: Slot| match slot {
            Slot::Context => context,
            Slot::Question => question,
        };
        let [head, middle, tail] = &self.literals;
        let mut out = String::with_capacity(head.len() + middle.len() + tail.len() + context.len() + question.len());
        out.push_str(head);
        out.push_str(pick(self.order[0]));
        out.push_str(middle);
        out.push_str(pick(self.order[1]));
        out.push_str(tail);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        // DEFAULT_TEMPLATE is covered by `default_template_parses`.
        Self::parse(DEFAULT_TEMPLATE).unwrap_or_else(|_| Self {
            literals: [String::new(), "\n\nQuestion: ".to_string(), "\n\nAnswer:\n".to_string()],
            order: [Slot::Context, Slot::Question],
        })
    }
}

fn single_occurrence(template: &str, placeholder: &str) -> Result<usize> {
    let mut found = template.match_indices(placeholder).map(|(i, _)| i);
    match (found.next(), found.next()) {
        (Some(at), None) => Ok(at),
        (None, _) => Err(Error::InvalidConfiguration(format!("prompt template is missing {placeholder}"))),
        (Some(_), Some(_)) => Err(Error::InvalidConfiguration(format!(
            "prompt template must contain {placeholder} exactly once"
        ))),
    }
}
