use crate::database::repository::QuestionBank;
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionDraft, TestLevel};
use std::sync::Arc;

#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionBank>,
}

impl QuestionService {
    pub fn new(questions: Arc<dyn QuestionBank>) -> Self {
        Self { questions }
    }

    pub async fn list(&self, level: Option<TestLevel>) -> Result<Vec<Question>> {
        self.questions.list_questions(level).await
    }

    pub async fn get(&self, question_id: i64) -> Result<Question> {
        self.questions
            .get_question(question_id)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))
    }

    pub async fn create(&self, draft: QuestionDraft) -> Result<Question> {
        validate_draft(&draft)?;
        let question = self.questions.create_question(draft).await?;
        tracing::info!(question_id = question.id, level = %question.level, "question created");
        Ok(question)
    }

    pub async fn update(&self, question_id: i64, draft: QuestionDraft) -> Result<Question> {
        validate_draft(&draft)?;
        let question = self
            .questions
            .update_question(question_id, draft)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        tracing::info!(question_id, "question updated");
        Ok(question)
    }

    pub async fn delete(&self, question_id: i64) -> Result<()> {
        if !self.questions.delete_question(question_id).await? {
            return Err(Error::NotFound("Question not found".to_string()));
        }
        tracing::info!(question_id, "question deleted");
        Ok(())
    }
}

/// A scorable question has text in both languages, at least two options and
/// exactly one correct option.
pub fn validate_draft(draft: &QuestionDraft) -> Result<()> {
    if draft.text_ru.trim().is_empty() || draft.text_kg.trim().is_empty() {
        return Err(Error::BadRequest(
            "Question text is required in both languages".to_string(),
        ));
    }
    if draft.options.len() < 2 {
        return Err(Error::BadRequest(
            "A question needs at least two answer options".to_string(),
        ));
    }
    if draft
        .options
        .iter()
        .any(|o| o.text_ru.trim().is_empty() || o.text_kg.trim().is_empty())
    {
        return Err(Error::BadRequest(
            "Option text is required in both languages".to_string(),
        ));
    }
    let correct = draft.options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(Error::BadRequest(format!(
            "Exactly one option must be correct, got {}",
            correct
        )));
    }
    Ok(())
}
