//! Shared test fixtures.

use crate::model::{Question, QuestionOption};

pub fn question(id: &str, subject: &str, answer: Option<&str>) -> Question {
    Question {
        id: id.into(),
        subject: subject.into(),
        stem: format!("Stem of {id}"),
        options: ["A", "B", "C", "D"]
            .iter()
            .map(|k| QuestionOption {
                key: (*k).into(),
                text: format!("Option {k} of {id}"),
            })
            .collect(),
        answer: answer.map(str::to_string),
        explanation: Some(format!("Explanation of {id}")),
        difficulty: None,
        weight: None,
    }
}

/// `count` graded questions split across two subjects, as corpus JSON.
pub fn corpus_json(count: usize) -> String {
    let questions: Vec<Question> = (0..count)
        .map(|i| {
            let subject = if i % 2 == 0 { "carbon" } else { "policy" };
            question(&format!("q{i:03}"), subject, Some("A"))
        })
        .collect();
    serde_json::to_string(&questions).unwrap()
}
