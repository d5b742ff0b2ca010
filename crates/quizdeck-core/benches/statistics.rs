use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizdeck_core::model::{AnswerRecord, Question, QuestionOption};
use quizdeck_core::statistics::{compute_statistics, percentage, score};

fn make_record(i: u64) -> AnswerRecord {
    let graded = i % 9 != 0;
    AnswerRecord {
        question_id: format!("q-{i:05}"),
        selected_option: (i % 13 != 0).then(|| "A".to_string()),
        correct_option: graded.then(|| "A".to_string()),
        is_correct: graded.then_some(i % 4 != 0),
        time_spent_ms: 1_000 + (i % 50) * 100,
        timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
        sequence: i,
        superseded: i % 17 == 0,
    }
}

fn make_question(i: u64) -> Question {
    Question {
        id: format!("q-{i:05}"),
        subject: format!("subject-{}", i % 5),
        stem: String::new(),
        options: vec![
            QuestionOption {
                key: "A".into(),
                text: String::new(),
            },
            QuestionOption {
                key: "B".into(),
                text: String::new(),
            },
        ],
        answer: (i % 9 != 0).then(|| "A".to_string()),
        explanation: None,
        difficulty: None,
        weight: None,
    }
}

fn bench_percentage(c: &mut Criterion) {
    c.bench_function("percentage", |b| {
        b.iter(|| percentage(black_box(37), black_box(50)))
    });
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [50u64, 1_000] {
        let records: Vec<AnswerRecord> = (0..size).map(make_record).collect();
        let questions: Vec<Question> = (0..size).map(make_question).collect();
        let answers: BTreeMap<String, AnswerRecord> = records
            .iter()
            .filter(|r| !r.superseded)
            .map(|r| (r.question_id.clone(), r.clone()))
            .collect();

        group.bench_function(format!("compute_{size}"), |b| {
            b.iter(|| {
                compute_statistics(black_box(&records), |id| {
                    Some(format!("subject-{}", id.len() % 5))
                })
            })
        });

        group.bench_function(format!("score_{size}"), |b| {
            b.iter(|| score(black_box(&questions), black_box(&answers)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_percentage, bench_statistics);
criterion_main!(benches);
