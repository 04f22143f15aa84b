use std::collections::HashMap;

use chrono::Duration;
use quiz_core::model::{
    Difficulty, QuestionDraft, QuestionId, QuestionType, QuizSession, ResubmitPolicy, SessionKey,
    Topic, TopicId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    NewTopicRecord, QuestionRepository, SessionStore, StorageError, TopicRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn mcq(topic_id: TopicId, text: &str, answer: &str, difficulty: Difficulty) -> QuestionDraft {
    QuestionDraft {
        topic_id,
        text: text.into(),
        question_type: QuestionType::Mcq,
        difficulty,
        options: Some(["10%".into(), "20%".into(), "25%".into(), "50%".into()]),
        correct_answer: answer.into(),
        solution: Some("Divide by the whole.".into()),
    }
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_questions() {
    let repo = connect("memdb_questions").await;
    let topic_id = repo
        .insert_new_topic(NewTopicRecord::new("Percentages").unwrap())
        .await
        .unwrap();

    let mcq_id = repo
        .insert_new_question(
            &mcq(topic_id, "What is 1/5?", "b", Difficulty::Medium)
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();
    let tf_id = repo
        .insert_new_question(
            &QuestionDraft {
                topic_id,
                text: "50% equals one half.".into(),
                question_type: QuestionType::TrueFalse,
                difficulty: Difficulty::Easy,
                options: Some(["x".into(), "y".into(), "z".into(), "w".into()]),
                correct_answer: "true".into(),
                solution: None,
            }
            .validate(fixed_now())
            .unwrap(),
        )
        .await
        .unwrap();

    let fetched = repo.get_question(mcq_id).await.unwrap().unwrap();
    assert_eq!(fetched.correct_answer(), "B");
    assert_eq!(fetched.correct_answer_display(), "B: 20%");
    assert_eq!(fetched.created_at(), fixed_now());
    assert_eq!(fetched.solution(), Some("Divide by the whole."));

    let tf = repo.get_question(tf_id).await.unwrap().unwrap();
    assert_eq!(tf.question_type(), QuestionType::TrueFalse);
    assert!(tf.options().is_none());
    assert_eq!(tf.correct_answer(), "True");

    let found = repo
        .get_questions(&[tf_id, QuestionId::new(999), mcq_id])
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|q| q.id()).collect();
    assert_eq!(ids, [tf_id, mcq_id]);
}

#[tokio::test]
async fn sqlite_practice_paging_and_counts() {
    let repo = connect("memdb_practice").await;
    let topic_id = repo
        .insert_new_topic(NewTopicRecord::new("Ratios").unwrap())
        .await
        .unwrap();

    let mut at = fixed_now();
    for (text, difficulty) in [
        ("h1", Difficulty::Hard),
        ("e1", Difficulty::Easy),
        ("m1", Difficulty::Medium),
        ("e2", Difficulty::Easy),
        ("e3", Difficulty::Easy),
    ] {
        repo.insert_new_question(&mcq(topic_id, text, "A", difficulty).validate(at).unwrap())
            .await
            .unwrap();
        at += Duration::minutes(1);
    }

    let first = repo
        .list_practice_questions(topic_id, None, 0, 3)
        .await
        .unwrap();
    let texts: Vec<_> = first.iter().map(|q| q.text().to_owned()).collect();
    assert_eq!(texts, ["e1", "e2", "e3"]);

    let second = repo
        .list_practice_questions(topic_id, None, 3, 3)
        .await
        .unwrap();
    let texts: Vec<_> = second.iter().map(|q| q.text().to_owned()).collect();
    assert_eq!(texts, ["m1", "h1"]);

    let hard = repo
        .list_practice_questions(topic_id, Some(Difficulty::Hard), 0, 5)
        .await
        .unwrap();
    assert_eq!(hard.len(), 1);
    assert_eq!(repo.count_questions(topic_id, None).await.unwrap(), 5);
    assert_eq!(
        repo.count_questions(topic_id, Some(Difficulty::Easy))
            .await
            .unwrap(),
        3
    );

    let listed = repo.list_questions(topic_id, 2).await.unwrap();
    let texts: Vec<_> = listed.iter().map(|q| q.text().to_owned()).collect();
    assert_eq!(texts, ["h1", "e1"]);
}

#[tokio::test]
async fn sqlite_topics_counts_conflicts_and_cascade() {
    let repo = connect("memdb_topics").await;
    let a = repo
        .insert_new_topic(NewTopicRecord::new("Algebra").unwrap())
        .await
        .unwrap();
    let b = repo
        .insert_new_topic(NewTopicRecord::new("Geometry").unwrap())
        .await
        .unwrap();
    let q = repo
        .insert_new_question(
            &mcq(a, "x", "A", Difficulty::Easy)
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();

    let err = repo
        .insert_new_topic(NewTopicRecord::new("Algebra").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let counts = repo.list_topics_with_counts().await.unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].question_count, 1);
    assert_eq!(counts[1].topic.id(), b);
    assert_eq!(counts[1].question_count, 0);

    repo.upsert_topic(&Topic::new(b, "Geometry II").unwrap())
        .await
        .unwrap();
    assert_eq!(
        repo.get_topic(b).await.unwrap().unwrap().name(),
        "Geometry II"
    );

    repo.delete_topic(a).await.unwrap();
    assert!(repo.get_question(q).await.unwrap().is_none());
    assert!(matches!(
        repo.delete_topic(a).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sqlite_rejects_question_for_missing_topic() {
    let repo = connect("memdb_orphan").await;
    let err = repo
        .insert_new_question(
            &mcq(TopicId::new(42), "orphan", "A", Difficulty::Easy)
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_session_store_persists_progress_and_report() {
    let repo = connect("memdb_sessions").await;
    let topic_id = repo
        .insert_new_topic(NewTopicRecord::new("Percentages").unwrap())
        .await
        .unwrap();
    for answer in ["A", "B", "C"] {
        repo.insert_new_question(
            &mcq(topic_id, answer, answer, Difficulty::Easy)
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();
    }
    let questions = repo.list_questions(topic_id, 10).await.unwrap();
    let topic = repo.get_topic(topic_id).await.unwrap().unwrap();

    let key = SessionKey::generate();
    assert!(repo.get_session(key).await.unwrap().is_none());

    let mut session = QuizSession::start(&topic, &questions, 10, fixed_now()).unwrap();
    session.record_answer("a").unwrap();
    session.go_to(2).unwrap();
    session.record_answer("D").unwrap();
    repo.put_session(key, &session).await.unwrap();

    let mut loaded = repo.get_session(key).await.unwrap().unwrap();
    assert_eq!(loaded, session);
    assert_eq!(loaded.position(), 2);

    let bank: HashMap<_, _> = questions.iter().map(|q| (q.id(), q.clone())).collect();
    let submission = loaded
        .submit(Some(&topic), &bank, fixed_now(), ResubmitPolicy::Replay)
        .unwrap();
    repo.put_session(key, &loaded).await.unwrap();

    let reloaded = repo.get_session(key).await.unwrap().unwrap();
    assert!(reloaded.is_submitted());
    assert_eq!(reloaded.report(), Some(submission.report()));
    assert_eq!(submission.report().score(), 1);

    // The in-progress copy can no longer replace the submitted row.
    assert!(matches!(
        repo.put_session(key, &session).await.unwrap_err(),
        StorageError::Conflict
    ));
    assert_eq!(repo.get_session(key).await.unwrap().unwrap(), reloaded);

    repo.delete_session(key).await.unwrap();
    assert!(repo.get_session(key).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_session_keeps_topic_name_after_topic_delete() {
    let repo = connect("memdb_session_topic_delete").await;
    let topic_id = repo
        .insert_new_topic(NewTopicRecord::new("Fractions").unwrap())
        .await
        .unwrap();
    repo.insert_new_question(
        &mcq(topic_id, "half", "B", Difficulty::Easy)
            .validate(fixed_now())
            .unwrap(),
    )
    .await
    .unwrap();
    let topic = repo.get_topic(topic_id).await.unwrap().unwrap();
    let questions = repo.list_questions(topic_id, 10).await.unwrap();

    let key = SessionKey::generate();
    let session = QuizSession::start(&topic, &questions, 10, fixed_now()).unwrap();
    repo.put_session(key, &session).await.unwrap();
    repo.delete_topic(topic_id).await.unwrap();

    let loaded = repo.get_session(key).await.unwrap().unwrap();
    assert_eq!(loaded.topic_name(), "Fractions");
    assert_eq!(loaded.topic_id(), topic_id);
}
