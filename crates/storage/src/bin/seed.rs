use std::fmt;

use chrono::{DateTime, Utc};
use quiz_core::model::{Difficulty, QuestionDraft, QuestionType, TopicId};
use storage::repository::{NewTopicRecord, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, now })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --now <rfc3339>           Fixed creation time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL");
}

struct Sample {
    text: &'static str,
    question_type: QuestionType,
    difficulty: Difficulty,
    options: Option<[&'static str; 4]>,
    answer: &'static str,
    solution: Option<&'static str>,
}

const PERCENTAGES: &[Sample] = &[
    Sample {
        text: "What is 25% of 80?",
        question_type: QuestionType::Mcq,
        difficulty: Difficulty::Easy,
        options: Some(["20", "25", "40", "16"]),
        answer: "A",
        solution: Some("0.25 x 80 = 20"),
    },
    Sample {
        text: "A price rises from 50 to 60. What is the percentage increase?",
        question_type: QuestionType::Mcq,
        difficulty: Difficulty::Medium,
        options: Some(["10%", "20%", "16.7%", "25%"]),
        answer: "B",
        solution: Some("(60 - 50) / 50 = 0.2"),
    },
    Sample {
        text: "Which fraction equals 12.5%?",
        question_type: QuestionType::Mcq,
        difficulty: Difficulty::Medium,
        options: Some(["1/4", "1/6", "1/8", "1/5"]),
        answer: "C",
        solution: None,
    },
    Sample {
        text: "A 10% discount followed by a 10% markup returns the original price.",
        question_type: QuestionType::TrueFalse,
        difficulty: Difficulty::Hard,
        options: None,
        answer: "False",
        solution: Some("0.9 x 1.1 = 0.99, so the final price is 1% lower."),
    },
    Sample {
        text: "What is 15% of 200?",
        question_type: QuestionType::Numeric,
        difficulty: Difficulty::Easy,
        options: None,
        answer: "30",
        solution: None,
    },
];

const FRACTIONS: &[Sample] = &[
    Sample {
        text: "What is 1/2 + 1/4 as a decimal?",
        question_type: QuestionType::Numeric,
        difficulty: Difficulty::Easy,
        options: None,
        answer: "0.75",
        solution: Some("1/2 = 2/4, and 2/4 + 1/4 = 3/4"),
    },
    Sample {
        text: "2/3 is greater than 3/5.",
        question_type: QuestionType::TrueFalse,
        difficulty: Difficulty::Medium,
        options: None,
        answer: "True",
        solution: Some("10/15 > 9/15"),
    },
];

async fn seed_topic(
    storage: &Storage,
    name: &str,
    samples: &[Sample],
    now: DateTime<Utc>,
) -> Result<Option<TopicId>, Box<dyn std::error::Error>> {
    let existing = storage.topics.list_topics_with_counts().await?;
    if existing.iter().any(|t| t.topic.name() == name) {
        return Ok(None);
    }

    let topic_id = storage
        .topics
        .insert_new_topic(NewTopicRecord::new(name)?)
        .await?;

    for sample in samples {
        let question = QuestionDraft {
            topic_id,
            text: sample.text.into(),
            question_type: sample.question_type,
            difficulty: sample.difficulty,
            options: sample.options.map(|o| o.map(String::from)),
            correct_answer: sample.answer.into(),
            solution: sample.solution.map(String::from),
        }
        .validate(now)?;
        storage.questions.insert_new_question(&question).await?;
    }

    Ok(Some(topic_id))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    for (name, samples) in [("Percentages", PERCENTAGES), ("Fractions", FRACTIONS)] {
        match seed_topic(&storage, name, samples, now).await? {
            Some(id) => println!(
                "Seeded topic {} ({name}) with {} questions",
                id.value(),
                samples.len()
            ),
            None => println!("Topic {name} already exists; skipped"),
        }
    }
    println!("Database: {}", args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
