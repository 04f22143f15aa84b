use std::fmt;

use quiz_core::model::{Difficulty, Direction, QuestionId, QuizSettings, SessionKey, TopicId};
use services::{AppServices, Clock, QuizSessionService, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    UnknownCommand(String),
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { what: &'static str, raw: String },
    InvalidPage { raw: String },
    InvalidDifficulty { raw: String },
    InvalidMaxQuestions { raw: String },
    Settings(quiz_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { what, raw } => write!(f, "invalid {what}: {raw}"),
            ArgsError::InvalidPage { raw } => write!(f, "invalid --page value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value (easy, medium, hard or 1-3): {raw}")
            }
            ArgsError::InvalidMaxQuestions { raw } => {
                write!(f, "invalid max questions value: {raw}")
            }
            ArgsError::Settings(err) => write!(f, "{err}"),
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

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Topics,
    Take(TopicId),
    Resume(SessionKey),
    Retake(SessionKey),
    Results(SessionKey),
    Practice {
        topic_id: TopicId,
        page: u32,
        difficulty: Option<Difficulty>,
    },
    Question(QuestionId),
}

#[derive(Debug)]
struct Args {
    db_url: String,
    settings: QuizSettings,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [options] topics");
    eprintln!("  quiz [options] take <topic-id>");
    eprintln!("  quiz [options] resume <session-key>");
    eprintln!("  quiz [options] retake <session-key>");
    eprintln!("  quiz [options] results <session-key>");
    eprintln!("  quiz [options] practice <topic-id> [--page <n>] [--difficulty <level>]");
    eprintln!("  quiz [options] question <question-id>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3)");
    eprintln!("  --max-questions <n>       Questions per quiz (default: 10)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("While taking a quiz, type an answer or one of:");
    eprintln!("  :n next   :p previous   :g <n> go to question   :s submit");
    eprintln!("  :q quit (resume later)   :d discard the attempt");
    eprintln!("  An answer that matches one of these needs a leading backslash, e.g. \\:n");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_MAX_QUESTIONS, RUST_LOG");
}

fn parse_id<T: std::str::FromStr>(what: &'static str, raw: Option<String>) -> Result<T, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingValue { flag: what })?;
    raw.parse().map_err(|_| ArgsError::InvalidId { what, raw })
}

fn parse_difficulty(raw: String) -> Result<Difficulty, ArgsError> {
    let parsed = match raw.trim().to_ascii_lowercase().as_str() {
        "easy" => Some(Difficulty::Easy),
        "medium" => Some(Difficulty::Medium),
        "hard" => Some(Difficulty::Hard),
        other => other
            .parse::<u8>()
            .ok()
            .and_then(|level| Difficulty::from_level(level).ok()),
    };
    parsed.ok_or(ArgsError::InvalidDifficulty { raw })
}

fn parse_max_questions(settings: &QuizSettings, raw: String) -> Result<QuizSettings, ArgsError> {
    let max: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidMaxQuestions { raw: raw.clone() })?;
    settings
        .with_max_questions(max)
        .map_err(|e| ArgsError::Settings(e.into()))
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        Self::parse_from(
            std::env::args().skip(1),
            std::env::var("QUIZ_DB_URL").ok(),
            std::env::var("QUIZ_MAX_QUESTIONS").ok(),
        )
    }

    fn parse_from(
        args: impl IntoIterator<Item = String>,
        env_db_url: Option<String>,
        env_max_questions: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url =
            env_db_url.map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut settings = QuizSettings::default();
        if let Some(raw) = env_max_questions {
            settings = parse_max_questions(&settings, raw)?;
        }

        let mut positional = Vec::new();
        let mut page = 1_u32;
        let mut difficulty = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--max-questions" => {
                    let value = require_value(&mut args, "--max-questions")?;
                    settings = parse_max_questions(&settings, value)?;
                }
                "--page" => {
                    let value = require_value(&mut args, "--page")?;
                    page = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidPage { raw: value.clone() })?;
                }
                "--difficulty" => {
                    let value = require_value(&mut args, "--difficulty")?;
                    difficulty = Some(parse_difficulty(value)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or(ArgsError::MissingCommand)?;
        let command = match name.as_str() {
            "topics" => Command::Topics,
            "take" => Command::Take(parse_id("topic id", positional.next())?),
            "resume" => Command::Resume(parse_id("session key", positional.next())?),
            "retake" => Command::Retake(parse_id("session key", positional.next())?),
            "results" => Command::Results(parse_id("session key", positional.next())?),
            "practice" => Command::Practice {
                topic_id: parse_id("topic id", positional.next())?,
                page,
                difficulty,
            },
            "question" => Command::Question(parse_id("question id", positional.next())?),
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            settings,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so the quiz prompt on stdout stays readable.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}

enum Input {
    Answer(String),
    Next,
    Prev,
    GoTo(usize),
    Submit,
    Quit,
    Discard,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if let Some(literal) = line.strip_prefix('\\') {
        return Input::Answer(literal.to_owned());
    }
    match line {
        ":n" => Input::Next,
        ":p" => Input::Prev,
        ":s" => Input::Submit,
        ":q" => Input::Quit,
        ":d" => Input::Discard,
        _ => match line.strip_prefix(":g") {
            Some(rest) => match rest.trim().parse::<usize>() {
                Ok(n) if n > 0 => Input::GoTo(n - 1),
                _ => Input::Invalid(line.to_owned()),
            },
            None => Input::Answer(line.to_owned()),
        },
    }
}

async fn prompt(
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> std::io::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    lines.next_line().await
}

async fn play(quiz: &QuizSessionService, key: SessionKey) -> Result<(), Box<dyn std::error::Error>> {
    println!("Session {key}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match quiz.current_question(key).await {
            Ok(view) => render::question_view(&view),
            Err(SessionError::AlreadySubmitted) => {
                render::report(&quiz.get_report(key).await?);
                return Ok(());
            }
            Err(SessionError::QuestionNotFound(id)) => {
                println!();
                println!("Question {id} is no longer available; it will be scored as incorrect.");
            }
            Err(err) => return Err(err.into()),
        }

        let Some(line) = prompt(&mut lines).await? else {
            println!();
            println!("Progress saved. Resume with: quiz resume {key}");
            return Ok(());
        };

        match parse_input(&line) {
            Input::Answer(text) => {
                let session = quiz.submit_answer(key, &text).await?;
                if !session.is_last() {
                    quiz.navigate(key, Direction::Next).await?;
                }
            }
            Input::Next => {
                quiz.navigate(key, Direction::Next).await?;
            }
            Input::Prev => {
                quiz.navigate(key, Direction::Prev).await?;
            }
            Input::GoTo(index) => {
                quiz.go_to(key, index).await?;
            }
            Input::Submit => {
                let report = quiz.finish_session(key).await?;
                render::report(&report);
                println!();
                println!("Retake with: quiz retake {key}");
                return Ok(());
            }
            Input::Quit => {
                println!("Progress saved. Resume with: quiz resume {key}");
                return Ok(());
            }
            Input::Discard => {
                quiz.discard(key).await?;
                println!("Attempt discarded.");
                return Ok(());
            }
            Input::Invalid(raw) => println!("Unrecognised command: {raw}"),
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::system(), args.settings).await?;
    tracing::debug!(db = %args.db_url, "storage ready");

    match args.command {
        Command::Topics => render::topics(&app.practice().list_topics().await?),
        Command::Take(topic_id) => {
            let quiz = app.quiz();
            let (key, _) = quiz.create_session(topic_id).await?;
            play(&quiz, key).await?;
        }
        Command::Resume(key) => play(&app.quiz(), key).await?,
        Command::Retake(key) => {
            let quiz = app.quiz();
            let (new_key, _) = quiz.retake(key).await?;
            play(&quiz, new_key).await?;
        }
        Command::Results(key) => render::report(&app.quiz().get_report(key).await?),
        Command::Practice {
            topic_id,
            page,
            difficulty,
        } => render::practice_page(&app.practice().practice_page(topic_id, difficulty, page).await?),
        Command::Question(id) => render::question_detail(&app.practice().question_detail(id).await?),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_practice_with_filters() {
        let parsed = Args::parse_from(
            args(&["practice", "3", "--page", "2", "--difficulty", "Hard"]),
            Some("sqlite://quiz.db".into()),
            None,
        )
        .unwrap();
        assert_eq!(parsed.db_url, "sqlite://quiz.db");
        assert_eq!(
            parsed.command,
            Command::Practice {
                topic_id: TopicId::new(3),
                page: 2,
                difficulty: Some(Difficulty::Hard),
            }
        );
    }

    #[test]
    fn flags_override_environment() {
        let parsed = Args::parse_from(
            args(&["--max-questions", "4", "take", "1", "--db", "sqlite://other.db"]),
            Some("sqlite://quiz.db".into()),
            Some("7".into()),
        )
        .unwrap();
        assert_eq!(parsed.db_url, "sqlite://other.db");
        assert_eq!(parsed.settings.max_questions(), 4);
        assert_eq!(parsed.command, Command::Take(TopicId::new(1)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Args::parse_from(args(&[]), None, None).unwrap_err(),
            ArgsError::MissingCommand
        ));
        assert!(matches!(
            Args::parse_from(args(&["take", "x"]), None, None).unwrap_err(),
            ArgsError::InvalidId { .. }
        ));
        assert!(matches!(
            Args::parse_from(args(&["topics"]), None, Some("0".into())).unwrap_err(),
            ArgsError::Settings(_)
        ));
        assert!(matches!(
            Args::parse_from(args(&["practice", "1", "--difficulty", "4"]), None, None)
                .unwrap_err(),
            ArgsError::InvalidDifficulty { .. }
        ));
    }

    #[test]
    fn quiz_input_commands() {
        assert!(matches!(parse_input(" :n "), Input::Next));
        assert!(matches!(parse_input(":g 3"), Input::GoTo(2)));
        assert!(matches!(parse_input(":g 0"), Input::Invalid(_)));
        assert!(matches!(parse_input(" b "), Input::Answer(a) if a == "b"));
    }

    #[test]
    fn backslash_enters_command_text_as_answer() {
        assert!(matches!(parse_input("\\:n"), Input::Answer(a) if a == ":n"));
        assert!(matches!(parse_input(" \\:g 2 "), Input::Answer(a) if a == ":g 2"));
        assert!(matches!(parse_input("\\42"), Input::Answer(a) if a == "42"));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.sqlite3"));
    }
}
