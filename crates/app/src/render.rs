use quiz_core::model::{Question, ResultsReport};
use services::{PracticePage, QuestionDetail, QuestionView};
use storage::repository::TopicWithCount;

pub fn topics(topics: &[TopicWithCount]) {
    if topics.is_empty() {
        println!("No topics with questions yet. Run the seed binary to add some.");
        return;
    }
    for t in topics {
        println!(
            "{:>4}  {}  ({} questions)",
            t.topic.id().value(),
            t.topic.name(),
            t.question_count
        );
    }
}

fn question_body(question: &Question) {
    println!("{}", question.text());
    if let Some(options) = question.options() {
        for (label, text) in options.labelled() {
            println!("  {label}) {text}");
        }
    }
}

pub fn question_view(view: &QuestionView) {
    let q = &view.question;
    println!();
    println!(
        "Question {}/{}  [{}, {}]  answered {}/{}",
        view.number(),
        view.total,
        q.question_type().label(),
        q.difficulty().label(),
        view.answered,
        view.total
    );
    question_body(q);
    if let Some(answer) = &view.answer {
        println!("Your answer: {answer}");
    }
}

pub fn report(report: &ResultsReport) {
    println!();
    println!("Results for {}", report.topic_name());
    println!(
        "Score: {}/{} ({:.1}%)",
        report.score(),
        report.total(),
        report.percentage()
    );
    for (i, entry) in report.entries().iter().enumerate() {
        let mark = if entry.is_correct { "correct" } else { "wrong" };
        println!();
        if entry.is_missing() {
            println!("{}. (question no longer available) [{mark}]", i + 1);
        } else {
            println!("{}. {} [{mark}]", i + 1, entry.question_text);
        }
        if let Some(options) = &entry.options {
            for (label, text) in options.labelled() {
                println!("     {label}) {text}");
            }
        }
        println!("   Your answer:    {}", entry.user_answer_display());
        if !entry.is_missing() {
            println!("   Correct answer: {}", entry.correct_answer_display);
        }
        if let Some(solution) = &entry.solution {
            println!("   Solution: {solution}");
        }
    }
}

pub fn practice_page(page: &PracticePage) {
    let filter = page
        .difficulty
        .map_or_else(|| "all levels".to_owned(), |d| d.label().to_owned());
    println!(
        "{} ({filter}): page {}/{}, {} questions",
        page.topic.name(),
        page.page,
        page.total_pages,
        page.total_questions
    );
    for q in &page.questions {
        println!();
        println!("#{} [{}, {}]", q.id(), q.question_type().label(), q.difficulty().label());
        question_body(q);
        println!("  Answer: {}", q.correct_answer_display());
    }
}

pub fn question_detail(detail: &QuestionDetail) {
    let q = &detail.question;
    println!(
        "{} / #{} [{}, {}]",
        detail.topic.name(),
        q.id(),
        q.question_type().label(),
        q.difficulty().label()
    );
    question_body(q);
    println!("Answer: {}", q.correct_answer_display());
    if let Some(solution) = q.solution() {
        println!("Solution: {solution}");
    }
    if !detail.related.is_empty() {
        println!();
        println!("Related:");
        for r in &detail.related {
            println!("  #{}  {}", r.id(), r.text());
        }
    }
}
