use animal_lens_lib::commands::{classifier, progress, quiz};
use animal_lens_lib::models::quiz_types::{Difficulty, QuizQuestion};
use animal_lens_lib::{AppConfig, AppState};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "animal-lens", about = "Recognize animals, play the quiz and browse your zoo")]
struct Args {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the model path
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Override the class names file
    #[arg(long, global = true)]
    classes: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recognize the animal in a photo
    Recognize { image: PathBuf },
    /// Guess the animal shown in example photos
    Quiz {
        #[arg(long, value_enum, default_value = "easy")]
        difficulty: Level,
    },
    /// Show unlocked animals
    Zoo,
    /// Show recognition and quiz statistics
    Stats,
    /// Forget unlocked animals and statistics
    Reset,
    /// Show whether the model can be loaded
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Easy,
    Medium,
    Hard,
}

impl From<Level> for Difficulty {
    fn from(level: Level) -> Self {
        match level {
            Level::Easy => Difficulty::Easy,
            Level::Medium => Difficulty::Medium,
            Level::Hard => Difficulty::Hard,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    animal_lens_lib::init_tracing();

    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model.model_path = model;
    }
    if let Some(classes) = args.classes {
        config.model.class_names_path = classes;
    }

    let state = AppState::initialize(config);

    match args.command {
        Command::Recognize { image } => {
            if classifier::is_recognizing(&state) {
                anyhow::bail!("A recognition is already running");
            }
            if let Err(e) = classifier::load_model(&state) {
                eprintln!("Model failed to load ({}); retrying on first use", e);
            }
            let outcome = classifier::start_recognition(&state, image)?.wait_blocking()?;
            if args.json {
                return print_json(&outcome);
            }
            println!("Results for {}:\n", outcome.file_path.display());
            for (i, p) in outcome.predictions.iter().enumerate() {
                println!("{}. {}: {:.2}%", i + 1, p.class_name, p.confidence * 100.0);
            }
            if let Some(animal) = outcome.newly_unlocked {
                println!("\nNew animal unlocked: {}", animal);
            }
            if let Some(e) = outcome.persist_error {
                eprintln!("Progress not saved: {}", e);
            }
        }
        Command::Quiz { difficulty } => run_quiz(&state, difficulty.into())?,
        Command::Zoo => {
            let zoo = progress::get_zoo_summary(&state);
            if args.json {
                return print_json(&zoo);
            }
            println!(
                "Unlocked: {}/{} animals ({:.1}%)\n",
                zoo.unlocked, zoo.total, zoo.percent
            );
            for entry in &zoo.entries {
                let name = if entry.unlocked { entry.name.as_str() } else { "???" };
                let mark = if entry.unlocked { "unlocked" } else { "locked" };
                println!("  {:<20} {}", name, mark);
            }
        }
        Command::Stats => {
            let stats = progress::get_user_stats(&state);
            if args.json {
                return print_json(&stats);
            }
            println!(
                "Unlocked animals: {}/{} | Recognitions: {} | Quiz score: {}",
                stats.animals_unlocked,
                state.labels.len(),
                stats.total_recognitions,
                stats.correct_guesses
            );
            if let Some(last) = stats.last_played {
                println!("Last played: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        Command::Reset => {
            progress::reset_progress(&state)?;
            println!("Progress reset.");
        }
        Command::Status => {
            let _ = classifier::load_model(&state);
            let status = classifier::get_model_status(&state);
            if args.json {
                return print_json(&status);
            }
            println!(
                "model file present: {} | ready: {} | classes: {} | error: {}",
                status.downloaded,
                status.ready,
                status
                    .output_width
                    .map_or_else(|| "unknown".to_string(), |w| w.to_string()),
                status.error.as_deref().unwrap_or("none")
            );
        }
    }

    Ok(())
}

fn ask_question(question: &QuizQuestion) {
    println!("\nQuestion {}/{}", question.number, question.total);
    match &question.image {
        Some(image) => println!("Photo: {}", image.display()),
        None => println!("(no photo available for this animal)"),
    }
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}) {}", i + 1, option);
    }
    print!("Your answer: ");
    let _ = std::io::stdout().flush();
}

/// Accept either the option number or the animal name.
fn resolve_answer(question: &QuizQuestion, input: &str) -> String {
    let input = input.trim();
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.options.get(i).cloned())
        .unwrap_or_else(|| input.to_string())
}

fn run_quiz(state: &AppState, difficulty: Difficulty) -> anyhow::Result<()> {
    let mut question = quiz::start_game(state, difficulty)?;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        ask_question(&question);
        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let answer = resolve_answer(&question, &line?);
        let outcome = quiz::check_answer(state, &answer)?;

        if outcome.correct {
            println!("Correct!");
        } else {
            println!("Wrong! The right answer was {}", outcome.correct_answer);
        }
        if let Some(e) = outcome.persist_error {
            eprintln!("Progress not saved: {}", e);
        }

        if outcome.finished {
            let zoo = progress::get_zoo_summary(state);
            println!(
                "\nGame over. Score: {}/{} | Zoo: {}/{}",
                outcome.score, question.total, zoo.unlocked, zoo.total
            );
            return Ok(());
        }

        question = match quiz::current_question(state) {
            Some(q) => q,
            None => return Ok(()),
        };
    }
}
