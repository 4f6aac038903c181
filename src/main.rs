use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fingerprint_reader::capture::{TerminalInput, WebcamDevice};
use fingerprint_reader::{
    CancelReason, IdentificationService, JsonFileStore, Outcome, ReaderConfig, StudentProfile,
};
use std::path::PathBuf;

type Service = IdentificationService<WebcamDevice, JsonFileStore>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Students table (JSON document)
    #[arg(short, long, default_value = "students.json")]
    store: PathBuf,

    /// Camera device index (overrides the config file)
    #[arg(long)]
    camera: Option<u32>,

    /// Similarity threshold in [0, 1] (overrides the config file)
    #[arg(long)]
    threshold: Option<f64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive menu (default)
    Menu,
    /// Scan a finger and identify the student
    Identify,
    /// Scan a finger and enroll it for a student
    Enroll {
        #[arg(long)]
        student_id: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => ReaderConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    if let Some(threshold) = args.threshold {
        config.matching.threshold = threshold;
    }

    tracing::info!("Fingerprint reader starting");
    tracing::info!("Camera: {}", config.camera.index);
    tracing::info!("Store: {}", args.store.display());
    tracing::info!("Threshold: {:.2}", config.matching.threshold);

    let camera = WebcamDevice::new(config.camera.clone());
    let store = JsonFileStore::new(&args.store);
    let mut service =
        IdentificationService::new(config, camera, store).context("Invalid configuration")?;
    let mut input = TerminalInput::spawn();

    match args.command.unwrap_or(Command::Menu) {
        Command::Menu => run_menu(&mut service, &mut input),
        Command::Identify => {
            prompt_capture();
            let outcome = service
                .identify(&mut input)
                .context("Identification failed")?;
            print_outcome(&outcome);
            Ok(())
        }
        Command::Enroll { student_id } => {
            prompt_capture();
            let outcome = service
                .enroll(&student_id, &mut input)
                .with_context(|| format!("Enrollment failed for {student_id}"))?;
            print_outcome(&outcome);
            Ok(())
        }
    }
}

fn run_menu(service: &mut Service, input: &mut TerminalInput) -> Result<()> {
    println!("Student Fingerprint Reader");
    println!("{}", "=".repeat(26));

    loop {
        println!();
        println!("Choose an option:");
        println!("1. Scan fingerprint to identify student");
        println!("2. Enroll new fingerprint");
        println!("3. Quit");

        let Some(choice) = input.read_line() else {
            break;
        };
        match choice.trim().to_ascii_lowercase().as_str() {
            "1" => {
                prompt_capture();
                match service.identify(input) {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => println!("Identification failed: {e}"),
                }
            }
            "2" => {
                println!("Enter student ID to enroll:");
                let Some(student_id) = input.read_line() else {
                    break;
                };
                let student_id = student_id.trim();
                if student_id.is_empty() {
                    println!("Invalid student ID");
                    continue;
                }
                prompt_capture();
                match service.enroll(student_id, input) {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => println!("Enrollment failed: {e}"),
                }
            }
            "3" | "q" | "quit" => break,
            _ => println!("Invalid choice. Please try again."),
        }
    }

    tracing::info!("Fingerprint reader closed");
    Ok(())
}

fn prompt_capture() {
    println!("Place your finger on the camera lens.");
    println!("Press Enter (or 'c') to capture, 'q' to cancel.");
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Matched {
            result, profile, ..
        } => {
            println!("Match found (similarity {:.2})", result.score);
            match profile {
                Some(profile) => print_profile(profile),
                None => println!("Student ID: {}", result.student_id),
            }
        }
        Outcome::NotFound { best, .. } => {
            let best_score = best.as_ref().map_or(0.0, |b| b.score);
            println!("No matching student found (best similarity {best_score:.2})");
        }
        Outcome::Enrolled { student_id } => {
            println!("Fingerprint enrolled for {student_id}");
        }
        Outcome::Cancelled(CancelReason::Operator) => println!("Capture cancelled"),
        Outcome::Cancelled(CancelReason::Timeout) => println!("Capture timed out"),
    }
}

fn print_profile(profile: &StudentProfile) {
    let optional = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("Student details:");
    println!("{}", "-".repeat(30));
    println!("Student Id: {}", profile.student_id);
    println!("Name: {} {}", profile.first_name, profile.last_name);
    println!("Email: {}", optional(&profile.email));
    println!("Phone: {}", optional(&profile.phone));
    println!("Department: {}", optional(&profile.department));
    println!(
        "Year Of Study: {}",
        profile
            .year_of_study
            .map_or_else(|| "-".to_string(), |y| y.to_string())
    );
    println!("Enrollment Date: {}", optional(&profile.enrollment_date));
    println!("Status: {}", profile.status);
}
