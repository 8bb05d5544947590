use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutor_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use tutor_contracts::models::ModelSelector;
use tutor_contracts::turns::{
    describe_image, project_history, render_transcript_markdown, render_turn_markdown, Author,
    Turn,
};
use tutor_engine::config::parse_timeout_secs;
use tutor_engine::{
    default_service_registry, load_env_file, load_image_attachment, ChatSession,
    CompletionService, PendingUpload, RenderAdapter, ServiceRegistry, SessionSummary, Submission,
    TurnDispatcher, TutorConfig, TUTOR_TAGLINE, TUTOR_TITLE,
};

#[derive(Debug, Parser)]
#[command(name = "tutor-rs", version, about = "O-Level Physics AI Tutor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Ask(AskArgs),
}

#[derive(Debug, Default, Args)]
struct SessionArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    env_file: Option<PathBuf>,
    #[arg(long)]
    instruction_file: Option<PathBuf>,
    #[arg(long)]
    request_timeout_secs: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct AskArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: Option<PathBuf>,
    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("tutor-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Ask(args) => run_ask(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TUTOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_config(args: &SessionArgs) -> Result<TutorConfig> {
    if let Some(path) = args.env_file.as_deref() {
        let loaded = load_env_file(path)?;
        info!(path = %path.display(), loaded, "loaded env file");
    }
    apply_overrides(TutorConfig::from_env()?, args)
}

fn apply_overrides(mut config: TutorConfig, args: &SessionArgs) -> Result<TutorConfig> {
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        config.model = model.to_string();
    }
    if let Some(raw) = args.request_timeout_secs.as_deref() {
        config.request_timeout = parse_timeout_secs(raw)?;
    }
    if let Some(path) = args.instruction_file.as_deref() {
        config = config.with_instruction_file(path)?;
    }
    Ok(config)
}

struct Backend {
    registry: ServiceRegistry,
    selector: ModelSelector,
}

struct ResolvedModel {
    service: Arc<dyn CompletionService>,
    model: String,
    vision: bool,
    note: Option<String>,
}

impl Backend {
    fn new(config: &TutorConfig) -> Result<Self> {
        Ok(Self {
            registry: default_service_registry(config)?,
            selector: ModelSelector::default(),
        })
    }

    fn resolve(&self, requested: &str) -> Result<ResolvedModel> {
        let selection = self.selector.select(requested)?;
        let Some(service) = self.registry.get(&selection.provider) else {
            bail!(
                "no service registered for provider '{}' (available: {})",
                selection.provider,
                self.registry.names().join(", ")
            );
        };
        Ok(ResolvedModel {
            service,
            model: selection.model,
            vision: selection.vision,
            note: selection.note,
        })
    }
}

/// Prints new turns as they land in the session.
///
/// Tracks how many turns have been drawn; a shorter snapshot means the
/// session was reset and drawing starts over.
struct TerminalRenderer<W: Write> {
    out: W,
    drawn: usize,
}

impl<W: Write> TerminalRenderer<W> {
    fn new(out: W) -> Self {
        Self { out, drawn: 0 }
    }

    fn draw(&mut self, turns: &[Turn]) -> io::Result<()> {
        if turns.len() < self.drawn {
            self.drawn = 0;
            writeln!(self.out, "-- conversation cleared --")?;
        }
        for turn in &turns[self.drawn..] {
            writeln!(self.out, "{}", render_turn_markdown(turn))?;
        }
        if turns.len() > self.drawn
            && turns.last().map(|turn| turn.author) == Some(Author::User)
        {
            writeln!(self.out, "(tutor is thinking...)")?;
        }
        self.drawn = turns.len();
        self.out.flush()
    }
}

impl<W: Write> RenderAdapter for TerminalRenderer<W> {
    fn render(&mut self, turns: &[Turn]) {
        if let Err(err) = self.draw(turns) {
            warn!(error = %err, "failed to draw transcript");
        }
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = build_config(&args.session)?;
    let backend = Backend::new(&config)?;
    let resolved = backend.resolve(&config.model)?;
    if let Some(note) = resolved.note.as_deref() {
        println!("{note}");
    }
    let mut vision = resolved.vision;
    let mut options = config.model_options();
    options.model = resolved.model;
    let mut dispatcher = TurnDispatcher::new(resolved.service, options);

    let mut session = ChatSession::init(args.session.events.clone());
    let mut pending = PendingUpload::new();
    let mut renderer = TerminalRenderer::new(io::stdout());

    let stdin = io::stdin();
    let mut line = String::new();

    println!("{TUTOR_TITLE}");
    println!("{TUTOR_TAGLINE}");
    println!(
        "Model: {} ({}). Type /help for commands.",
        dispatcher.options().model,
        dispatcher.provider()
    );

    loop {
        print!("{}", prompt_prefix(&pending));
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "attach_image" => {
                let Some(path) = value_as_non_empty_string(intent.command_args.get("path")) else {
                    println!("Usage: /attach <path>");
                    continue;
                };
                match load_image_attachment(Path::new(&path)) {
                    Ok(image) => {
                        println!(
                            "Attached {}. It will be sent with your next question.",
                            describe_image(&image)
                        );
                        if pending.set(image).is_some() {
                            println!("Replaced the previously attached image.");
                        }
                        if !vision {
                            println!(
                                "Note: {} is not listed as image-capable.",
                                dispatcher.options().model
                            );
                        }
                    }
                    Err(err) => println!("Could not attach image: {err:#}"),
                }
            }
            "detach_image" => {
                if pending.clear() {
                    println!("Attached image removed.");
                } else {
                    println!("No image attached.");
                }
            }
            "set_model" => {
                let Some(name) = value_as_non_empty_string(intent.command_args.get("model")) else {
                    println!(
                        "Model: {} ({})",
                        dispatcher.options().model,
                        dispatcher.provider()
                    );
                    continue;
                };
                match backend.resolve(&name) {
                    Ok(resolved) => {
                        if let Some(note) = resolved.note.as_deref() {
                            println!("{note}");
                        }
                        vision = resolved.vision;
                        dispatcher.set_model(resolved.service, resolved.model);
                        println!(
                            "Model set to {} ({}).",
                            dispatcher.options().model,
                            dispatcher.provider()
                        );
                    }
                    Err(err) => println!("Model unchanged: {err:#}"),
                }
            }
            "reset" => {
                session.reset();
                renderer.render(session.snapshot());
            }
            "show_history" => {
                let history = project_history(session.snapshot());
                println!("{}", serde_json::to_string_pretty(&history)?);
            }
            "export_transcript" => {
                let Some(path) = value_as_non_empty_string(intent.command_args.get("path")) else {
                    println!("Usage: /export <path>");
                    continue;
                };
                match export_transcript(Path::new(&path), session.snapshot()) {
                    Ok(()) => println!("Transcript written to {path}"),
                    Err(err) => println!("Export failed: {err:#}"),
                }
            }
            "quit" => break,
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
            "submit" => {
                let Some(submission) =
                    Submission::from_pending(intent.prompt.unwrap_or_default(), &mut pending)
                else {
                    continue;
                };
                if let Err(err) = dispatcher.dispatch(&mut session, submission, &mut renderer) {
                    println!("{}", err.user_notice());
                }
            }
            other => warn!(action = other, "unhandled chat action"),
        }
    }

    println!("{}", describe_summary(&session.teardown()));
    Ok(())
}

fn prompt_prefix(pending: &PendingUpload) -> String {
    match pending.current_file() {
        Some(image) => format!("{} > ", describe_image(image)),
        None => "> ".to_string(),
    }
}

fn describe_summary(summary: &SessionSummary) -> String {
    format!(
        "Session {} ({} to {}): {} turn(s), {} answered, {} failed, {} reset(s).",
        summary.session_id,
        summary.started_at,
        summary.finished_at,
        summary.turns,
        summary.completed_cycles,
        summary.failed_cycles,
        summary.resets
    )
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let config = build_config(&args.session)?;
    let backend = Backend::new(&config)?;
    let resolved = backend.resolve(&config.model)?;
    if let Some(note) = resolved.note.as_deref() {
        eprintln!("{note}");
    }
    let mut options = config.model_options();
    options.model = resolved.model;
    let dispatcher = TurnDispatcher::new(resolved.service, options);

    let mut pending = PendingUpload::new();
    if let Some(path) = args.image.as_deref() {
        pending.set(load_image_attachment(path)?);
    }
    let Some(submission) = Submission::from_pending(args.prompt, &mut pending) else {
        bail!("--prompt must not be blank");
    };

    let mut session = ChatSession::init(args.session.events.clone());
    let mut renderer = TerminalRenderer::new(io::stdout());
    let code = match dispatcher.dispatch(&mut session, submission, &mut renderer) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{}", err.user_notice());
            eprintln!("tutor-rs error: {err}");
            1
        }
    };
    session.teardown();
    Ok(code)
}

fn export_transcript(path: &Path, turns: &[Turn]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, render_transcript_markdown(TUTOR_TITLE, turns))
        .with_context(|| format!("failed to write {}", path.display()))
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tutor_contracts::turns::ImageAttachment;

    use super::*;

    fn rendered(renderer: &TerminalRenderer<Vec<u8>>) -> String {
        String::from_utf8_lossy(&renderer.out).into_owned()
    }

    #[test]
    fn renderer_draws_only_new_turns() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let mut turns = vec![Turn::user_text("What is velocity?")];
        renderer.render(&turns);
        turns.push(Turn::assistant_text("Think about direction."));
        renderer.render(&turns);

        let out = rendered(&renderer);
        assert_eq!(out.matches("What is velocity?").count(), 1);
        assert_eq!(out.matches("(tutor is thinking...)").count(), 1);
        assert!(out.contains("**Tutor:**\nThink about direction."));
    }

    #[test]
    fn renderer_restarts_after_reset() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render(&[
            Turn::user_text("What is velocity?"),
            Turn::assistant_text("Think about direction."),
        ]);
        renderer.render(&[]);
        renderer.render(&[Turn::user_text("What is a lens?")]);

        let out = rendered(&renderer);
        assert!(out.contains("-- conversation cleared --"));
        assert!(out.contains("What is a lens?"));
        assert_eq!(renderer.drawn, 1);
    }

    #[test]
    fn renderer_describes_image_turns() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render(&[Turn::user_with_image(
            "Explain this circuit",
            ImageAttachment::new("image/png", vec![0; 12]),
        )]);
        assert!(rendered(&renderer).contains("[image: image/png, 12 bytes]"));
    }

    #[test]
    fn flags_override_config() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let instruction = temp.path().join("rules.txt");
        fs::write(&instruction, "Only use SI units.\n")?;
        let args = SessionArgs {
            model: Some(" dryrun-tutor-1 ".to_string()),
            request_timeout_secs: Some("30".to_string()),
            instruction_file: Some(instruction),
            ..SessionArgs::default()
        };
        let config = apply_overrides(TutorConfig::default(), &args)?;
        assert_eq!(config.model, "dryrun-tutor-1");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert!(config.system_instruction.contains("SI units"));
        Ok(())
    }

    #[test]
    fn bad_timeout_flag_is_rejected() {
        let args = SessionArgs {
            request_timeout_secs: Some("soon".to_string()),
            ..SessionArgs::default()
        };
        assert!(apply_overrides(TutorConfig::default(), &args).is_err());
    }

    #[test]
    fn resolve_routes_models_to_their_service() -> anyhow::Result<()> {
        let backend = Backend::new(&TutorConfig::default())?;

        let dryrun = backend.resolve("dryrun-tutor-1")?;
        assert_eq!(dryrun.service.name(), "dryrun");
        assert!(dryrun.note.is_none());

        let listed = backend.resolve("gemini-2.5-pro")?;
        assert_eq!(listed.service.name(), "gemini");
        assert!(listed.vision);

        let unlisted = backend.resolve("gemini-exp-1206")?;
        assert_eq!(unlisted.service.name(), "gemini");
        assert_eq!(unlisted.model, "gemini-exp-1206");
        assert!(unlisted.note.is_some());

        let unknown = backend.resolve("gpt-5")?;
        assert_eq!(unknown.model, "gemini-flash-latest");
        assert!(unknown.note.is_some());
        Ok(())
    }

    #[test]
    fn prompt_shows_pending_image() {
        let mut pending = PendingUpload::new();
        assert_eq!(prompt_prefix(&pending), "> ");
        pending.set(ImageAttachment::new("image/png", vec![0; 12]).with_name("circuit.png"));
        assert_eq!(
            prompt_prefix(&pending),
            "[image: circuit.png, image/png, 12 bytes] > "
        );
    }

    #[test]
    fn summary_line_reports_span_and_counts() {
        let summary = SessionSummary {
            session_id: "session-1".to_string(),
            started_at: "2026-01-01T00:00:00.000000+00:00".to_string(),
            finished_at: "2026-01-01T00:05:00.000000+00:00".to_string(),
            turns: 4,
            completed_cycles: 2,
            failed_cycles: 1,
            resets: 0,
        };
        let line = describe_summary(&summary);
        assert!(line.starts_with("Session session-1 (2026-01-01T00:00:00.000000+00:00 to "));
        assert!(line.ends_with("4 turn(s), 2 answered, 1 failed, 0 reset(s)."));
    }

    #[test]
    fn export_writes_markdown_transcript() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out").join("transcript.md");
        export_transcript(
            &path,
            &[
                Turn::user_text("What is velocity?"),
                Turn::assistant_text("Think about direction."),
            ],
        )?;
        let raw = fs::read_to_string(&path)?;
        assert!(raw.starts_with("# O-Level Physics AI Tutor"));
        assert!(raw.contains("**You:**\nWhat is velocity?"));
        Ok(())
    }
}
