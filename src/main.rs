use anyhow::Context;
use exodus::ai::{GroqClient, OllamaClient, Provider};
use exodus::attachments::{self, FileAttachments};
use exodus::config::{self, AppConfig};
use exodus::logging::{self, LogBuffer};
use exodus::network::TcpProbe;
use exodus::prefs::UserPreferences;
use exodus::repository::ChatRepository;
use exodus::session::ChatSession;
use exodus::types::Attachment;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "\
Commands:
  /models              list installed models
  /model <name>        select a model
  /provider [name]     show or set provider (auto, groq, ollama)
  /key <key>|clear     save and test a Groq API key, or remove it
  /attach <path>       attach a file to the next message
  /pull <name>         ask Ollama to download a model
  /clear               clear the conversation
  /logs [n]            show recent log entries
  /quit                exit";

fn parse_provider(value: &str) -> Provider {
    match value.trim().to_ascii_lowercase().as_str() {
        "groq" | "online" | "cloud" => Provider::GroqOnline,
        "ollama" | "local" => Provider::OllamaLocal,
        other => Provider::from_name(other),
    }
}

struct Terminal {
    session: ChatSession,
    logs: LogBuffer,
    pending: Vec<Attachment>,
}

impl Terminal {
    /// Returns false when the user asked to quit.
    async fn handle(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        let Some(command) = line.strip_prefix('/') else {
            self.send(line).await;
            return true;
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));

        match name {
            "quit" | "exit" => return false,
            "help" => println!("{HELP}"),
            "models" => {
                self.session.load_available_models().await;
                let selected = self.session.selected_model().map(|m| m.name.clone());
                for model in self.session.available_models() {
                    let marker = if Some(&model.name) == selected.as_ref() { "*" } else { " " };
                    println!("{marker} {} ({})", model.name, model.size);
                }
            }
            "model" => match self.session.select_model(arg) {
                Some(model) => println!("Using {}", model.display_name),
                None => self.report_error(),
            },
            "provider" => {
                if !arg.is_empty() {
                    self.session.select_provider(parse_provider(arg));
                    self.report_error();
                }
                let provider = self.session.selected_provider();
                println!("{}: {}", provider.display_name(), provider.description());
            }
            "key" => self.set_key(arg).await,
            "attach" => self.attach(arg),
            "pull" if !arg.is_empty() => println!("{}", self.session.download_model(arg).await),
            "clear" => {
                self.session.clear_messages();
                self.pending.clear();
                println!("Conversation cleared");
            }
            "logs" => {
                let count = arg.parse().unwrap_or(20);
                for entry in self.logs.recent(count) {
                    println!("{entry}");
                }
            }
            _ => println!("Unknown command. {HELP}"),
        }
        true
    }

    async fn send(&mut self, text: &str) {
        let attachments = std::mem::take(&mut self.pending);
        match self.session.send_message(text, attachments).await {
            Some(reply) => println!("\n{}\n", reply.content),
            None => println!("No model selected. Use /models and /model <name>."),
        }
    }

    async fn set_key(&mut self, arg: &str) {
        if arg.is_empty() || arg == "clear" {
            self.session.update_groq_api_key("");
            println!("Groq API key removed");
            return;
        }
        self.session.update_groq_api_key(arg);
        if self.session.test_groq_api_key(arg).await {
            println!("Groq API key saved and verified");
        } else {
            println!("Groq API key saved, but a test request failed");
        }
    }

    fn attach(&mut self, arg: &str) {
        match attachments::create_attachment(Path::new(arg)) {
            Ok(attachment) if !attachments::is_sendable(&attachment) => println!(
                "Cannot attach {}: {} files are not sent, only images and documents",
                attachment.file_name, attachment.mime_type
            ),
            Ok(attachment) if attachments::is_valid_attachment(&attachment) => {
                println!(
                    "Attached {} ({}, {})",
                    attachment.file_name,
                    attachment.kind,
                    attachments::format_file_size(attachment.size)
                );
                self.pending.push(attachment);
            }
            Ok(attachment) => println!(
                "Cannot attach {}: larger than 10 MB or unreadable",
                attachment.file_name
            ),
            Err(err) => println!("Cannot attach {arg}: {err}"),
        }
    }

    fn report_error(&mut self) {
        if let Some(message) = self.session.error_message() {
            println!("{message}");
        }
        self.session.clear_error();
    }
}

async fn run(config: AppConfig, logs: LogBuffer) -> anyhow::Result<()> {
    let preferences = match &config.preferences_path {
        Some(path) => UserPreferences::open(path),
        None => UserPreferences::open_default(),
    }
    .context("failed to open preferences")?;
    tracing::info!("preferences at {}", preferences.path().display());

    let repository = ChatRepository::new(
        Arc::new(OllamaClient::with_timeouts(
            config.ollama_base_url.clone(),
            config.ollama_connect_timeout,
            config.ollama_read_timeout,
        )),
        Arc::new(GroqClient::with_timeouts(
            config.groq_base_url.clone(),
            config.groq_model.clone(),
            config.groq_connect_timeout,
            config.groq_read_timeout,
        )),
        Arc::new(FileAttachments),
        Arc::new(TcpProbe::new(config.network_probe_addr.clone())),
    );

    let mut terminal = Terminal {
        session: ChatSession::new(repository, Arc::new(preferences)),
        logs,
        pending: Vec::new(),
    };
    terminal.session.load_available_models().await;

    let provider = terminal.session.selected_provider();
    println!("Exodus - {} via {}", env!("CARGO_PKG_VERSION"), provider.display_name());
    if let Some(model) = terminal.session.selected_model() {
        println!("Model: {}", model.display_name);
    }
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !terminal.handle(&line).await {
            break;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Before the runtime exists, so no other thread reads the environment.
    config::load_environment().context("failed to read bundled configuration")?;
    let config = AppConfig::from_env();
    let logs = logging::init(&config.log_filter);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(config, logs))
}
