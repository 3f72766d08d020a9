//! `docchat chat`: interactive terminal chat over one session, or a
//! one-shot question with `--message`.

use std::io::Write;
use std::path::{Path, PathBuf};

use docchat_agent::{Connectivity, Session, SessionFactory};
use docchat_config::AppConfig;
use docchat_core::file::UploadedFile;
use docchat_core::message::Message;
use tokio::io::AsyncBufReadExt;

const HELP: &str = "\
  Commands:
    /upload <path>...   Upload files (not selected until /select)
    /files              List uploaded files
    /select <name>...   Use these files as context (no names = none)
    /rm <name>          Remove one file
    /clear-files        Remove all files
    /new                Start a new conversation
    /clear              Clear chat history
    /export [path]      Save the transcript (default: chat_history_<ts>.txt)
    /stats              Show file and message counts
    /help               Show this help
    /quit               Exit
  Quote names or paths that contain spaces: /select \"my report.txt\"
  Anything else is sent as a question about the selected files.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Upload(Vec<PathBuf>),
    Files,
    Select(Vec<String>),
    Remove(String),
    ClearFiles,
    NewConversation,
    ClearHistory,
    Export(Option<PathBuf>),
    Stats,
    Help,
    Quit,
    Ask(String),
    Empty,
    Invalid(String),
}

/// Split command arguments on whitespace. Single or double quotes keep
/// spaces inside one argument: `/select "my report.txt" data.csv`.
fn split_args(rest: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in rest.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unclosed {q} quote"));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

pub fn parse(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if !line.starts_with('/') {
        return ReplCommand::Ask(line.to_string());
    }

    let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let mut args = match split_args(rest) {
        Ok(args) => args,
        Err(e) => return ReplCommand::Invalid(e),
    };

    match cmd {
        "/upload" if args.is_empty() => ReplCommand::Invalid("usage: /upload <path>...".into()),
        "/upload" => ReplCommand::Upload(args.into_iter().map(PathBuf::from).collect()),
        "/files" => ReplCommand::Files,
        "/select" => ReplCommand::Select(args),
        "/rm" if args.len() != 1 => {
            ReplCommand::Invalid("usage: /rm <name> (quote names with spaces)".into())
        }
        "/rm" => ReplCommand::Remove(args.remove(0)),
        "/clear-files" => ReplCommand::ClearFiles,
        "/new" => ReplCommand::NewConversation,
        "/clear" => ReplCommand::ClearHistory,
        "/export" if args.len() > 1 => {
            ReplCommand::Invalid("usage: /export [path] (quote paths with spaces)".into())
        }
        "/export" => ReplCommand::Export(args.pop().map(PathBuf::from)),
        "/stats" => ReplCommand::Stats,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("unknown command {other}; try /help")),
    }
}

/// Read a file from disk and upload it. Size and name are checked before
/// the file is read.
pub async fn upload_path(
    session: &mut Session,
    path: &Path,
) -> Result<UploadedFile, Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("not a file name: {}", path.display()))?
        .to_string();
    let size_bytes = tokio::fs::metadata(path).await?.len();
    session.check_upload(&name, size_bytes)?;

    let bytes = tokio::fs::read(path).await?;
    Ok(session.upload(bytes, &name, size_bytes).await?)
}

fn print_reply(out: &mut impl Write, reply: &Message) -> std::io::Result<()> {
    writeln!(out)?;
    for line in reply.content.lines() {
        writeln!(out, "  Assistant > {line}")?;
    }
    writeln!(out)
}

/// Run one command. Returns `false` when the REPL should exit.
pub async fn execute(
    session: &mut Session,
    command: ReplCommand,
    out: &mut impl Write,
) -> std::io::Result<bool> {
    match command {
        ReplCommand::Empty => {}
        ReplCommand::Quit => return Ok(false),
        ReplCommand::Help => writeln!(out, "{HELP}")?,
        ReplCommand::Invalid(msg) => writeln!(out, "  [Error] {msg}")?,
        ReplCommand::Upload(paths) => {
            for path in paths {
                match upload_path(session, &path).await {
                    Ok(file) => writeln!(
                        out,
                        "  ✅ {} {} ({})",
                        file.icon(),
                        file.name,
                        file.formatted_size()
                    )?,
                    Err(e) => writeln!(out, "  [Error] {}: {e}", path.display())?,
                }
            }
        }
        ReplCommand::Files => {
            if session.files().is_empty() {
                writeln!(out, "  No files uploaded.")?;
            }
            for f in session.files() {
                let mark = if session.is_selected(&f.name) { "x" } else { " " };
                writeln!(
                    out,
                    "  [{mark}] {} {}  {}  {}",
                    f.icon(),
                    f.name,
                    f.formatted_size(),
                    f.uploaded_time()
                )?;
            }
            writeln!(
                out,
                "  Files are removed automatically after {} hours.",
                session.retention_hours()
            )?;
        }
        ReplCommand::Select(names) => match session.select(names) {
            Ok(selection) if selection.is_empty() => writeln!(out, "  No files selected.")?,
            Ok(selection) => writeln!(
                out,
                "  📋 Using {} file(s): {}",
                selection.len(),
                selection.names().join(", ")
            )?,
            Err(e) => writeln!(out, "  [Error] {e}")?,
        },
        ReplCommand::Remove(name) => match session.remove_file(&name) {
            Ok(file) => writeln!(out, "  Removed {}", file.name)?,
            Err(e) => writeln!(out, "  [Error] {e}")?,
        },
        ReplCommand::ClearFiles => match session.clear_files() {
            Ok(n) => writeln!(out, "  Removed {n} file(s)")?,
            Err(e) => writeln!(out, "  [Error] {e}")?,
        },
        ReplCommand::NewConversation => {
            session.new_conversation();
            writeln!(out, "  🆕 New conversation")?;
        }
        ReplCommand::ClearHistory => {
            session.clear_history();
            writeln!(out, "  Chat history cleared")?;
        }
        ReplCommand::Export(path) => {
            if session.messages().is_empty() {
                writeln!(out, "  Nothing to export yet.")?;
            } else {
                let transcript = session.export();
                let path = path.unwrap_or_else(|| PathBuf::from(&transcript.filename));
                match tokio::fs::write(&path, transcript.body).await {
                    Ok(()) => writeln!(out, "  📥 Saved {}", path.display())?,
                    Err(e) => writeln!(out, "  [Error] {}: {e}", path.display())?,
                }
            }
        }
        ReplCommand::Stats => {
            let stats = session.stats();
            writeln!(
                out,
                "  📊 Files: {} ({} selected)  Messages: {}",
                stats.files, stats.selected, stats.messages
            )?;
        }
        ReplCommand::Ask(prompt) => match session.ask(&prompt).await {
            Ok(reply) => print_reply(out, &reply)?,
            Err(e) => writeln!(out, "  [Error] {e}")?,
        },
    }
    Ok(true)
}

pub async fn run(
    files: Vec<PathBuf>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mut session = SessionFactory::from_config(&config).new_session();

    if let Connectivity::Disconnected { reason } = session.connectivity() {
        eprintln!();
        eprintln!("  ❌ {reason}");
        eprintln!();
        eprintln!("  Set GEMINI_API_KEY (or DOCCHAT_API_KEY), or add `api_key` to:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No usable Gemini client. See above for setup instructions.".into());
    }

    let mut out = std::io::stdout();

    let mut uploaded = Vec::new();
    for path in &files {
        match upload_path(&mut session, path).await {
            Ok(file) => {
                eprintln!("  ✅ {} {} ({})", file.icon(), file.name, file.formatted_size());
                uploaded.push(file.name);
            }
            Err(e) => eprintln!("  [Error] {}: {e}", path.display()),
        }
    }
    if !uploaded.is_empty() {
        session.select(uploaded)?;
    }
    tracing::debug!(session = %session.id(), files = session.files().len(), "Chat session ready");

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = session.ask(&msg).await?;
        eprint!("\r              \r");
        println!("{}", reply.content);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  DocChat, interactive mode");
    println!("  Model:  {}", config.model);
    println!(
        "  Files are removed automatically after {} hours.",
        session.retention_hours()
    );
    println!("  Type a question, or /help for commands.");
    println!();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !execute(&mut session, parse(&line), &mut out).await? {
            break;
        }
    }

    println!();
    println!("  Goodbye! 👋");
    Ok(())
}
