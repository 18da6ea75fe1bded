use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};

use async_trait::async_trait;
use relay_core::protocol::describe_failure;
use relay_core::{HostActions, InputBoxOptions, MessageSeverity};
use serde_json::Value;
use tokio::process::Command as TokioCommand;

use crate::settings::{HostCommand, Settings};

/// Host commands that open a path with the system opener.
const OPEN_COMMANDS: &[&str] = &["vscode.open", "open"];

/// Host actions backed by the local machine: messages go to the log (and
/// stderr), prompts to the controlling terminal, named commands to the
/// external programs configured in settings.
pub struct ProcessHost {
    commands: HashMap<String, HostCommand>,
    echo_messages: bool,
}

impl ProcessHost {
    pub fn new(settings: &Settings) -> Self {
        let commands = settings
            .commands
            .iter()
            .map(|cmd| (cmd.name.clone(), cmd.clone()))
            .collect();
        ProcessHost {
            commands,
            echo_messages: settings.echo_messages,
        }
    }
}

#[async_trait]
impl HostActions for ProcessHost {
    fn show_message(&self, severity: MessageSeverity, message: &str) {
        log::log!(severity.log_level(), "{}", message);
        if self.echo_messages {
            eprintln!("[{}] {}", severity_label(severity), message);
        }
    }

    async fn show_input_box(&self, options: InputBoxOptions) -> Result<Option<String>, String> {
        tokio::task::spawn_blocking(move || prompt_on_terminal(&options))
            .await
            .map_err(|e| format!("Input prompt failed: {}", e))?
    }

    async fn execute_command(&self, command: &str, args: Vec<Value>) -> Result<Value, String> {
        if OPEN_COMMANDS.contains(&command) {
            return open_path(args).await;
        }
        match self.commands.get(command) {
            Some(host_command) => run_host_command(host_command, &args).await,
            None => Err(format!("command '{}' not found", command)),
        }
    }
}

fn severity_label(severity: MessageSeverity) -> &'static str {
    match severity {
        MessageSeverity::Information => "info",
        MessageSeverity::Warning => "warning",
        MessageSeverity::Error => "error",
    }
}

/// Ask on the controlling terminal; stdin and stdout carry the relay.
fn prompt_on_terminal(options: &InputBoxOptions) -> Result<Option<String>, String> {
    let tty = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .map_err(|e| format!("No terminal available for input: {}", e))?;
    let mut writer = tty
        .try_clone()
        .map_err(|e| format!("No terminal available for input: {}", e))?;
    let mut reader = BufReader::new(tty);
    read_answer(options, &mut reader, &mut writer)
}

fn read_answer(
    options: &InputBoxOptions,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
) -> Result<Option<String>, String> {
    let mut prompt = options.prompt.clone().unwrap_or_else(|| "Input".to_string());
    if let Some(hint) = options.place_holder.as_ref().or(options.value.as_ref()) {
        prompt.push_str(&format!(" [{}]", hint));
    }
    write!(writer, "{}: ", prompt)
        .and_then(|_| writer.flush())
        .map_err(|e| format!("Failed to write prompt: {}", e))?;

    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| format!("Failed to read input: {}", e))?;
    if read == 0 {
        // EOF dismisses the prompt
        return Ok(None);
    }
    let answer = line.trim_end_matches(&['\r', '\n'][..]);
    if answer.is_empty() {
        if let Some(value) = &options.value {
            return Ok(Some(value.clone()));
        }
    }
    Ok(Some(answer.to_string()))
}

async fn open_path(args: Vec<Value>) -> Result<Value, String> {
    let path = match args.first() {
        Some(Value::String(path)) if !path.is_empty() => path.clone(),
        _ => return Err("open requires a path".to_string()),
    };
    log::info!("Opening {}", path);
    tokio::task::spawn_blocking(move || {
        open::that(&path).map_err(|e| format!("Failed to open '{}': {}", path, e))
    })
    .await
    .map_err(|e| format!("Failed to open: {}", e))??;
    Ok(Value::Null)
}

/// Render a JSON argument for a command line. Strings go in unquoted.
fn arg_to_string(arg: &Value) -> String {
    match arg {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Run the program behind a host command. Its stdout is the result (JSON if
/// it parses, otherwise the trimmed text); a non-zero exit is a failure
/// described by stderr.
async fn run_host_command(host_command: &HostCommand, args: &[Value]) -> Result<Value, String> {
    log::debug!(
        "Running '{}' for host command '{}' with {} arg(s)",
        host_command.command,
        host_command.name,
        args.len()
    );
    let output = TokioCommand::new(&host_command.command)
        .args(&host_command.args)
        .args(args.iter().map(arg_to_string))
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("Failed to start '{}': {}", host_command.command, e))?;

    if output.status.success() {
        return Ok(parse_output(&String::from_utf8_lossy(&output.stdout)));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        return Err(format!("'{}' exited with {}", host_command.name, output.status));
    }
    match serde_json::from_str::<Value>(stderr) {
        Ok(failure) => Err(describe_failure(&failure)),
        Err(_) => Err(stderr.to_string()),
    }
}

fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
