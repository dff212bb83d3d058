//! Wires the backend, the controller and a minimal prompt loop together.
//!
//! Rendering is deliberately thin: the reconciled snapshot is the product
//! of this program, and the loop only prints it as text.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::error;

use agent_client::{AgentBackend, HttpAgentBackend, MessageRole, StreamRecorder};

use crate::cli::Args;
use crate::config;
use crate::markup::MessageSpan;
use crate::replay::ReplayBackend;
use crate::thread::{Controller, RunState};

pub async fn run(args: Args) -> Result<()> {
    let config = config::load();
    let backend_url = args.backend_url.clone().unwrap_or(config.backend_url);

    let backend: Arc<dyn AgentBackend> = if let Some(path) = &args.playback {
        Arc::new(ReplayBackend::from_file(path, args.fast_playback)?)
    } else if let Some(path) = &args.record {
        Arc::new(HttpAgentBackend::with_recorder(
            backend_url.as_str(),
            StreamRecorder::new(path),
        ))
    } else {
        Arc::new(HttpAgentBackend::new(backend_url.as_str()))
    };

    let thread_id = args
        .thread
        .clone()
        .or(config.default_thread)
        .unwrap_or_else(|| "default".to_string());

    let mut controller = Controller::new(backend);
    controller.select_thread(&thread_id).await?;

    if let Some(message) = &args.message {
        send_and_stream(&mut controller, message).await?;
        print_snapshot(&controller);
        return Ok(());
    }

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/stop" => {
                controller.stop().await?;
                print_snapshot(&controller);
            }
            "/resync" => {
                controller.resync().await?;
                print_snapshot(&controller);
            }
            message => {
                if let Err(e) = send_and_stream(&mut controller, message).await {
                    error!("Run failed: {e}");
                }
                print_snapshot(&controller);
            }
        }
    }
    Ok(())
}

/// Start a run and apply its notices until it reaches a terminal state.
/// The receiver is re-fetched each iteration because a reconnect replaces
/// the stream.
async fn send_and_stream(controller: &mut Controller, message: &str) -> Result<()> {
    controller.start(message).await?;
    while controller.run_state() == RunState::Running {
        let Some(notices) = controller.notices() else {
            break;
        };
        match notices.recv().await {
            Ok(notice) => controller.handle_notice(notice).await,
            Err(_) => break,
        }
    }
    Ok(())
}

fn print_snapshot(controller: &Controller) {
    let snapshot = controller.snapshot();
    println!();
    for message in &snapshot.messages {
        let label = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "agent",
            MessageRole::Tool => "tool",
        };
        println!("[{label}]");
        for span in &message.spans {
            match span {
                MessageSpan::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        println!("{text}");
                    }
                }
                MessageSpan::Tag(node) => {
                    let state = if node.closed { "" } else { " (streaming)" };
                    println!("  * {}{state}", describe_tag(&node.name, &node.attributes));
                }
            }
        }
        for call in &message.calls {
            let outcome = match &call.result {
                Some(result) if !result.content.is_empty() => result.content.as_str(),
                Some(_) => "done",
                None => "pending",
            };
            println!(
                "    {} -> {outcome}",
                describe_tag(&call.call.name, &call.call.attributes)
            );
        }
    }
    if let Some(active) = &snapshot.active_call {
        println!("... {} {:?}", active.tool_name, active.derived_fields);
    }
    if let Some(notice) = &snapshot.notice {
        println!("! {notice}");
    }
    println!("[state: {:?}]", snapshot.run_state);
}

fn describe_tag(
    name: &str,
    attributes: &std::collections::BTreeMap<String, String>,
) -> String {
    let mut description = name.to_string();
    for (key, value) in attributes {
        description.push_str(&format!(" {key}={value}"));
    }
    description
}
