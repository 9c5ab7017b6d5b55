//! Chat command - Talk to the cost assistant.

use anyhow::{Context, Result};
use clap::Args;
use priceyy_chat::{AppSession, ChatError, ChatResponse};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send; starts an interactive session when omitted
    message: Vec<String>,

    /// Continue a specific thread
    #[arg(short, long)]
    thread: Option<String>,

    /// Start a new thread
    #[arg(short, long, conflicts_with = "thread")]
    new: bool,

    /// Primary model for this invocation
    #[arg(short, long)]
    model: Option<String>,

    /// Wait for whole responses instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Keep reading messages from stdin
    #[arg(short, long)]
    interactive: bool,
}

pub async fn execute(args: ChatArgs, global: &GlobalOptions) -> Result<()> {
    let mut config = global.config()?;
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    if args.no_stream {
        config = config.with_stream(false);
    }
    let session = global.open_session(config)?;
    if !session.has_llm() {
        return Err(ChatError::LlmNotConfigured.into());
    }

    if args.new {
        session.start_new_thread()?;
    } else if let Some(thread_id) = &args.thread {
        let thread = session
            .select_thread(thread_id)
            .with_context(|| format!("Cannot continue thread {}", thread_id))?;
        info!(thread_id = %thread.id, "Continuing thread");
    }

    let message = args.message.join(" ");
    if !message.trim().is_empty() {
        let response = send(&session, &message).await?;
        if global.json {
            print_json(&response)?;
        } else {
            print_reply(&response);
        }
        if !args.interactive {
            return Ok(());
        }
    }

    interactive(&session, global.json).await
}

async fn interactive(session: &AppSession, json: bool) -> Result<()> {
    println!("💬 Priceyy assistant. Type /new for a fresh thread, /exit to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/new" => {
                session.start_new_thread()?;
                println!("🧵 Next message starts a new thread.");
                continue;
            }
            _ => {}
        }

        match send(session, line).await {
            Ok(response) if json => print_json(&response)?,
            Ok(response) => print_reply(&response),
            // The thread keeps the partial round; the next message continues it
            Err(e @ (ChatError::Cancelled | ChatError::AllModelsFailed { .. })) => {
                eprintln!("⚠️  {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Send one message, cancelling the round on Ctrl-C.
async fn send(session: &AppSession, message: &str) -> Result<ChatResponse, ChatError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = session.send_message(message, &cancel).await;
    watcher.abort();
    result
}

fn print_reply(response: &ChatResponse) {
    println!("\n🤖 {}\n", response.reply.content.trim());
    if response.fallback_active {
        println!("   ↪ answered by fallback model {}", response.model);
    }
    if response.hit_turn_limit {
        println!("   ⚠️  stopped after {} steps", response.turns);
    }
}
