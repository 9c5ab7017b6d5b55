//! Threads command - Manage conversation threads.

use anyhow::Result;
use clap::{Args, Subcommand};
use priceyy_chat::MessageRole;

use super::{print_json, GlobalOptions};

#[derive(Args)]
pub struct ThreadsArgs {
    #[command(subcommand)]
    command: Option<ThreadsCommand>,
}

#[derive(Subcommand)]
enum ThreadsCommand {
    /// List threads, most recent first
    List,

    /// Show the transcript of a thread (the current one by default)
    Show { id: Option<String> },

    /// Make a thread current
    Select { id: String },

    /// Delete a thread
    Delete { id: String },

    /// Start a fresh thread with the next message
    New,
}

pub async fn execute(args: ThreadsArgs, global: &GlobalOptions) -> Result<()> {
    let session = global.open_session(global.config()?)?;

    match args.command.unwrap_or(ThreadsCommand::List) {
        ThreadsCommand::List => {
            let threads = session.list_threads()?;
            if global.json {
                return print_json(&threads);
            }
            if threads.is_empty() {
                println!("No threads yet. Start one with `priceyy chat`.");
                return Ok(());
            }
            let current = session.current_thread_id()?;
            for thread in threads {
                let marker = if current.as_deref() == Some(thread.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}  {} ({} messages)",
                    marker,
                    thread.id,
                    thread.timestamp.format("%Y-%m-%d %H:%M"),
                    thread.title,
                    thread.message_count
                );
            }
        }
        ThreadsCommand::Show { id } => {
            let id = match id {
                Some(id) => id,
                None => match session.current_thread_id()? {
                    Some(id) => id,
                    None => anyhow::bail!("No current thread; pass a thread id argument"),
                },
            };
            let thread = session.load_thread(&id)?;
            let transcript = session.transcript(&id)?;
            if global.json {
                return print_json(&transcript);
            }
            println!("🧵 {}\n", thread.title);
            for message in transcript {
                let who = match message.role {
                    MessageRole::User => "🧑",
                    MessageRole::Assistant => "🤖",
                    MessageRole::Tool => "🔧",
                };
                println!("{} {}\n", who, message.content.trim());
            }
        }
        ThreadsCommand::Select { id } => {
            let thread = session.select_thread(&id)?;
            println!("✅ Current thread: {}", thread.title);
        }
        ThreadsCommand::Delete { id } => {
            session.delete_thread(&id)?;
            println!("🗑️  Deleted thread {}", id);
        }
        ThreadsCommand::New => {
            session.start_new_thread()?;
            println!("🧵 Next message starts a new thread.");
        }
    }

    Ok(())
}
