use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use shared::chat::export::write_export;
use shared::chat::{ChatError, ChatSession, ChatTransport, ExchangeReport, Rating};
use shared::llm::{MODEL_CATALOG, find_model, short_label};
use shared::models::Role;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::commands::{Command, HELP_TEXT, parse_command};

pub async fn run<T: ChatTransport>(mut session: ChatSession<T>, export_dir: &Path) -> io::Result<()> {
    println!(
        "Connected with {} ({} framing). Type /help for commands.",
        short_label(session.store().selected_model()),
        session.framing()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Quit => return Ok(()),
            Command::Help => println!("{HELP_TEXT}"),
            Command::Send(text) => {
                let result = stream_exchange(&mut session, Exchange::Send(&text)).await;
                report_exchange(&session, result);
            }
            Command::Regenerate => {
                let result = stream_exchange(&mut session, Exchange::Regenerate).await;
                report_exchange(&session, result);
            }
            Command::New => {
                session.store_mut().new_conversation();
                println!("Started a new conversation.");
            }
            Command::List => list_conversations(&session),
            Command::Switch(index) => match conversation_id_at(&session, index) {
                Some(id) => {
                    if let Err(err) = session.store_mut().select(&id) {
                        eprintln!("{err}");
                    } else {
                        print_history(&session);
                    }
                }
                None => eprintln!("There is no conversation {}.", index + 1),
            },
            Command::Delete(index) => {
                let target = match index {
                    Some(index) => conversation_id_at(&session, index),
                    None => session.store().active_id().map(str::to_string),
                };
                match target {
                    Some(id) => match session.store_mut().delete(&id) {
                        Ok(()) => println!("Conversation deleted."),
                        Err(err) => eprintln!("{err}"),
                    },
                    None => eprintln!("There is no such conversation."),
                }
            }
            Command::Model(None) => {
                let current = session.store().selected_model();
                match find_model(current) {
                    Some(model) => println!("{} ({current})", model.name),
                    None => println!("{current}"),
                }
            }
            Command::Model(Some(id)) => match find_model(&id) {
                Some(model) => match session.store_mut().set_model(model.id) {
                    Ok(()) => println!("Now using {}.", model.name),
                    Err(err) => eprintln!("{err}"),
                },
                None => eprintln!("Unknown model '{id}'. Use /models to see the choices."),
            },
            Command::Models => {
                let current = session.store().selected_model();
                for model in MODEL_CATALOG {
                    let marker = if model.id == current { '*' } else { ' ' };
                    println!("{marker} {:<40} {} - {}", model.id, model.name, model.description);
                }
            }
            Command::Like => rate_last_reply(&mut session, Rating::Up),
            Command::Dislike => rate_last_reply(&mut session, Rating::Down),
            Command::Export => match session.store().active() {
                Some(conversation) => match write_export(conversation, export_dir, Utc::now()) {
                    Ok(path) => println!("Exported to {}", path.display()),
                    Err(err) => eprintln!("Export failed: {err}"),
                },
                None => eprintln!("No active conversation to export."),
            },
        }
    }
}

enum Exchange<'t> {
    Send(&'t str),
    Regenerate,
}

/// Runs one exchange, echoing the growing transcript as it arrives.
/// Returns the exchange result and the text already shown.
async fn stream_exchange<T: ChatTransport>(
    session: &mut ChatSession<T>,
    exchange: Exchange<'_>,
) -> (Result<ExchangeReport, ChatError>, String) {
    let mut shown = String::new();
    let on_update = |transcript: &str| {
        if let Err(err) = echo_suffix(&mut io::stdout(), &shown, transcript) {
            debug!("failed to echo streamed reply: {err}");
        }
        shown.clear();
        shown.push_str(transcript);
    };

    let result = match exchange {
        Exchange::Send(text) => session.send(text, on_update).await,
        Exchange::Regenerate => session.regenerate(on_update).await,
    };
    (result, shown)
}

/// Writes the part of `transcript` not yet shown.
fn echo_suffix<W: Write>(out: &mut W, shown: &str, transcript: &str) -> io::Result<()> {
    if let Some(suffix) = transcript.get(shown.len()..) {
        out.write_all(suffix.as_bytes())?;
        out.flush()?;
    }
    Ok(())
}

fn report_exchange<T: ChatTransport>(
    session: &ChatSession<T>,
    (result, shown): (Result<ExchangeReport, ChatError>, String),
) {
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let reply = session
        .store()
        .conversation(&report.conversation_id)
        .and_then(|conversation| conversation.last_turn());
    match reply {
        Some(reply) if reply.content == shown => println!(),
        Some(reply) => {
            if !shown.is_empty() {
                println!();
            }
            println!("{}", reply.content);
        }
        None => println!(),
    }

    if let Some(notification) = report.notification {
        eprintln!("[{}] {}", notification.title, notification.description);
    }
}

fn list_conversations<T: ChatTransport>(session: &ChatSession<T>) {
    let active = session.store().active_id();
    for (index, conversation) in session.store().conversations().iter().enumerate() {
        let marker = if Some(conversation.id.as_str()) == active {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker} {:>2}. {} ({} messages)",
            index + 1,
            conversation.title,
            conversation.turns.len()
        );
    }
}

fn conversation_id_at<T: ChatTransport>(session: &ChatSession<T>, index: usize) -> Option<String> {
    session
        .store()
        .conversations()
        .get(index)
        .map(|conversation| conversation.id.clone())
}

fn print_history<T: ChatTransport>(session: &ChatSession<T>) {
    let Some(conversation) = session.store().active() else {
        return;
    };
    println!("== {} ==", conversation.title);
    for turn in &conversation.turns {
        let speaker = match (turn.role, turn.model.as_deref()) {
            (Role::User, _) => "you",
            (_, Some(model)) => short_label(model),
            (role, None) => role.as_str(),
        };
        println!("[{}] {speaker}: {}", turn.timestamp.format("%H:%M"), turn.content);
    }
}

fn rate_last_reply<T: ChatTransport>(session: &mut ChatSession<T>, rating: Rating) {
    let Some(turn_id) = session
        .store()
        .active()
        .and_then(|conversation| {
            conversation
                .turns
                .iter()
                .rev()
                .find(|turn| turn.role == Role::Assistant)
        })
        .map(|turn| turn.id.clone())
    else {
        eprintln!("There is no reply to rate yet.");
        return;
    };

    match session.store_mut().rate(&turn_id, rating) {
        Ok(Some(Rating::Up)) => println!("Marked the last reply as helpful."),
        Ok(Some(Rating::Down)) => println!("Marked the last reply as unhelpful."),
        Ok(None) => println!("Rating cleared."),
        Err(err) => {
            warn!("rating failed: {err}");
            eprintln!("{err}");
        }
    }
}
