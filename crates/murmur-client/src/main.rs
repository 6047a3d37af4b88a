mod command;
mod config;
mod render;

use murmur_api::ApiClient;
use murmur_gateway::{CableClient, CableConfig};
use murmur_sync::history::PageOutcome;
use murmur_sync::reconciler::Reconciled;
use murmur_sync::{ChatSession, HistorySource, LiveChannel, LiveEnvelope, Loaded, SessionEvent};
use murmur_types::models::Channel;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::command::Command;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,murmur_gateway=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Collaborators
    let api = ApiClient::new(&config.api_url, config.cookie.clone(), config.request_timeout)?;
    let me = api.get_me().await?;
    info!("Signed in as {} ({})", me.user.username, me.user.id);

    let cable = CableClient::connect(CableConfig {
        url: config.cable_url.clone(),
        origin: Some(config.origin.clone()),
        cookie: config.cookie.clone(),
        subscribe_timeout: config.subscribe_timeout,
    })
    .await?;

    let channels = me.channels;
    let (mut session, mut events) = ChatSession::new(api, cable, me.user);

    println!("{}", list_channels(&channels));
    if let Some(channel_id) = config.channel.or_else(|| channels.first().map(|c| c.id)) {
        session.open_channel(channel_id).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }
                run(&mut session, command, &channels).await;
                report_notice(&mut session);
            }
            Some(event) = events.recv() => {
                match event {
                    SessionEvent::Live(envelope) => print_live(&mut session, envelope),
                    SessionEvent::Task(done) => match session.complete(done).await {
                        // The view is drawn once members arrive.
                        Ok(Loaded::Page(PageOutcome::Seeded { .. })) => {}
                        Ok(Loaded::Page(PageOutcome::Exhausted)) => println!("-- start of history --"),
                        Ok(Loaded::Page(_) | Loaded::Detail) => show(&session),
                        Ok(Loaded::Dropped) | Err(_) => {}
                    },
                }
                report_notice(&mut session);
            }
        }
    }

    session.close().await;
    info!("Bye");
    Ok(())
}

async fn run<R, L>(session: &mut ChatSession<R, L>, cmd: Command, channels: &[Channel])
where
    R: HistorySource + Clone + Send + Sync + 'static,
    L: LiveChannel,
{
    // Failures are already recorded as the session notice.
    match cmd {
        Command::Join(channel_id) => session.open_channel(channel_id).await,
        Command::More => match session.load_older() {
            Ok(true) => info!("Loading older messages"),
            Ok(false) => println!("No older messages to load right now"),
            Err(e) => warn!("Loading older messages failed: {}", e),
        },
        Command::Reply { parent, text } => {
            let _ = session.send_message(&text, Some(parent), Vec::new()).await;
        }
        Command::Say(text) => {
            let _ = session.send_message(&text, None, Vec::new()).await;
        }
        Command::React { message_id, emoji } => {
            if let Err(e) = session.toggle_reaction(message_id, &emoji).await {
                eprintln!("{e}");
            }
        }
        Command::Members => println!("{}", render::members(session.members())),
        Command::Channels => println!("{}", list_channels(channels)),
        Command::Show => show(session),
        Command::Help => println!("{}", command::HELP),
        Command::Quit | Command::Nothing => {}
    }
}

fn print_live<R, L>(session: &mut ChatSession<R, L>, envelope: LiveEnvelope)
where
    R: HistorySource + Clone + Send + Sync + 'static,
    L: LiveChannel,
{
    match session.handle_live(envelope) {
        Reconciled::Applied { kind: "message", message_id } => {
            let messages = session.messages();
            if let Some(message) = messages.iter().find(|m| m.id == message_id) {
                println!(
                    "{}\n{}",
                    message.author_username(),
                    render::message_line(message, messages, &session.me().username)
                );
            }
        }
        Reconciled::Applied { kind, message_id } => println!("  * {kind} on [{message_id}]"),
        Reconciled::Disconnected(_) => println!("Live updates stopped, /join to reconnect"),
        _ => {}
    }
}

fn show<R, L>(session: &ChatSession<R, L>) {
    match (session.channel(), session.selected_channel()) {
        (Some(channel), _) => println!("{}", render::channel_header(channel, session.has_more())),
        (None, Some(channel_id)) => println!("== #{channel_id} =="),
        (None, None) => {
            println!("No channel selected, /join <channel>");
            return;
        }
    }
    print!(
        "{}",
        render::groups(&session.groups(), session.messages(), &session.me().username)
    );
}

fn report_notice<R, L>(session: &mut ChatSession<R, L>) {
    if let Some(notice) = session.notice() {
        eprintln!("! {notice}");
        session.clear_notice();
    }
}

fn list_channels(channels: &[Channel]) -> String {
    if channels.is_empty() {
        return "You are not in any channels".to_string();
    }
    let mut lines = vec!["Channels:".to_string()];
    for channel in channels {
        let unread = channel
            .read_state
            .as_ref()
            .map(|r| r.unread_count)
            .filter(|&n| n > 0)
            .map(|n| format!(" ({n} unread)"))
            .unwrap_or_default();
        lines.push(format!("  #{} {}{}", channel.id, channel.name, unread));
    }
    lines.join("\n")
}
