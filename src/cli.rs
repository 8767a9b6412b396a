//! `portal-sync` command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::models::{
    EventName, NewTicket, Notification, NotificationFilter, PushEvent, Role, TicketStatus,
    TicketType,
};
use crate::notifications::{LoadState, route_for};
use crate::session::PortalSession;

/// Real-time notification and ticket sync for the recruiting portal
#[derive(Parser)]
#[command(name = "portal-sync", version, about)]
pub struct Cli {
    /// Directory holding the `.env` files (defaults to the working directory)
    #[arg(long, global = true)]
    pub env_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow live notifications and ticket messages
    Watch {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Inspect and mark notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Work with support tickets
    Ticket {
        #[command(subcommand)]
        command: TicketCommands,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications, newest first
    List {
        #[arg(long)]
        unread_only: bool,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Mark one notification read
    Read { notification_id: String },
    /// Mark every notification read
    ReadAll,
}

#[derive(Subcommand)]
pub enum TicketCommands {
    /// List visible tickets with unread badges
    List,
    /// Show a ticket's messages and mark its notifications read
    Open { ticket_id: String },
    /// Send a message on a ticket
    Send { ticket_id: String, message: String },
    /// File a new ticket
    Create {
        /// hr or it
        #[arg(long = "type")]
        ticket_type: TicketType,
        #[arg(long)]
        subject: Option<String>,
        description: String,
    },
    /// Change a ticket's status (admin and HR only)
    Status {
        ticket_id: String,
        status: TicketStatus,
    },
    /// Assign a ticket (admin and HR only)
    Assign {
        ticket_id: String,
        assignee_user_id: String,
    },
}

pub async fn run(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    let session = PortalSession::from_config(config).context("failed to build portal session")?;

    match command {
        Commands::Watch { seconds } => watch(&session, seconds).await,
        Commands::Notifications { command } => notifications(&session, command).await,
        Commands::Ticket { command } => ticket(&session, command).await,
    }
}

async fn watch(session: &PortalSession, seconds: Option<u64>) -> anyhow::Result<()> {
    let bell = session.bell();
    let desk = session.desk();
    let role = session.auth().role;

    let running = session.start()?;
    bell.load_initial(NotificationFilter::window(session.config().bell_capacity as u32))
        .await;
    desk.load_tickets().await.ok();

    let channel = session.channel();
    let _printer = channel.subscribe_scoped(EventName::NewNotification, move |event| {
        if let PushEvent::NewNotification(notification) = event {
            println!("{}", describe(notification, role));
        }
    });
    let _messages = channel.subscribe_scoped(EventName::TicketMessage, |event| {
        if let PushEvent::TicketMessage(incoming) = event {
            println!(
                "[ticket {}] {}: {}",
                incoming.ticket_id, incoming.message.sent_by_user_type, incoming.message.message
            );
        }
    });

    println!("unread: {}", bell.unread_count());
    for notification in bell.items() {
        println!("{}", describe(&notification, role));
    }

    match seconds {
        Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?,
    }

    info!(unread = bell.unread_count(), "stopping watch");
    running.shutdown().await;
    Ok(())
}

async fn notifications(session: &PortalSession, command: NotificationCommands) -> anyhow::Result<()> {
    let inbox = session.inbox();
    let role = session.auth().role;

    match command {
        NotificationCommands::List {
            unread_only,
            page,
            limit,
        } => {
            let filter = NotificationFilter {
                unread_only,
                limit: Some(limit.unwrap_or(session.config().page_size)),
                page: Some(page.unwrap_or(1)),
            };
            inbox.load_initial(filter).await;
            if let LoadState::Failed(message) = inbox.state() {
                anyhow::bail!("failed to load notifications: {message}");
            }

            println!("unread: {}", inbox.unread_count());
            for notification in inbox.items() {
                println!("{}", describe(&notification, role));
            }
            if let Some(pagination) = inbox.pagination() {
                println!(
                    "page {} of {}",
                    pagination.page.unwrap_or(1),
                    pagination.total_pages.unwrap_or(1)
                );
            }
        }
        NotificationCommands::Read { notification_id } => {
            inbox.mark_read(&notification_id).await?;
            println!("marked {notification_id} read");
        }
        NotificationCommands::ReadAll => {
            inbox.mark_all_read().await?;
            println!("marked all notifications read");
        }
    }
    Ok(())
}

async fn ticket(session: &PortalSession, command: TicketCommands) -> anyhow::Result<()> {
    let desk = session.desk();

    match command {
        TicketCommands::List => {
            desk.load_tickets().await?;
            for ticket in desk.tickets() {
                println!(
                    "{} [{}] {} ({} unread)",
                    ticket.id,
                    ticket.status,
                    ticket.subject.as_deref().unwrap_or(&ticket.description),
                    ticket.unread_count
                );
            }
        }
        TicketCommands::Open { ticket_id } => {
            desk.open(&ticket_id).await?;
            print_open_ticket(session);
        }
        TicketCommands::Send { ticket_id, message } => {
            desk.open(&ticket_id).await?;
            desk.send(&message).await?;
            print_open_ticket(session);
        }
        TicketCommands::Create {
            ticket_type,
            subject,
            description,
        } => {
            let ticket = desk
                .create_ticket(&NewTicket {
                    ticket_type,
                    subject,
                    description,
                })
                .await?;
            println!("created ticket {}", ticket.id);
        }
        TicketCommands::Status { ticket_id, status } => {
            desk.open(&ticket_id).await?;
            desk.update_status(status).await?;
            println!("ticket {ticket_id} is now {status}");
        }
        TicketCommands::Assign {
            ticket_id,
            assignee_user_id,
        } => {
            desk.open(&ticket_id).await?;
            desk.assign(&assignee_user_id).await?;
            println!("ticket {ticket_id} assigned to {assignee_user_id}");
        }
    }
    Ok(())
}

fn print_open_ticket(session: &PortalSession) {
    let desk = session.desk();
    let Some(open) = desk.current() else {
        return;
    };
    println!(
        "{} [{}] {}",
        open.ticket.id,
        open.ticket.status,
        open.ticket.subject.as_deref().unwrap_or(&open.ticket.description)
    );
    for message in open.messages {
        println!(
            "  {} {}: {}",
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.sent_by_user_type,
            message.message
        );
    }
}

fn describe(notification: &Notification, role: Role) -> String {
    let marker = if notification.read { " " } else { "*" };
    format!(
        "{marker} {} {}: {} -> {}",
        notification.id,
        notification.title,
        notification.message,
        route_for(notification, role).path()
    )
}
