//! FlexiTrip - trip planning agent
//!
//! CLI entry point for planning, listing and booking trips.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use flexitrip::booking::{
    BookingDesk, BookingError, BookingStatus, BookingSummary, IdempotencyKey, SimulatedProcessor, StateError,
    cost_breakdown,
};
use flexitrip::cli::{Cli, Command, OutputFormat, PaymentArgs, PreferenceArgs};
use flexitrip::config::Config;
use flexitrip::domain::{IdResolver, TripId};
use flexitrip::llm::create_client;
use flexitrip::planning::{
    ActivityCategory, ChatContext, ChatTurn, Itinerary, PlannedTrip, PlanningAgent, ToolGap, TripChat,
};
use flexitrip::store::{ChatRecord, TripRecord, TripStore};
use flexitrip::tools::providers::standard_registry;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flexitrip")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("flexitrip.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "FlexiTrip loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Command::Plan {
            preferences,
            no_save,
            format,
        } => cmd_plan(&config, &preferences, no_save, format).await,
        Command::Trips { limit, format } => cmd_trips(&config, limit, format).await,
        Command::Show { trip, format } => cmd_show(&config, &trip, format).await,
        Command::Book {
            trip,
            payment,
            idempotency_key,
        } => cmd_book(&config, &trip, &payment, idempotency_key).await,
        Command::Chat { trip, message, format } => cmd_chat(&config, &trip, &message, format).await,
        Command::Events { limit, format } => cmd_events(&config, limit, format).await,
    }
}

/// Run a planning pass and save the result
async fn cmd_plan(config: &Config, args: &PreferenceArgs, no_save: bool, format: OutputFormat) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(standard_registry(&config.tools).context("Failed to register tool providers")?);
    let llm = create_client(&config.llm).context("Failed to create model client")?;
    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;

    let agent = PlanningAgent::new(registry, llm, config.planning.clone())
        .with_max_tokens(config.llm.max_tokens)
        .with_analytics(Arc::new(store.clone()));

    if matches!(format, OutputFormat::Text) {
        println!("{}", "Planning trip...".dimmed());
    }

    let result = agent.plan(args.to_preferences()).await;
    let trip = match result {
        Ok(trip) => trip,
        Err(failure) => {
            warn!(run_id = %failure.run_id, error = %failure.error, "Planning failed");
            if !failure.gaps.is_empty() {
                eprintln!("{}", "Missing travel data:".yellow());
                print_gaps(&failure.gaps);
            }
            store.shutdown().await.ok();
            return Err(eyre::eyre!(failure.error).wrap_err(format!("Planning run {} failed", failure.run_id)));
        }
    };

    let saved = if no_save {
        None
    } else {
        Some(store.save_trip(TripRecord::new(trip.clone())).await?)
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "trip_id": saved, "trip": trip }))?
            );
        }
        OutputFormat::Text => {
            print_trip(&trip);
            if let Some(id) = &saved {
                println!();
                println!("Saved as {}", id.as_str().bold());
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

/// List saved trips
async fn cmd_trips(config: &Config, limit: usize, format: OutputFormat) -> Result<()> {
    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;
    let trips = store.list_trips(limit).await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = trips
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "id": t.id,
                        "title": t.title,
                        "destination": t.destination,
                        "total": t.total,
                        "partial": t.partial,
                        "created_at": t.created_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if trips.is_empty() {
                println!("No saved trips. Run `flexitrip plan` to create one.");
            }
            for t in &trips {
                let partial = if t.partial { " (partial)".yellow().to_string() } else { String::new() };
                println!("{}  {}  {}{}", t.id.as_str().bold(), t.title, t.total, partial);
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

/// Show one trip with cost breakdown and bookings
async fn cmd_show(config: &Config, reference: &str, format: OutputFormat) -> Result<()> {
    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;
    let record = resolve_trip(&store, reference).await?;
    let bookings = store.list_bookings(&record.id).await?;
    let breakdown = cost_breakdown(&record.trip.itinerary);

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "trip": record,
                    "cost_breakdown": breakdown,
                    "bookings": bookings,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", record.id.as_str().dimmed());
            print_trip(&record.trip);
            println!();
            println!("{}", "Cost breakdown".bold());
            for category in ActivityCategory::ALL {
                let amount = breakdown.get(category);
                if amount > 0.0 {
                    println!(
                        "  {:<16} {:>10.2} ({:.0}%)",
                        category.label(),
                        amount,
                        breakdown.share(category)
                    );
                }
            }
            println!("  {:<16} {:>10.2} {}", "Total", breakdown.total.amount, breakdown.total.currency);
            if !bookings.is_empty() {
                println!();
                println!("{}", "Bookings".bold());
                for booking in &bookings {
                    println!("  {}", BookingSummary::from_booking(booking, &record.destination));
                }
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

/// Book and pay for every bookable activity of a trip
///
/// The desk is rebuilt from the bookings and payments saved for the trip, so
/// re-running with the same key reuses pending bookings and their payments.
async fn cmd_book(config: &Config, reference: &str, payment: &PaymentArgs, key: Option<String>) -> Result<()> {
    let details = payment.to_details();
    details.validate()?;

    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;
    let record = resolve_trip(&store, reference).await?;
    let key = key.unwrap_or_else(|| record.id.to_string());

    let bookings = store.list_bookings(&record.id).await?;
    let payments = store.list_payments(&record.id).await?;
    info!(trip = %record.id, bookings = bookings.len(), payments = payments.len(), "cmd_book: restoring desk");
    let desk = BookingDesk::new(Arc::new(SimulatedProcessor::new()))
        .with_analytics(Arc::new(store.clone()))
        .with_records(bookings, payments);

    let itinerary = &record.trip.itinerary;
    let mut booked = 0;
    let mut failed = 0;

    for (index, activity) in itinerary.bookable_activities().enumerate() {
        let previous = activity.bookable.as_ref().and_then(|item| desk.latest_for(item));
        let booking = match previous {
            Some(b) if b.status == BookingStatus::Confirmed => {
                println!("{} {} (already booked)", "=".dimmed(), activity.name);
                continue;
            }
            Some(b) if b.status == BookingStatus::Pending => b,
            _ => {
                let booking = desk.create_booking(activity, &itinerary.currency)?;
                store.save_booking(&record.id, &booking).await?;
                booking
            }
        };

        let attempt_key = IdempotencyKey::new(format!("{}-{}", key, index));
        let paid = match desk.attempt_payment(&booking.id, &details, attempt_key).await {
            Ok(paid) => {
                store.save_payment(&paid).await?;
                true
            }
            // Paid under another key by an earlier run; only confirmation is left
            Err(BookingError::State(StateError::AlreadyPaid { .. })) => true,
            Err(BookingError::Payment { payment, source }) => {
                store.save_payment(&payment).await?;
                println!("{} {}: {}", "✗".red(), activity.name, source);
                false
            }
            Err(e) => return Err(e.into()),
        };
        if !paid {
            failed += 1;
            continue;
        }

        let confirmed = desk.confirm_booking(&booking.id).await?;
        store.save_booking(&record.id, &confirmed).await?;
        println!(
            "{} {}",
            "✓".green(),
            BookingSummary::from_booking(&confirmed, &record.destination)
        );
        booked += 1;
    }

    if booked == 0 && failed == 0 {
        println!("Nothing to book for {}", record.title);
    } else {
        println!();
        println!("{} booked, {} failed", booked, failed);
    }

    store.shutdown().await?;
    Ok(())
}

/// Ask the assistant about a saved trip and keep the exchange
async fn cmd_chat(config: &Config, reference: &str, message: &str, format: OutputFormat) -> Result<()> {
    config.validate()?;

    let llm = create_client(&config.llm).context("Failed to create model client")?;
    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;
    let record = resolve_trip(&store, reference).await?;

    let history: Vec<ChatTurn> = store
        .list_chat(&record.id, CHAT_HISTORY)
        .await?
        .iter()
        .map(ChatRecord::turn)
        .collect();
    let chat = TripChat::new(llm).with_max_tokens(config.llm.max_tokens);
    let context = ChatContext::from_trip(&record.trip);

    let reply = match chat.ask(message, &context, &history).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(trip = %record.id, code = e.code(), error = %e, "Chat failed");
            store.shutdown().await.ok();
            return Err(eyre::eyre!(e).wrap_err("The assistant could not answer, please try again"));
        }
    };
    store
        .save_chat(ChatRecord::new(record.id.clone(), message.trim(), &reply))
        .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        OutputFormat::Text => {
            println!("{}", reply.reply);
            println!();
            println!("{}", "You could also ask:".dimmed());
            for suggestion in &reply.suggestions {
                println!("  - {}", suggestion);
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

/// Show recent analytics events
async fn cmd_events(config: &Config, limit: usize, format: OutputFormat) -> Result<()> {
    let store = TripStore::spawn(&config.storage.db_path).context("Failed to open trip store")?;
    let events = store.recent_events(limit).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        OutputFormat::Text => {
            for record in &events {
                let when = chrono::DateTime::from_timestamp_millis(record.recorded_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{}  {:<18} {}", when.dimmed(), record.name, serde_json::to_string(&record.event)?);
            }
        }
    }

    store.shutdown().await?;
    Ok(())
}

/// How many recent trips a short reference is matched against
const RESOLVE_LIMIT: usize = 10_000;

/// Earlier exchanges loaded for a chat question
const CHAT_HISTORY: usize = 6;

/// Find a trip by full ID, hex prefix or destination slug
async fn resolve_trip(store: &TripStore, reference: &str) -> Result<TripRecord> {
    let trips = store.list_trips(RESOLVE_LIMIT).await?;
    let ids: HashMap<String, String> = trips
        .iter()
        .map(|t| (t.id.to_string(), t.title.clone()))
        .collect();

    let id = match IdResolver::new(&ids).resolve(reference) {
        Ok(Some(id)) => id,
        Ok(None) => eyre::bail!("No trip matches '{}'", reference),
        Err(candidates) => eyre::bail!("'{}' matches several trips: {}", reference, candidates.join(", ")),
    };

    store
        .get_trip(&TripId::from_string(id))
        .await?
        .ok_or_else(|| eyre::eyre!("Trip '{}' disappeared", reference))
}

fn print_gaps(gaps: &[ToolGap]) {
    for gap in gaps {
        eprintln!("  - {}", gap);
    }
}

fn print_trip(trip: &PlannedTrip) {
    let itinerary: &Itinerary = &trip.itinerary;
    println!("{}", itinerary.title.bold());
    println!(
        "{} | {} days | {} | {} activities",
        itinerary.destination,
        itinerary.days.len(),
        itinerary.total(),
        itinerary.activity_count()
    );

    if trip.partial {
        println!("{}", "Planned without some live data:".yellow());
        for gap in &trip.gaps {
            println!("  - {}", gap);
        }
    }

    for day in &itinerary.days {
        println!();
        match &day.theme {
            Some(theme) => println!("{}", format!("Day {}: {}", day.number, theme).bold()),
            None => println!("{}", format!("Day {}", day.number).bold()),
        }
        for activity in &day.activities {
            let bookable = activity
                .bookable
                .as_ref()
                .map(|b| format!(" [{}]", b).cyan().to_string())
                .unwrap_or_default();
            println!(
                "  {}  {} @ {}  {:.2}{}",
                activity.window, activity.name, activity.location, activity.cost_estimate, bookable
            );
        }
    }
}
