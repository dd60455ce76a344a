//! CLI command definitions and subcommands

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::booking::{PaymentDetails, PaymentMethodKind};
use crate::domain::Money;
use crate::planning::{PreferenceSet, TravelStyle};

/// FlexiTrip - trip planning agent with live travel context
#[derive(Parser)]
#[command(
    name = "flexitrip",
    about = "Plan trips from live weather, lodging, events and routing data, then book them",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/flexitrip/logs/flexitrip.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Plan a trip and save it
    Plan {
        #[command(flatten)]
        preferences: PreferenceArgs,

        /// Print the plan without saving it
        #[arg(long)]
        no_save: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List saved trips
    Trips {
        /// Number of trips to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a saved trip with its cost breakdown and bookings
    Show {
        /// Trip ID, hex prefix or destination slug
        trip: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Book and pay for every bookable activity of a saved trip
    Book {
        /// Trip ID, hex prefix or destination slug
        trip: String,

        #[command(flatten)]
        payment: PaymentArgs,

        /// Key that makes repeating this command safe (defaults to the trip ID)
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Ask the travel assistant about a saved trip
    Chat {
        /// Trip ID, hex prefix or destination slug
        trip: String,

        /// Question for the assistant
        message: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show recent analytics events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Traveller preferences for `plan`
#[derive(Args, Debug, Clone)]
pub struct PreferenceArgs {
    /// Where to go; leave out to let the planner suggest one
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Where the trip starts
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Total budget for the group
    #[arg(short, long)]
    pub budget: f64,

    /// Budget currency
    #[arg(long, default_value = "INR")]
    pub currency: String,

    /// Trip length in days
    #[arg(long, default_value = "3")]
    pub days: u32,

    /// relaxed, adventure, cultural or mixed
    #[arg(short, long, default_value = "mixed")]
    pub style: TravelStyle,

    /// Number of travellers
    #[arg(short, long, default_value = "1")]
    pub group: u32,

    /// Comma-separated interests
    #[arg(short, long, value_delimiter = ',')]
    pub interests: Vec<String>,

    /// First day of the trip (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
}

impl PreferenceArgs {
    pub fn to_preferences(&self) -> PreferenceSet {
        let mut prefs = PreferenceSet::new(Money::new(self.budget, &self.currency), self.days)
            .style(self.style)
            .group_size(self.group)
            .interests(&self.interests);
        if let Some(destination) = &self.destination {
            prefs = prefs.destination(destination);
        }
        if let Some(origin) = &self.origin {
            prefs = prefs.origin(origin);
        }
        if let Some(date) = self.start_date {
            prefs = prefs.start_date(date);
        }
        prefs
    }
}

/// Payment method and its details for `book`
#[derive(Args, Debug, Clone)]
pub struct PaymentArgs {
    /// card, upi, net-banking or wallet
    #[arg(short, long)]
    pub method: PaymentMethodKind,

    #[arg(long)]
    pub card_number: Option<String>,

    /// Card expiry (MM/YY)
    #[arg(long)]
    pub expiry: Option<String>,

    #[arg(long)]
    pub cvv: Option<String>,

    #[arg(long)]
    pub upi_id: Option<String>,

    #[arg(long)]
    pub bank: Option<String>,

    /// Wallet provider
    #[arg(long)]
    pub wallet: Option<String>,
}

impl PaymentArgs {
    /// Details for the chosen method; missing fields are left empty for validation to report
    pub fn to_details(&self) -> PaymentDetails {
        let value = |field: &Option<String>| field.clone().unwrap_or_default();
        match self.method {
            PaymentMethodKind::Card => PaymentDetails::Card {
                number: value(&self.card_number),
                expiry: value(&self.expiry),
                cvv: value(&self.cvv),
            },
            PaymentMethodKind::Upi => PaymentDetails::Upi {
                upi_id: value(&self.upi_id),
            },
            PaymentMethodKind::NetBanking => PaymentDetails::NetBanking {
                bank: value(&self.bank),
            },
            PaymentMethodKind::Wallet => PaymentDetails::Wallet {
                provider: value(&self.wallet),
            },
        }
    }
}

/// Output format for listing commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flexitrip")
        .join("logs")
        .join("flexitrip.log")
}
