// Copyright 2026 Hotel Stack Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hotel Stack CLI: entry point.

mod config;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use std::collections::BTreeMap;

use hotel_stack::{crawl_signals, Analyzer, ConfirmedSystems, Layer, PropertyInputs};

use crate::config::{load_config, load_rules, resolve_config_path, resolve_rules_path};

#[derive(Parser)]
#[command(
    name = "hotel-stack",
    about = "Infer a hotel's technology stack from its public website",
    version
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pretty-print the JSON result.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl, detect and score a hotel website.
    Analyze {
        /// Hotel website URL (scheme optional).
        url: String,

        /// Competitor website to analyse alongside and compare against.
        #[arg(long)]
        competitor: Option<String>,

        /// Property management system in use, if known.
        #[arg(long)]
        pms: Option<String>,

        /// Booking engine in use, if known.
        #[arg(long)]
        booking_engine: Option<String>,

        /// Channel manager in use, if known.
        #[arg(long)]
        channel_manager: Option<String>,

        /// CRM / guest database in use, if known.
        #[arg(long)]
        crm: Option<String>,

        /// Room count for the opportunity model (default 60).
        #[arg(long)]
        rooms: Option<u32>,

        /// Occupancy as a fraction, e.g. 0.72 (default 0.72).
        #[arg(long)]
        occupancy: Option<f64>,

        /// Average daily rate in GBP (default 140).
        #[arg(long)]
        adr: Option<f64>,

        /// Vendor rule file (JSON). Also reads HOTEL_STACK_RULES.
        #[arg(long)]
        rules: Option<String>,

        /// Config file (JSON). Also reads HOTEL_STACK_CONFIG.
        #[arg(long)]
        config: Option<String>,
    },

    /// Crawl a website and print the collected signals.
    Crawl {
        url: String,

        /// Config file (JSON). Also reads HOTEL_STACK_CONFIG.
        #[arg(long)]
        config: Option<String>,
    },

    /// Validate a rule file and summarize it.
    Rules {
        /// Vendor rule file (JSON). Defaults to the built-in rules.
        #[arg(long)]
        rules: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   hotel-stack completions bash > ~/.local/share/bash-completion/completions/hotel-stack
    ///   hotel-stack completions zsh > ~/.zfunc/_hotel-stack
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RulesSummary {
    rules: usize,
    dropped: usize,
    by_layer: BTreeMap<Layer, usize>,
    vendors: Vec<String>,
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "hotel_stack=debug"
    } else {
        "hotel_stack=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serializing output")?;
    println!("{out}");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Analyze {
            url,
            competitor,
            pms,
            booking_engine,
            channel_manager,
            crm,
            rooms,
            occupancy,
            adr,
            rules,
            config,
        } => {
            let app = load_config(resolve_config_path(config.as_deref()).as_deref())?;
            let rules = load_rules(resolve_rules_path(rules.as_deref()).as_deref())?;
            let analyzer = Analyzer::new(app.scan, rules, app.scoring)
                .context("building analyzer")?
                .with_property_inputs(PropertyInputs {
                    rooms,
                    occupancy,
                    adr,
                });
            let confirmed = ConfirmedSystems {
                pms,
                booking_engine,
                channel_manager,
                crm,
            };

            match competitor {
                Some(competitor) => {
                    let pair = analyzer.analyze_pair(&url, &confirmed, &competitor).await;
                    print_json(&pair, cli.pretty)?;
                }
                None => {
                    let report = analyzer.analyze(&url, &confirmed).await;
                    print_json(&report, cli.pretty)?;
                }
            }
        }

        Commands::Crawl { url, config } => {
            let app = load_config(resolve_config_path(config.as_deref()).as_deref())?;
            let mut signals = crawl_signals(&url, &app.scan).await;
            if let Err(e) = signals.ensure_reachable() {
                tracing::warn!(error = %e, "crawl stopped at the home page");
            }
            for page in &mut signals.pages {
                page.html.clear();
            }
            signals.combined_text_blob.clear();
            print_json(&signals, cli.pretty)?;
        }

        Commands::Rules { rules } => {
            let path = resolve_rules_path(rules.as_deref());
            let set = load_rules(path.as_deref())?;
            let mut by_layer: BTreeMap<Layer, usize> = Layer::ALL.iter().map(|l| (*l, 0)).collect();
            for rule in set.rules() {
                *by_layer.entry(rule.layer).or_default() += 1;
            }
            let mut vendors: Vec<String> = set.rules().iter().map(|r| r.rule.vendor.clone()).collect();
            vendors.sort();
            vendors.dedup();
            let summary = RulesSummary {
                rules: set.len(),
                dropped: set.dropped(),
                by_layer,
                vendors,
            };
            print_json(&summary, cli.pretty)?;
        }

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "hotel-stack",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
