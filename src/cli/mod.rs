//! Command-line interface.

use clap::{Parser, Subcommand};

use crate::domain::Intent;
use crate::safety::{SafetyPolicies, SafetySettings};
use crate::Config;

/// Promptboard - natural-language dashboards over a relational store
#[derive(Parser)]
#[command(name = "promptboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Write a default config.toml if none exists
    Init,

    /// Screen a prompt with the safety validator without calling a model
    CheckPrompt {
        /// Use the record-entry policy instead of the read policy
        #[arg(long)]
        update: bool,

        /// Prompt text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created default config.toml");
    } else {
        println!("config.toml already exists");
    }
    Ok(())
}

pub fn cmd_check_prompt(config: &Config, update: bool, text: &[String]) -> anyhow::Result<()> {
    let policies = SafetyPolicies::new(&SafetySettings::from_config(config))?;
    let intent = if update { Intent::Update } else { Intent::Read };
    let prompt = text.join(" ");

    match policies.for_intent(intent).validate_prompt(&prompt) {
        Ok(()) => println!("✓ Prompt accepted ({intent} policy)"),
        Err(violation) => println!("✗ {violation}"),
    }
    Ok(())
}
