
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::settings::SUPPORTED_UNITS;
use super::{Config, ConfigError, GoogleConfig, OpenWeatherConfig};
use crate::geocoding::Geocoder;
use crate::providers::openweather::OpenWeatherClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🍷 Vine Concierge Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("API Keys").bold().yellow());
    eprintln!("Leave a key blank to keep the current value.");
    eprintln!();

    configure_keys(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Models").bold().yellow());
    configure_models(&mut config.google)?;

    eprintln!();
    eprintln!("{}", style("Weather").bold().yellow());
    configure_weather(&mut config.openweather)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_default_city(&config) {
        Ok(Some(message)) => eprintln!("{}", style(format!("✓ {message}")).green()),
        Ok(None) => eprintln!(
            "{}",
            style("⚠ Skipped weather check: no OpenWeather key configured").yellow()
        ),
        Err(e) => {
            eprintln!("{}", style(format!("⚠ Warning: {e}")).yellow());
            eprintln!("You can continue, but weather answers will fail until this is fixed.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Google (Gemini):").bold().yellow());
    eprintln!("  API key: {}", style(mask_secret(config.google.api_key.as_deref())).cyan());
    eprintln!("  Chat model: {}", style(&config.google.chat_model).cyan());
    eprintln!("  Embedding model: {}", style(&config.google.embedding_model).cyan());
    eprintln!("  Batch size: {}", style(config.google.batch_size).cyan());

    eprintln!("{}", style("Tavily:").bold().yellow());
    eprintln!("  API key: {}", style(mask_secret(config.tavily.api_key.as_deref())).cyan());
    eprintln!("  Max results: {}", style(config.tavily.max_results).cyan());

    eprintln!("{}", style("OpenWeather:").bold().yellow());
    eprintln!(
        "  API key: {}",
        style(mask_secret(config.openweather.api_key.as_deref())).cyan()
    );
    eprintln!("  Default city: {}", style(&config.openweather.default_city).cyan());
    eprintln!("  Units: {}", style(&config.openweather.units).cyan());

    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!(
        "  Document: {}",
        style(config.paths.document_path.display()).cyan()
    );
    eprintln!("  Index dir: {}", style(config.paths.index_dir.display()).cyan());
    eprintln!(
        "  Chunking: {} chars, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top k: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());

    Ok(())
}

/// Render a credential for display without revealing it
pub(crate) fn mask_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim).filter(|s| !s.is_empty()) {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 8 => "****".to_string(),
        Some(s) => {
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            format!("****{tail}")
        }
    }
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir()?;
    Config::load_from(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn prompt_key(label: &str, current: &mut Option<String>) -> Result<()> {
    let prompt = format!("{label} ({})", mask_secret(current.as_deref()));
    let entered = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;

    if !entered.trim().is_empty() {
        *current = Some(entered.trim().to_string());
    }
    Ok(())
}

fn configure_keys(config: &mut Config) -> Result<()> {
    prompt_key("Google API key", &mut config.google.api_key)?;
    prompt_key("Tavily API key", &mut config.tavily.api_key)?;
    prompt_key("OpenWeather API key", &mut config.openweather.api_key)?;
    Ok(())
}

fn configure_models(google: &mut GoogleConfig) -> Result<()> {
    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(google.chat_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model (re-ingest after changing)")
        .default(google.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    google.set_chat_model(chat_model)?;
    google.set_embedding_model(embedding_model)?;

    Ok(())
}

fn configure_weather(weather: &mut OpenWeatherConfig) -> Result<()> {
    let city: String = Input::new()
        .with_prompt("Default city (e.g. \"Napa, CA\")")
        .default(weather.default_city.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let mut candidate = weather.clone();
            candidate.set_default_city(input.clone())
        })
        .interact_text()?;

    let default_index = SUPPORTED_UNITS
        .iter()
        .position(|&u| u == weather.units)
        .unwrap_or(0);

    let units_index = Select::new()
        .with_prompt("Units")
        .default(default_index)
        .items(SUPPORTED_UNITS)
        .interact()?;

    weather.set_default_city(city)?;
    weather.set_units(SUPPORTED_UNITS[units_index].to_string())?;

    Ok(())
}

fn test_default_city(config: &Config) -> Result<Option<String>> {
    if config.require_openweather_key().is_err() {
        return Ok(None);
    }

    let client = OpenWeatherClient::new(config)?;
    let city = &config.openweather.default_city;
    let coordinates = Geocoder::new(&client).geocode(city)?;

    Ok(Some(coordinates.map_or_else(
        || format!("OpenWeather reachable, but \"{city}\" did not resolve"),
        |c| format!("Resolved \"{city}\" to {:.4}, {:.4}", c.lat, c.lon),
    )))
}
