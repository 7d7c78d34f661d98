use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cwa_weather_core::{
    Config, FileStore, Moment, SunTable, WeatherFetcher,
    location::{self, LocationInfo},
    source_from_config,
    store::{save_city, saved_city},
    sun::taipei_now,
};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use std::path::PathBuf;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Taiwan weather dashboard backed by CWA open data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the CWA API key and the sunrise/sunset dataset.
    Configure,

    /// Fetch once and print the weather card.
    Show {
        /// City to show instead of the saved one, e.g. "高雄市".
        #[arg(long)]
        city: Option<String>,
    },

    /// Interactive card with manual refresh and city picker.
    Dashboard,

    /// List supported cities.
    Cities,

    /// Change the saved city.
    Select {
        /// City name; omit to pick from a list.
        city: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city } => show(city.as_deref()).await,
            Command::Dashboard => dashboard().await,
            Command::Cities => {
                for loc in location::all() {
                    println!("{}\tstation: {}", loc.city_name, loc.station_name);
                }
                Ok(())
            }
            Command::Select { city } => select(city),
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("CWA API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    config.set_api_key(api_key.trim().to_string());

    let current = config
        .sun_table
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let sun_table = Text::new("Sunrise/sunset dataset (JSON path, empty to skip):")
        .with_initial_value(&current)
        .prompt()?;
    config.sun_table = match sun_table.trim() {
        "" => None,
        path => Some(PathBuf::from(path)),
    };

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(city: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let source = source_from_config(&config)?;
    let store = Box::new(FileStore::open_default()?);

    let fetcher = match city {
        Some(name) => WeatherFetcher::new(source, store, location::resolve_or_default(name)),
        None => WeatherFetcher::restore(source, store)?,
    };

    fetcher
        .refresh()
        .await
        .with_context(|| format!("Failed to fetch weather for {}", fetcher.location().city_name))?;

    let sun = load_sun_table(&config);
    let moment = moment_for(&sun, fetcher.location());
    print!("{}", render::card(fetcher.location(), &fetcher.snapshot(), moment));
    Ok(())
}

async fn dashboard() -> anyhow::Result<()> {
    const REFRESH: &str = "Refresh";
    const CHANGE_CITY: &str = "Change city";
    const QUIT: &str = "Quit";

    let config = Config::load()?;
    let sun = load_sun_table(&config);
    let mut fetcher =
        WeatherFetcher::restore(source_from_config(&config)?, Box::new(FileStore::open_default()?))?;

    loop {
        if let Err(err) = fetcher.refresh().await {
            eprintln!("Refresh failed: {err}");
        }

        let moment = moment_for(&sun, fetcher.location());
        println!();
        print!("{}", render::card(fetcher.location(), &fetcher.snapshot(), moment));
        println!();

        let choice = Select::new("Action:", vec![REFRESH, CHANGE_CITY, QUIT]).prompt()?;
        match choice {
            REFRESH => continue,
            CHANGE_CITY => {
                let picked = pick_city(fetcher.location())?;
                fetcher.select_city(picked.city_name)?;
            }
            _ => return Ok(()),
        }
    }
}

fn select(city: Option<String>) -> anyhow::Result<()> {
    let mut store = FileStore::open_default()?;

    let picked = match city {
        Some(name) => match location::resolve(&name) {
            Some(loc) => loc,
            None => bail!(
                "Unknown city '{name}'.\n\
                 Hint: run `weather cities` to list supported cities."
            ),
        },
        None => pick_city(saved_city(&store)?)?,
    };

    save_city(&mut store, picked)?;
    println!("Selected {}", picked.city_name);
    Ok(())
}

fn pick_city(current: &LocationInfo) -> anyhow::Result<&'static LocationInfo> {
    let names: Vec<&str> = location::all().iter().map(|l| l.city_name).collect();
    let cursor = names.iter().position(|n| *n == current.city_name).unwrap_or(0);

    let name = Select::new("City:", names).with_starting_cursor(cursor).prompt()?;
    Ok(location::resolve_or_default(name))
}

fn load_sun_table(config: &Config) -> SunTable {
    let Some(path) = config.sun_table_path() else {
        return SunTable::default();
    };

    match SunTable::load(path) {
        Ok(table) => table,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "sunrise/sunset data unavailable, assuming day");
            SunTable::default()
        }
    }
}

fn moment_for(sun: &SunTable, location: &LocationInfo) -> Moment {
    sun.moment(location.sun_county, taipei_now()).unwrap_or_default()
}
