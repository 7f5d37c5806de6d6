use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use lib::announce::{Almanac, Haiku, LAST_ENTRY_URL_KEY, LastEntryUrls, pick_new_entry};
use lib::{
    AccuWeatherFile, Announcement, ArticleFeeds, ConditionGroups, CycleConfig, DaybreakError,
    ForecastSource, HistoryStore, JsonFileStorage, RuleCatalog, announce_new_entry, build_payload,
    init_logger, run_cycle, write_history_csv, write_payload,
};
use log::debug;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Saved AccuWeather daily forecast response (JSON)
    #[arg(short, long)]
    forecast: PathBuf,

    /// Rule catalog (JSON object of rule name -> conditions). Uses the built-in catalog if omitted
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// History store file holding lastWeather / weatherHistories
    #[arg(short, long, default_value = "daybreak-store.json")]
    store: PathBuf,

    /// Recent article listings (JSON with tayori / saijiki / tenkijp lists)
    #[arg(long)]
    articles: Option<PathBuf>,

    /// Sunrise / sunset / moon timings (JSON)
    #[arg(long)]
    almanac: Option<PathBuf>,

    /// Poem of the day (JSON with text / author)
    #[arg(long)]
    haiku: Option<PathBuf>,

    /// URL of the rendered weather image
    #[arg(long)]
    image_url: Option<String>,

    /// AccuWeather location key used for the forecast link
    #[arg(long)]
    location_id: Option<String>,

    /// Output base name (will create dir containing the payload and history export)
    #[arg(short, long, default_value = "output")]
    output: String,

    /// Keep at most this many history entries (unbounded if not specified)
    #[arg(long)]
    retention: Option<usize>,

    /// Hours east of UTC of the local calendar
    #[arg(long, default_value_t = 9, value_parser = clap::value_parser!(i32).range(-12..=14))]
    utc_offset: i32,

    /// Decide as of this RFC 3339 instant instead of now
    #[arg(long, value_parser = parse_instant)]
    now: Option<DateTime<FixedOffset>>,

    /// Select without writing to the history store
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn parse_instant(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value).map_err(|e| format!("{}: {}", value, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DaybreakError> {
    debug!("Reading {}", path.display());
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn main() -> Result<(), DaybreakError> {
    // Initialize timer, CLI args and logger
    let total_start = Instant::now();
    let args = Args::parse();
    init_logger(args.debug)?;

    let config = CycleConfig {
        utc_offset_hours: args.utc_offset,
        retention: args.retention,
        dry_run: args.dry_run,
    };
    let now = args
        .now
        .unwrap_or_else(|| Utc::now().fixed_offset())
        .with_timezone(&config.offset()?);

    println!("Daybreak! Morning weather label");
    debug!(
        "Forecast: {} | Store: {} | Date: {}",
        args.forecast.display(),
        args.store.display(),
        now
    );
    debug!(
        "Creating cycle configuration | Offset={}h, Retention={:?}, DryRun={}",
        config.utc_offset_hours, config.retention, config.dry_run
    );

    let catalog = match &args.catalog {
        Some(path) => RuleCatalog::load(path, ConditionGroups::accuweather())?,
        None => RuleCatalog::builtin()?,
    };
    println!("Loaded {} rules", catalog.len());

    let snapshot = AccuWeatherFile::new(&args.forecast).fetch_forecast(now)?;
    debug!(
        "Snapshot: {:.1}°C, {:.2}mm, {:.1}m/s @ {}°, icon {}",
        snapshot.temperature_c(),
        snapshot.rainfall_mm(),
        snapshot.wind_speed_mps(),
        snapshot.wind_direction_deg(),
        snapshot.weather_id()
    );

    // Decide
    let decision_start = Instant::now();
    let storage = JsonFileStorage::open(&args.store)?;
    debug!("Opened history store at {}", storage.path().display());
    let mut store = HistoryStore::open(storage, config.retention);
    let outcome = run_cycle(&catalog, snapshot, now, &mut store, &config)?;
    println!(
        "Today's weather: 「{}」 (decided in {:.2?})",
        outcome.name(),
        decision_start.elapsed()
    );

    // Announcement
    let entry = match &args.articles {
        Some(path) => {
            let feeds: ArticleFeeds = read_json(path)?;
            if config.dry_run {
                let seen: LastEntryUrls = store.read(LAST_ENTRY_URL_KEY)?.unwrap_or_default();
                pick_new_entry(&feeds, &seen).map(|(entry, _)| entry)
            } else {
                announce_new_entry(&mut store, &feeds)?
            }
        }
        None => None,
    };
    let almanac: Option<Almanac> = args.almanac.as_deref().map(read_json::<Almanac>).transpose()?;
    let haiku: Option<Haiku> = args.haiku.as_deref().map(read_json::<Haiku>).transpose()?;
    let announcement = Announcement {
        location_id: args.location_id.clone(),
        image_url: args.image_url.clone(),
        almanac,
        haiku,
        entry,
    };
    let payload = build_payload(outcome.name(), outcome.snapshot.weather_id(), &announcement);

    // Create output directory
    let output_dir = PathBuf::from(format!("./output/{}", args.output));
    fs::create_dir_all(&output_dir)?;
    let output_name = args
        .output
        .split(['/', '\\'])
        .next_back()
        .unwrap_or(&args.output);
    let payload_path = output_dir.join(format!("{}.payload.json", output_name));
    let history_path = output_dir.join(format!("{}.history.csv", output_name));

    write_payload(&payload, &payload_path)?;
    write_history_csv(&store.histories()?, &history_path)?;
    store.close();

    println!("\nWrote files to directory: {}", output_dir.display());
    debug!("  - {}", payload_path.display());
    debug!("  - {}", history_path.display());

    println!("Cycle completed successfully in {:.2?}", total_start.elapsed());
    Ok(())
}
