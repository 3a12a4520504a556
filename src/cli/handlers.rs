use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::config::{self, AppConfig, CONFIG_FILE};
use crate::datetime;
use crate::entity::{BatteryRecord, ChargeState};
use crate::error::{Result, SkyfuelError};
use crate::service::BatteryService;
use crate::storage::BatteryStore;

/// Open the service for the current home, failing if `init` was never run.
fn open_service() -> Result<BatteryService> {
    let home = config::home_dir();
    if !home.join(CONFIG_FILE).exists() {
        return Err(SkyfuelError::NotInitialized);
    }
    let config = AppConfig::load(&home)?;
    BatteryService::open(&home, &config)
}

fn parse_state(state: &str) -> Result<ChargeState> {
    state.parse().map_err(SkyfuelError::Validation)
}

fn print_summary(record: &BatteryRecord) {
    println!(
        "{}  {:>2}S  {:>6} mAh  {:<7}  updated {}",
        datetime::short_id(&record.id()),
        record.nb_cells(),
        record.capacity(),
        record.charge_state().to_string(),
        datetime::format(&record.updated_at())
    );
}

fn print_details(service: &BatteryService, record: &BatteryRecord) {
    let qr_path = service.codec().artifact_path(&record.id());
    println!("Battery {}", record.id());
    println!("  Cells:        {}S", record.nb_cells());
    println!("  Capacity:     {} mAh", record.capacity());
    println!("  State:        {}", record.charge_state());
    println!("  Registered:   {}", datetime::format(&record.registered_at()));
    println!("  Last update:  {}", datetime::format(&record.updated_at()));
    if qr_path.exists() {
        println!("  QR code:      {}", qr_path.display());
    } else {
        println!("  QR code:      (not rendered, run 'skyfuel qr {}')", record.id());
    }
}

pub fn handle_init() -> Result<()> {
    let home = config::home_dir();
    if home.join(CONFIG_FILE).exists() {
        return Err(SkyfuelError::AlreadyInitialized(home.display().to_string()));
    }

    let config = AppConfig::default();
    config.save(&home)?;
    BatteryStore::open(&config.database_path(&home))?;

    println!("Initialized skyfuel home in {}", home.display());
    Ok(())
}

pub fn handle_add(cells: i64, capacity: i64, state: String, json: bool) -> Result<()> {
    let state = parse_state(&state)?;
    let service = open_service()?;

    let (record, artifact) = service.register(cells, capacity, state)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "Registered battery {} ({}S {} mAh, {})",
            record.id(),
            record.nb_cells(),
            record.capacity(),
            record.charge_state()
        );
        println!("QR code written to {}", artifact.path.display());
    }
    Ok(())
}

pub fn handle_list(state: Option<String>, json: bool) -> Result<()> {
    let state = state.as_deref().map(parse_state).transpose()?;
    let service = open_service()?;
    let records = match state {
        Some(state) => service.list_by_state(state)?,
        None => service.list()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        match state {
            Some(state) => println!("No {} batteries.", state),
            None => println!("No batteries registered."),
        }
        return Ok(());
    }
    for record in &records {
        print_summary(record);
    }
    Ok(())
}

pub fn handle_get(id: String, json: bool) -> Result<()> {
    let service = open_service()?;
    let id = service.resolve_id(&id)?;
    let record = service.get(&id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_details(&service, &record);
    }
    Ok(())
}

pub fn handle_latest(json: bool) -> Result<()> {
    let service = open_service()?;

    match service.latest()? {
        Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
        Some(record) => print_details(&service, &record),
        None if json => println!("null"),
        None => println!("No batteries registered."),
    }
    Ok(())
}

pub fn handle_set_state(id: String, state: String, json: bool) -> Result<()> {
    let state = parse_state(&state)?;
    let service = open_service()?;
    let id = service.resolve_id(&id)?;

    let record = service.change_state(&id, state)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "Battery {} is now {}",
            datetime::short_id(&record.id()),
            record.charge_state()
        );
    }
    Ok(())
}

pub fn handle_delete(id: String) -> Result<()> {
    let service = open_service()?;
    let id = service.resolve_id(&id)?;

    let record = service.remove(&id)?;
    println!("Deleted battery {}", record.id());
    Ok(())
}

pub fn handle_qr(id: String) -> Result<()> {
    let service = open_service()?;
    let id = service.resolve_id(&id)?;

    let artifact = service.render(&id)?;
    println!("{}", artifact.path.display());
    Ok(())
}

pub fn handle_scan(text: Option<String>, stdin: bool, json: bool) -> Result<()> {
    let raw = if stdin {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        content
    } else {
        text.unwrap_or_default()
    };

    let service = open_service()?;
    let record = service.resolve_scan(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_details(&service, &record);
    }
    Ok(())
}

pub fn handle_export(output: Option<PathBuf>) -> Result<()> {
    let service = open_service()?;
    let json = service.export()?;

    match output {
        Some(path) => {
            fs::write(&path, format!("{}\n", json))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn handle_import(file: Option<PathBuf>, stdin: bool, json: bool) -> Result<()> {
    let content = match file {
        Some(path) if !stdin => fs::read_to_string(&path)?,
        _ => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            content
        }
    };

    let service = open_service()?;
    let summary = service.import(&content)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Imported {} of {} batteries ({} already registered)",
            summary.imported, summary.total, summary.skipped
        );
    }
    Ok(())
}

pub fn handle_stats(json: bool) -> Result<()> {
    let service = open_service()?;
    let stats = service.statistics()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Batteries:       {}", stats.total);
    println!("  low:           {}", stats.low);
    println!("  storage:       {}", stats.storage);
    println!("  full:          {}", stats.full);
    println!("Total cells:     {}", stats.total_cells);
    println!("Total capacity:  {} mAh", stats.total_capacity);
    if stats.needing_charge() > 0 {
        println!("{} battery(ies) need charging", stats.needing_charge());
    }
    Ok(())
}
