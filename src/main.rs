use clap::Parser;
use skyfuel::cli::{
    handle_add, handle_delete, handle_export, handle_get, handle_import, handle_init,
    handle_latest, handle_list, handle_qr, handle_scan, handle_set_state, handle_stats, Cli,
    Commands,
};

fn main() {
    let cli = Cli::parse();
    skyfuel::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Add {
            cells,
            capacity,
            state,
            json,
        } => handle_add(cells, capacity, state, json),
        Commands::List { state, json } => handle_list(state, json),
        Commands::Get { id, json } => handle_get(id, json),
        Commands::Latest { json } => handle_latest(json),
        Commands::SetState { id, state, json } => handle_set_state(id, state, json),
        Commands::Delete { id } => handle_delete(id),
        Commands::Qr { id } => handle_qr(id),
        Commands::Scan { text, stdin, json } => handle_scan(text, stdin, json),
        Commands::Export { output } => handle_export(output),
        Commands::Import { file, stdin, json } => handle_import(file, stdin, json),
        Commands::Stats { json } => handle_stats(json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
