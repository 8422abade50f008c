use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::{CoordinatorClient, JobStatus};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar al coordinator")]
struct Cli {
    /// Ruta del socket (por defecto MR_SOCKET o /var/tmp/5840-mr-<uid>)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fase, contadores y tareas en vuelo del job
    Status,
    /// ¿Terminó el job? (exit code 0 si sí, 1 si no)
    Done,
}

fn print_status(st: &JobStatus) {
    println!("Job:");
    println!("  fase: {:?}", st.phase);
    println!("  maps: {}/{} repartidos", st.maps_issued, st.total_maps);
    println!("  reduces: {}/{} repartidos", st.reduces_issued, st.total_reduces);
    println!("  en vuelo: {}", st.in_flight);
    println!("  reasignaciones: {}", st.reassignments);

    // progreso calculado localmente (repartidas, no terminadas)
    let total = st.total_maps + st.total_reduces;
    if total > 0 {
        let pct = ((st.maps_issued + st.reduces_issued) as f64 / total as f64) * 100.0;
        println!("  repartido: {:.1}%", pct);
    }

    println!("  iniciado: {}", st.started_at);
    if let Some(ref done) = st.finished_at {
        println!("  finalizado: {}", done);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(common::coordinator_sock);
    let client = CoordinatorClient::connect(&socket)?;

    match cli.command {
        Commands::Status => {
            let st = client.status().await?;
            print_status(&st);
        }

        Commands::Done => {
            let done = client.is_done().await?;
            println!("{}", if done { "terminado" } else { "en curso" });
            if !done {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
