//! Vigia: Signalling-Equipment Analytics
//!
//! Interactive entry point over the dashboard orchestrator: launch one
//! filterable dashboard per (line, analysis) pair, check status, stop them
//! all. The GUI that normally drives the orchestrator talks to the same
//! `launch`/`stop_all` surface.

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vigia::data::AnalysisType;
use vigia::orchestrator::ProgressFn;
use vigia::{AppConfig, DashboardOrchestrator, LaunchOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = AppConfig::from_env();

    println!("\n{}", "═".repeat(60));
    println!("🚦 Vigía: Análisis de Señalización v0.2.0");
    println!("{}", "═".repeat(60));
    println!("Carpeta de datos: {}", config.output_dir.display());
    println!("Puerto base: {}", config.base_port);
    println!("{}\n", "═".repeat(60));

    let orchestrator = DashboardOrchestrator::new(&config.output_dir, config.base_port);
    info!(folder = %config.output_dir.display(), "orchestrator ready");

    println!("💡 Comandos: 'launch <LINEA> <CDV|ADV>' | 'status' | 'stop' | 'quit'\n");

    loop {
        print!("vigia> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let parts: Vec<&str> = input.split_whitespace().collect();

        match parts.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] | ["q"] => {
                orchestrator.stop_all().await;
                println!("\n👋 Hasta luego!\n");
                break;
            }
            ["status"] => {
                let rows = orchestrator.status().await;
                if rows.is_empty() {
                    println!("  (sin dashboards)\n");
                } else {
                    for (key, port, state) in rows {
                        println!("  {key:<12} puerto {port:<6} {state}");
                    }
                    println!();
                }
            }
            ["stop"] => {
                let stopped = orchestrator.stop_all().await;
                println!("🛑 {stopped} dashboard(s) detenido(s)\n");
            }
            ["launch", line, analysis] => {
                let Some(analysis) = AnalysisType::parse(analysis) else {
                    println!("⚠️  Tipo de análisis desconocido: use CDV o ADV\n");
                    continue;
                };
                let progress: ProgressFn = Arc::new(|pct, msg| {
                    let pct = pct.map_or_else(|| "  -".to_string(), |p| format!("{p:>3}"));
                    println!("   [{pct}%] {}", msg.unwrap_or(""));
                });
                match orchestrator.launch(line, analysis, Some(progress)).await {
                    Ok(LaunchOutcome::Started { port }) => {
                        println!("✅ Dashboard {line} {analysis} en http://localhost:{port}\n");
                    }
                    Ok(LaunchOutcome::AlreadyRunning { port }) => {
                        println!("ℹ️  Ya está en ejecución en http://localhost:{port}\n");
                    }
                    Err(err) => {
                        println!("❌ No se pudo lanzar el dashboard: {err:#}\n");
                    }
                }
            }
            _ => {
                println!("⚠️  Comando no reconocido\n");
            }
        }
    }

    Ok(())
}
