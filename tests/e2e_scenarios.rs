//! End-to-End Scenarios
//!
//! Real CSV exports on disk, real orchestrator, real listeners on localhost.
//! Each test uses its own base port range so parallel test threads never
//! collide on a bind.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use vigia::analytics::KpiValue;
use vigia::data::{AnalysisType, FilterSpec, TableStore};
use vigia::orchestrator::DashboardInstance;
use vigia::orchestrator::InstanceKey;
use vigia::{DashboardOrchestrator, LaunchOutcome};

fn write_file(dir: &TempDir, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn cdv_export(dir: &TempDir, line: &str) {
    write_file(
        dir,
        &format!("df_{line}_FO_Mensual.csv"),
        "Fecha Hora,Equipo,Estacion\n\
         2024-03-04 08:10:00,CDV_21,Tobalaba\n\
         2024-03-04 08:40:00,CDV_21,Tobalaba\n\
         2024-03-05 14:00:00,CDV_7,Los Leones\n",
    );
    write_file(
        dir,
        &format!("df_{line}_FL_Mensual.csv"),
        "Fecha Hora,Equipo,Estacion\n2024-03-06 10:00:00,CDV_21,Tobalaba\n",
    );
    write_file(
        dir,
        &format!("df_{line}_OCUP_Mensual.csv"),
        "Fecha,Equipo,Count\n2024-03-04,CDV_21,500\n2024-03-05,CDV_7,300\n",
    );
}

fn adv_export(dir: &TempDir, line: &str) {
    write_file(
        dir,
        &format!("df_{line}_ADV_DISC_Mensual.csv"),
        "Fecha Hora,Equipo Estacion,Linea\n04/03/2024 09:00:00,AG_3 Baquedano,L5\n",
    );
    write_file(
        dir,
        &format!("df_{line}_ADV_MOV_Mensual.csv"),
        "Fecha,Equipo,Count\n2024-03-04,AG_3,250\n",
    );
}

#[tokio::test]
async fn launch_is_idempotent_and_reuses_the_port() {
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    let orchestrator = DashboardOrchestrator::new(dir.path(), 38650);

    let first = orchestrator.launch("L1", AnalysisType::Cdv, None).await.unwrap();
    assert_eq!(first, LaunchOutcome::Started { port: 38650 });

    // Second launch of a running key: no-op success, no new port.
    let second = orchestrator.launch("L1", AnalysisType::Cdv, None).await.unwrap();
    assert_eq!(second, LaunchOutcome::AlreadyRunning { port: 38650 });
    assert_eq!(orchestrator.assigned_ports().await, 1);

    // Stop, relaunch: same port comes back.
    assert_eq!(orchestrator.stop_all().await, 1);
    assert!(!orchestrator.is_running("L1", AnalysisType::Cdv).await);
    let third = orchestrator.launch("L1", AnalysisType::Cdv, None).await.unwrap();
    assert_eq!(third, LaunchOutcome::Started { port: 38650 });
    assert_eq!(orchestrator.assigned_ports().await, 1);

    orchestrator.stop_all().await;
}

#[tokio::test]
async fn concurrent_duplicate_launches_yield_one_instance() {
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    let orchestrator = DashboardOrchestrator::new(dir.path(), 38660);

    let a = orchestrator.clone();
    let b = orchestrator.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.launch("L1", AnalysisType::Cdv, None).await }),
        tokio::spawn(async move { b.launch("L1", AnalysisType::Cdv, None).await }),
    );
    let outcomes = [ra.unwrap().unwrap(), rb.unwrap().unwrap()];

    let started = outcomes
        .iter()
        .filter(|o| matches!(o, LaunchOutcome::Started { .. }))
        .count();
    assert_eq!(started, 1, "exactly one launch may win: {outcomes:?}");
    assert_eq!(outcomes[0].port(), outcomes[1].port());
    assert_eq!(orchestrator.assigned_ports().await, 1);

    orchestrator.stop_all().await;
}

#[tokio::test]
async fn distinct_keys_get_distinct_ports_and_servers() {
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    adv_export(&dir, "L5");
    let orchestrator = DashboardOrchestrator::new(dir.path(), 38670);

    let cdv = orchestrator.launch("L1", AnalysisType::Cdv, None).await.unwrap();
    let adv = orchestrator.launch("L5", AnalysisType::Adv, None).await.unwrap();
    assert_eq!(cdv.port(), 38670);
    assert_eq!(adv.port(), 38671);

    // Both servers answer their health probe.
    for port in [cdv.port(), adv.port()] {
        let response = http_get(port, "/health").await;
        assert!(response.contains("200"), "health probe on {port}: {response}");
    }

    assert_eq!(orchestrator.stop_all().await, 2);
}

#[tokio::test]
async fn unreadable_folder_reverts_the_key_to_absent() {
    let orchestrator =
        DashboardOrchestrator::new("/definitely/not/a/folder", 38680);
    let err = orchestrator.launch("L1", AnalysisType::Cdv, None).await;
    assert!(err.is_err());
    assert!(!orchestrator.is_running("L1", AnalysisType::Cdv).await);

    // The key can be launched again once the folder exists.
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    let retry = DashboardOrchestrator::new(dir.path(), 38681);
    assert!(retry.launch("L1", AnalysisType::Cdv, None).await.is_ok());
    retry.stop_all().await;
}

#[tokio::test]
async fn progress_callback_sees_the_launch_phases() {
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    let orchestrator = DashboardOrchestrator::new(dir.path(), 38690);

    let messages: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
    let sink = messages.clone();
    let progress: vigia::orchestrator::ProgressFn = Arc::new(move |_pct, msg| {
        if let Some(msg) = msg {
            sink.lock().unwrap().push(msg.to_string());
        }
    });
    orchestrator.launch("L1", AnalysisType::Cdv, Some(progress)).await.unwrap();

    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("Cargando datos")));
    assert!(messages.iter().any(|m| m.contains("Iniciando servidor web")));
    drop(messages);
    orchestrator.stop_all().await;
}

#[tokio::test]
async fn partial_export_still_produces_a_dashboardable_analysis() {
    // Only the occupancy-failures file exists: insights about top offenders
    // appear, release-failure fields stay absent, reliability is N/A.
    let dir = TempDir::new().unwrap();
    write_file(
        &dir,
        "df_L3_FO_Mensual.csv",
        "Fecha Hora,Equipo,Estacion\n\
         2024-03-04 08:10:00,CDV_50,Irarrazaval\n\
         2024-03-04 09:10:00,CDV_50,Irarrazaval\n\
         2024-03-05 10:10:00,CDV_51,Nuble\n",
    );
    let store = TableStore::load("L3", AnalysisType::Cdv, dir.path()).unwrap();
    let instance =
        DashboardInstance::new(InstanceKey::new("L3", AnalysisType::Cdv), 0, store);

    let top = instance.insights.summary["top_equipos_fallos_ocupacion"]
        .as_array()
        .unwrap();
    assert_eq!(top[0], "CDV_50");
    assert!(!instance
        .insights
        .summary
        .contains_key("top_equipos_fallos_liberacion"));
    assert!(instance
        .insights
        .recommendations
        .iter()
        .any(|r| r.contains("CDV_50")));
    assert_eq!(
        instance.kpis["indice_fiabilidad"],
        KpiValue::Text("N/A".to_string())
    );

    // The dashboard still renders: charts exist, possibly placeholders.
    let figures = instance.initial_figures();
    assert!(!figures.trend.no_data);
}

#[tokio::test]
async fn filtered_figures_are_deterministic_and_fall_back_when_empty() {
    let dir = TempDir::new().unwrap();
    cdv_export(&dir, "L1");
    let store = TableStore::load("L1", AnalysisType::Cdv, dir.path()).unwrap();
    let instance =
        DashboardInstance::new(InstanceKey::new("L1", AnalysisType::Cdv), 0, store);

    let spec = FilterSpec {
        equipment: BTreeSet::from(["CDV_21".to_string()]),
        ..FilterSpec::default()
    };
    let once = instance.recompute(&spec);
    let twice = instance.recompute(&spec);
    assert_eq!(once, twice);
    assert_eq!(once.distribution.categories, vec!["CDV_21"]);

    let nothing_matches = FilterSpec {
        equipment: BTreeSet::from(["CDV_NONE".to_string()]),
        ..FilterSpec::default()
    };
    let fallback = instance.recompute(&nothing_matches);
    // Over-restrictive filter renders the unfiltered charts, never blanks.
    assert!(!fallback.trend.no_data);
    assert_eq!(fallback.distribution.categories.len(), 2);
}

async fn http_get(port: u16, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    stream
        .write_all(
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}
