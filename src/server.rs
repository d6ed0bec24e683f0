//! Dashboard HTTP Surface
//!
//! One axum application per dashboard instance, bound to localhost on the
//! instance's allocated port. Serves the single-page view, the overview
//! payload and the apply-filters action. The filter recompute is synchronous
//! inside the request handler; a slow recompute only delays this instance's
//! own response cycle.

use anyhow::{Context, Result};
use axum::{
    extract::{Json, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::analytics::{AnomalyRecord, KpiValue};
use crate::data::{AnalysisType, FilterSpec};
use crate::figures::FigureSet;
use crate::orchestrator::instance::{DashboardInstance, DetailRow};

/// Bind the instance's listener and spawn its serve task. Binding happens
/// here, before the task detaches, so a port problem surfaces to the
/// launcher instead of dying silently inside the task.
pub async fn spawn(instance: Arc<DashboardInstance>) -> Result<JoinHandle<()>> {
    let port = instance.port;
    let key = instance.key.clone();
    let app = router(instance);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("binding dashboard port {port}"))?;
    info!(%key, "dashboard listening at http://127.0.0.1:{port}");
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(%key, %err, "dashboard server terminated");
        }
    }))
}

fn router(instance: Arc<DashboardInstance>) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/health", get(|| async { "OK" }))
        .route("/api/overview", get(overview))
        .route("/api/filters", post(apply_filters))
        .layer(TraceLayer::new_for_http())
        .with_state(instance)
}

#[derive(Serialize)]
struct Overview {
    line: String,
    analysis: AnalysisType,
    port: u16,
    kpis: BTreeMap<String, KpiValue>,
    recommendations: Vec<String>,
    detected_patterns: Vec<String>,
    anomalies: Vec<AnomalyRecord>,
    summary: BTreeMap<String, serde_json::Value>,
    equipment: Vec<String>,
    date_min: Option<NaiveDate>,
    date_max: Option<NaiveDate>,
    figures: FigureSet,
    details: Vec<DetailRow>,
}

async fn overview(State(instance): State<Arc<DashboardInstance>>) -> impl IntoResponse {
    let (date_min, date_max) = instance.date_range();
    Json(Overview {
        line: instance.store.line.clone(),
        analysis: instance.store.analysis,
        port: instance.port,
        kpis: instance.kpis.clone(),
        recommendations: instance.insights.recommendations.clone(),
        detected_patterns: instance.insights.detected_patterns.clone(),
        anomalies: instance.insights.anomalies.clone(),
        summary: instance.insights.summary.clone(),
        equipment: instance.equipment_list(),
        date_min,
        date_max,
        figures: instance.initial_figures(),
        details: instance.detail_rows(),
    })
}

/// The apply-filters action. Last write wins: whatever response the browser
/// renders last is the state it shows.
async fn apply_filters(
    State(instance): State<Arc<DashboardInstance>>,
    Json(spec): Json<FilterSpec>,
) -> impl IntoResponse {
    Json(instance.recompute(&spec))
}

async fn page(State(instance): State<Arc<DashboardInstance>>) -> impl IntoResponse {
    let line = &instance.store.line;
    let analysis = instance.store.analysis;
    let generated = chrono::Local::now().format("%d-%m-%Y %H:%M");

    // NOTE: literal braces in CSS/JS are doubled for the format! macro.
    Html(format!(
        r####"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Dashboard {line} {analysis}</title>
<style>
  body {{ background: #F0F2F6; color: #2C3E50; font-family: -apple-system, "Segoe UI", sans-serif; margin: 0; }}
  header {{ background: #2C3E50; color: white; padding: 20px; text-align: center; margin-bottom: 20px; }}
  header p {{ margin: 4px 0 0; opacity: 0.7; font-size: 13px; }}
  .wrap {{ max-width: 1100px; margin: 0 auto; padding: 0 15px 40px; }}
  .cards {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px; margin-bottom: 20px; }}
  .kpi {{ border-radius: 6px; color: white; padding: 12px; }}
  .kpi h3 {{ margin: 0; font-size: 26px; }}
  .kpi p {{ margin: 4px 0 0; font-size: 12px; opacity: 0.85; }}
  .panel {{ background: white; border-radius: 6px; padding: 15px; margin-bottom: 20px; box-shadow: 0 1px 2px rgba(0,0,0,0.08); }}
  .panel h5 {{ margin: 0 0 10px; }}
  .grid2 {{ display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }}
  .bar-row {{ display: flex; align-items: center; gap: 8px; font-size: 12px; margin: 2px 0; }}
  .bar-row .label {{ width: 110px; text-align: right; overflow: hidden; white-space: nowrap; }}
  .bar-row .bar {{ background: #3498DB; height: 14px; }}
  .filters label {{ display: block; font-size: 12px; margin: 8px 0 2px; }}
  .filters select, .filters input {{ width: 100%; }}
  button {{ background: #3498DB; color: white; font-weight: bold; padding: 10px 20px; border: none; border-radius: 5px; cursor: pointer; margin-top: 12px; }}
  table {{ border-collapse: collapse; width: 100%; font-size: 12px; }}
  th, td {{ border: 1px solid #ddd; padding: 4px 6px; text-align: left; }}
  th {{ background: #f4f4f4; }}
  .heat td {{ width: 18px; height: 14px; border: 1px solid #eee; padding: 0; }}
  .muted {{ color: #888; font-style: italic; }}
</style>
</head>
<body>
<header>
  <h2>Dashboard de Análisis - {line} {analysis}</h2>
  <p>Fecha de generación: {generated}</p>
</header>
<div class="wrap">
  <div class="cards" id="kpi-cards"></div>
  <div class="grid2">
    <div class="panel"><h5>Tendencia Temporal</h5><div id="fig-trend"></div></div>
    <div class="panel"><h5>Distribución por Equipo</h5><div id="fig-distribution"></div></div>
  </div>
  <div class="panel filters">
    <h5>Filtros y Controles</h5>
    <div class="grid2">
      <div>
        <label>Fecha inicio</label><input type="date" id="start-date">
        <label>Fecha fin</label><input type="date" id="end-date">
      </div>
      <div>
        <label>Equipos</label><select id="equipment" multiple size="4"></select>
        <label>Tipo de visualización</label>
        <select id="granularity">
          <option value="daily">Diario</option>
          <option value="weekly">Semanal</option>
          <option value="monthly">Mensual</option>
        </select>
      </div>
    </div>
    <button onclick="applyFilters()">Aplicar filtros</button>
  </div>
  <div class="grid2">
    <div class="panel"><h5>Distribución Temporal</h5><div id="fig-temporal"></div></div>
    <div class="panel"><h5>Mapa de Calor</h5><div id="fig-heatmap"></div></div>
  </div>
  <div class="grid2">
    <div class="panel"><h5>Recomendaciones de Mantenimiento</h5><ul id="recommendations"></ul></div>
    <div class="panel"><h5>Patrones Detectados</h5><div id="patterns"></div></div>
  </div>
  <div class="panel"><h5>Datos Detallados</h5><div id="details"></div></div>
</div>
<script>
const KPI_COLORS = ['#E74C3C', '#F39C12', '#2C3E50', '#2ECC71'];

function renderFigure(el, spec) {{
  el.innerHTML = '';
  if (spec.no_data) {{
    el.innerHTML = '<p class="muted">' + spec.title + '</p>';
    return;
  }}
  if (spec.kind === 'heatmap') {{
    const max = Math.max(1, ...spec.cells.flat());
    let html = '<table class="heat"><tr><th></th>' +
      spec.categories.map(c => '<th>' + c + '</th>').join('') + '</tr>';
    spec.rows.forEach((row, i) => {{
      html += '<tr><th>' + row + '</th>' + spec.cells[i].map(v => {{
        const alpha = v / max;
        return '<td title="' + v + '" style="background: rgba(44,62,80,' + alpha + ')"></td>';
      }}).join('') + '</tr>';
    }});
    el.innerHTML = html + '</table><p class="muted">' + spec.title + '</p>';
    return;
  }}
  const max = Math.max(1, ...spec.values);
  let html = '';
  spec.categories.forEach((cat, i) => {{
    const width = 100 * spec.values[i] / max;
    html += '<div class="bar-row"><span class="label">' + cat + '</span>' +
      '<div class="bar" style="width:' + width + '%"></div><span>' + spec.values[i] + '</span></div>';
  }});
  el.innerHTML = html + '<p class="muted">' + spec.title + '</p>';
}}

function renderFigures(figures) {{
  renderFigure(document.getElementById('fig-trend'), figures.trend);
  renderFigure(document.getElementById('fig-distribution'), figures.distribution);
  renderFigure(document.getElementById('fig-temporal'), figures.temporal);
  renderFigure(document.getElementById('fig-heatmap'), figures.heatmap);
}}

async function loadOverview() {{
  const res = await fetch('/api/overview');
  const data = await res.json();

  const cards = document.getElementById('kpi-cards');
  Object.entries(data.kpis).forEach(([name, value], i) => {{
    const pretty = typeof value === 'number' ? Math.round(value * 100) / 100 : value;
    cards.innerHTML += '<div class="kpi" style="background:' + KPI_COLORS[i % 4] + '">' +
      '<h3>' + pretty + '</h3><p>' + name.replaceAll('_', ' ') + '</p></div>';
  }});

  const recs = document.getElementById('recommendations');
  data.recommendations.forEach(r => {{ recs.innerHTML += '<li>' + r + '</li>'; }});

  const patterns = document.getElementById('patterns');
  patterns.innerHTML = data.detected_patterns.length
    ? '<ul>' + data.detected_patterns.map(p => '<li>' + p + '</li>').join('') + '</ul>'
    : '<p class="muted">No se detectaron patrones significativos</p>';

  const select = document.getElementById('equipment');
  data.equipment.forEach(eq => {{
    select.innerHTML += '<option value="' + eq + '">' + eq + '</option>';
  }});
  if (data.date_min) document.getElementById('start-date').value = data.date_min;
  if (data.date_max) document.getElementById('end-date').value = data.date_max;

  const details = document.getElementById('details');
  if (data.details.length) {{
    let html = '<table><tr><th>Fecha Hora</th><th>Equipo</th><th>Detalle</th></tr>';
    data.details.forEach(d => {{
      html += '<tr><td>' + (d.timestamp || '-') + '</td><td>' + d.equipment +
        '</td><td>' + (d.context || d.extra || '-') + '</td></tr>';
    }});
    details.innerHTML = html + '</table>';
  }} else {{
    details.innerHTML = '<p class="muted">No hay datos disponibles para mostrar en la tabla.</p>';
  }}

  renderFigures(data.figures);
}}

async function applyFilters() {{
  const selected = Array.from(document.getElementById('equipment').selectedOptions).map(o => o.value);
  const spec = {{
    start_date: document.getElementById('start-date').value || null,
    end_date: document.getElementById('end-date').value || null,
    equipment: selected,
    granularity: document.getElementById('granularity').value
  }};
  const res = await fetch('/api/filters', {{
    method: 'POST',
    headers: {{ 'Content-Type': 'application/json' }},
    body: JSON.stringify(spec)
  }});
  renderFigures(await res.json());
}}

loadOverview();
</script>
</body>
</html>"####
    ))
}
