//! `GET /dashboard` (also served at `/export-page`): HTML overview with record
//! counts, download links and the API surface.

use axum::{extract::State, response::Html};

use super::{ApiError, AppState};
use crate::models::RecordKind;
use crate::store::Filter;

pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let backend = state.storage.resolve_backend().await;

    let mut cards = String::new();
    let mut sections = String::new();
    for kind in RecordKind::ALL {
        let count = state
            .storage
            .get_collection(kind.collection())
            .await
            .count(&Filter::new())
            .await
            .map_err(|e| ApiError::storage("Error loading dashboard", e))?;

        cards.push_str(&format!(
            r#"<div class="stat-card"><div class="stat-number">{count}</div><div class="stat-label">{title}</div></div>"#,
            title = section_title(kind),
        ));
        sections.push_str(&format!(
            r#"<div class="export-section"><h3>{title}</h3>
<a class="button" href="/export?data_type={name}&format=json">Download JSON</a>
<a class="button" href="/export?data_type={name}&format=csv">Download CSV</a></div>
"#,
            title = section_title(kind),
            name = kind.as_str(),
        ));
    }

    Ok(Html(render_page(&cards, &sections, backend.kind().as_str())))
}

fn section_title(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Sentiments => "Emotions",
        RecordKind::Vlogs => "Vlogs",
        RecordKind::Gps => "Locations",
    }
}

/// Method, path and purpose of each endpoint the app integrates with.
const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("POST", "/vlogs", "Submit vlog data"),
    ("POST", "/sentiments", "Submit sentiment data"),
    ("POST", "/gps", "Submit GPS coordinate data"),
    ("GET", "/vlogs", "Retrieve vlogs (skip, limit, user_id)"),
    ("GET", "/sentiments", "Retrieve sentiments (skip, limit, user_id)"),
    ("GET", "/gps", "Retrieve GPS coordinates (skip, limit, user_id)"),
    ("GET", "/export", "Export data (data_type, format)"),
    ("GET", "/health", "Service and storage status"),
];

fn endpoint_list() -> String {
    let mut html = String::from("<ul>\n");
    for (method, path, purpose) in ENDPOINTS {
        html.push_str(&format!(
            "<li><strong>{method}</strong> <code>{path}</code> - {purpose}</li>\n"
        ));
    }
    html.push_str("</ul>");
    html
}

fn render_page(cards: &str, sections: &str, backend: &str) -> String {
    let endpoints = endpoint_list();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>EmoGo Data Export Portal</title>
<style>
body {{ font-family: Arial, sans-serif; max-width: 1000px; margin: 0 auto; padding: 20px; background: #f0f2f5; }}
.stats {{ display: flex; justify-content: space-around; margin: 20px 0; }}
.stat-card {{ background: #667eea; color: white; padding: 20px; border-radius: 8px; text-align: center; min-width: 200px; }}
.stat-number {{ font-size: 2em; font-weight: bold; }}
.export-section {{ margin: 20px 0; padding: 20px; background: white; border-radius: 8px; border-left: 4px solid #007bff; }}
.button {{ display: inline-block; padding: 12px 24px; margin: 8px; background: #007bff; color: white; border-radius: 6px; text-decoration: none; }}
</style>
</head>
<body>
<h1>EmoGo Data Export Portal</h1>
<p>Storage backend: <code>{backend}</code></p>
<div class="stats">{cards}</div>
{sections}<div class="export-section"><h3>All Data</h3>
<a class="button" href="/export?data_type=all&format=json">Download All (JSON)</a></div>
<div class="export-section"><h3>API Endpoints</h3>
{endpoints}</div>
</body>
</html>
"#
    )
}
