// Server-rendered HTML forms for browsers without a JSON client.

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::fmt::Write;

use super::{AppState, BuildDecksRequest, ImportTagRequest};
use crate::models::DeckResponse;

#[derive(Deserialize)]
pub struct MetaForm {
    #[serde(default)]
    pub meta: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/ui", get(ui))
        .route("/build_decks_form", post(build_decks_form))
        .route("/admin", get(admin))
        .route("/update_cards_form", post(update_cards_form))
        .route("/update_meta_form", post(update_meta_form))
        .route("/import", get(import_page).post(import_form))
}

/// Escape text for use inside HTML element content or quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<title>{title}</title>\n{body}\n<p><a href=\"/\">back</a></p>\n",
        title = escape_html(title),
    ))
}

// ── Home ──────────────────────────────────────────────────────────────

async fn home() -> Html<String> {
    Html(
        r#"<!doctype html>
<title>Clash Deck Builder</title>
<h1>Clash Deck Builder</h1>
<ul>
  <li><a href="/ui">Build 3 decks</a></li>
  <li><a href="/admin">Admin (refresh cards, paste meta)</a></li>
  <li><a href="/import">Import a player by tag</a></li>
  <li><a href="/players">List players</a></li>
  <li><a href="/debug/files">Data files</a></li>
</ul>
"#
        .to_string(),
    )
}

// ── Deck builder ──────────────────────────────────────────────────────

/// Render the deck form, followed by an error or a result when present.
pub fn render_ui(players: &[String], error: Option<&str>, result: Option<&DeckResponse>) -> Html<String> {
    let mut body = String::from(
        "<h2>Build 3 decks</h2>\n<form method=\"post\" action=\"/build_decks_form\">\n  <label>Player:</label>\n  <select name=\"player_id\">\n",
    );
    for p in players {
        let p = escape_html(p);
        let _ = writeln!(body, "    <option value=\"{p}\">{p}</option>");
    }
    body.push_str(
        "  </select>\n  <br><br>\n  <label>Prompt:</label><br>\n  <textarea name=\"prompt\" rows=\"3\" cols=\"60\" placeholder=\"e.g. a 2.6 cycle deck with Hog Rider\"></textarea>\n  <br><br>\n  <button type=\"submit\">Build</button>\n</form>\n",
    );

    if let Some(err) = error {
        let _ = write!(
            body,
            "<hr>\n<p style=\"color:#b00\"><b>Error:</b> {}</p>\n",
            escape_html(err)
        );
    }

    if let Some(result) = result {
        body.push_str("<hr>\n<h3>Result</h3>\n");
        for (i, deck) in result.decks.iter().enumerate() {
            let _ = writeln!(body, "<h4>Deck {}</h4>\n<ul>", i + 1);
            for card in &deck.cards {
                let _ = writeln!(body, "  <li>{}</li>", escape_html(card));
            }
            body.push_str("</ul>\n");
            if let Some(avg) = deck.avg_elixir {
                let _ = writeln!(body, "<p><b>Average elixir:</b> {avg}</p>");
            }
            if !deck.evolved_cards.is_empty() {
                let _ = writeln!(
                    body,
                    "<p><b>Evolutions:</b> {}</p>",
                    escape_html(&deck.evolved_cards.join(", "))
                );
            }
            if !deck.reasons.is_empty() {
                let _ = writeln!(body, "<p><b>Reasons:</b> {}</p>", escape_html(&deck.reasons));
            }
            if !deck.warnings.is_empty() {
                let _ = writeln!(body, "<p><b>Warnings:</b> {}</p>", escape_html(&deck.warnings));
            }
        }
    }

    page("Build 3 decks", &body)
}

/// Player ids for the dropdown. A store failure renders an empty list.
async fn player_ids(state: &AppState) -> Vec<String> {
    state.service.list_players().await.unwrap_or_else(|e| {
        tracing::warn!("Could not list players: {e}");
        Vec::new()
    })
}

async fn ui(State(state): State<AppState>) -> Html<String> {
    let players = player_ids(&state).await;
    render_ui(&players, None, None)
}

async fn build_decks_form(
    State(state): State<AppState>,
    Form(req): Form<BuildDecksRequest>,
) -> Html<String> {
    let players = player_ids(&state).await;
    match state.service.build_decks(&req.player_id, &req.prompt).await {
        Ok(result) => render_ui(&players, None, Some(&result)),
        Err(e) => {
            tracing::error!("Deck build for '{}' failed: {e}", req.player_id.trim());
            render_ui(&players, Some(&e.to_string()), None)
        }
    }
}

// ── Admin ─────────────────────────────────────────────────────────────

fn render_admin(message: Option<&str>) -> Html<String> {
    let mut body = String::from(
        r#"<h2>Admin</h2>
<form method="post" action="/update_cards_form">
  <button type="submit">Refresh cards (vendor API)</button>
</form>
<hr>
<h3>Update meta</h3>
<form method="post" action="/update_meta_form">
  <p>Paste the full meta snapshot JSON:</p>
  <textarea name="meta" rows="14" cols="100" placeholder='{"period":"...","archetypes":[...]}'></textarea>
  <br><br>
  <button type="submit">Save meta</button>
</form>
"#,
    );
    if let Some(msg) = message {
        let _ = writeln!(body, "<p><b>{}</b></p>", escape_html(msg));
    }
    page("Admin", &body)
}

async fn admin() -> Html<String> {
    render_admin(None)
}

async fn update_cards_form(State(state): State<AppState>) -> Response {
    match state.service.refresh_catalog().await {
        Ok(_) => Redirect::to("/admin").into_response(),
        Err(e) => {
            tracing::error!("Card refresh failed: {e}");
            (
                super::error_status(&e),
                render_admin(Some(&format!("Card refresh failed: {e}"))),
            )
                .into_response()
        }
    }
}

async fn update_meta_form(State(state): State<AppState>, Form(form): Form<MetaForm>) -> Response {
    match state.service.update_meta_text(&form.meta).await {
        Ok(_) => Redirect::to("/admin").into_response(),
        Err(e) => (
            super::error_status(&e),
            render_admin(Some(&e.to_string())),
        )
            .into_response(),
    }
}

// ── Import ────────────────────────────────────────────────────────────

fn render_import(message: Option<&str>) -> Html<String> {
    let mut body = String::from(
        r##"<h2>Import a player by tag</h2>
<form method="post" action="/import">
  <label>Local player id (e.g. samuel):</label>
  <input name="player_id"/>
  <br><br>
  <label>Player tag (e.g. #ABCD123):</label>
  <input name="tag" placeholder="#ABCD123"/>
  <br><br>
  <button type="submit">Import</button>
</form>
"##,
    );
    if let Some(msg) = message {
        let _ = writeln!(body, "<p><b>{}</b></p>", escape_html(msg));
    }
    page("Import player", &body)
}

async fn import_page() -> Html<String> {
    render_import(None)
}

async fn import_form(State(state): State<AppState>, Form(req): Form<ImportTagRequest>) -> Response {
    if req.player_id.trim().is_empty() || req.tag.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            render_import(Some("player_id and tag are required")),
        )
            .into_response();
    }
    match state.service.import_player(&req.player_id, &req.tag).await {
        Ok(cards) => render_import(Some(&format!(
            "Player '{}' imported with {cards} cards.",
            req.player_id.trim().to_lowercase()
        )))
        .into_response(),
        Err(e) => {
            tracing::error!("Import of '{}' failed: {e}", req.tag.trim());
            (
                super::error_status(&e),
                render_import(Some(&format!("Import failed: {e}"))),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckSuggestion;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & y")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; y&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("P.E.K.K.A"), "P.E.K.K.A");
    }

    #[test]
    fn test_render_ui_escapes_model_text() {
        let result = DeckResponse {
            decks: vec![DeckSuggestion {
                cards: vec!["Hog Rider".into()],
                avg_elixir: None,
                evolved_cards: vec![],
                reasons: "<b>spam</b>".into(),
                warnings: String::new(),
            }],
        };
        let Html(html) = render_ui(&["ana".to_string()], None, Some(&result));
        assert!(html.contains("<option value=\"ana\">ana</option>"));
        assert!(html.contains("<li>Hog Rider</li>"));
        assert!(html.contains("&lt;b&gt;spam&lt;/b&gt;"));
        assert!(!html.contains("Average elixir"));
        assert!(!html.contains("Warnings"));
    }

    #[test]
    fn test_render_ui_shows_error() {
        let Html(html) = render_ui(&[], Some("player 'x' not found"), None);
        assert!(html.contains("<b>Error:</b> player &#39;x&#39; not found"));
        assert!(!html.contains("Result"));
    }
}
