use std::sync::Arc;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::get,
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tera::Tera;
use shared::protocol::{API_PREFIX, HOME_PATH, REFRESH_PATH};
use shared::types::{Printer, Reading};
use crate::add_printer::{add_printer, AddOutcome, AddPrinterForm};
use crate::api::notice::Notice;
use crate::api::render::render_home;
use crate::dashboard::Toggles;
use crate::refresh::Poller;
use crate::store_manager::StoreHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub poller: Poller,
    pub templates: Arc<Tera>,
}

/// Query of the home page: a notice code and the display toggles
#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub notice: Option<String>,
    pub toggles: Option<String>,
    pub location: Option<String>,
    pub ip: Option<String>,
    pub model: Option<String>,
}

/// Either form of the home page. `add_printer_submit` tells them apart.
#[derive(Debug, Default, Deserialize)]
pub struct HomeForm {
    pub add_printer_submit: Option<String>,
    #[serde(default)]
    pub printer_name: String,
    #[serde(default)]
    pub printer_location: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub department_name: String,
    pub location: Option<String>,
    pub ip: Option<String>,
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct LevelsResponse {
    pub readings: Vec<Reading>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl HomeQuery {
    /// Unchecked boxes are absent, so without the marker the defaults apply
    fn display_toggles(&self) -> Toggles {
        if self.toggles.is_none() {
            return Toggles::default();
        }
        Toggles {
            show_location: self.location.is_some(),
            show_ip: self.ip.is_some(),
            show_model: self.model.is_some(),
        }
    }
}

impl HomeForm {
    fn add_printer_form(&self) -> AddPrinterForm {
        AddPrinterForm {
            printer_name: self.printer_name.clone(),
            printer_location: self.printer_location.clone(),
            ip_address: self.ip_address.clone(),
            department_name: self.department_name.clone(),
        }
    }

    fn display_toggles(&self) -> Toggles {
        Toggles {
            show_location: self.location.is_some(),
            show_ip: self.ip.is_some(),
            show_model: self.model.is_some(),
        }
    }
}

fn toggles_path(toggles: Toggles) -> String {
    let mut path = format!("{}?toggles=1", HOME_PATH);
    for (name, on) in [
        ("location", toggles.show_location),
        ("ip", toggles.show_ip),
        ("model", toggles.show_model),
    ] {
        if on {
            path.push_str(&format!("&{}=on", name));
        }
    }
    path
}

fn internal_error(context: &str, e: anyhow::Error) -> StatusCode {
    tracing::error!("{}: {:#}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HOME_PATH, get(get_home).post(post_home))
        .route(REFRESH_PATH, get(refresh_toner).post(refresh_toner))
        .route(&format!("{}/printers", API_PREFIX), get(get_printers))
        .route(&format!("{}/levels", API_PREFIX), get(get_levels))
        .with_state(state)
}

async fn get_home(
    State(state): State<AppState>,
    Query(params): Query<HomeQuery>,
) -> Result<Html<String>, StatusCode> {
    let dashboard = state
        .store
        .dashboard(state.poller.window())
        .await
        .map_err(|e| internal_error("Failed to assemble dashboard", e))?;

    let notice = params.notice.as_deref().and_then(Notice::from_code);

    render_home(&state.templates, &dashboard, params.display_toggles(), notice)
        .map(Html)
        .map_err(|e| internal_error("Failed to render home page", e))
}

async fn post_home(
    State(state): State<AppState>,
    Form(form): Form<HomeForm>,
) -> Result<Redirect, StatusCode> {
    if form.add_printer_submit.is_none() {
        return Ok(Redirect::to(&toggles_path(form.display_toggles())));
    }

    let notice = match add_printer(&state.store, &state.poller, &form.add_printer_form()).await {
        Ok(AddOutcome::Committed(_)) => Notice::Added,
        Ok(AddOutcome::Rejected(rejection)) => Notice::Rejected(rejection),
        Err(e) => return Err(internal_error("Failed to add printer", e)),
    };

    Ok(Redirect::to(&format!("{}?notice={}", HOME_PATH, notice.code())))
}

async fn refresh_toner(State(state): State<AppState>) -> Result<Redirect, StatusCode> {
    state
        .poller
        .refresh_all(&state.store)
        .await
        .map_err(|e| internal_error("Failed to refresh toner levels", e))?;

    Ok(Redirect::to(HOME_PATH))
}

async fn get_printers(State(state): State<AppState>) -> Result<Json<Vec<Printer>>, StatusCode> {
    state
        .store
        .list_printers()
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to list printers", e))
}

async fn get_levels(State(state): State<AppState>) -> Result<Json<LevelsResponse>, StatusCode> {
    let dashboard = state
        .store
        .dashboard(state.poller.window())
        .await
        .map_err(|e| internal_error("Failed to query levels", e))?;

    Ok(Json(LevelsResponse {
        readings: dashboard.readings,
        last_updated: dashboard.last_updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, Response};
    use tower::ServiceExt;
    use shared::types::SnmpVersion;
    use crate::api::render::templates;
    use crate::config::Config;
    use crate::snmp::fake::FakeDevice;
    use crate::store::db::{tests::new_printer, PrinterDb};

    fn state(device: FakeDevice) -> AppState {
        AppState {
            store: StoreHandle::spawn(PrinterDb::open(":memory:").unwrap()),
            poller: Poller::new(Arc::new(device), &Config::default()),
            templates: Arc::new(templates().unwrap()),
        }
    }

    fn laser() -> FakeDevice {
        FakeDevice::printer("HP LaserJet M402dn", &[SnmpVersion::V2c])
            .with_supply(1, "Black Cartridge", 1, 100, 13)
            .with_colorant(1, "black")
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
        router(state.clone()).oneshot(request).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    const ADD_FORM: &str =
        "printer_name=IT+Copier&printer_location=Room+45&ip_address=10.0.0.5&department_name=IT&add_printer_submit=1";

    #[tokio::test]
    async fn test_empty_home_page() {
        let state = state(laser());
        let response = send(&state, get("/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(text(response).await.contains("No toner data yet"));
    }

    #[tokio::test]
    async fn test_add_printer_then_view() {
        let state = state(laser());

        let response = send(&state, post("/", ADD_FORM)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?notice=added");

        let html = text(send(&state, get("/?notice=added")).await).await;
        assert!(html.contains("Printer added."));
        assert!(html.contains("IT Copier"));
        assert!(html.contains("value=\"13\""));
    }

    #[tokio::test]
    async fn test_unreachable_add_redirects_with_notice() {
        let state = state(FakeDevice::off());

        let response = send(&state, post("/", ADD_FORM)).await;
        assert_eq!(location(&response), "/?notice=unreachable");
        assert!(state.store.list_printers().await.unwrap().is_empty());

        let html = text(send(&state, get("/?notice=unreachable")).await).await;
        assert!(html.contains("Printer not added. Make sure you have the correct IP address"));
    }

    #[tokio::test]
    async fn test_invalid_address_is_rejected() {
        let state = state(laser());
        let body = "printer_name=p&ip_address=999.1.1.1&department_name=IT&add_printer_submit=1";

        let response = send(&state, post("/", body)).await;
        assert_eq!(location(&response), "/?notice=invalid-address");
    }

    #[tokio::test]
    async fn test_toggle_form_redirects_with_query() {
        let state = state(laser());

        let response = send(&state, post("/", "toggles=1&model=on")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?toggles=1&model=on");
    }

    #[tokio::test]
    async fn test_toggle_query_hides_details() {
        let state = state(laser());
        state.store.insert_printer(new_printer("IT Copier", [10, 0, 0, 5], "IT")).await.unwrap();

        let html = text(send(&state, get("/?toggles=1&model=on")).await).await;
        assert!(html.contains("HP LaserJet M402dn"));
        assert!(!html.contains("10.0.0.5"));
        assert!(!html.contains("Building 8 Room 45"));
    }

    #[tokio::test]
    async fn test_refresh_marks_off_printer() {
        let state = state(FakeDevice::off());
        state.store.insert_printer(new_printer("IT Copier", [10, 0, 0, 5], "IT")).await.unwrap();

        let response = send(&state, get("/refresh-toner")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let html = text(send(&state, get("/")).await).await;
        assert!(html.contains("Printer appears to be off"));
    }

    #[tokio::test]
    async fn test_json_endpoints() {
        let state = state(laser());
        state.store.insert_printer(new_printer("IT Copier", [10, 0, 0, 5], "IT")).await.unwrap();
        send(&state, post("/refresh-toner", "")).await;

        let printers: serde_json::Value = serde_json::from_str(&text(send(&state, get("/v1/printers")).await).await).unwrap();
        assert_eq!(printers[0]["name"], "IT Copier");
        assert_eq!(printers[0]["address"], "10.0.0.5");

        let levels: serde_json::Value = serde_json::from_str(&text(send(&state, get("/v1/levels")).await).await).unwrap();
        assert_eq!(levels["readings"][0]["module"], "Black");
        assert_eq!(levels["readings"][0]["level"], "13");
        assert!(levels["last_updated"].is_string());
    }
}
