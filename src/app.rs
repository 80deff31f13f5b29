#![cfg(feature = "web")]
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::auth::{self, AuthOutcome, CsvFileUsers, UserSource};
use crate::chart::{self, Chart, ChartRequest};
use crate::config::{Settings, UserSourceConfig};
use crate::contact::{ContactClient, ContactForm, ContactOutcome};
use crate::error::{Error, Result};
use crate::forecast::{self, FORECAST_DAYS, Forecast};
use crate::ingest;
use crate::market::{self, Period};
use crate::pages::{self, PageQuery, PageView};
use crate::qr::{self, QR_FILE_NAME};
use crate::quotes::{DEFAULT_US_TICKERS, QuoteService, RetryPolicy, YahooChartProvider};
use crate::render::{self, GraphOptions};
use crate::router::{Page, RouteTable};
use crate::session::{SESSION_COOKIE, SessionContext, Sessions};
use crate::sheets::{GOOGLE_DOCS_BASE, PublishedSheetUsers};
use crate::store::RecordStore;
use crate::ticker_list::{ExportFormat, TICKER_LIST_COOKIE, TickerList};

pub const PERIOD_COOKIE: &str = "stock_price_period";
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Shared state handed to every handler
pub struct AppState {
    pub settings: Settings,
    pub store: RecordStore,
    pub sessions: Sessions,
    pub routes: RouteTable,
    pub quotes: QuoteService,
    pub users: Option<Arc<dyn UserSource>>,
    pub contact: Option<ContactClient>,
}

impl AppState {
    /// Assembles the state from explicit parts
    pub fn new(
        settings: Settings,
        quotes: QuoteService,
        users: Option<Arc<dyn UserSource>>,
        contact: Option<ContactClient>,
    ) -> Self {
        AppState {
            store: RecordStore::open(settings.db_path.clone()),
            sessions: Sessions::new(),
            routes: RouteTable::default(),
            settings,
            quotes,
            users,
            contact,
        }
    }

    /// Builds the providers and clients named by `settings`
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let provider = YahooChartProvider::new(&settings.quote_api_base)?;
        let quotes = QuoteService::new(
            Arc::new(provider),
            settings.quote_cache_ttl,
            RetryPolicy::default(),
        );

        let users: Option<Arc<dyn UserSource>> = match &settings.user_source {
            Some(UserSourceConfig::CsvFile(path)) => Some(Arc::new(CsvFileUsers::new(path.clone()))),
            Some(UserSourceConfig::PublishedSheet { key, sheet_name }) => Some(Arc::new(
                PublishedSheetUsers::new(GOOGLE_DOCS_BASE, key, sheet_name)?,
            )),
            None => {
                log::warn!("no login source configured, login is disabled");
                None
            }
        };

        let contact = settings
            .contact_endpoint
            .as_deref()
            .map(|endpoint| ContactClient::new(endpoint, &settings.contact_from_site))
            .transpose()?;

        Ok(Self::new(settings, quotes, users, contact))
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidFileName { .. }
            | Error::MissingColumn { .. }
            | Error::NonPlottable { .. }
            | Error::Validation(_)
            | Error::DuplicateTicker(_)
            | Error::InvalidPeriod(_)
            | Error::InvalidFormat(_)
            | Error::Csv(_) => StatusCode::BAD_REQUEST,
            Error::RecordNotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::AuthNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Provider(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let body = StatusResponse {
            status: "error",
            message: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the router with every page and API route
pub fn build_router(state: Arc<AppState>) -> Router {
    let limit = state.settings.upload_limit;

    Router::new()
        .route("/", get(|| async { Redirect::to("/page/main") }))
        .route("/page/:key", get(serve_page))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/session", get(session_info))
        .route(
            "/api/tickers",
            get(list_tickers).post(add_ticker).delete(reset_tickers),
        )
        .route("/api/tickers/:ticker", delete(remove_ticker))
        .route("/api/tickers/export/:format", get(export_tickers))
        .route("/api/tickers/cookie", post(save_ticker_cookie))
        .route("/api/quotes", get(get_quotes))
        .route("/api/quotes/chart", get(quotes_chart))
        .route("/api/quotes/:ticker/volatility", get(get_volatility))
        .route("/api/quotes/:ticker/forecast", get(get_us_forecast))
        .route("/api/quotes/:ticker/forecast/chart", get(us_forecast_chart))
        .route("/api/jp/:code", get(get_jp_series))
        .route("/api/jp/:code/chart", get(jp_chart))
        .route("/api/jp/:code/csv", get(download_jp_csv))
        .route("/api/jp/:code/forecast", get(get_jp_forecast))
        .route("/api/jp/:code/forecast/chart", get(jp_forecast_chart))
        .route(
            "/api/files",
            get(list_files).post(upload_file).delete(delete_files),
        )
        .route("/api/chart", get(files_chart))
        .route("/api/qr", get(qr_code))
        .route("/api/contact", post(submit_contact))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(limit))
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}

/// Starts the server and blocks until it stops
///
/// # Arguments
/// * `settings` - Settings read by the binary
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error if start-up or serving fails
pub async fn run(settings: Settings) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_settings(settings)?);
    let bind_addr = state.settings.bind_addr.clone();

    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_state.sessions.purge_expired();
            if purged > 0 {
                log::debug!("purged {} expired sessions", purged);
            }
        }
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    let port = listener.local_addr()?.port();
    log::info!("Local URL: http://{}", bind_addr);
    match local_ip_address::local_ip() {
        Ok(ip) => log::info!("Network URL: http://{}:{}", ip, port),
        Err(e) => log::debug!("no LAN address: {}", e),
    }

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_session(state: &AppState, jar: CookieJar) -> (CookieJar, String, SessionContext) {
    let (jar, id) = state.sessions.open(jar);
    let ctx = state.sessions.get(&id).unwrap_or_default();
    (jar, id, ctx)
}

fn update_session<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut SessionContext) -> Result<T>,
) -> Result<T> {
    state
        .sessions
        .update(id, f)
        .unwrap_or_else(|| Err(Error::Validation("Session expired.".to_string())))
}

fn require_login(ctx: &SessionContext) -> Result<()> {
    if ctx.authenticated {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

// Cookie list when one was saved, the built-in list otherwise.
fn watch_list(jar: &CookieJar) -> Vec<String> {
    jar.get(TICKER_LIST_COOKIE)
        .and_then(|c| TickerList::from_cookie_value(c.value()))
        .filter(|list| !list.is_empty())
        .map(|list| list.as_slice().to_vec())
        .unwrap_or_else(|| DEFAULT_US_TICKERS.iter().map(|t| t.to_string()).collect())
}

fn remembered_period(jar: &CookieJar, ctx: &SessionContext) -> Period {
    jar.get(PERIOD_COOKIE)
        .and_then(|c| c.value().parse().ok())
        .unwrap_or(ctx.period)
}

fn persistent_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .same_site(SameSite::Lax)
        .permanent()
        .build()
}

fn attachment(file_name: &str, mime: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn png(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

fn parse_ids(raw: Option<&str>) -> Result<Vec<u64>> {
    let raw = raw.ok_or_else(|| Error::Validation("Select at least one record.".to_string()))?;
    pages::split_list(raw)
        .iter()
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| Error::Validation(format!("invalid record id '{}'", id)))
        })
        .collect()
}

async fn serve_page(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<PageQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>)> {
    let (jar, id, mut ctx) = open_session(&state, jar);
    ctx.period = remembered_period(&jar, &ctx);

    let page = state.routes.dispatch(&key);
    if page.is_none() {
        log::debug!("no page registered for '{}'", key);
    }
    let records = if page == Some(Page::DataViewer) {
        state.store.list_all()?
    } else {
        Vec::new()
    };
    let watch_list = watch_list(&jar);

    let view = PageView {
        routes: &state.routes,
        route_key: &key,
        session: &ctx,
        records: &records,
        watch_list: &watch_list,
        query: &query,
        login_enabled: state.users.is_some(),
        contact_enabled: state.contact.is_some(),
    };
    let html = pages::render_shell(&view, page);

    if page == Some(Page::UsStocks) {
        state.sessions.mark_notice_shown(&id);
    }
    Ok((jar, Html(html)))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Json<AuthOutcome>)> {
    let users = state.users.as_ref().ok_or(Error::AuthNotConfigured)?;
    let (jar, id, _) = open_session(&state, jar);

    let outcome = auth::authenticate(users.as_ref(), &form.username, &form.password).await?;
    match outcome {
        AuthOutcome::Authenticated => {
            log::info!("user '{}' logged in", form.username);
            update_session(&state, &id, |s| {
                s.authenticated = true;
                Ok(())
            })?;
        }
        AuthOutcome::Rejected(reason) => {
            log::info!("login for '{}' rejected: {}", form.username, reason);
        }
    }
    Ok((jar, Json(outcome)))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<StatusResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.teardown(cookie.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(StatusResponse {
            status: "ok",
            message: None,
        }),
    )
}

#[derive(Serialize)]
struct SessionInfo {
    authenticated: bool,
    ticker_list: TickerList,
}

async fn session_info(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionInfo>) {
    let (jar, _, ctx) = open_session(&state, jar);
    let info = SessionInfo {
        authenticated: ctx.authenticated,
        ticker_list: ctx.ticker_list,
    };
    (jar, Json(info))
}

#[derive(Serialize)]
struct TickerListResponse {
    ticker_list: TickerList,
}

async fn list_tickers(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<TickerListResponse>) {
    let (jar, _, ctx) = open_session(&state, jar);
    (
        jar,
        Json(TickerListResponse {
            ticker_list: ctx.ticker_list,
        }),
    )
}

#[derive(Deserialize)]
struct AddTicker {
    ticker: String,
    #[serde(default)]
    unique: bool,
}

async fn add_ticker(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<AddTicker>,
) -> Result<(CookieJar, Json<TickerListResponse>)> {
    let (jar, id, _) = open_session(&state, jar);
    let ticker_list = update_session(&state, &id, |s| {
        if form.unique {
            s.ticker_list.push_unique(&form.ticker)?;
        } else {
            s.ticker_list.push(&form.ticker)?;
        }
        Ok(s.ticker_list.clone())
    })?;
    Ok((jar, Json(TickerListResponse { ticker_list })))
}

async fn remove_ticker(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TickerListResponse>)> {
    let (jar, id, _) = open_session(&state, jar);
    let ticker_list = update_session(&state, &id, |s| {
        if !s.ticker_list.remove(&ticker) {
            return Err(Error::Validation(format!("'{}' is not in the ticker list", ticker)));
        }
        Ok(s.ticker_list.clone())
    })?;
    Ok((jar, Json(TickerListResponse { ticker_list })))
}

async fn reset_tickers(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TickerListResponse>)> {
    let (jar, id, _) = open_session(&state, jar);
    let ticker_list = update_session(&state, &id, |s| {
        s.ticker_list.clear();
        Ok(s.ticker_list.clone())
    })?;
    Ok((jar, Json(TickerListResponse { ticker_list })))
}

async fn export_tickers(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let format: ExportFormat = format.parse()?;
    let (jar, _, ctx) = open_session(&state, jar);
    let download = ctx
        .ticker_list
        .export(format, chrono::Utc::now().timestamp())?;
    Ok((
        jar,
        attachment(&download.file_name, download.mime, download.bytes),
    ))
}

async fn save_ticker_cookie(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TickerListResponse>)> {
    let (jar, _, ctx) = open_session(&state, jar);
    let value = ctx.ticker_list.to_cookie_value()?;
    let jar = jar.add(persistent_cookie(TICKER_LIST_COOKIE, value));
    log::info!("saved {} tickers to cookie", ctx.ticker_list.len());
    Ok((
        jar,
        Json(TickerListResponse {
            ticker_list: ctx.ticker_list,
        }),
    ))
}

#[derive(Deserialize)]
struct QuotesQuery {
    tickers: Option<String>,
    period: Option<String>,
    ymin: Option<f64>,
    ymax: Option<f64>,
    title: Option<String>,
}

// Resolves tickers and period of a quotes request and remembers the period.
fn quotes_selection(
    state: &AppState,
    jar: CookieJar,
    query: &QuotesQuery,
) -> Result<(CookieJar, Vec<String>, Period)> {
    let (jar, id, ctx) = open_session(state, jar);
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse()?,
        None => remembered_period(&jar, &ctx),
    };
    let tickers = match query.tickers.as_deref() {
        Some(raw) => pages::split_list(raw),
        None => watch_list(&jar).into_iter().take(3).collect(),
    };
    if tickers.is_empty() {
        return Err(Error::Validation("Select at least one company.".to_string()));
    }

    state.sessions.update(&id, |s| s.period = period);
    let jar = jar.add(persistent_cookie(PERIOD_COOKIE, period.to_string()));
    Ok((jar, tickers, period))
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuotesQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<crate::quotes::QuoteBatch>)> {
    let (jar, tickers, period) = quotes_selection(&state, jar, &query)?;
    let batch = state.quotes.fetch_many(&tickers, period).await;
    Ok((jar, Json(batch)))
}

async fn quotes_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuotesQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let (jar, tickers, period) = quotes_selection(&state, jar, &query)?;
    let batch = state.quotes.fetch_many(&tickers, period).await;
    if batch.series.is_empty() {
        return Err(Error::Validation(
            "No data for the selected companies.".to_string(),
        ));
    }

    let y_range = match (query.ymin, query.ymax) {
        (Some(lo), Some(hi)) if lo < hi => Some((lo, hi)),
        _ => None,
    };
    let title = query.title.as_deref().unwrap_or("Stock price");
    let chart = Chart::from_series(&batch.series, title, y_range);
    let bytes = render::render_png(&chart, &GraphOptions::default())?;
    Ok((jar, png(bytes)))
}

async fn get_volatility(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<market::Volatility>> {
    Ok(Json(state.quotes.volatility(&ticker).await?))
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

async fn jp_series(state: &AppState, code: &str, query: &PeriodQuery) -> Result<market::StockSeries> {
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse::<Period>()?,
        None => Period::OneYear,
    };
    if !Period::JAPAN.contains(&period) {
        return Err(Error::InvalidPeriod(period.to_string()));
    }

    let ticker = market::normalize_jp_ticker(code);
    if ticker == ".T" {
        return Err(Error::Validation("Enter a ticker code.".to_string()));
    }
    state.quotes.series(&ticker, period).await
}

async fn get_jp_series(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<market::StockSeries>> {
    Ok(Json(jp_series(&state, &code, &query).await?))
}

async fn jp_chart(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response> {
    let series = jp_series(&state, &code, &query).await?;
    if series.is_empty() {
        return Err(Error::Validation(format!("No data for {}", series.ticker)));
    }
    let chart = Chart::from_series(std::slice::from_ref(&series), &series.ticker, None);
    let bytes = render::render_png(&chart, &GraphOptions::default())?;
    Ok(png(bytes))
}

async fn download_jp_csv(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response> {
    let series = jp_series(&state, &code, &query).await?;
    if series.is_empty() {
        return Err(Error::Validation(format!("No data for {}", series.ticker)));
    }
    let file_name = series.download_file_name(chrono::Local::now().date_naive());
    Ok(attachment(&file_name, "text/csv", series.to_csv_bytes()?))
}

fn logged_in(state: &AppState, jar: CookieJar) -> Result<(CookieJar, SessionContext)> {
    let (jar, _, ctx) = open_session(state, jar);
    require_login(&ctx)?;
    Ok((jar, ctx))
}

// The US forecast reads the remembered period but does not store a new one.
async fn us_forecast(
    state: &AppState,
    jar: CookieJar,
    ticker: &str,
    query: &PeriodQuery,
) -> Result<(CookieJar, market::StockSeries, Forecast)> {
    let (jar, ctx) = logged_in(state, jar)?;
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse()?,
        None => remembered_period(&jar, &ctx),
    };
    let series = state.quotes.series(ticker, period).await?;
    let forecast = forecast::forecast(&series, FORECAST_DAYS)?;
    Ok((jar, series, forecast))
}

async fn jp_forecast(
    state: &AppState,
    jar: CookieJar,
    code: &str,
    query: &PeriodQuery,
) -> Result<(CookieJar, market::StockSeries, Forecast)> {
    let (jar, _) = logged_in(state, jar)?;
    let series = jp_series(state, code, query).await?;
    let forecast = forecast::forecast(&series, FORECAST_DAYS)?;
    Ok((jar, series, forecast))
}

fn forecast_png(series: &market::StockSeries, forecast: &Forecast) -> Result<Response> {
    let bytes = render::render_png(&forecast.chart(series), &GraphOptions::default())?;
    Ok(png(bytes))
}

async fn get_us_forecast(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<PeriodQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Forecast>)> {
    let (jar, _, forecast) = us_forecast(&state, jar, &ticker, &query).await?;
    Ok((jar, Json(forecast)))
}

async fn us_forecast_chart(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<PeriodQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let (jar, series, forecast) = us_forecast(&state, jar, &ticker, &query).await?;
    Ok((jar, forecast_png(&series, &forecast)?))
}

async fn get_jp_forecast(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Forecast>)> {
    let (jar, _, forecast) = jp_forecast(&state, jar, &code, &query).await?;
    Ok((jar, Json(forecast)))
}

async fn jp_forecast_chart(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let (jar, series, forecast) = jp_forecast(&state, jar, &code, &query).await?;
    Ok((jar, forecast_png(&series, &forecast)?))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<crate::store::FileRecord>>> {
    Ok(Json(state.store.list_all()?))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<crate::store::FileRecord>)> {
    let (jar, _, ctx) = open_session(&state, jar);
    require_login(&ctx)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::Validation("Uploaded file has no name.".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(e.to_string()))?;

        let record = ingest::ingest_csv(&state.store, &state.settings.data_path, &file_name, &bytes)?;
        return Ok((jar, Json(record)));
    }

    Err(Error::Validation("No file data received".to_string()))
}

#[derive(Deserialize)]
struct IdsQuery {
    ids: Option<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    status: &'static str,
    removed: usize,
}

async fn delete_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdsQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DeleteResponse>)> {
    let (jar, id, ctx) = open_session(&state, jar);
    require_login(&ctx)?;

    let ids = parse_ids(query.ids.as_deref())?;
    let removed = ingest::remove_records(&state.store, &ids)?;
    state
        .sessions
        .update(&id, |s| s.selected_ids.retain(|sel| !ids.contains(sel)));
    Ok((
        jar,
        Json(DeleteResponse {
            status: "ok",
            removed,
        }),
    ))
}

#[derive(Deserialize)]
struct ChartQuery {
    ids: Option<String>,
    x_col: Option<String>,
    y_col: Option<String>,
    title: Option<String>,
}

async fn files_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response)> {
    let (jar, id, _) = open_session(&state, jar);
    let ids = parse_ids(query.ids.as_deref())?;
    state.sessions.update(&id, |s| s.selected_ids = ids.clone());

    let defaults = ChartRequest::default();
    let request = ChartRequest {
        x_col: query.x_col.unwrap_or(defaults.x_col),
        y_col: query.y_col.unwrap_or(defaults.y_col),
        title: query.title.unwrap_or(defaults.title),
        label_segment: defaults.label_segment,
    };
    let chart = chart::assemble_chart(&state.store, &ids, &request)?;
    let bytes = render::render_png(&chart, &GraphOptions::default())?;
    Ok((jar, png(bytes)))
}

#[derive(Deserialize)]
struct QrQuery {
    text: Option<String>,
    version: Option<i16>,
    #[serde(default)]
    download: bool,
}

async fn qr_code(Query(query): Query<QrQuery>) -> Result<Response> {
    let text = query.text.unwrap_or_default();
    let bytes = qr::render_qr_png(&text, query.version.unwrap_or(1))?;
    if query.download {
        Ok(attachment(QR_FILE_NAME, "image/png", bytes))
    } else {
        Ok(png(bytes))
    }
}

async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ContactForm>,
) -> Result<Json<ContactOutcome>> {
    let Some(client) = state.contact.as_ref() else {
        return Ok(Json(ContactOutcome::Failed(
            "The contact form is not configured.".to_string(),
        )));
    };
    Ok(Json(client.submit(&form).await?))
}
