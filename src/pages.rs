#![cfg(feature = "web")]
use serde::Deserialize;
use std::fmt::Write;

use crate::market::Period;
use crate::router::{Page, RouteTable};
use crate::session::SessionContext;
use crate::store::FileRecord;

/// Query parameters a page may read
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub period: Option<String>,
    pub tickers: Option<String>,
    pub ymin: Option<f64>,
    pub ymax: Option<f64>,
    pub code: Option<String>,
    /// Ticker whose forecast the US page shows; any value on the Japan page
    pub forecast: Option<String>,
    pub text: Option<String>,
    pub version: Option<i16>,
}

/// Everything a page needs to render
pub struct PageView<'a> {
    pub routes: &'a RouteTable,
    pub route_key: &'a str,
    pub session: &'a SessionContext,
    pub records: &'a [FileRecord],
    /// Watch list of the US page (cookie or defaults)
    pub watch_list: &'a [String],
    pub query: &'a PageQuery,
    pub login_enabled: bool,
    pub contact_enabled: bool,
}

/// Renders the shell with the sidebar and, if a page matched, its content
pub fn render_shell(view: &PageView, page: Option<Page>) -> String {
    let mut nav = String::new();
    for entry in view.routes.entries() {
        let class = if entry.routing_name == view.route_key { " class=\"active\"" } else { "" };
        let _ = writeln!(
            nav,
            "            <li><a href=\"/page/{name}\"{class} data-icon=\"{icon}\">{name}</a></li>",
            name = escape_html(&entry.routing_name),
            icon = escape_html(&entry.icon),
            class = class,
        );
    }

    let (title, content) = match page {
        Some(page) => (view.route_key, render_page(page, view)),
        None => ("", String::new()),
    };

    include_str!("./static/layout.html")
        .replace("{{title}}", &escape_html(title))
        .replace("{{nav}}", nav.trim_end())
        .replace("{{content}}", &content)
}

/// Page entry points
pub fn render_page(page: Page, view: &PageView) -> String {
    match page {
        Page::UsStocks => us_stocks(view),
        Page::JapanStocks => japan_stocks(view),
        Page::DataViewer => data_viewer(view),
        Page::Login => login(view),
        Page::TickerSettings => ticker_settings(view),
        Page::Qr => qr(view),
        Page::Contact => contact(view),
    }
}

fn period_options(options: &[Period], selected: Period) -> String {
    options
        .iter()
        .map(|p| {
            let sel = if *p == selected { " selected" } else { "" };
            format!("<option value=\"{p}\"{sel}>{p}</option>")
        })
        .collect::<Vec<_>>()
        .join("")
}

fn us_stocks(view: &PageView) -> String {
    let period = view
        .query
        .period
        .as_deref()
        .and_then(|p| p.parse().ok())
        .unwrap_or(view.session.period);
    let ymin = view.query.ymin.unwrap_or(0.0);
    let ymax = view.query.ymax.unwrap_or(500.0);

    let selected: Vec<String> = match view.query.tickers.as_deref() {
        Some(raw) => split_list(raw),
        None => view.watch_list.iter().take(3).cloned().collect(),
    };

    let mut html = String::from("<h2>StockPrice-Viewer</h2>\n");
    if !view.session.cookie_notice_shown {
        html.push_str("<p class=\"notice\">This page uses cookies.</p>\n");
    }

    html.push_str("<form method=\"get\" action=\"/page/main\" data-join>\n");
    let _ = writeln!(
        html,
        "<label>Period <select name=\"period\">{}</select></label>",
        period_options(&Period::ALL, period)
    );
    let _ = writeln!(
        html,
        "<label>Scale <input type=\"number\" name=\"ymin\" value=\"{ymin}\"> – <input type=\"number\" name=\"ymax\" value=\"{ymax}\"></label>"
    );
    html.push_str("<h4>Company Selection</h4>\n");
    for ticker in view.watch_list {
        let checked = if selected.contains(ticker) { " checked" } else { "" };
        let _ = writeln!(
            html,
            "<label><input type=\"checkbox\" name=\"tickers\" value=\"{t}\"{checked}> {t}</label>",
            t = escape_html(ticker)
        );
    }
    html.push_str("<button type=\"submit\">Show</button>\n</form>\n");

    if selected.is_empty() {
        html.push_str("<p class=\"notice\">Select at least one company.</p>\n");
    } else {
        let _ = writeln!(
            html,
            "<img class=\"chart\" alt=\"stock prices\" src=\"/api/quotes/chart?tickers={}&amp;period={}&amp;ymin={}&amp;ymax={}\">",
            urlencoding::encode(&selected.join(",")),
            period,
            ymin,
            ymax
        );
        html.push_str("<div class=\"cards\">\n");
        for ticker in &selected {
            let _ = writeln!(
                html,
                "<a class=\"card\" href=\"/api/quotes/{}/volatility\">{} changes</a>",
                urlencoding::encode(ticker),
                escape_html(ticker)
            );
        }
        html.push_str("</div>\n");
        html.push_str(&us_forecast(view, &selected, period));
    }
    html
}

fn us_forecast(view: &PageView, selected: &[String], period: Period) -> String {
    let mut html = String::from("<h3>Forecast</h3>\n");
    if !view.session.authenticated {
        html.push_str("<p class=\"notice\">Forecasting requires log in.</p>\n");
        return html;
    }

    html.push_str("<p>Who do you want to forecast?</p>\n<div class=\"cards\">\n");
    for ticker in selected {
        let _ = writeln!(
            html,
            "<a class=\"card\" href=\"/page/main?tickers={}&amp;period={}&amp;forecast={t}\">{}</a>",
            urlencoding::encode(&selected.join(",")),
            period,
            escape_html(ticker),
            t = urlencoding::encode(ticker),
        );
    }
    html.push_str("</div>\n");

    if let Some(ticker) = view.query.forecast.as_deref().filter(|t| selected.iter().any(|s| s == t)) {
        let _ = writeln!(
            html,
            "<img class=\"chart\" alt=\"{t} forecast\" src=\"/api/quotes/{enc}/forecast/chart?period={period}\">\n\
             <a href=\"/api/quotes/{enc}/forecast?period={period}\">Forecast values (JSON)</a>",
            t = escape_html(ticker),
            enc = urlencoding::encode(ticker),
            period = period,
        );
        html.push_str(FORECAST_NOTICE);
    }
    html
}

const FORECAST_NOTICE: &str = "<p class=\"notice\">Forecasts extend a linear trend fitted to past closes. \
They are not guaranteed and are not investment advice.</p>\n";

fn japan_stocks(view: &PageView) -> String {
    let period = view
        .query
        .period
        .as_deref()
        .and_then(|p| p.parse().ok())
        .filter(|p| Period::JAPAN.contains(p))
        .unwrap_or(Period::OneYear);
    let code = view.query.code.as_deref().unwrap_or("").trim();

    let mut html = String::from("<h2>Japan stock</h2>\n");
    let _ = writeln!(
        html,
        "<form method=\"get\" action=\"/page/JapanStock\">\n\
         <label>Ticker code (e.g. 7203) <input name=\"code\" value=\"{}\"></label>\n\
         <label>Period <select name=\"period\">{}</select></label>\n\
         <button type=\"submit\">Fetch prices</button>\n</form>",
        escape_html(code),
        period_options(&Period::JAPAN, period)
    );

    if !code.is_empty() {
        let ticker = crate::market::normalize_jp_ticker(code);
        let _ = writeln!(
            html,
            "<h4>{t}, past {period}</h4>\n\
             <img class=\"chart\" alt=\"{t}\" src=\"/api/jp/{code_enc}/chart?period={period}\">\n\
             <p>Downloads are named <code>{{download_date}}_{{ticker}}_stockData.csv</code>.</p>\n\
             <a href=\"/api/jp/{code_enc}/csv?period={period}\">Download data (CSV)</a>",
            t = escape_html(&ticker),
            code_enc = urlencoding::encode(code),
            period = period,
        );
        html.push_str(&jp_forecast(view, code, period));
    }
    html
}

fn jp_forecast(view: &PageView, code: &str, period: Period) -> String {
    let mut html = String::from("<h3>Predict future prices?</h3>\n");
    if !view.session.authenticated {
        html.push_str("<p class=\"notice\">Forecasting requires log in.</p>\n");
        return html;
    }
    let enc = urlencoding::encode(code);
    if view.query.forecast.is_none() {
        let _ = writeln!(
            html,
            "<a class=\"card\" href=\"/page/JapanStock?code={enc}&amp;period={period}&amp;forecast=1\">Predict stock price</a>"
        );
        return html;
    }
    let _ = writeln!(
        html,
        "<img class=\"chart\" alt=\"forecast\" src=\"/api/jp/{enc}/forecast/chart?period={period}\">\n\
         <a href=\"/api/jp/{enc}/forecast?period={period}\">Forecast values (JSON)</a>"
    );
    html.push_str(FORECAST_NOTICE);
    html
}

fn data_viewer(view: &PageView) -> String {
    let mut html = String::from("<h2>Data viewer</h2>\n<h3>Upload CSV</h3>\n");
    if view.session.authenticated {
        html.push_str(
            "<form data-api=\"/api/files\" data-reload enctype=\"multipart/form-data\">\n\
             <input type=\"file\" name=\"file\" accept=\".csv\">\n\
             <button type=\"submit\">Save file</button>\n<pre class=\"result\"></pre>\n</form>\n",
        );
    } else {
        html.push_str("<p class=\"notice\">Uploading and deleting files requires log in.</p>\n");
    }
    html.push_str(
        "<p>Uploaded files are expected to be named \
         <code>{download_date}_{category}_{ticker_code}.csv</code>.</p>\n<h3>Chart</h3>\n",
    );

    if view.records.is_empty() {
        return html;
    }

    let mut rows = String::new();
    for r in view.records {
        let checked = if view.session.selected_ids.contains(&r.id) { " checked" } else { "" };
        let _ = writeln!(
            rows,
            "<tr><td><input type=\"checkbox\" name=\"ids\" value=\"{}\"{}></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            r.id,
            checked,
            r.id,
            escape_html(&r.file_name),
            escape_html(&r.category),
            escape_html(&r.ticker_code),
            escape_html(&r.file_path)
        );
    }
    let table = format!(
        "<table>\n<tr><th></th><th>id</th><th>file_name</th><th>category</th><th>ticker_code</th><th>file_path</th></tr>\n{}</table>\n",
        rows
    );

    let _ = writeln!(
        html,
        "<form data-image=\"/api/chart\">\n{table}\
         <button type=\"submit\">Make chart</button>\n\
         <img class=\"chart\" alt=\"\">\n</form>"
    );
    if view.session.authenticated {
        let _ = writeln!(
            html,
            "<form data-api=\"/api/files\" data-method=\"DELETE\" data-reload>\n{}\
             <button type=\"submit\">Delete selected</button>\n<pre class=\"result\"></pre>\n</form>",
            table
        );
    }
    html
}

fn login(view: &PageView) -> String {
    let mut html = String::from("<h2>Login</h2>\n");
    if !view.login_enabled {
        html.push_str("<p class=\"notice\">No login source is configured.</p>\n");
        return html;
    }
    if view.session.authenticated {
        html.push_str(
            "<p>You are logged in.</p>\n\
             <form data-api=\"/api/logout\" data-reload><button type=\"submit\">Logout</button></form>\n",
        );
        return html;
    }
    html.push_str(
        "<form data-api=\"/api/login\">\n\
         <label>Username <input name=\"username\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <button type=\"submit\">Login</button>\n<pre class=\"result\"></pre>\n</form>\n",
    );
    html
}

fn ticker_settings(view: &PageView) -> String {
    let mut html = String::from(
        "<h2>Setting-Stock-List</h2>\n\
         <form data-api=\"/api/tickers\" data-reload>\n\
         <input name=\"ticker\" placeholder=\"e.g. 7203, KO, MSFT\">\n\
         <input type=\"hidden\" name=\"unique\" value=\"true\">\n\
         <button type=\"submit\">Add List</button>\n<pre class=\"result\"></pre>\n</form>\n",
    );

    let list = &view.session.ticker_list;
    if list.is_empty() {
        html.push_str("<p>Ticker_list is empty.</p>\n");
        return html;
    }

    html.push_str("<ul>\n");
    for ticker in list.as_slice() {
        let _ = writeln!(
            html,
            "<li>{t} <form data-api=\"/api/tickers/{enc}\" data-method=\"DELETE\" data-reload style=\"display:inline\"><button type=\"submit\">Delete! {t}</button></form></li>",
            t = escape_html(ticker),
            enc = urlencoding::encode(ticker)
        );
    }
    html.push_str(
        "</ul>\n\
         <a href=\"/api/tickers/export/toml\">Download Tick List as TOML</a>\n\
         <a href=\"/api/tickers/export/json\">Download Tick List as JSON</a>\n\
         <form data-api=\"/api/tickers/cookie\"><button type=\"submit\">Save to cookie</button><pre class=\"result\"></pre></form>\n\
         <form data-api=\"/api/tickers\" data-method=\"DELETE\" data-reload><button type=\"submit\">Reset List</button></form>\n",
    );
    html
}

fn qr(view: &PageView) -> String {
    let text = view.query.text.as_deref().unwrap_or("Hello, QR Code!");
    let version = view.query.version.unwrap_or(1);

    let mut html = String::from("<h2>QR code generator</h2>\n");
    let _ = writeln!(
        html,
        "<form method=\"get\" action=\"/page/QR\">\n\
         <label>Text to embed <input name=\"text\" value=\"{}\"></label>\n\
         <label>Version (1 to 40) <input type=\"number\" name=\"version\" min=\"1\" max=\"40\" value=\"{}\"></label>\n\
         <button type=\"submit\">Generate QR code</button>\n</form>",
        escape_html(text),
        version
    );

    if view.query.text.is_some() {
        let src = format!("/api/qr?text={}&amp;version={}", urlencoding::encode(text), version);
        let _ = writeln!(
            html,
            "<img class=\"qr\" alt=\"Generated QR code\" src=\"{src}\">\n\
             <a href=\"{src}&amp;download=true\">Download QR code</a>"
        );
    }
    html
}

fn contact(view: &PageView) -> String {
    let mut html = String::from("<h2>Contact Me</h2>\n");
    if !view.contact_enabled {
        html.push_str("<p class=\"notice\">The contact form is not configured.</p>\n");
        return html;
    }
    html.push_str(
        "<form data-api=\"/api/contact\">\n\
         <label>Your name* <input name=\"name\"></label>\n\
         <label>Your email* <input type=\"email\" name=\"email\"></label>\n\
         <label>Your message* <textarea name=\"body\"></textarea></label>\n\
         <p style=\"font-size: 13px;\">*Required fields</p>\n\
         <button type=\"submit\">Send</button>\n<pre class=\"result\"></pre>\n</form>\n",
    );
    html
}

/// Splits `a,b , c` into trimmed, non-empty items
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&"), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }

    #[test]
    fn splits_lists() {
        assert_eq!(split_list(" KO, ,MSFT "), vec!["KO".to_string(), "MSFT".to_string()]);
    }
}
