//! Server-side HTML for the dashboard page and its error page.

use crate::charts;
use crate::view::DashboardView;
use analytics::{KpiReport, VarianceLine};
use chrono::{DateTime, Utc};
use core_types::{AnalysisWindow, CompanyUnit, Currency};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::fmt::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
body { margin: 0; font-family: -apple-system, "Segoe UI", Roboto, sans-serif; background: #f8fafc; color: #1e293b; }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 260px; padding: 1.5rem; background: #0f172a; color: #e2e8f0; }
.sidebar label { display: block; margin: 1rem 0 0.25rem; font-size: 0.85rem; }
.sidebar select, .sidebar button { width: 100%; padding: 0.4rem; border-radius: 4px; }
.sidebar button { margin-top: 1rem; cursor: pointer; }
main { flex: 1; padding: 1.5rem 2rem; }
.header { background: linear-gradient(90deg, #1e3a8a, #3b82f6); color: white; padding: 1rem 1.5rem; border-radius: 8px; }
.kpis { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin: 1.5rem 0; }
.kpi { background: white; border-radius: 8px; padding: 1rem; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
.kpi .label { font-size: 0.85rem; color: #64748b; }
.kpi .value { font-size: 1.6rem; font-weight: 600; margin: 0.3rem 0; }
.delta.positive { color: #10b981; }
.delta.negative { color: #ef4444; }
.delta.neutral { color: #64748b; }
.tabs button { padding: 0.5rem 1rem; border: none; background: #e2e8f0; cursor: pointer; border-radius: 4px 4px 0 0; }
.tabs button.active { background: white; font-weight: 600; }
.tab { display: none; background: white; padding: 1rem; border-radius: 0 8px 8px 8px; }
.tab.active { display: block; }
.grid { display: grid; grid-template-columns: 2fr 1fr; gap: 1rem; }
table { border-collapse: collapse; width: 100%; }
td, th { padding: 0.35rem 0.5rem; border-bottom: 1px solid #e2e8f0; text-align: left; }
.empty, .error { background: white; padding: 2rem; border-radius: 8px; }
footer { margin-top: 2rem; font-size: 0.8rem; color: #64748b; }
"#;

const TAB_SCRIPT: &str = r#"
function showTab(id) {
  document.querySelectorAll('.tab').forEach(function (t) { t.classList.toggle('active', t.id === id); });
  document.querySelectorAll('.tabs button').forEach(function (b) { b.classList.toggle('active', b.dataset.tab === id); });
  document.querySelectorAll('#' + id + ' .chart').forEach(function (c) { Plotly.Plots.resize(c); });
}
"#;

/// Escapes text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
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

/// Compact money: `$12.3M`, `-€1.2K`, `£950`.
pub fn format_money(value: Decimal, currency: Currency) -> String {
    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    let abs = value.abs();
    let symbol = currency.symbol();
    let (scaled, suffix) = if abs >= dec!(1_000_000_000) {
        (abs / dec!(1_000_000_000), "B")
    } else if abs >= dec!(1_000_000) {
        (abs / dec!(1_000_000), "M")
    } else if abs >= dec!(1_000) {
        (abs / dec!(1_000), "K")
    } else {
        return format!("{sign}{symbol}{:.0}", abs.round_dp(0));
    };
    format!("{sign}{symbol}{:.1}{suffix}", scaled.round_dp(1))
}

/// `+12.34%`
pub fn format_pct(value: Decimal) -> String {
    let sign = if value > Decimal::ZERO { "+" } else { "" };
    format!("{sign}{:.2}%", value.round_dp(2))
}

/// `-1.20pp`
pub fn format_pp(value: Decimal) -> String {
    let sign = if value > Decimal::ZERO { "+" } else { "" };
    format!("{sign}{:.2}pp", value.round_dp(2))
}

fn delta_class(value: Option<Decimal>) -> &'static str {
    match value {
        Some(v) if v > Decimal::ZERO => "positive",
        Some(v) if v < Decimal::ZERO => "negative",
        _ => "neutral",
    }
}

fn page_start(html: &mut String, title: &str) {
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{}</title><style>{STYLE}</style>\
         <script src=\"{PLOTLY_CDN}\"></script></head><body>",
        escape(title)
    );
}

/// A standalone page explaining why the dashboard could not be shown.
pub fn error_page(title: &str, message: &str) -> String {
    let mut html = String::new();
    page_start(&mut html, "Financial Dashboard");
    let _ = write!(
        html,
        "<main><div class=\"error\"><h1>{}</h1><p>{}</p><p><a href=\"/\">Try again</a></p></div></main></body></html>",
        escape(title),
        escape(message)
    );
    html
}

fn select(html: &mut String, name: &str, label: &str, options: &[(&str, &str)], selected: &str) {
    let _ = write!(html, "<label for=\"{name}\">{label}</label><select id=\"{name}\" name=\"{name}\">");
    for (value, text) in options {
        let marker = if *value == selected { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{value}\"{marker}>{}</option>", escape(text));
    }
    html.push_str("</select>");
}

fn sidebar(html: &mut String, view: &DashboardView) {
    let selection = view.selection;
    let windows: Vec<(&str, &str)> = AnalysisWindow::ALL.iter().map(|w| (w.as_str(), w.label())).collect();
    let units: Vec<(&str, &str)> = CompanyUnit::ALL.iter().map(|u| (u.as_str(), u.label())).collect();
    let currencies: Vec<(&str, &str)> = Currency::ALL.iter().map(|c| (c.code(), c.code())).collect();

    html.push_str("<aside class=\"sidebar\"><h2>Dashboard Controls</h2><form method=\"get\" action=\"/\">");
    select(html, "window", "Analysis Period", &windows, selection.window.as_str());
    select(html, "company_unit", "Business Unit", &units, selection.unit.as_str());
    select(html, "currency", "Currency", &currencies, selection.currency.code());
    html.push_str("<button type=\"submit\">Apply</button></form>");

    let _ = write!(
        html,
        "<form method=\"post\" action=\"/refresh\">\
         <input type=\"hidden\" name=\"window\" value=\"{}\">\
         <input type=\"hidden\" name=\"company_unit\" value=\"{}\">\
         <input type=\"hidden\" name=\"currency\" value=\"{}\">\
         <button type=\"submit\">Refresh Data</button></form></aside>",
        selection.window.as_str(),
        selection.unit.as_str(),
        selection.currency.code()
    );
}

fn kpi_card(html: &mut String, label: &str, value: &str, delta: Option<Decimal>, delta_text: &str) {
    let _ = write!(
        html,
        "<div class=\"kpi\"><div class=\"label\">{label}</div><div class=\"value\">{}</div>\
         <div class=\"delta {}\">{}</div></div>",
        escape(value),
        delta_class(delta),
        escape(delta_text)
    );
}

fn kpi_cards(html: &mut String, kpis: &KpiReport, currency: Currency) {
    html.push_str("<section class=\"kpis\">");
    kpi_card(
        html,
        "Total Revenue",
        &format_money(kpis.total_revenue, currency),
        Some(kpis.revenue_growth_pct),
        &format_pct(kpis.revenue_growth_pct),
    );
    kpi_card(
        html,
        "Net Profit",
        &format_money(kpis.total_profit, currency),
        Some(kpis.profit_growth_pct),
        &format_pct(kpis.profit_growth_pct),
    );
    kpi_card(
        html,
        "Net Margin",
        &format!("{:.1}%", kpis.net_margin_pct.round_dp(1)),
        Some(kpis.margin_change_pp),
        &format_pp(kpis.margin_change_pp),
    );
    kpi_card(
        html,
        "Cash Position",
        &format_money(kpis.cash_position, currency),
        kpis.cash_growth_pct,
        &kpis.cash_growth_pct.map(format_pct).unwrap_or_else(|| "n/a".to_string()),
    );
    html.push_str("</section>");
}

fn row(html: &mut String, label: &str, value: &str) {
    let _ = write!(html, "<tr><th>{label}</th><td>{}</td></tr>", escape(value));
}

fn optional_pct(value: Option<Decimal>) -> String {
    value.map(format_pct).unwrap_or_else(|| "n/a".to_string())
}

fn variance_rows(html: &mut String, label: &str, line: &VarianceLine, currency: Currency) {
    let _ = write!(
        html,
        "<tr><th>{label}</th><td>{}</td><td>{}</td><td class=\"delta {}\">{}</td><td>{}</td></tr>",
        escape(&format_money(line.actual, currency)),
        escape(&format_money(line.budget, currency)),
        delta_class(Some(line.difference)),
        escape(&format_money(line.difference, currency)),
        escape(&optional_pct(line.variance_pct))
    );
}

fn chart_div(html: &mut String, id: &str) {
    let _ = write!(html, "<div class=\"chart\" id=\"{id}\"></div>");
}

fn tabs(html: &mut String, view: &DashboardView, figures: &mut Vec<(&'static str, Value)>) {
    let currency = view.selection.currency;
    html.push_str(
        "<nav class=\"tabs\">\
         <button class=\"active\" data-tab=\"tab-revenue\" onclick=\"showTab('tab-revenue')\">Revenue Analysis</button>\
         <button data-tab=\"tab-pnl\" onclick=\"showTab('tab-pnl')\">P&amp;L Breakdown</button>\
         <button data-tab=\"tab-budget\" onclick=\"showTab('tab-budget')\">Budget Variance</button>\
         <button data-tab=\"tab-cash\" onclick=\"showTab('tab-cash')\">Cash Flow</button></nav>",
    );

    html.push_str("<section class=\"tab active\" id=\"tab-revenue\"><div class=\"grid\"><div>");
    if let Some(trend) = &view.trend {
        chart_div(html, "chart-trend");
        figures.push(("chart-trend", charts::revenue_trend(trend, currency)));
    }
    html.push_str("</div><div><h3>Revenue Insights</h3><table>");
    if let Some(insights) = &view.insights {
        row(html, "Growth vs previous period", &optional_pct(insights.growth_pct));
        row(html, "Average monthly revenue", &format_money(insights.average_monthly_revenue, currency));
        if let Some(peak) = insights.peak_month {
            row(html, "Peak month", &charts::month_label(peak));
        }
        row(html, "Annual run rate", &format_money(insights.annual_run_rate, currency));
        row(html, "Average gross margin", &format!("{:.1}%", insights.average_gross_margin_pct.round_dp(1)));
        row(html, "Average net margin", &format!("{:.1}%", insights.average_net_margin_pct.round_dp(1)));
    }
    html.push_str("</table></div></div></section>");

    html.push_str("<section class=\"tab\" id=\"tab-pnl\">");
    if let Some(pnl) = &view.pnl {
        chart_div(html, "chart-waterfall");
        figures.push(("chart-waterfall", charts::pnl_waterfall(pnl, currency)));
        html.push_str("<div class=\"grid\"><div>");
        chart_div(html, "chart-expenses");
        figures.push(("chart-expenses", charts::expense_pie(pnl)));
        html.push_str("</div><div><h3>Expense Analysis</h3><table><tr><th>Category</th><th>Amount</th><th>% of Revenue</th></tr>");
        for share in &pnl.expense_shares {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
                escape(&share.category),
                escape(&format_money(share.amount, currency)),
                share.pct_of_revenue.round_dp(1)
            );
        }
        html.push_str("</table></div></div>");
    }
    html.push_str("</section>");

    html.push_str("<section class=\"tab\" id=\"tab-budget\">");
    match &view.variance {
        Some(variance) => {
            chart_div(html, "chart-variance");
            figures.push(("chart-variance", charts::budget_variance(variance)));
            html.push_str(
                "<h3>Variance Summary</h3><table><tr><th></th><th>Actual</th><th>Budget</th><th>Variance</th><th>Variance %</th></tr>",
            );
            variance_rows(html, "Revenue", &variance.revenue, currency);
            variance_rows(html, "Net Profit", &variance.net_profit, currency);
            variance_rows(html, "Expenses", &variance.expenses, currency);
            html.push_str("</table>");
        }
        None => html.push_str("<p class=\"empty\">No budget data for this period.</p>"),
    }
    html.push_str("</section>");

    html.push_str("<section class=\"tab\" id=\"tab-cash\">");
    match &view.cash_summary {
        Some(summary) => {
            chart_div(html, "chart-cash");
            figures.push(("chart-cash", charts::cash_flow(&view.cash_entries)));
            html.push_str("<div class=\"grid\"><div><h3>Cash Flow Totals</h3><table>");
            row(html, "Operating", &format_money(summary.operating_total, currency));
            row(html, "Investing", &format_money(summary.investing_total, currency));
            row(html, "Financing", &format_money(summary.financing_total, currency));
            row(html, "Net", &format_money(summary.net_total, currency));
            if let Some(balance) = summary.ending_cash_balance {
                row(html, "Ending balance", &format_money(balance, currency));
            }
            html.push_str("</table></div><div><h3>Cash Flow Ratios</h3><table>");
            row(html, "Avg monthly operating CF", &format_money(summary.operating_monthly_avg, currency));
            row(html, "Avg monthly investing CF", &format_money(summary.investing_monthly_avg, currency));
            row(html, "Operating CF / net profit", &optional_pct(summary.cash_conversion_pct));
            row(html, "Investing CF / revenue", &optional_pct(summary.investing_pct_of_revenue));
            row(
                html,
                "Days of expenses covered",
                &summary
                    .days_of_expenses
                    .map(|d| format!("{:.0}", d.round_dp(0)))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
            html.push_str("</table></div></div>");
        }
        None => html.push_str("<p class=\"empty\">No cash flow data for this period.</p>"),
    }
    html.push_str("</section>");
}

/// Serializes the figures for an inline script. `</` is escaped so a label can
/// never close the script element.
fn plot_script(html: &mut String, figures: &[(&'static str, Value)]) {
    html.push_str("<script>");
    html.push_str(TAB_SCRIPT);
    for (id, figure) in figures {
        let json = figure.to_string().replace("</", "<\\/");
        let _ = write!(
            html,
            "(function () {{ var f = {json}; Plotly.newPlot('{id}', f.data, f.layout, {{responsive: true}}); }})();"
        );
    }
    html.push_str("</script>");
}

/// The full dashboard page for one selection.
pub fn dashboard_page(view: &DashboardView, fetched_at: DateTime<Utc>) -> String {
    let selection = view.selection;
    let mut html = String::new();
    page_start(&mut html, "Financial Dashboard");
    html.push_str("<div class=\"layout\">");
    sidebar(&mut html, view);

    let _ = write!(
        html,
        "<main><div class=\"header\"><h1>Financial Performance Dashboard</h1>\
         <p>{} | {} | {}</p></div>",
        escape(selection.unit.label()),
        escape(selection.window.label()),
        selection.currency.code()
    );

    let mut figures = Vec::new();
    match &view.kpis {
        Some(kpis) => {
            kpi_cards(&mut html, kpis, selection.currency);
            tabs(&mut html, view, &mut figures);
        }
        None => html.push_str(
            "<div class=\"empty\"><h2>No financial data available</h2>\
             <p>No periods were found for this business unit. Seed or import data through the API and refresh.</p></div>",
        ),
    }

    let as_of = view
        .as_of
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let _ = write!(
        html,
        "<footer>Data as of {} | Last refreshed {}</footer></main></div>",
        escape(&as_of),
        fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    plot_script(&mut html, &figures);
    html.push_str("</body></html>");
    html
}
