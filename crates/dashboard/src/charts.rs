//! Plotly figure specifications. Each function returns `{"data": [...], "layout": {...}}`
//! ready for `Plotly.newPlot` in the browser.

use analytics::{PnlBreakdown, RevenueTrend, StepMeasure, VarianceReport};
use chrono::NaiveDate;
use core_types::{CashFlowEntry, Currency, PeriodType};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

const BLUE: &str = "#3b82f6";
const GREEN: &str = "#10b981";
const RED: &str = "#ef4444";
const AMBER: &str = "#f59e0b";

fn num(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `Jan 2024`
pub fn month_label(date: NaiveDate) -> String {
    PeriodType::Monthly.label(date)
}

fn labels<T>(items: &[T], date: impl Fn(&T) -> NaiveDate) -> Vec<String> {
    items.iter().map(|item| month_label(date(item))).collect()
}

/// Monthly revenue with its fitted trend on the left axis and net margin on the right.
pub fn revenue_trend(trend: &RevenueTrend, currency: Currency) -> Value {
    let x = labels(&trend.points, |p| p.period_date);
    let revenue: Vec<f64> = trend.points.iter().map(|p| num(p.revenue)).collect();
    let margin: Vec<f64> = trend.points.iter().map(|p| num(p.net_margin_pct)).collect();
    let fitted: Vec<f64> = trend.points.iter().map(|p| num(p.trend_revenue)).collect();

    json!({
        "data": [
            {
                "type": "scatter", "mode": "lines+markers", "name": "Monthly Revenue",
                "x": x, "y": revenue,
                "line": {"color": BLUE, "width": 3}, "marker": {"size": 8}
            },
            {
                "type": "scatter", "mode": "lines+markers", "name": "Net Margin %",
                "x": x, "y": margin, "yaxis": "y2",
                "line": {"color": GREEN, "width": 2}, "marker": {"size": 6}
            },
            {
                "type": "scatter", "mode": "lines", "name": "Revenue Trend",
                "x": x, "y": fitted, "opacity": 0.7,
                "line": {"color": RED, "width": 2, "dash": "dash"}
            }
        ],
        "layout": {
            "title": {"text": "Revenue Growth & Profitability Trend"},
            "hovermode": "x unified",
            "height": 400,
            "showlegend": true,
            "xaxis": {"title": {"text": "Period"}},
            "yaxis": {"title": {"text": format!("Revenue ({})", currency.symbol())}},
            "yaxis2": {"title": {"text": "Net Margin (%)"}, "overlaying": "y", "side": "right"}
        }
    })
}

/// Revenue stepping down through each expense line to net profit.
pub fn pnl_waterfall(pnl: &PnlBreakdown, currency: Currency) -> Value {
    let measure: Vec<&str> = pnl
        .steps
        .iter()
        .map(|s| match s.measure {
            StepMeasure::Absolute => "absolute",
            StepMeasure::Relative => "relative",
            StepMeasure::Total => "total",
        })
        .collect();
    let x: Vec<&str> = pnl.steps.iter().map(|s| s.label.as_str()).collect();
    let y: Vec<f64> = pnl.steps.iter().map(|s| num(s.amount)).collect();
    let text: Vec<String> = pnl
        .steps
        .iter()
        .map(|s| crate::render::format_money(s.amount, currency))
        .collect();

    json!({
        "data": [{
            "type": "waterfall", "name": "P&L Analysis", "orientation": "v",
            "measure": measure, "x": x, "y": y, "text": text, "textposition": "outside",
            "connector": {"line": {"color": "rgb(63, 63, 63)"}},
            "decreasing": {"marker": {"color": RED}},
            "increasing": {"marker": {"color": GREEN}},
            "totals": {"marker": {"color": BLUE}}
        }],
        "layout": {
            "title": {"text": "Profit & Loss Waterfall Analysis"},
            "height": 500,
            "showlegend": false
        }
    })
}

pub fn expense_pie(pnl: &PnlBreakdown) -> Value {
    let names: Vec<&str> = pnl.expense_shares.iter().map(|e| e.category.as_str()).collect();
    let values: Vec<f64> = pnl.expense_shares.iter().map(|e| num(e.amount)).collect();
    json!({
        "data": [{"type": "pie", "labels": names, "values": values}],
        "layout": {"title": {"text": "Expense Breakdown"}, "height": 400}
    })
}

/// Budget and actual side by side, revenue on top and net profit below.
pub fn budget_variance(report: &VarianceReport) -> Value {
    let x = labels(&report.periods, |p| p.period_date);
    let series = |f: fn(&analytics::PeriodVariance) -> Decimal| -> Vec<f64> {
        report.periods.iter().map(|p| num(f(p))).collect()
    };

    json!({
        "data": [
            {
                "type": "bar", "name": "Budget Revenue", "x": x,
                "y": series(|p| p.revenue.budget),
                "marker": {"color": "lightblue"}, "opacity": 0.7
            },
            {
                "type": "bar", "name": "Actual Revenue", "x": x,
                "y": series(|p| p.revenue.actual),
                "marker": {"color": BLUE}
            },
            {
                "type": "bar", "name": "Budget Profit", "x": x,
                "y": series(|p| p.net_profit.budget),
                "xaxis": "x2", "yaxis": "y2",
                "marker": {"color": "lightgreen"}, "opacity": 0.7
            },
            {
                "type": "bar", "name": "Actual Profit", "x": x,
                "y": series(|p| p.net_profit.actual),
                "xaxis": "x2", "yaxis": "y2",
                "marker": {"color": GREEN}
            }
        ],
        "layout": {
            "title": {"text": "Budget vs Actual Performance Analysis"},
            "height": 600,
            "barmode": "group",
            "grid": {"rows": 2, "columns": 1, "pattern": "independent"},
            "annotations": [
                subplot_title("Revenue: Budget vs Actual", 1.0),
                subplot_title("Profit: Budget vs Actual", 0.45)
            ]
        }
    })
}

/// Monthly cash flow components as relative bars, with the balance below.
pub fn cash_flow(entries: &[CashFlowEntry]) -> Value {
    let x = labels(entries, |e| e.period_date);
    let series = |f: fn(&CashFlowEntry) -> Decimal| -> Vec<f64> {
        entries.iter().map(|e| num(f(e))).collect()
    };

    json!({
        "data": [
            {
                "type": "bar", "name": "Operating CF", "x": x,
                "y": series(|e| e.operating_cash_flow), "marker": {"color": GREEN}
            },
            {
                "type": "bar", "name": "Investing CF", "x": x,
                "y": series(|e| e.investing_cash_flow), "marker": {"color": AMBER}
            },
            {
                "type": "bar", "name": "Financing CF", "x": x,
                "y": series(|e| e.financing_cash_flow), "marker": {"color": RED}
            },
            {
                "type": "scatter", "mode": "lines+markers", "name": "Cash Balance", "x": x,
                "y": series(|e| e.cash_balance),
                "xaxis": "x2", "yaxis": "y2", "showlegend": false,
                "line": {"color": BLUE, "width": 3}, "marker": {"size": 6}
            }
        ],
        "layout": {
            "title": {"text": "Cash Flow Analysis"},
            "height": 600,
            "barmode": "relative",
            "grid": {"rows": 2, "columns": 1, "pattern": "independent"},
            "annotations": [
                subplot_title("Cash Flow Components", 1.0),
                subplot_title("Cash Balance Trend", 0.45)
            ]
        }
    })
}

fn subplot_title(text: &str, y: f64) -> Value {
    json!({
        "text": text, "showarrow": false,
        "xref": "paper", "yref": "paper", "x": 0.5, "y": y,
        "xanchor": "center", "yanchor": "bottom",
        "font": {"size": 14}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::tests::sample_data;
    use analytics::AnalyticsEngine;
    use core_types::CompanyUnit;

    #[test]
    fn month_labels_are_short() {
        assert_eq!(month_label(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()), "Sep 2024");
    }

    #[test]
    fn waterfall_follows_the_pnl_steps() {
        let data = sample_data(CompanyUnit::Europe, 3);
        let pnl = AnalyticsEngine::new().pnl_breakdown(&data.periods).unwrap();
        let figure = pnl_waterfall(&pnl, Currency::Eur);

        let trace = &figure["data"][0];
        assert_eq!(trace["type"], "waterfall");
        assert_eq!(trace["measure"][0], "absolute");
        assert_eq!(trace["measure"][7], "total");
        assert_eq!(trace["x"][7], "Net Profit");
        assert!(trace["y"][1].as_f64().unwrap() < 0.0);
        assert!(trace["text"][0].as_str().unwrap().starts_with('€'));
    }

    #[test]
    fn trend_puts_margin_on_the_secondary_axis() {
        let data = sample_data(CompanyUnit::Europe, 6);
        let trend = AnalyticsEngine::new().revenue_trend(&data.periods).unwrap();
        let figure = revenue_trend(&trend, Currency::Usd);

        assert_eq!(figure["data"].as_array().unwrap().len(), 3);
        assert_eq!(figure["data"][1]["yaxis"], "y2");
        assert_eq!(figure["layout"]["yaxis2"]["overlaying"], "y");
        assert_eq!(figure["data"][0]["x"][0], "Jan 2023");
    }

    #[test]
    fn cash_flow_stacks_components_and_plots_balance_below() {
        let data = sample_data(CompanyUnit::Europe, 4);
        let figure = cash_flow(&data.cash_flows);
        assert_eq!(figure["layout"]["barmode"], "relative");
        assert_eq!(figure["data"][3]["yaxis"], "y2");
        assert_eq!(figure["data"][3]["y"].as_array().unwrap().len(), 4);
    }
}
