use super::AnalyticsService;
use crate::error::{MonitorError, Result};
use crate::models::{DailyRecord, Forecast};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

pub const NEXT_DAY_MIN_DAYS: usize = 2;
pub const NEXT_MONTH_MIN_DAYS: usize = 30;
pub const MONTH_HORIZON: usize = 30;

const COARSE_STEP: f64 = 0.05;
const FINE_STEP: f64 = 0.005;
const PARAM_MIN: f64 = 0.001;
const PARAM_MAX: f64 = 0.999;

/// Daily consumption totals on a contiguous calendar.
///
/// Days without any record appear as explicit zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    start: Option<NaiveDate>,
    values: Vec<f64>,
}

impl DailySeries {
    pub fn from_records(records: &[DailyRecord]) -> Self {
        let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in records {
            *totals.entry(record.date).or_insert(0.0) += record.total_consumption_kw;
        }

        let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
            return Self {
                start: None,
                values: Vec::new(),
            };
        };

        let values = first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| totals.get(&day).copied().unwrap_or(0.0))
            .collect();

        Self {
            start: Some(first),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        let start = self.start?;
        start.checked_add_days(Days::new(self.values.len().saturating_sub(1) as u64))
    }
}

/// Fitted exponential smoothing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingFit {
    pub alpha: f64,
    /// Trend smoothing; `None` for the level-only model
    pub beta: Option<f64>,
    pub level: f64,
    pub trend: f64,
    pub sse: f64,
}

impl SmoothingFit {
    /// Fit simple exponential smoothing (level only).
    pub fn simple(values: &[f64]) -> Result<Self> {
        check_series(values, 1)?;
        let ((alpha, _), sse) = minimise(false, |alpha, _| simple_pass(values, alpha).1)?;
        let (level, _) = simple_pass(values, alpha);
        finite_fit(Self {
            alpha,
            beta: None,
            level,
            trend: 0.0,
            sse,
        })
    }

    /// Fit Holt's linear method with an additive trend.
    pub fn additive_trend(values: &[f64]) -> Result<Self> {
        check_series(values, 2)?;
        let ((alpha, beta), sse) = minimise(true, |alpha, beta| holt_pass(values, alpha, beta).2)?;
        let (level, trend, _) = holt_pass(values, alpha, beta);
        finite_fit(Self {
            alpha,
            beta: Some(beta),
            level,
            trend,
            sse,
        })
    }

    /// Point forecasts for the next `steps` days.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        (1..=steps)
            .map(|h| self.level + h as f64 * self.trend)
            .collect()
    }
}

fn check_series(values: &[f64], min_len: usize) -> Result<()> {
    if values.len() < min_len {
        return Err(MonitorError::PredictionError(format!(
            "series of {} points is too short to fit",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(MonitorError::PredictionError(format!(
            "series contains a non-finite value ({bad})"
        )));
    }
    Ok(())
}

fn finite_fit(fit: SmoothingFit) -> Result<SmoothingFit> {
    if fit.level.is_finite() && fit.trend.is_finite() && fit.sse.is_finite() {
        Ok(fit)
    } else {
        Err(MonitorError::PredictionError(format!(
            "smoothing diverged (level {}, trend {}, sse {})",
            fit.level, fit.trend, fit.sse
        )))
    }
}

/// Returns the final level and the one-step-ahead SSE.
fn simple_pass(values: &[f64], alpha: f64) -> (f64, f64) {
    let mut level = values[0];
    let mut sse = 0.0;
    for &y in &values[1..] {
        let error = y - level;
        sse += error * error;
        level += alpha * error;
    }
    (level, sse)
}

/// Returns the final level, final trend and the one-step-ahead SSE.
fn holt_pass(values: &[f64], alpha: f64, beta: f64) -> (f64, f64, f64) {
    let mut level = values[0];
    let mut trend = values[1] - values[0];
    let mut sse = 0.0;
    for &y in &values[1..] {
        let predicted = level + trend;
        let error = y - predicted;
        sse += error * error;
        let next_level = alpha * y + (1.0 - alpha) * predicted;
        trend = beta * (next_level - level) + (1.0 - beta) * trend;
        level = next_level;
    }
    (level, trend, sse)
}

fn grid(centre: Option<f64>, step: f64) -> Vec<f64> {
    let (lo, hi) = match centre {
        Some(c) => ((c - COARSE_STEP).max(PARAM_MIN), (c + COARSE_STEP).min(PARAM_MAX)),
        None => (PARAM_MIN, PARAM_MAX),
    };
    let count = ((hi - lo) / step).floor() as usize;
    let mut points: Vec<f64> = (0..=count).map(|i| lo + i as f64 * step).collect();
    if points.last().map_or(true, |last| *last < hi) {
        points.push(hi);
    }
    points
}

/// Coarse grid search over (0, 1), then a fine grid around the best point.
fn minimise<F>(two_params: bool, objective: F) -> Result<((f64, f64), f64)>
where
    F: Fn(f64, f64) -> f64,
{
    let search = |alphas: Vec<f64>, betas: Vec<f64>| {
        let mut best: Option<((f64, f64), f64)> = None;
        for &alpha in &alphas {
            for &beta in &betas {
                let sse = objective(alpha, beta);
                if sse.is_finite() && best.map_or(true, |(_, b)| sse < b) {
                    best = Some(((alpha, beta), sse));
                }
            }
        }
        best
    };
    let betas_for = |centre: Option<f64>, step: f64| {
        if two_params {
            grid(centre, step)
        } else {
            vec![0.0]
        }
    };

    let ((alpha, beta), _) = search(grid(None, COARSE_STEP), betas_for(None, COARSE_STEP))
        .ok_or_else(|| MonitorError::PredictionError("no parameters gave a finite error".into()))?;

    let beta_centre = two_params.then_some(beta);
    search(grid(Some(alpha), FINE_STEP), betas_for(beta_centre, FINE_STEP))
        .ok_or_else(|| MonitorError::PredictionError("refinement gave no finite error".into()))
}

/// Exponential-smoothing forecasts over the daily ledger
#[derive(Debug, Clone)]
pub struct Forecaster {
    rate_per_kwh: f64,
}

impl Forecaster {
    pub fn new(rate_per_kwh: f64) -> Self {
        Self { rate_per_kwh }
    }

    fn priced(&self, consumption: f64) -> Result<Forecast> {
        if !consumption.is_finite() {
            return Err(MonitorError::PredictionError(format!(
                "forecast is not a finite number ({consumption})"
            )));
        }
        Ok(Forecast {
            forecast_consumption: consumption,
            forecast_cost: consumption * self.rate_per_kwh,
        })
    }
}

fn require_days(series: &DailySeries, required: usize) -> Result<()> {
    if series.len() < required {
        return Err(MonitorError::InsufficientData {
            required,
            available: series.len(),
        });
    }
    Ok(())
}

impl AnalyticsService for Forecaster {
    fn forecast_next_day(&self, records: &[DailyRecord]) -> Result<Forecast> {
        let series = DailySeries::from_records(records);
        require_days(&series, NEXT_DAY_MIN_DAYS)?;

        let fit = SmoothingFit::simple(series.values())?;
        log::debug!("Next-day fit: alpha {:.3}, sse {:.4}", fit.alpha, fit.sse);
        let next = fit.forecast(1).first().copied().unwrap_or(fit.level);
        self.priced(next)
    }

    fn forecast_next_month(&self, records: &[DailyRecord]) -> Result<Forecast> {
        let series = DailySeries::from_records(records);
        require_days(&series, NEXT_MONTH_MIN_DAYS)?;

        let fit = SmoothingFit::additive_trend(series.values())?;
        log::debug!(
            "Next-month fit: alpha {:.3}, beta {:?}, sse {:.4}",
            fit.alpha,
            fit.beta,
            fit.sse
        );
        self.priced(fit.forecast(MONTH_HORIZON).iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Appliance;
    use chrono::NaiveTime;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(offset))
            .unwrap()
    }

    fn record(date: NaiveDate, kw: f64) -> DailyRecord {
        DailyRecord {
            date,
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            appliance: Appliance::AirConditioner,
            total_consumption_kw: kw,
            cost: kw * 10.0,
            total_time_seconds: 10.0,
        }
    }

    #[test]
    fn series_sums_per_day_and_fills_gaps_with_zero() {
        let records = vec![
            record(day(0), 1.0),
            record(day(0), 2.0),
            record(day(3), 4.0),
        ];
        let series = DailySeries::from_records(&records);
        assert_eq!(series.values(), &[3.0, 0.0, 0.0, 4.0]);
        assert_eq!(series.start_date(), Some(day(0)));
        assert_eq!(series.end_date(), Some(day(3)));
    }

    #[test]
    fn empty_ledger_gives_empty_series() {
        let series = DailySeries::from_records(&[]);
        assert!(series.is_empty());
        assert_eq!(series.end_date(), None);
    }

    #[test]
    fn next_day_needs_two_calendar_days() {
        let forecaster = Forecaster::new(10.0);
        let one_day = vec![record(day(0), 1.0), record(day(0), 2.0)];
        assert!(matches!(
            forecaster.forecast_next_day(&one_day),
            Err(MonitorError::InsufficientData { required: 2, available: 1 })
        ));

        let two_days = vec![record(day(0), 1.0), record(day(1), 3.0)];
        let forecast = forecaster.forecast_next_day(&two_days).unwrap();
        assert!(forecast.forecast_consumption.is_finite());
        assert!((forecast.forecast_cost - forecast.forecast_consumption * 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_filled_gap_counts_toward_history() {
        let forecaster = Forecaster::new(10.0);
        let records = vec![record(day(0), 2.0), record(day(2), 2.0)];
        assert!(forecaster.forecast_next_day(&records).is_ok());
    }

    #[test]
    fn constant_series_forecasts_the_constant() {
        let values = vec![2.5; 10];
        let fit = SmoothingFit::simple(&values).unwrap();
        assert!((fit.forecast(1)[0] - 2.5).abs() < 1e-9);
        assert_eq!(fit.sse, 0.0);
    }

    #[test]
    fn simple_fit_prefers_high_alpha_for_a_step_change() {
        let mut values = vec![1.0; 10];
        values.extend([5.0; 10]);
        let fit = SmoothingFit::simple(&values).unwrap();
        assert!(fit.alpha > 0.9, "alpha = {}", fit.alpha);
        assert!((fit.level - 5.0).abs() < 0.01);
    }

    #[test]
    fn next_month_needs_thirty_calendar_days() {
        let forecaster = Forecaster::new(10.0);
        let span_29: Vec<_> = (0..29).map(|d| record(day(d), 1.0)).collect();
        assert!(matches!(
            forecaster.forecast_next_month(&span_29),
            Err(MonitorError::InsufficientData { required: 30, available: 29 })
        ));

        // Only the endpoints recorded, but 30 calendar days spanned.
        let span_30 = vec![record(day(0), 1.0), record(day(29), 1.0)];
        let forecast = forecaster.forecast_next_month(&span_30).unwrap();
        assert!(forecast.forecast_consumption.is_finite());
    }

    #[test]
    fn linear_growth_is_extrapolated_over_the_month() {
        let forecaster = Forecaster::new(10.0);
        let records: Vec<_> = (0..30).map(|d| record(day(d), 1.0 + d as f64)).collect();
        let forecast = forecaster.forecast_next_month(&records).unwrap();

        // Perfect line y = 1 + t: next 30 days are 31..=60.
        let expected: f64 = (31..=60).map(|v| v as f64).sum();
        assert!(
            (forecast.forecast_consumption - expected).abs() < 1e-6,
            "got {}",
            forecast.forecast_consumption
        );
        assert!((forecast.forecast_cost - expected * 10.0).abs() < 1e-5);
    }

    #[test]
    fn non_finite_history_is_a_prediction_error() {
        let forecaster = Forecaster::new(10.0);
        let records = vec![record(day(0), f64::NAN), record(day(1), 1.0)];
        assert!(matches!(
            forecaster.forecast_next_day(&records),
            Err(MonitorError::PredictionError(_))
        ));
    }
}
