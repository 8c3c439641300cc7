use crate::models::{Appliance, BillLine, DailyRecord, MonthlyBill};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Default)]
struct Totals {
    consumption: f64,
    cost: f64,
    seconds: f64,
    count: usize,
}

/// Summarise the ledger per appliance, plus a grand total. `None` for an empty ledger.
pub fn monthly_bill(records: &[DailyRecord], current_date: NaiveDate) -> Option<MonthlyBill> {
    if records.is_empty() {
        return None;
    }

    let mut per_appliance: BTreeMap<Appliance, Totals> = BTreeMap::new();
    for record in records {
        let totals = per_appliance.entry(record.appliance).or_default();
        totals.consumption += record.total_consumption_kw;
        totals.cost += record.cost;
        totals.seconds += record.total_time_seconds;
        totals.count += 1;
    }

    let lines: Vec<BillLine> = per_appliance
        .into_iter()
        .map(|(appliance, totals)| BillLine {
            appliance,
            total_consumption_kw: totals.consumption,
            cost: totals.cost,
            total_time_seconds: totals.seconds,
            average_consumption_kw: totals.consumption / totals.count as f64,
        })
        .collect();

    let average_consumption_kw =
        lines.iter().map(|l| l.average_consumption_kw).sum::<f64>() / lines.len() as f64;

    Some(MonthlyBill {
        total_consumption_kw: lines.iter().map(|l| l.total_consumption_kw).sum(),
        total_cost: lines.iter().map(|l| l.cost).sum(),
        total_time_seconds: lines.iter().map(|l| l.total_time_seconds).sum(),
        average_consumption_kw,
        current_date,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn record(appliance: Appliance, kw: f64, seconds: f64) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            appliance,
            total_consumption_kw: kw,
            cost: kw * 10.0,
            total_time_seconds: seconds,
        }
    }

    #[test]
    fn empty_ledger_has_no_bill() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 11).unwrap();
        assert_eq!(monthly_bill(&[], today), None);
    }

    #[test]
    fn groups_by_appliance_and_totals() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 11).unwrap();
        let records = vec![
            record(Appliance::Refrigerator, 2.0, 10.0),
            record(Appliance::AirConditioner, 4.0, 20.0),
            record(Appliance::AirConditioner, 6.0, 30.0),
        ];

        let bill = monthly_bill(&records, today).unwrap();
        assert_eq!(bill.lines.len(), 2);

        let ac = &bill.lines[0];
        assert_eq!(ac.appliance, Appliance::AirConditioner);
        assert_eq!(ac.total_consumption_kw, 10.0);
        assert_eq!(ac.cost, 100.0);
        assert_eq!(ac.total_time_seconds, 50.0);
        assert_eq!(ac.average_consumption_kw, 5.0);

        assert_eq!(bill.lines[1].appliance, Appliance::Refrigerator);
        assert_eq!(bill.total_consumption_kw, 12.0);
        assert_eq!(bill.total_cost, 120.0);
        assert_eq!(bill.total_time_seconds, 60.0);
        // Mean of the per-appliance averages (5.0 and 2.0).
        assert_eq!(bill.average_consumption_kw, 3.5);
        assert_eq!(bill.current_date, today);
    }
}
