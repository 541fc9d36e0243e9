//! Dashboard summary: platform spend against manually entered revenue.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::ads::Insight;
use crate::store::ManualRevenue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub spend: Decimal,
    pub clicks: i64,
    pub revenue: Decimal,
    pub sales: i64,
    /// `revenue / spend`, absent when nothing was spent.
    pub roas: Option<f64>,
}

/// Revenue divided by spend. `None` when spend is zero or the ratio does not fit.
pub fn blended_roas(revenue: Decimal, spend: Decimal) -> Option<f64> {
    revenue.checked_div(spend)?.round_dp(4).to_f64()
}

/// Totals for the range. `None` when a sum overflows.
pub fn summarize(
    from: NaiveDate,
    to: NaiveDate,
    insights: &[Insight],
    revenue: &[ManualRevenue],
) -> Option<DashboardSummary> {
    let spend = insights
        .iter()
        .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.spend()))?;
    let clicks = insights
        .iter()
        .try_fold(0i64, |acc, i| acc.checked_add(i.clicks()))?;
    let total_revenue = revenue
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.revenue))?;
    let sales = revenue
        .iter()
        .try_fold(0i64, |acc, r| acc.checked_add(r.sales_count))?;

    Some(DashboardSummary {
        from,
        to,
        spend,
        clicks,
        revenue: total_revenue,
        sales,
        roas: blended_roas(total_revenue, spend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn insight(spend: &str, clicks: &str) -> Insight {
        Insight {
            spend: Some(spend.into()),
            clicks: Some(clicks.into()),
            ..Default::default()
        }
    }

    fn revenue(d: u32, amount: Decimal, sales: i64) -> ManualRevenue {
        ManualRevenue {
            ad_account_id: "act_1".into(),
            date: day(d),
            revenue: amount,
            sales_count: sales,
            unit_price: dec!(20),
        }
    }

    #[test]
    fn roas_is_revenue_over_spend() {
        assert_eq!(blended_roas(dec!(300), dec!(100)), Some(3.0));
        assert_eq!(blended_roas(dec!(50), dec!(200)), Some(0.25));
        assert_eq!(blended_roas(dec!(50), Decimal::ZERO), None);
        assert_eq!(blended_roas(Decimal::MAX, dec!(0.0001)), None);
    }

    #[test]
    fn summary_adds_up_both_sides() {
        let summary = summarize(
            day(1),
            day(7),
            &[insight("60.00", "30"), insight("40.00", "20")],
            &[revenue(1, dec!(120), 6), revenue(2, dec!(130), 7)],
        )
        .unwrap();
        assert_eq!(summary.spend, dec!(100.00));
        assert_eq!(summary.clicks, 50);
        assert_eq!(summary.revenue, dec!(250));
        assert_eq!(summary.sales, 13);
        assert_eq!(summary.roas, Some(2.5));
    }

    #[test]
    fn summary_without_spend_has_no_roas() {
        let summary = summarize(day(1), day(1), &[], &[revenue(1, dec!(10), 1)]).unwrap();
        assert_eq!(summary.roas, None);
        assert_eq!(summary.spend, Decimal::ZERO);
    }

    #[test]
    fn overflowing_revenue_is_rejected() {
        let entries = [revenue(1, Decimal::MAX, 1), revenue(2, Decimal::MAX, 1)];
        assert!(summarize(day(1), day(2), &[], &entries).is_none());
    }
}
