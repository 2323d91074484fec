//! Classifies budgets by how much of their limit has been spent.

use serde::Serialize;

use crate::{budget::BudgetProgress, settings::AlertPreferences};

/// How close a budget is to its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// At or past the warning threshold.
    Warning,
    /// At or past the critical threshold.
    Danger,
}

/// A budget that is close to or over its limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetAlert {
    /// The budget's category.
    pub category: String,
    /// The fraction of the limit spent so far this month.
    pub pct: f64,
    /// How serious the alert is.
    pub level: AlertLevel,
    /// A sentence describing the alert.
    pub message: String,
    #[serde(skip)]
    spent: f64,
    #[serde(skip)]
    limit: f64,
}

impl BudgetAlert {
    /// The one line summary used in alert emails.
    pub fn digest_line(&self) -> String {
        match self.level {
            AlertLevel::Danger => format!(
                "Budget exceeded for {}: {:.2}/{:.2}.",
                self.category, self.spent, self.limit
            ),
            AlertLevel::Warning => format!(
                "Approaching budget for {}: {:.0}% used.",
                self.category,
                self.pct * 100.0
            ),
        }
    }
}

/// Pick out the budgets in `progress` that have reached a threshold.
///
/// Budgets without a positive limit never raise alerts.
pub fn budget_alerts(
    progress: &[BudgetProgress],
    preferences: &AlertPreferences,
) -> Vec<BudgetAlert> {
    let thresholds = preferences.thresholds;
    let currency = &preferences.currency_symbol;

    progress
        .iter()
        .filter(|budget| budget.monthly_limit > 0.0)
        .filter_map(|budget| {
            let pct = budget.used_ratio;
            let spent = budget.spent_mtd;
            let limit = budget.monthly_limit;

            let (level, message) = if pct >= thresholds.critical {
                (
                    AlertLevel::Danger,
                    format!(
                        "You exceeded your {} budget (spent {currency}{spent:.0} / {currency}{limit:.0}).",
                        budget.category
                    ),
                )
            } else if pct >= thresholds.warn {
                (
                    AlertLevel::Warning,
                    format!(
                        "You're at {:.0}% of your {} budget ({currency}{spent:.0} / {currency}{limit:.0}).",
                        pct * 100.0,
                        budget.category
                    ),
                )
            } else {
                return None;
            };

            Some(BudgetAlert {
                category: budget.category.clone(),
                pct,
                level,
                message,
                spent,
                limit,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        budget::{BudgetProgress, used_ratio},
        settings::{AlertPreferences, AlertThresholds},
        timestamp::Timestamp,
    };

    use super::{AlertLevel, budget_alerts};

    fn progress(category: &str, spent: f64, limit: f64) -> BudgetProgress {
        BudgetProgress {
            id: 1,
            category: category.to_owned(),
            monthly_limit: limit,
            spent_mtd: spent,
            used_ratio: used_ratio(spent, limit),
            created_at: Timestamp::new(datetime!(2025-03-01 00:00:00)),
        }
    }

    #[test]
    fn classifies_by_default_thresholds() {
        let alerts = budget_alerts(
            &[
                progress("Groceries", 180.0, 200.0),
                progress("Rent", 210.0, 200.0),
                progress("Dining", 50.0, 200.0),
            ],
            &AlertPreferences::default(),
        );

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert_eq!(alerts[0].pct, 0.9);
        assert_eq!(
            alerts[0].message,
            "You're at 90% of your Groceries budget ($180 / $200)."
        );
        assert_eq!(
            alerts[0].digest_line(),
            "Approaching budget for Groceries: 90% used."
        );
        assert_eq!(alerts[1].level, AlertLevel::Danger);
        assert_eq!(
            alerts[1].message,
            "You exceeded your Rent budget (spent $210 / $200)."
        );
        assert_eq!(
            alerts[1].digest_line(),
            "Budget exceeded for Rent: 210.00/200.00."
        );
    }

    #[test]
    fn respects_custom_thresholds() {
        let budgets = [progress("Groceries", 180.0, 200.0)];

        let strict = budget_alerts(
            &budgets,
            &AlertPreferences {
                thresholds: AlertThresholds {
                    warn: 0.5,
                    critical: 0.85,
                },
                ..Default::default()
            },
        );
        let relaxed = budget_alerts(
            &budgets,
            &AlertPreferences {
                thresholds: AlertThresholds {
                    warn: 0.95,
                    critical: 1.2,
                },
                ..Default::default()
            },
        );

        assert_eq!(strict[0].level, AlertLevel::Danger);
        assert!(relaxed.is_empty());
    }

    #[test]
    fn skips_budgets_without_a_limit() {
        let alerts = budget_alerts(&[progress("Gifts", 10.0, 0.0)], &AlertPreferences::default());

        assert!(alerts.is_empty());
    }

    #[test]
    fn messages_use_currency_symbol() {
        let alerts = budget_alerts(
            &[progress("Rent", 210.0, 200.0)],
            &AlertPreferences {
                currency_symbol: "€".to_owned(),
                ..Default::default()
            },
        );

        assert_eq!(
            alerts[0].message,
            "You exceeded your Rent budget (spent €210 / €200)."
        );
    }
}
