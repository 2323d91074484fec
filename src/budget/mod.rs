//! Monthly spending limits per category, their month-to-date progress and alerts.

mod alerts;
mod core;
mod endpoints;

pub use alerts::budget_alerts;
pub use core::{
    BudgetProgress, BudgetUpdate, create_budget_table, delete_budget, get_budget_progress,
    update_budget, upsert_budget,
};
pub use endpoints::{
    budget_alerts_endpoint, budget_progress_endpoint, create_budget_endpoint,
    delete_budget_endpoint, edit_budget_endpoint, list_budgets_endpoint,
};

#[cfg(test)]
pub use core::used_ratio;
