//! Savings goals, contributions towards them and their contribution history.

mod contribution;
mod core;
mod endpoints;

pub use contribution::{NewContribution, contribute, contribution_history};
pub use core::{
    Goal, GoalStatus, GoalUpdate, NewGoal, create_goal, create_goal_tables, delete_goal,
    get_goal, list_goals, update_goal,
};
pub use endpoints::{
    contribute_endpoint, contribute_to_goal_endpoint, create_goal_endpoint,
    delete_goal_endpoint, edit_goal_endpoint, goal_history_endpoint, list_goals_endpoint,
};
