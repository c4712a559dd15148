pub mod calendar;
pub mod capacity_policy;
pub mod conflict_checker;
pub mod priority_ranker;
