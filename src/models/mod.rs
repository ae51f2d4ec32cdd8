pub mod activity;
pub mod category;
pub mod usage;
