pub mod classification;
pub mod config;
pub mod datasets;
pub mod error;
pub mod facets;
pub mod frame;
pub mod logging;
pub mod models;
pub mod pl_sql;
pub mod xlsx_to_pl;
