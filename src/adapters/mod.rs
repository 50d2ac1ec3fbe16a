//! Concrete adapter implementations for ports.

pub mod console_report_adapter;
pub mod csv_adapter;
pub mod csv_trade_writer;
pub mod file_config_adapter;
