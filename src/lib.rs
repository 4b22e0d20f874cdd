//! Merchandising Route-Adherence Report Library
//!
//! This library computes the daily route-adherence reports for the merchandising
//! field team and delivers them to leaders through a WhatsApp gateway.
//!
//! # Modules
//!
//! - `core`: Domain logic (periods, metrics, report text, recipients).
//! - `integrations`: External collaborators (database queries, WhatsApp gateway).
//! - `cli`: Command-line arguments.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `dispatch`: Batch sending with pacing and cancellation.
//! - `errors`: Error handling types.
//! - `models`: Metric, directory and dispatch models.
//! - `period`: Reporting calendar and windows.
//! - `queries`: Aggregation queries over the monitoring table.
//! - `recipients`: Leader classification and phone resolution.
//! - `report_builder`: Plain-text message layout.
//! - `report_job`: One reporting run, from directory to dispatch items.
//! - `whatsapp_gateway`: HTTP client for the WhatsApp gateway.

pub mod core;
pub mod integrations;

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod period;
pub mod queries;
pub mod recipients;
pub mod report_builder;
pub mod report_job;
pub mod whatsapp_gateway;
