//! Salesforce → Smartlead lead sync
//!
//! Pulls Negative Review leads from Salesforce, checks each email with
//! Debounce, adds deliverable ones to a Smartlead campaign and records every
//! synced email in a Google Sheets tracker so no email is pushed twice.
//!
//! # Modules
//!
//! - `integrations`: External service clients under one namespace.
//! - `obs`: Logging setup.
//! - `config`: Configuration management.
//! - `debounce`: Email deliverability checks.
//! - `errors`: Error handling types.
//! - `journal`: Local record of pushes the tracker did not accept.
//! - `models`: Salesforce records, tracker rows and run summaries.
//! - `salesforce`: Salesforce login and SOQL queries.
//! - `sheets`: Google Sheets tracking store.
//! - `smartlead`: Smartlead campaign client.
//! - `sync`: Run orchestration.

pub mod integrations;
pub mod obs;

pub mod config;
pub mod debounce;
pub mod errors;
pub mod journal;
pub mod models;
pub mod salesforce;
pub mod sheets;
pub mod smartlead;
pub mod sync;
