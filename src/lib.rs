//! Multi-tenant SES matching backend: cases, engineers, AI matching and
//! email outreach over a Supabase table API.

pub mod api;
pub mod app;
pub mod auth;
pub mod business_client;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod mail;
pub mod matching;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod stores;
pub mod supabase;
pub mod templating;
