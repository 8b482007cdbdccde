pub mod activities;
pub mod auth;
pub mod contacts;
pub mod core;
pub mod dashboards;
pub mod deals;
pub mod invitations;
pub mod llm;
pub mod main_module;
pub mod tasks;
pub mod templates;
pub mod whatsapp;
