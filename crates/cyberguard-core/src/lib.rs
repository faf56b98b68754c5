//! # CyberGuard Core
//!
//! Domain logic for the CyberGuard complaint portal: the language and
//! command catalog, the nine-question interview, the intake flow
//! controller, the categorization engine, evidence preprocessing, the
//! oracle adapters, the filing pipeline and the complaint store trait.
//!
//! This crate performs no I/O of its own. Every external service
//! (generative model, mail transport, database) is reached through a
//! trait in [`traits`] or [`store`]; the `cyberguard` application crate
//! provides the concrete implementations.

pub mod catalog;
pub mod categorize;
pub mod evidence;
pub mod extract;
pub mod filing;
pub mod flow;
pub mod form;
pub mod models;
pub mod questions;
pub mod store;
pub mod traits;
pub mod translate;

#[cfg(test)]
mod testing;
