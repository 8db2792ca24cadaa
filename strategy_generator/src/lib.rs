//! Strategy generators and the library of built-in attack strategies.
//!
//! A [`LibraryStrategy`] watches the chain through an [`Attacker`] and submits [`Strategy`]s
//! ahead of the slots they target. The [`Generator`] decides which library strategies run and
//! for how long.
//!
//! [`Strategy`]: strategy_types::Strategy

pub use crate::{
    attacker::{Attacker, LibraryParams},
    generator::{ALL, Generator, Registry},
    library_strategy::LibraryStrategy,
};

mod attacker;
mod duty_watcher;
mod five;
mod generator;
mod library_strategy;
mod none;
mod withholding;
