#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::module_name_repetitions)]

//! A thermodynamic ensemble engine for nucleic acid secondary structure:
//! partition function, minimum free energy, Boltzmann sampling,
//! suboptimal enumeration, and multi-strand equilibrium concentration,
//! built on a single algebraic recursion generic over the accumulation
//! semiring in use.

pub mod action;
pub mod alphabet;
pub mod backtrack;
pub mod base;
pub mod big;
pub mod block;
pub mod cache;
pub mod cached_model;
pub mod concentration;
pub mod constants;
pub mod decomposition;
pub mod dotparen;
pub mod driver;
pub mod error;
pub mod guard;
pub mod interior;
pub mod matrix;
pub mod model;
pub mod pairlist;
pub mod pairmatrix;
pub mod recursions;
pub mod rig;
pub mod sample;
pub mod schedule;
pub mod sequence;
pub mod subopt;

pub use error::{Error, Result};
