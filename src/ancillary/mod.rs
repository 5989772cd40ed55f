//! Ancillary collectors: public-address poller and interface enumerator.
//!
//! Peripheral to the probing-and-analytics engine (see SPEC_FULL.md §4.8)
//! — they only write to their own Shared Snapshot slot and never touch
//! the probing or stats path.

pub mod interfaces;
pub mod public_ip;
