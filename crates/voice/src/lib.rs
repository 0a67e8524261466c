//! onair-voice – Track-Relay fuer den Live-Audiostream
//!
//! Der Broadcaster speist seine eingehenden Audio-Pakete genau einmal in das
//! [`TrackRelay`] ein. Jeder Listener erhaelt einen eigenen [`Tap`], der eine
//! unabhaengige Kopie des Streams liefert.
//!
//! ## Module
//! - [`relay`] – Relay und Taps

pub mod relay;

pub use relay::{Tap, TrackRelay, STANDARD_KAPAZITAET};
