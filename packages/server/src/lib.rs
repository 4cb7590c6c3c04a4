//! Consultation chat relay and WebRTC signaling hub.
//!
//! Patients and doctors connect over WebSocket, join the room of their
//! appointment, exchange persisted chat messages and relay the
//! offer/answer/ICE exchange that sets up a direct video call.

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
