//! Client for Mobile ID challenge/response authentication over ETSI TS 102 204.
//!
//! An application provider asks the service to have the user sign a short challenge
//! on the phone, then checks the signature it gets back:
//!
//! - [definitions] holds the request, the response and the status codes, plus the
//!   CMS signature verification in [definitions::x509];
//! - [wire] renders the SOAP requests and reads the answers;
//! - [transport] posts them over mutual TLS;
//! - [identity] decides whether the signer is the user that was asked;
//! - [client] ties these together for one call;
//! - [authentication] runs a whole session of calls, polls and retries.
pub mod authentication;
pub mod client;
pub mod config;
pub mod definitions;
pub mod identity;
pub mod transport;
pub mod wire;

pub use authentication::{Authenticator, Outcome, SessionContext};
pub use client::MobileIdClient;
pub use config::Config;
