//! Test doubles for the transport, identity and spot-source seams.

pub mod stubs;
