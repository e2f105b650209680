pub mod identity;
pub mod spots;
pub mod transport;

pub use identity::{IdentityCalls, StubIdentityProvider};
pub use spots::{StubSpotSource, stub_spot};
pub use transport::ScriptedTransport;
