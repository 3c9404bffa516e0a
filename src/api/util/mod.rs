pub mod client_identity;
pub mod json;
