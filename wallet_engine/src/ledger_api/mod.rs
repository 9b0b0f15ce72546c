pub mod access;
pub mod api_key_api;
pub mod deposit_flow_api;
pub mod identity_api;
pub mod wallet_api;
