use ledger_common::Amount;
use mockall::mock;
use wallet_engine::traits::{DepositGateway, DepositIntent, GatewayError};

mock! {
    pub Gateway {}
    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }
    impl DepositGateway for Gateway {
        async fn initialize_deposit(&self, email: &str, amount: Amount, reference: &str) -> Result<DepositIntent, GatewayError>;
        async fn verify_deposit(&self, reference: &str) -> Result<Option<Amount>, GatewayError>;
    }
}

/// A gateway that accepts every deposit and echoes the reference back.
pub fn accepting_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_initialize_deposit().returning(|_email, _amount, reference| {
        Ok(DepositIntent {
            reference: reference.to_string(),
            authorization_url: format!("https://checkout.paystack.com/{reference}"),
        })
    });
    gateway
}
