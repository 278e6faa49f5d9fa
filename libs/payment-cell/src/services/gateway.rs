// libs/payment-cell/src/services/gateway.rs
use async_trait::async_trait;

use crate::error::PaymentError;
use crate::models::{
    AccountLink, AccountLinkParams, Balance, ConnectedAccount, ConnectedAccountParams,
    CreateCustomerParams, CreatePaymentIntentParams, Customer, PaymentIntent, Refund, RefundParams,
    Transfer, TransferParams,
};

/// The payment processor as seen by the payment lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, PaymentError>;

    async fn create_customer(&self, params: &CreateCustomerParams) -> Result<Customer, PaymentError>;

    async fn create_payment_intent(&self, params: &CreatePaymentIntentParams) -> Result<PaymentIntent, PaymentError>;

    /// Full refund of the intent's charge.
    async fn refund(&self, params: &RefundParams) -> Result<Refund, PaymentError>;

    async fn create_connected_account(&self, params: &ConnectedAccountParams) -> Result<ConnectedAccount, PaymentError>;

    async fn create_account_link(&self, params: &AccountLinkParams) -> Result<AccountLink, PaymentError>;

    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, PaymentError>;

    /// Balance of a connected account.
    async fn retrieve_balance(&self, account_id: &str) -> Result<Balance, PaymentError>;

    async fn create_transfer(&self, params: &TransferParams) -> Result<Transfer, PaymentError>;
}
