use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;
use ethers::providers::{JsonRpcClient, Provider};
use ethers_core::types::U256;
use serde_json::Value;

/// JSON-RPC method returning the node's suggested legacy gas price
pub(crate) const ETH_GAS_PRICE: &str = "eth_gasPrice";

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("RPC call {method} failed: {message}")]
    CallFailed { method: String, message: String },
}

impl RpcError {
    pub fn call_failed(method: &str, err: impl ToString) -> Self {
        Self::CallFailed {
            method: method.to_owned(),
            message: err.to_string(),
        }
    }
}

/// The one capability the remote estimators need from a node: call a method
/// and decode a scalar result.
///
/// The call is cancelled by dropping the returned future, so callers bound it
/// with a timeout of their own.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait GasPriceRpc: Send + Sync + Debug {
    /// Invoke `method` with positional `params` and decode the result as an
    /// unsigned integer.
    async fn call_scalar(&self, method: &str, params: Vec<Value>) -> Result<U256, RpcError>;
}

#[async_trait]
impl<P> GasPriceRpc for Provider<P>
where
    P: JsonRpcClient,
{
    async fn call_scalar(&self, method: &str, params: Vec<Value>) -> Result<U256, RpcError> {
        self.request::<_, U256>(method, params)
            .await
            .map_err(|err| RpcError::call_failed(method, err))
    }
}

#[cfg(test)]
mod tests {
    use ethers::providers::{JsonRpcError, MockProvider, MockResponse, Provider};

    use super::*;

    #[tokio::test]
    async fn provider_decodes_hex_quantity() {
        let mock = MockProvider::new();
        mock.push(U256::from(1_000_000_007u64)).unwrap();
        let provider = Provider::new(mock.clone());

        let price = provider.call_scalar(ETH_GAS_PRICE, vec![]).await.unwrap();

        assert_eq!(price, U256::from(1_000_000_007u64));
        mock.assert_request(ETH_GAS_PRICE, Vec::<Value>::new())
            .unwrap();
    }

    #[tokio::test]
    async fn provider_error_names_the_method() {
        let mock = MockProvider::new();
        mock.push_response(MockResponse::Error(JsonRpcError {
            code: -32000,
            message: "header not found".to_owned(),
            data: None,
        }));
        let provider = Provider::new(mock);

        let err = provider
            .call_scalar(ETH_GAS_PRICE, vec![])
            .await
            .unwrap_err();

        let RpcError::CallFailed { method, message } = err;
        assert_eq!(method, ETH_GAS_PRICE);
        assert!(message.contains("header not found"), "{message}");
    }
}
