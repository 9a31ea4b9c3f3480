use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use ledger_core::{LedgerError, Result};

use crate::client::CustodyApi;
use crate::config::CustodyConfig;
use crate::types::{
    DepositAddress, TransactionsPage, Wallet, WalletTransaction, WalletsPage, WithdrawalActivity,
};

/// Upper bound on a single transactions page.
const TRANSACTIONS_PAGE_LIMIT: u32 = 500;

/// HTTP implementation of the custody API.
pub struct CustodyHttpClient {
    client: Client,
    config: CustodyConfig,
}

impl CustodyHttpClient {
    pub fn new(config: CustodyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.rpc_timeout)
            .build()
            .map_err(|e| LedgerError::Custody(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-ACCESS-KEY", &self.config.access_key)
            .header("X-ACCESS-PASSPHRASE", &self.config.passphrase)
            .header("X-ACCESS-SIGNATURE", &self.config.signing_key)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| LedgerError::Custody(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Custody(format!(
                "request failed with status {status}: {body}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::Custody(format!("failed to decode response: {e}")))
    }
}

#[async_trait]
impl CustodyApi for CustodyHttpClient {
    async fn list_wallets(
        &self,
        portfolio_id: &str,
        wallet_type: &str,
        symbols: &[String],
    ) -> Result<Vec<Wallet>> {
        let url = self.url(&format!("/v1/portfolios/{portfolio_id}/wallets"));
        let mut query: Vec<(&str, String)> = vec![("type", wallet_type.to_string())];
        for symbol in symbols {
            query.push(("symbols", symbol.clone()));
        }

        let page: WalletsPage = self.send(self.client.get(&url).query(&query)).await?;
        debug!(portfolio_id = %portfolio_id, count = page.wallets.len(), "Listed wallets");
        Ok(page.wallets)
    }

    async fn create_wallet(
        &self,
        portfolio_id: &str,
        name: &str,
        symbol: &str,
        wallet_type: &str,
    ) -> Result<Wallet> {
        let url = self.url(&format!("/v1/portfolios/{portfolio_id}/wallets"));
        let body = json!({
            "name": name,
            "symbol": symbol,
            "type": wallet_type,
        });
        self.send(self.client.post(&url).json(&body)).await
    }

    async fn create_deposit_address(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        symbol: &str,
        network: &str,
    ) -> Result<DepositAddress> {
        let url = self.url(&format!(
            "/v1/portfolios/{portfolio_id}/wallets/{wallet_id}/addresses"
        ));
        let body = json!({
            "symbol": symbol,
            "network": network,
        });
        self.send(self.client.post(&url).json(&body)).await
    }

    async fn list_wallet_transactions(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>> {
        let url = self.url(&format!(
            "/v1/portfolios/{portfolio_id}/wallets/{wallet_id}/transactions"
        ));
        let query = [
            (
                "start_time",
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("limit", TRANSACTIONS_PAGE_LIMIT.to_string()),
        ];

        let page: TransactionsPage = self.send(self.client.get(&url).query(&query)).await?;
        debug!(
            wallet_id = %wallet_id,
            since = %since,
            count = page.transactions.len(),
            "Fetched wallet transactions"
        );
        Ok(page.transactions)
    }

    async fn create_withdrawal(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        destination: &str,
        amount: &str,
        asset: &str,
        idempotency_key: &str,
    ) -> Result<WithdrawalActivity> {
        let url = self.url(&format!(
            "/v1/portfolios/{portfolio_id}/wallets/{wallet_id}/withdrawals"
        ));
        let body = json!({
            "destination": destination,
            "amount": amount,
            "asset": asset,
            "idempotency_key": idempotency_key,
        });
        self.send(self.client.post(&url).json(&body)).await
    }
}
