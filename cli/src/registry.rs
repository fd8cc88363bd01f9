//! Thin HTTP clients for the two external registries named in the data
//! model's boundary contracts: the transaction registry and the
//! selective-disclosure tracker. Both services are out of scope for this
//! crate — only the client side is implemented, against the endpoint
//! shapes the reference services expose.

use anyhow::{bail, Context, Result};
use cop_core::{ProtectedTransaction, ShareRecord};
use serde::Serialize;
use serde_json::Value;

pub struct TransactionRegistry {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct RegisterCompanyIn<'a> {
    name: &'a str,
    signing_public: &'a str,
    encryption_public: &'a str,
}

impl TransactionRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::blocking::Client::new() }
    }

    pub fn register_company(&self, name: &str, signing_public: &str, encryption_public: &str) -> Result<()> {
        let url = format!("{}/register_company", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&RegisterCompanyIn { name, signing_public, encryption_public })
            .send()
            .with_context(|| format!("POST {url}"))?;
        ensure_success(resp, &url)?;
        Ok(())
    }

    pub fn put_transaction(&self, tx: &ProtectedTransaction) -> Result<()> {
        let url = format!("{}/transactions", self.base_url);
        let resp = self.client.post(&url).json(tx).send().with_context(|| format!("POST {url}"))?;
        ensure_success(resp, &url)?;
        Ok(())
    }

    pub fn get_transaction(&self, tx_id: &str) -> Result<ProtectedTransaction> {
        let url = format!("{}/transactions/{tx_id}", self.base_url);
        let resp = self.client.get(&url).send().with_context(|| format!("GET {url}"))?;
        let resp = ensure_success(resp, &url)?;
        Ok(resp.json()?)
    }

    pub fn buyer_sign(&self, tx_id: &str, sig_buyer: &str) -> Result<()> {
        let url = format!("{}/transactions/{tx_id}/buyer_sign", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "sig_buyer": sig_buyer }))
            .send()
            .with_context(|| format!("POST {url}"))?;
        ensure_success(resp, &url)?;
        Ok(())
    }

    pub fn put_share(&self, share: &ShareRecord) -> Result<()> {
        let url = format!("{}/transactions/{}/share", self.base_url, share.tx_id);
        let resp = self.client.post(&url).json(share).send().with_context(|| format!("POST {url}"))?;
        ensure_success(resp, &url)?;
        Ok(())
    }

    pub fn list_shares(&self, tx_id: &str) -> Result<Vec<ShareRecord>> {
        let url = format!("{}/transactions/{tx_id}/shares", self.base_url);
        let resp = self.client.get(&url).send().with_context(|| format!("GET {url}"))?;
        let resp = ensure_success(resp, &url)?;
        Ok(resp.json()?)
    }
}

pub struct DisclosureTracker {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl DisclosureTracker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::blocking::Client::new() }
    }

    pub fn put_disclosure(&self, share: &ShareRecord) -> Result<()> {
        let url = format!("{}/disclosures", self.base_url);
        let resp = self.client.post(&url).json(share).send().with_context(|| format!("POST {url}"))?;
        ensure_success(resp, &url)?;
        Ok(())
    }

    pub fn list_disclosures(&self, tx_id: &str, section: Option<&str>) -> Result<Vec<ShareRecord>> {
        let url = format!("{}/disclosures/{tx_id}", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(section) = section {
            req = req.query(&[("section", section)]);
        }
        let resp = req.send().with_context(|| format!("GET {url}"))?;
        let resp = ensure_success(resp, &url)?;
        Ok(resp.json()?)
    }
}

fn ensure_success(resp: reqwest::blocking::Response, url: &str) -> Result<reqwest::blocking::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let detail: Value = resp.json().unwrap_or_else(|_| Value::Null);
    bail!("{url} returned {status}: {detail}")
}
