use std::{collections::BTreeMap, fmt};

use corepc_types::bitcoin::BlockHash;
use jsonrpc::Request;
use jsonrpc::error::RpcError;
use jsonrpc::serde_json::{self, Map, Value, json, value::RawValue};
use log::{debug, trace};
use serde::Deserialize;

use crate::config::{Config, RpcErrorPolicy};
use crate::error::{Error, TransportError};
use crate::transport::{HttpRequest, HttpTransport, Transport};
use crate::types::{
    AddressType, BlockSummary, Input, RawTransaction, ReceivedByAddress, SignedTransaction,
    Unspent,
};

/// `id` sent with every request.
pub const CLIENT_ID: &str = "bitcoind-rpc-light";

/// Version tag bitcoind expects for legacy JSON-RPC.
pub const JSONRPC_VERSION: &str = "1.0";

/// Confirmation bounds substituted for out-of-range `listunspent` arguments.
pub const MIN_CONFIRMATIONS: i64 = 1;
pub const MAX_CONFIRMATIONS: i64 = 9_999_999;

const SATS_PER_BTC: f64 = 100_000_000.0;

const LOG_TARGET: &str = "bitcoind_rpc_light";

/// Response envelope. `id` is not checked.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Box<RawValue>>,
    #[serde(default)]
    error: Option<Box<RawValue>>,
}

// RPC Client.
pub struct Client {
    config: Config,
    /// Precomputed `Authorization` header.
    authorization: String,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.config.url())
            .field("rpc_errors", &self.config.rpc_errors)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client to a bitcoind JSON-RPC server over HTTP.
    ///
    /// Requires authentication via username/password or cookie file.
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = HttpTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }

    /// Creates a client that sends its requests through `transport`.
    pub fn with_transport<T>(config: Config, transport: T) -> Result<Self, Error>
    where
        T: Transport,
    {
        let authorization = config.auth.basic_header()?;
        Ok(Self {
            config,
            authorization,
            transport: Box::new(transport),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Calls the RPC `method` with a given `args` list.
    ///
    /// A missing or null `result` is decoded from JSON `null`.
    pub fn call<T>(&self, method: &str, args: &[Value]) -> Result<T, Error>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        self.call_at(&self.config, method, args)
    }

    fn call_at<T>(&self, config: &Config, method: &str, args: &[Value]) -> Result<T, Error>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let body = self.send(config, method, args)?;
        decode_result(config.rpc_errors, &body)
    }

    /// Like [`Client::call_at`], but a missing or null `result` becomes `T::default()`.
    fn call_or_default<T>(&self, config: &Config, method: &str, args: &[Value]) -> Result<T, Error>
    where
        T: for<'de> serde::Deserialize<'de> + Default,
    {
        let result: Option<T> = self.call_at(config, method, args)?;
        Ok(result.unwrap_or_default())
    }

    fn send(&self, config: &Config, method: &str, args: &[Value]) -> Result<Vec<u8>, Error> {
        let params = serde_json::value::to_raw_value(args).map_err(TransportError::Encode)?;
        let request = Request {
            method,
            params: Some(&*params),
            id: Value::from(CLIENT_ID),
            jsonrpc: Some(JSONRPC_VERSION),
        };
        let body = serde_json::to_vec(&request).map_err(TransportError::Encode)?;
        let url = config.url();

        // Bodies may carry private keys; only sizes are logged.
        debug!(target: LOG_TARGET, "JSON-RPC request `{method}` to {url}");
        let response = self.transport.post(HttpRequest {
            url,
            headers: vec![
                ("content-type", "text/plain;".to_string()),
                ("authorization", self.authorization.clone()),
            ],
            body,
        })?;
        trace!(target: LOG_TARGET, "JSON-RPC response `{method}`: {} bytes", response.len());

        Ok(response)
    }
}

fn decode_result<T>(policy: RpcErrorPolicy, body: &[u8]) -> Result<T, Error>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| Error::decode(body, e))?;

    if policy == RpcErrorPolicy::Surface {
        if let Some(raw) = envelope.error {
            let err: RpcError =
                serde_json::from_str(raw.get()).map_err(|e| Error::decode(body, e))?;
            return Err(Error::Rpc(err));
        }
    }

    match envelope.result {
        Some(raw) => serde_json::from_str(raw.get()),
        None => serde_json::from_value(Value::Null),
    }
    .map_err(|e| Error::decode(body, e))
}

/// Replaces out-of-range `listunspent` bounds with the node-wide extremes.
pub(crate) fn clamp_confirmations(minconf: i64, maxconf: i64) -> (i64, i64) {
    let minconf = if minconf <= 1 || minconf >= MAX_CONFIRMATIONS {
        MIN_CONFIRMATIONS
    } else {
        minconf
    };
    let maxconf = if maxconf <= 1 || maxconf >= MAX_CONFIRMATIONS {
        MAX_CONFIRMATIONS
    } else {
        maxconf
    };
    (minconf, maxconf)
}

/// Rounds a BTC amount to whole satoshis, half away from zero.
pub(crate) fn round_to_sats(amount: f64) -> f64 {
    (amount * SATS_PER_BTC).round() / SATS_PER_BTC
}

/// Builds the `outputs` argument of `createrawtransaction`.
///
/// Negative amounts are skipped; zero is kept. A non-empty `data_hex` adds a
/// trailing `{"data": ..}` output.
pub(crate) fn build_outputs(
    outputs: &BTreeMap<String, f64>,
    data_hex: &str,
) -> Result<Vec<Value>, Error> {
    let mut entries = Vec::with_capacity(outputs.len() + 1);

    for (address, amount) in outputs {
        if !amount.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "amount for {address} is not a finite number"
            )));
        }
        let amount = round_to_sats(*amount);
        if amount < 0.0 {
            continue;
        }
        let mut entry = Map::new();
        entry.insert(address.clone(), Value::from(amount));
        entries.push(Value::Object(entry));
    }

    if !data_hex.is_empty() {
        entries.push(json!({ "data": data_hex }));
    }

    if entries.is_empty() {
        return Err(Error::InvalidArgument(
            "no spendable outputs: every amount is negative and no data was given".to_string(),
        ));
    }
    Ok(entries)
}

// `bitcoind` RPC methods
impl Client {
    /// Lists the unspent outputs paying to `addresses`.
    ///
    /// `minconf` outside `2..MAX_CONFIRMATIONS` becomes [`MIN_CONFIRMATIONS`];
    /// `maxconf` outside the same range becomes [`MAX_CONFIRMATIONS`].
    pub fn list_unspent_of_address(
        &self,
        minconf: i64,
        maxconf: i64,
        addresses: &[&str],
    ) -> Result<Vec<Unspent>, Error> {
        let (minconf, maxconf) = clamp_confirmations(minconf, maxconf);
        self.call_or_default(
            &self.config,
            "listunspent",
            &[json!(minconf), json!(maxconf), json!(addresses)],
        )
    }

    /// Creates an unsigned transaction and returns its hex.
    ///
    /// Amounts are rounded to satoshi precision. See [`Error::InvalidArgument`]
    /// and [`Error::EmptyResult`] for the failure cases.
    pub fn create_raw_transaction(
        &self,
        inputs: &[Input],
        outputs: &BTreeMap<String, f64>,
        data_hex: &str,
    ) -> Result<String, Error> {
        let outputs = build_outputs(outputs, data_hex)?;
        let raw_tx: String = self.call_or_default(
            &self.config,
            "createrawtransaction",
            &[json!(inputs), Value::Array(outputs)],
        )?;

        if raw_tx.is_empty() {
            return Err(Error::EmptyResult("createrawtransaction"));
        }
        Ok(raw_tx)
    }

    /// Reveals the WIF private key of a wallet address.
    pub fn dump_private_key(&self, address: &str) -> Result<String, Error> {
        self.call_or_default(&self.config, "dumpprivkey", &[json!(address)])
    }

    /// Signs `raw_tx_hex` with a single private key and returns the resulting hex.
    ///
    /// The node's `complete` flag is not returned: a partially signed
    /// transaction looks the same as a fully signed one.
    pub fn sign_raw_transaction_with_key(
        &self,
        raw_tx_hex: &str,
        private_key: &str,
    ) -> Result<String, Error> {
        let signed: SignedTransaction = self.call_or_default(
            &self.config,
            "signrawtransactionwithkey",
            &[json!(raw_tx_hex), json!([private_key])],
        )?;
        Ok(signed.hex)
    }

    /// Broadcasts a signed transaction and returns its txid.
    pub fn send_raw_transaction(&self, signed_tx_hex: &str) -> Result<String, Error> {
        self.call_or_default(&self.config, "sendrawtransaction", &[json!(signed_tx_hex)])
    }

    /// Get block count.
    pub fn get_block_count(&self) -> Result<u64, Error> {
        self.call_or_default(&self.config, "getblockcount", &[])
    }

    /// Get the hash of the block at `height`.
    pub fn get_block_hash(&self, height: u64) -> Result<String, Error> {
        self.call_or_default(&self.config, "getblockhash", &[json!(height)])
    }

    /// Get best block hash.
    pub fn get_best_block_hash(&self) -> Result<BlockHash, Error> {
        let res: String = self.call("getbestblockhash", &[])?;
        Ok(res.parse()?)
    }

    /// Fetches a block header summary plus its txids.
    pub fn get_block(&self, block_hash: &str) -> Result<BlockSummary, Error> {
        self.call_or_default(&self.config, "getblock", &[json!(block_hash)])
    }

    /// Fetches a transaction in verbose form.
    pub fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, Error> {
        self.call_or_default(&self.config, "getrawtransaction", &[json!(txid), json!(true)])
    }

    /// Derives a new address in `wallet`.
    ///
    /// `address_type` is one of `""` (node default), `"legacy"`,
    /// `"p2sh-segwit"` or `"bech32"`.
    pub fn get_new_address(
        &self,
        wallet: &str,
        label: &str,
        address_type: &str,
    ) -> Result<String, Error> {
        let address_type = match address_type {
            "" => None,
            other => Some(other.parse::<AddressType>()?),
        };

        let mut args = vec![json!(label)];
        if let Some(ty) = address_type {
            args.push(json!(ty.as_str()));
        }

        let config = self.config.wallet_scoped(wallet);
        self.call_or_default(&config, "getnewaddress", &args)
    }

    /// Lists the amounts received per address of `wallet`.
    pub fn list_received_by_address(
        &self,
        wallet: &str,
        minconf: u32,
        include_empty: bool,
        include_watchonly: bool,
        address_filter: &str,
    ) -> Result<Vec<ReceivedByAddress>, Error> {
        let config = self.config.wallet_scoped(wallet);
        self.call_or_default(
            &config,
            "listreceivedbyaddress",
            &[
                json!(minconf),
                json!(include_empty),
                json!(include_watchonly),
                json!(address_filter),
            ],
        )
    }
}
