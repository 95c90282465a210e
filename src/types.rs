//! Request arguments and reshaped results of the wrapped RPC methods.
//!
//! Result records serialize back to JSON with exactly the keys bitcoind uses
//! for the fields kept here; everything else the node sends is dropped.
//! Missing fields decode to their zero value.

use std::{fmt, str::FromStr};

use corepc_types::bitcoin::{BlockHash, Txid};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One entry of `listunspent`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unspent {
    #[serde(deserialize_with = "null_as_default")]
    pub txid: String,
    pub vout: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "scriptPubKey")]
    #[serde(deserialize_with = "null_as_default")]
    pub script_pub_key: String,
    /// Amount in BTC.
    pub amount: f64,
    pub confirmations: i64,
    /// Only set for P2SH outputs.
    #[serde(rename = "redeemScript")]
    #[serde(deserialize_with = "null_as_default")]
    pub redeem_script: String,
    /// Only set for P2WSH or P2SH-P2WSH outputs.
    #[serde(rename = "witnessScript")]
    #[serde(deserialize_with = "null_as_default")]
    pub witness_script: String,
    pub spendable: bool,
    pub solvable: bool,
    /// Only reported when the wallet has `avoid_reuse` set.
    pub reused: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub desc: String,
    #[serde(deserialize_with = "null_as_default")]
    pub parent_descs: Vec<String>,
    pub safe: bool,
}

/// Outpoint spent by `createrawtransaction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Input {
    pub txid: String,
    pub vout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl Input {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
            sequence: None,
        }
    }
}

/// Result of `signrawtransactionwithkey`. Only `hex` reaches callers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SignedTransaction {
    #[serde(deserialize_with = "null_as_default")]
    pub hex: String,
}

/// The subset of `getblock` (verbosity 1) this client keeps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub hash: String,
    pub height: u64,
    pub time: u64,
    /// Txids of the block's transactions.
    #[serde(deserialize_with = "null_as_default")]
    pub tx: Vec<String>,
    #[serde(rename = "nTx")]
    pub n_tx: u64,
}

impl BlockSummary {
    pub fn block_hash(&self) -> Result<BlockHash, Error> {
        Ok(self.hash.parse()?)
    }

    pub fn txids(&self) -> Result<Vec<Txid>, Error> {
        self.tx
            .iter()
            .map(|txid| txid.parse::<Txid>().map_err(Error::from))
            .collect()
    }
}

/// Input of a verbose `getrawtransaction`, reduced to the spent outpoint.
///
/// Coinbase inputs carry no outpoint and come back as an empty txid and 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vin {
    #[serde(deserialize_with = "null_as_default")]
    pub txid: String,
    pub vout: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPubKey {
    #[serde(deserialize_with = "null_as_default")]
    pub asm: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
}

/// Output of a verbose `getrawtransaction`, with the address lifted out of
/// `scriptPubKey`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Vout {
    pub address: String,
    pub n: u32,
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct WireVout {
    value: f64,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: ScriptPubKey,
}

impl From<WireVout> for Vout {
    fn from(out: WireVout) -> Self {
        Vout {
            address: out.script_pub_key.address.clone(),
            n: out.n,
            value: out.value,
            script_pub_key: out.script_pub_key,
        }
    }
}

/// Verbose `getrawtransaction` result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    pub in_active_chain: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub hex: String,
    #[serde(deserialize_with = "null_as_default")]
    pub txid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hash: String,
    pub size: u64,
    pub locktime: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub vin: Vec<Vin>,
    #[serde(deserialize_with = "deserialize_vouts")]
    pub vout: Vec<Vout>,
    #[serde(deserialize_with = "null_as_default")]
    pub blockhash: String,
    pub confirmations: i64,
    pub blocktime: u64,
    pub time: u64,
}

impl RawTransaction {
    pub fn txid(&self) -> Result<Txid, Error> {
        Ok(self.txid.parse()?)
    }
}

fn deserialize_vouts<'de, D>(deserializer: D) -> Result<Vec<Vout>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let outs: Vec<WireVout> = null_as_default(deserializer)?;
    Ok(outs.into_iter().map(Vout::from).collect())
}

/// Decodes an explicit JSON `null` as the zero value, like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of `listreceivedbyaddress`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceivedByAddress {
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    /// Total received in BTC.
    pub amount: f64,
    pub confirmations: i64,
    #[serde(rename = "involvesWatchonly")]
    pub involves_watchonly: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(deserialize_with = "null_as_default")]
    pub txids: Vec<String>,
}

/// Address types accepted by `getnewaddress`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressType {
    Legacy,
    P2shSegwit,
    Bech32,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Legacy => "legacy",
            AddressType::P2shSegwit => "p2sh-segwit",
            AddressType::Bech32 => "bech32",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(AddressType::Legacy),
            "p2sh-segwit" => Ok(AddressType::P2shSegwit),
            "bech32" => Ok(AddressType::Bech32),
            other => Err(Error::InvalidArgument(format!(
                "unsupported address type `{other}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpc::serde_json::{self, json};

    #[test]
    fn address_type_round_trips_through_str() {
        for ty in [
            AddressType::Legacy,
            AddressType::P2shSegwit,
            AddressType::Bech32,
        ] {
            assert_eq!(ty.as_str().parse::<AddressType>().unwrap(), ty);
        }
        assert!(matches!(
            "bech32m".parse::<AddressType>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn vout_address_is_lifted_from_script() {
        let tx: RawTransaction = serde_json::from_value(json!({
            "txid": "aa",
            "vout": [{
                "value": 0.5,
                "n": 1,
                "scriptPubKey": {
                    "asm": "0 abcd",
                    "desc": "addr(bcrt1q...)#xyz",
                    "hex": "0014abcd",
                    "address": "bcrt1qxyz",
                    "type": "witness_v0_keyhash"
                }
            }]
        }))
        .unwrap();

        assert_eq!(
            tx.vout,
            vec![Vout {
                address: "bcrt1qxyz".to_string(),
                n: 1,
                value: 0.5,
                script_pub_key: ScriptPubKey {
                    asm: "0 abcd".to_string(),
                    address: "bcrt1qxyz".to_string(),
                },
            }]
        );
    }

    #[test]
    fn null_strings_and_lists_decode_as_empty() {
        let unspent: Unspent = serde_json::from_value(json!({
            "txid": "ab",
            "label": null,
            "desc": null,
            "parent_descs": null,
            "amount": 0.1
        }))
        .unwrap();
        assert_eq!(unspent.label, "");
        assert_eq!(unspent.desc, "");
        assert!(unspent.parent_descs.is_empty());

        let block: BlockSummary =
            serde_json::from_value(json!({"hash": "00", "tx": null, "nTx": 0})).unwrap();
        assert!(block.tx.is_empty());

        let tx: RawTransaction = serde_json::from_value(json!({
            "txid": "aa",
            "blockhash": null,
            "vin": null,
            "vout": null
        }))
        .unwrap();
        assert_eq!(tx.blockhash, "");
        assert!(tx.vin.is_empty());
        assert!(tx.vout.is_empty());

        let received: ReceivedByAddress =
            serde_json::from_value(json!({"address": "bcrt1q", "label": null, "txids": null}))
                .unwrap();
        assert_eq!(received.label, "");
        assert!(received.txids.is_empty());
    }

    #[test]
    fn coinbase_vin_decodes_to_empty_outpoint() {
        let vin: Vin =
            serde_json::from_value(json!({"coinbase": "03a0bb0d", "sequence": 4294967295u32}))
                .unwrap();
        assert_eq!(vin, Vin::default());
    }

    #[test]
    fn input_omits_unset_sequence() {
        let mut input = Input::new("ab", 1);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"txid": "ab", "vout": 1})
        );

        input.sequence = Some(0xfffffffd);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"txid": "ab", "vout": 1, "sequence": 4294967293u32})
        );
    }

    #[test]
    fn block_summary_parses_typed_hashes() {
        let block = BlockSummary {
            hash: "000000000000e7f3e8f60f9431725df65cdeb5c13386f03edaba73269e2d313d".to_string(),
            tx: vec![
                "45c0f0a58d4f356b605a26b8aceb3faab24cf067c7d084b252d4ff863c692771".to_string(),
            ],
            ..Default::default()
        };

        assert_eq!(block.block_hash().unwrap().to_string(), block.hash);
        assert_eq!(block.txids().unwrap()[0].to_string(), block.tx[0]);

        let bad = BlockSummary::default();
        assert!(matches!(bad.block_hash(), Err(Error::HexToArray(_))));
    }
}
