//! Transaction assembly and signing.
//!
//! The signer signs the key-sorted amino JSON `StdSignDoc`. The broadcast
//! envelope is a protobuf `TxRaw` whose signer info declares
//! `SIGN_MODE_LEGACY_AMINO_JSON`, so Stargate nodes verify against that doc.

use crate::account::AccountResolver;
use crate::error::{FaucetError, FaucetResult};
use crate::proto;
use drip_common::{Coin, DecCoin};
use drip_keystore::{Keystore, DEFAULT_KEY_PASS};
use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Bank transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

/// Messages the faucet knows how to sign, in their amino JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Msg {
    #[serde(rename = "cosmos-sdk/MsgSend")]
    Send(MsgSend),
}

impl Msg {
    /// Protobuf form, packed for `TxBody.messages`.
    pub fn to_any(&self) -> proto::Any {
        match self {
            Msg::Send(send) => proto::Any {
                type_url: proto::MSG_SEND_TYPE_URL.to_string(),
                value: proto::ProtoMsgSend {
                    from_address: send.from_address.clone(),
                    to_address: send.to_address.clone(),
                    amount: send.amount.iter().map(proto::ProtoCoin::from).collect(),
                }
                .encode_to_vec(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    #[serde(with = "u64_string")]
    pub gas: u64,
}

#[derive(Serialize)]
struct StdSignDoc<'a> {
    #[serde(with = "u64_string")]
    account_number: u64,
    chain_id: &'a str,
    fee: StdFee,
    memo: &'a str,
    msgs: &'a [Msg],
    #[serde(with = "u64_string")]
    sequence: u64,
}

/// Everything needed to produce sign bytes, before a signature exists.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub msgs: Vec<Msg>,
    pub account_number: u64,
    pub sequence: u64,
    pub gas: u64,
    pub gas_adjustment: f64,
    pub gas_prices: Vec<DecCoin>,
    pub memo: String,
    pub chain_id: String,
}

impl UnsignedTransaction {
    /// Fee derived from the gas prices: `ceil(price * gas)` per denom.
    pub fn fee(&self) -> StdFee {
        let amount = self
            .gas_prices
            .iter()
            .map(|price| price.fee_for_gas(self.gas))
            .filter(|coin| coin.amount > 0)
            .collect();
        StdFee {
            amount,
            gas: self.gas,
        }
    }

    /// Canonical bytes the signer commits to: compact JSON with sorted keys.
    pub fn sign_bytes(&self) -> FaucetResult<Vec<u8>> {
        let doc = StdSignDoc {
            account_number: self.account_number,
            chain_id: &self.chain_id,
            fee: self.fee(),
            memo: &self.memo,
            msgs: &self.msgs,
            sequence: self.sequence,
        };
        // Value objects are BTreeMaps, so a round trip sorts every level.
        let sorted: Value = serde_json::to_value(&doc)
            .map_err(|e| FaucetError::SigningError(format!("sign doc: {}", e)))?;
        serde_json::to_vec(&sorted).map_err(|e| FaucetError::SigningError(format!("sign doc: {}", e)))
    }
}

/// Signed, broadcast-ready transaction. Single use: it carries the sequence it consumed.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    bytes: Vec<u8>,
    account_number: u64,
    sequence: u64,
    hash: String,
}

impl SignedTransaction {
    fn new(bytes: Vec<u8>, account_number: u64, sequence: u64) -> Self {
        let hash = hex::encode_upper(Sha256::digest(&bytes));
        Self {
            bytes,
            account_number,
            sequence,
            hash,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Upper-case hex SHA-256 of the encoded transaction
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

pub struct TransactionBuilder {
    keystore: Arc<dyn Keystore>,
    resolver: AccountResolver,
    chain_id: String,
    gas: u64,
    gas_adjustment: f64,
    gas_prices: Vec<DecCoin>,
    memo: String,
}

impl TransactionBuilder {
    pub fn new(
        keystore: Arc<dyn Keystore>,
        resolver: AccountResolver,
        chain_id: String,
        gas: u64,
        gas_adjustment: f64,
        gas_prices: Vec<DecCoin>,
        memo: String,
    ) -> Self {
        Self {
            keystore,
            resolver,
            chain_id,
            gas,
            gas_adjustment,
            gas_prices,
            memo,
        }
    }

    /// Look up `key_name`, fetch its current account state and sign `msgs` with it.
    pub async fn build_and_sign(&self, msgs: Vec<Msg>, key_name: &str) -> FaucetResult<SignedTransaction> {
        let key = self.keystore.key_by_name(key_name)?;
        let account = self.resolver.resolve(&key.address).await?;

        let unsigned = UnsignedTransaction {
            msgs,
            account_number: account.account_number,
            sequence: account.sequence,
            gas: self.gas,
            gas_adjustment: self.gas_adjustment,
            gas_prices: self.gas_prices.clone(),
            memo: self.memo.clone(),
            chain_id: self.chain_id.clone(),
        };

        let sign_bytes = unsigned.sign_bytes()?;
        let signed = self.keystore.sign(key_name, DEFAULT_KEY_PASS, &sign_bytes)?;

        let fee = unsigned.fee();
        let body = proto::TxBody {
            messages: unsigned.msgs.iter().map(Msg::to_any).collect(),
            memo: unsigned.memo,
            timeout_height: 0,
        };
        let auth_info = proto::AuthInfo {
            signer_infos: vec![proto::SignerInfo {
                public_key: Some(proto::Any {
                    type_url: proto::SECP256K1_PUBKEY_TYPE_URL.to_string(),
                    value: proto::PubKey {
                        key: signed.public_key,
                    }
                    .encode_to_vec(),
                }),
                mode_info: Some(proto::ModeInfo {
                    single: Some(proto::Single {
                        mode: proto::SIGN_MODE_LEGACY_AMINO_JSON,
                    }),
                }),
                sequence: account.sequence,
            }],
            fee: Some(proto::Fee {
                amount: fee.amount.iter().map(proto::ProtoCoin::from).collect(),
                gas_limit: fee.gas,
                payer: String::new(),
                granter: String::new(),
            }),
        };
        let bytes = proto::TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            signatures: vec![signed.signature],
        }
        .encode_to_vec();

        let signed_tx = SignedTransaction::new(bytes, account.account_number, account.sequence);
        debug!(
            "Signed tx {} with key {} (account_number={}, sequence={})",
            signed_tx.hash(),
            key_name,
            account.account_number,
            account.sequence
        );
        Ok(signed_tx)
    }
}

/// Amino JSON renders 64-bit integers as strings.
mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountState, BroadcastResult, LedgerClient};
    use async_trait::async_trait;
    use drip_keystore::{verify, LocalKeystore};

    struct FixedAccount(AccountState);

    #[async_trait]
    impl LedgerClient for FixedAccount {
        async fn account(&self, _address: &str) -> FaucetResult<AccountState> {
            Ok(self.0)
        }

        async fn balance(&self, _address: &str, denom: &str) -> FaucetResult<Coin> {
            Ok(Coin::new(0, denom))
        }

        async fn broadcast_tx_commit(&self, _tx_bytes: &[u8]) -> FaucetResult<BroadcastResult> {
            unreachable!("builder never broadcasts")
        }
    }

    struct MissingAccount;

    #[async_trait]
    impl LedgerClient for MissingAccount {
        async fn account(&self, address: &str) -> FaucetResult<AccountState> {
            Err(FaucetError::AccountNotFound(address.to_string()))
        }

        async fn balance(&self, _address: &str, denom: &str) -> FaucetResult<Coin> {
            Ok(Coin::new(0, denom))
        }

        async fn broadcast_tx_commit(&self, _tx_bytes: &[u8]) -> FaucetResult<BroadcastResult> {
            unreachable!("builder never broadcasts")
        }
    }

    fn send_msg() -> Msg {
        Msg::Send(MsgSend {
            from_address: "cosmos1from".to_string(),
            to_address: "cosmos1to".to_string(),
            amount: vec![Coin::new(1000, "uatom")],
        })
    }

    fn unsigned() -> UnsignedTransaction {
        UnsignedTransaction {
            msgs: vec![send_msg()],
            account_number: 12,
            sequence: 7,
            gas: 200_000,
            gas_adjustment: 1.0,
            gas_prices: DecCoin::parse_list("0.025uatom").unwrap(),
            memo: "drip".to_string(),
            chain_id: "test-1".to_string(),
        }
    }

    fn builder(ledger: Arc<dyn LedgerClient>, keystore: Arc<LocalKeystore>) -> TransactionBuilder {
        TransactionBuilder::new(
            keystore,
            AccountResolver::new(ledger, "cosmos"),
            "test-1".to_string(),
            200_000,
            1.0,
            DecCoin::parse_list("0.01uatom").unwrap(),
            String::new(),
        )
    }

    #[test]
    fn test_fee_rounds_up() {
        let mut tx = unsigned();
        tx.gas = 100_001;
        tx.gas_prices = DecCoin::parse_list("0.01uatom,0stake").unwrap();
        let fee = tx.fee();
        assert_eq!(fee.amount, vec![Coin::new(1001, "uatom")]);
        assert_eq!(fee.gas, 100_001);
    }

    #[test]
    fn test_sign_bytes_are_sorted_amino_json() {
        let bytes = unsigned().sign_bytes().unwrap();
        let expected = concat!(
            r#"{"account_number":"12","chain_id":"test-1","#,
            r#""fee":{"amount":[{"amount":"5000","denom":"uatom"}],"gas":"200000"},"#,
            r#""memo":"drip","#,
            r#""msgs":[{"type":"cosmos-sdk/MsgSend","value":{"amount":[{"amount":"1000","denom":"uatom"}],"from_address":"cosmos1from","to_address":"cosmos1to"}}],"#,
            r#""sequence":"7"}"#
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_sign_bytes_depend_on_sequence() {
        let a = unsigned();
        let mut b = unsigned();
        b.sequence += 1;
        assert_ne!(a.sign_bytes().unwrap(), b.sign_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_build_and_sign_embeds_account_state() {
        let keystore = Arc::new(LocalKeystore::new());
        let key = keystore.add("faucet", DEFAULT_KEY_PASS).unwrap();
        let ledger = Arc::new(FixedAccount(AccountState {
            account_number: 3,
            sequence: 41,
        }));

        let signed = builder(ledger, keystore).build_and_sign(vec![send_msg()], "faucet").await.unwrap();
        assert_eq!(signed.sequence(), 41);
        assert_eq!(signed.account_number(), 3);
        assert_eq!(signed.hash(), hex::encode_upper(Sha256::digest(signed.bytes())));

        let raw = proto::TxRaw::decode(signed.bytes()).unwrap();
        let body = proto::TxBody::decode(raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages, vec![send_msg().to_any()]);
        assert_eq!(body.messages[0].type_url, "/cosmos.bank.v1beta1.MsgSend");
        let send = proto::ProtoMsgSend::decode(body.messages[0].value.as_slice()).unwrap();
        assert_eq!(send.to_address, "cosmos1to");
        assert_eq!(send.amount[0].amount, "1000");

        let auth_info = proto::AuthInfo::decode(raw.auth_info_bytes.as_slice()).unwrap();
        let fee = auth_info.fee.unwrap();
        assert_eq!(fee.amount, vec![proto::ProtoCoin::from(&Coin::new(2000, "uatom"))]);
        assert_eq!(fee.gas_limit, 200_000);

        let signer = &auth_info.signer_infos[0];
        assert_eq!(signer.sequence, 41);
        assert_eq!(
            signer.mode_info.as_ref().and_then(|m| m.single.as_ref()).map(|s| s.mode),
            Some(proto::SIGN_MODE_LEGACY_AMINO_JSON)
        );
        let any_key = signer.public_key.as_ref().unwrap();
        assert_eq!(any_key.type_url, "/cosmos.crypto.secp256k1.PubKey");
        let public_key = proto::PubKey::decode(any_key.value.as_slice()).unwrap().key;
        assert_eq!(public_key, key.public_key);
        assert_eq!(raw.signatures.len(), 1);
        let signature = raw.signatures[0].clone();

        let doc = UnsignedTransaction {
            msgs: vec![send_msg()],
            account_number: 3,
            sequence: 41,
            gas: 200_000,
            gas_adjustment: 1.0,
            gas_prices: DecCoin::parse_list("0.01uatom").unwrap(),
            memo: String::new(),
            chain_id: "test-1".to_string(),
        };
        assert!(verify(&public_key, &doc.sign_bytes().unwrap(), &signature).unwrap());
    }

    #[tokio::test]
    async fn test_build_and_sign_unknown_key() {
        let ledger = Arc::new(FixedAccount(AccountState {
            account_number: 0,
            sequence: 0,
        }));
        let err = builder(ledger, Arc::new(LocalKeystore::new()))
            .build_and_sign(vec![send_msg()], "nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::KeyNotFound(_)));
    }

    #[tokio::test]
    async fn test_build_and_sign_propagates_missing_account() {
        let keystore = Arc::new(LocalKeystore::new());
        keystore.add("faucet", DEFAULT_KEY_PASS).unwrap();
        let err = builder(Arc::new(MissingAccount), keystore)
            .build_and_sign(vec![send_msg()], "faucet")
            .await
            .unwrap_err();
        assert!(matches!(err, FaucetError::AccountNotFound(_)));
    }
}
