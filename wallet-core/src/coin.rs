//! Coin registry
//!
//! Every supported chain is described by one constant [`CoinDescriptor`]. The
//! table is read-only and shared; nothing in the library mutates it.

use core::fmt;
use core::str::FromStr;

use bitcoin_hashes::{Hash, hash160, ripemd160};
use serde::{Deserialize, Serialize};
use wallet_core_hashes::blake256;

use crate::base58::Checksum;
use crate::bip32::{ChildNumber, DerivationPath, version};
use crate::error::{Error, Result};
use crate::keys::{Curve, PublicKeyType};

/// Coin identifiers. Values are SLIP-44 coin types, or the registry id for
/// chains that share another chain's SLIP-44 number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum CoinType {
    Bitcoin = 0,
    Litecoin = 2,
    Dogecoin = 3,
    Dash = 5,
    Viacoin = 14,
    DigiByte = 20,
    Decred = 42,
    Ethereum = 60,
    EthereumClassic = 61,
    Cosmos = 118,
    Zcash = 133,
    Firo = 136,
    Ripple = 144,
    Ravencoin = 175,
    Tron = 195,
    Kava = 459,
    Solana = 501,
    Binance = 714,
    Neo = 888,
    THORChain = 931,
    Polygon = 966,
    Qtum = 2301,
    Osmosis = 10000118,
    AvalancheCChain = 10009000,
    SmartChain = 20000714,
}

impl CoinType {
    /// Every registered coin, in id order
    pub const ALL: [CoinType; 25] = [
        CoinType::Bitcoin,
        CoinType::Litecoin,
        CoinType::Dogecoin,
        CoinType::Dash,
        CoinType::Viacoin,
        CoinType::DigiByte,
        CoinType::Decred,
        CoinType::Ethereum,
        CoinType::EthereumClassic,
        CoinType::Cosmos,
        CoinType::Zcash,
        CoinType::Firo,
        CoinType::Ripple,
        CoinType::Ravencoin,
        CoinType::Tron,
        CoinType::Kava,
        CoinType::Solana,
        CoinType::Binance,
        CoinType::Neo,
        CoinType::THORChain,
        CoinType::Polygon,
        CoinType::Qtum,
        CoinType::Osmosis,
        CoinType::AvalancheCChain,
        CoinType::SmartChain,
    ];

    /// Numeric id
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Registry entry of this coin
    pub fn descriptor(self) -> &'static CoinDescriptor {
        match self {
            CoinType::Bitcoin => &BITCOIN,
            CoinType::Litecoin => &LITECOIN,
            CoinType::Dogecoin => &DOGECOIN,
            CoinType::Dash => &DASH,
            CoinType::Viacoin => &VIACOIN,
            CoinType::DigiByte => &DIGIBYTE,
            CoinType::Decred => &DECRED,
            CoinType::Ethereum => &ETHEREUM,
            CoinType::EthereumClassic => &ETHEREUM_CLASSIC,
            CoinType::Cosmos => &COSMOS,
            CoinType::Zcash => &ZCASH,
            CoinType::Firo => &FIRO,
            CoinType::Ripple => &RIPPLE,
            CoinType::Ravencoin => &RAVENCOIN,
            CoinType::Tron => &TRON,
            CoinType::Kava => &KAVA,
            CoinType::Solana => &SOLANA,
            CoinType::Binance => &BINANCE,
            CoinType::Neo => &NEO,
            CoinType::THORChain => &THORCHAIN,
            CoinType::Polygon => &POLYGON,
            CoinType::Qtum => &QTUM,
            CoinType::Osmosis => &OSMOSIS,
            CoinType::AvalancheCChain => &AVALANCHE_C_CHAIN,
            CoinType::SmartChain => &SMART_CHAIN,
        }
    }
}

impl From<CoinType> for u32 {
    fn from(coin: CoinType) -> Self {
        coin.id()
    }
}

impl TryFrom<u32> for CoinType {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        CoinType::ALL
            .into_iter()
            .find(|coin| coin.id() == id)
            .ok_or_else(|| Error::UnsupportedCoin(format!("Unknown coin id {}", id)))
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

impl FromStr for CoinType {
    type Err = Error;

    /// Accepts the coin name, case-insensitive, or its symbol
    fn from_str(s: &str) -> Result<Self> {
        CoinType::ALL
            .into_iter()
            .find(|coin| {
                let d = coin.descriptor();
                d.name.eq_ignore_ascii_case(s) || d.symbol == s
            })
            .ok_or_else(|| Error::UnsupportedCoin(s.to_string()))
    }
}

/// Chain family, selects the transaction format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blockchain {
    Bitcoin,
    Zcash,
    Decred,
    Ethereum,
    Cosmos,
    Tron,
    Ripple,
    Solana,
    Neo,
}

impl Blockchain {
    /// Whether the planner and signer handle this family
    pub fn is_utxo(&self) -> bool {
        matches!(self, Blockchain::Bitcoin | Blockchain::Zcash | Blockchain::Decred)
    }
}

/// BIP43 purpose field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum Purpose {
    /// Legacy P2PKH accounts
    Bip44 = 44,
    /// P2SH-wrapped segwit accounts
    Bip49 = 49,
    /// Native segwit accounts
    Bip84 = 84,
}

impl From<Purpose> for u32 {
    fn from(purpose: Purpose) -> Self {
        purpose as u32
    }
}

impl TryFrom<u32> for Purpose {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            44 => Ok(Purpose::Bip44),
            49 => Ok(Purpose::Bip49),
            84 => Ok(Purpose::Bip84),
            other => Err(Error::InvalidParameter(format!("Unsupported purpose {}", other))),
        }
    }
}

/// Shape of a coin's derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathTemplate {
    /// `m/purpose'/coin'/account'/change/address`
    Bip44,
    /// `m/purpose'/coin'/account'`, hardened only
    AccountOnly,
}

/// Public key hash used by Base58 and segwit addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyHasher {
    /// RIPEMD160(SHA256(x))
    Hash160,
    /// RIPEMD160(BLAKE256(x))
    Blake256Ripemd160,
}

impl KeyHasher {
    pub fn hash(&self, data: &[u8]) -> [u8; 20] {
        match self {
            KeyHasher::Hash160 => hash160::Hash::hash(data).to_byte_array(),
            KeyHasher::Blake256Ripemd160 => {
                let blake = blake256::Hash::hash(data);
                ripemd160::Hash::hash(blake.as_byte_array()).to_byte_array()
            }
        }
    }
}

/// Address format parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// Base58Check P2PKH/P2SH, plus segwit when `hrp` is set
    Bitcoin {
        p2pkh: &'static [u8],
        p2sh: &'static [u8],
        hrp: Option<&'static str>,
        checksum: Checksum,
        hasher: KeyHasher,
    },
    /// Bech32 of the key hash
    Cosmos {
        hrp: &'static str,
    },
    Ethereum,
    Tron,
    Ripple,
    Solana,
    Neo,
}

/// Fee estimation model of a UTXO chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeModel {
    /// 148 bytes per input, 34 per output, 10 overhead
    Legacy,
    /// 101.25 vbytes per input, 31 per output, 10 overhead
    Segwit,
    /// 166 bytes per input, 38 per output, 12 overhead
    Decred,
    /// ZIP-317 conventional fee
    Zip317,
}

/// Registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinDescriptor {
    pub coin: CoinType,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub blockchain: Blockchain,
    pub curve: Curve,
    pub public_key_type: PublicKeyType,
    /// Purpose of the default derivation path
    pub purpose: Purpose,
    /// Coin field of the derivation path
    pub slip44: u32,
    pub path_template: PathTemplate,
    pub address: AddressFamily,
    /// `(purpose, public version, private version)` of extended key strings
    pub hd_versions: &'static [(Purpose, u32, u32)],
    /// Fee model, `None` for account-based chains
    pub fee_model: Option<FeeModel>,
    /// Consensus branch id of the current transaction format
    pub branch_id: Option<u32>,
}

impl CoinDescriptor {
    /// Derivation path for `account`, `change` and `address` indices
    pub fn derivation_path(&self, account: u32, change: u32, address: u32) -> Result<DerivationPath> {
        self.derivation_path_for(self.purpose, account, change, address)
    }

    /// Derivation path under another purpose
    pub fn derivation_path_for(
        &self,
        purpose: Purpose,
        account: u32,
        change: u32,
        address: u32,
    ) -> Result<DerivationPath> {
        let mut path = vec![
            ChildNumber::from_hardened_idx(purpose.into())?,
            ChildNumber::from_hardened_idx(self.slip44)?,
            ChildNumber::from_hardened_idx(account)?,
        ];
        if self.path_template == PathTemplate::Bip44 {
            path.push(ChildNumber::from_normal_idx(change)?);
            path.push(ChildNumber::from_normal_idx(address)?);
        }
        Ok(DerivationPath::from(path))
    }

    /// Path of the first receiving address
    pub fn default_derivation_path(&self) -> Result<DerivationPath> {
        self.derivation_path(0, 0, 0)
    }

    /// Account level path, the node extended keys are exported at
    pub fn account_path(&self, purpose: Purpose, account: u32) -> Result<DerivationPath> {
        Ok(DerivationPath::from(vec![
            ChildNumber::from_hardened_idx(purpose.into())?,
            ChildNumber::from_hardened_idx(self.slip44)?,
            ChildNumber::from_hardened_idx(account)?,
        ]))
    }

    /// Extended key versions for `purpose`
    pub fn extended_key_versions(&self, purpose: Purpose) -> Option<(u32, u32)> {
        self.hd_versions.iter().find(|(p, _, _)| *p == purpose).map(|(_, public, private)| (*public, *private))
    }

    /// Human readable part of native segwit or Cosmos addresses
    pub fn hrp(&self) -> Option<&'static str> {
        match self.address {
            AddressFamily::Bitcoin {
                hrp,
                ..
            } => hrp,
            AddressFamily::Cosmos {
                hrp,
            } => Some(hrp),
            _ => None,
        }
    }

    /// Key hash function for Base58 and segwit scripts
    pub fn key_hasher(&self) -> KeyHasher {
        match self.address {
            AddressFamily::Bitcoin {
                hasher,
                ..
            } => hasher,
            _ => KeyHasher::Hash160,
        }
    }
}

const BITCOIN_VERSIONS: &[(Purpose, u32, u32)] = &[
    (Purpose::Bip44, version::XPUB, version::XPRV),
    (Purpose::Bip49, version::YPUB, version::YPRV),
    (Purpose::Bip84, version::ZPUB, version::ZPRV),
];
const LITECOIN_VERSIONS: &[(Purpose, u32, u32)] = &[
    (Purpose::Bip44, version::LTUB, version::LTPV),
    (Purpose::Bip49, version::MTUB, version::MTPV),
    (Purpose::Bip84, version::ZPUB, version::ZPRV),
];
const SEGWIT_VERSIONS: &[(Purpose, u32, u32)] = &[
    (Purpose::Bip44, version::XPUB, version::XPRV),
    (Purpose::Bip84, version::ZPUB, version::ZPRV),
];
const LEGACY_VERSIONS: &[(Purpose, u32, u32)] = &[(Purpose::Bip44, version::XPUB, version::XPRV)];

/// Zcash Sapling consensus branch id
pub const SAPLING_BRANCH_ID: u32 = 0x76b8_09bb;

const fn bitcoin_like(
    coin: CoinType,
    name: &'static str,
    symbol: &'static str,
    purpose: Purpose,
    address: AddressFamily,
    hd_versions: &'static [(Purpose, u32, u32)],
    fee_model: FeeModel,
) -> CoinDescriptor {
    CoinDescriptor {
        coin,
        name,
        symbol,
        decimals: 8,
        blockchain: Blockchain::Bitcoin,
        curve: Curve::Secp256k1,
        public_key_type: PublicKeyType::Secp256k1,
        purpose,
        slip44: coin as u32,
        path_template: PathTemplate::Bip44,
        address,
        hd_versions,
        fee_model: Some(fee_model),
        branch_id: None,
    }
}

const fn base58(p2pkh: &'static [u8], p2sh: &'static [u8], hrp: Option<&'static str>) -> AddressFamily {
    AddressFamily::Bitcoin {
        p2pkh,
        p2sh,
        hrp,
        checksum: Checksum::Sha256d,
        hasher: KeyHasher::Hash160,
    }
}

#[allow(clippy::too_many_arguments)]
const fn account_based(
    coin: CoinType,
    name: &'static str,
    symbol: &'static str,
    decimals: u8,
    blockchain: Blockchain,
    public_key_type: PublicKeyType,
    slip44: u32,
    address: AddressFamily,
) -> CoinDescriptor {
    CoinDescriptor {
        coin,
        name,
        symbol,
        decimals,
        blockchain,
        curve: Curve::Secp256k1,
        public_key_type,
        purpose: Purpose::Bip44,
        slip44,
        path_template: PathTemplate::Bip44,
        address,
        hd_versions: &[],
        fee_model: None,
        branch_id: None,
    }
}

static BITCOIN: CoinDescriptor = bitcoin_like(
    CoinType::Bitcoin,
    "Bitcoin",
    "BTC",
    Purpose::Bip84,
    base58(&[0x00], &[0x05], Some("bc")),
    BITCOIN_VERSIONS,
    FeeModel::Segwit,
);

static LITECOIN: CoinDescriptor = bitcoin_like(
    CoinType::Litecoin,
    "Litecoin",
    "LTC",
    Purpose::Bip84,
    base58(&[0x30], &[0x32], Some("ltc")),
    LITECOIN_VERSIONS,
    FeeModel::Segwit,
);

static DOGECOIN: CoinDescriptor = bitcoin_like(
    CoinType::Dogecoin,
    "Dogecoin",
    "DOGE",
    Purpose::Bip44,
    base58(&[0x1e], &[0x16], None),
    &[(Purpose::Bip44, version::DGUB, version::DGPV)],
    FeeModel::Legacy,
);

static DASH: CoinDescriptor = bitcoin_like(
    CoinType::Dash,
    "Dash",
    "DASH",
    Purpose::Bip44,
    base58(&[0x4c], &[0x10], None),
    LEGACY_VERSIONS,
    FeeModel::Legacy,
);

static VIACOIN: CoinDescriptor = bitcoin_like(
    CoinType::Viacoin,
    "Viacoin",
    "VIA",
    Purpose::Bip84,
    base58(&[0x47], &[0x21], Some("via")),
    SEGWIT_VERSIONS,
    FeeModel::Segwit,
);

static DIGIBYTE: CoinDescriptor = bitcoin_like(
    CoinType::DigiByte,
    "DigiByte",
    "DGB",
    Purpose::Bip84,
    base58(&[0x1e], &[0x3f], Some("dgb")),
    SEGWIT_VERSIONS,
    FeeModel::Segwit,
);

static DECRED: CoinDescriptor = CoinDescriptor {
    blockchain: Blockchain::Decred,
    address: AddressFamily::Bitcoin {
        p2pkh: &[0x07, 0x3f],
        p2sh: &[0x07, 0x1a],
        hrp: None,
        checksum: Checksum::Blake256d,
        hasher: KeyHasher::Blake256Ripemd160,
    },
    ..bitcoin_like(
        CoinType::Decred,
        "Decred",
        "DCR",
        Purpose::Bip44,
        base58(&[], &[], None),
        &[(Purpose::Bip44, version::DPUB, version::DPRV)],
        FeeModel::Decred,
    )
};

static ZCASH: CoinDescriptor = CoinDescriptor {
    blockchain: Blockchain::Zcash,
    branch_id: Some(SAPLING_BRANCH_ID),
    ..bitcoin_like(
        CoinType::Zcash,
        "Zcash",
        "ZEC",
        Purpose::Bip44,
        base58(&[0x1c, 0xb8], &[0x1c, 0xbd], None),
        LEGACY_VERSIONS,
        FeeModel::Zip317,
    )
};

static FIRO: CoinDescriptor = bitcoin_like(
    CoinType::Firo,
    "Firo",
    "FIRO",
    Purpose::Bip44,
    base58(&[0x52], &[0x07], None),
    LEGACY_VERSIONS,
    FeeModel::Legacy,
);

static RAVENCOIN: CoinDescriptor = bitcoin_like(
    CoinType::Ravencoin,
    "Ravencoin",
    "RVN",
    Purpose::Bip44,
    base58(&[0x3c], &[0x7a], None),
    LEGACY_VERSIONS,
    FeeModel::Legacy,
);

static QTUM: CoinDescriptor = bitcoin_like(
    CoinType::Qtum,
    "Qtum",
    "QTUM",
    Purpose::Bip44,
    base58(&[0x3a], &[0x32], Some("qc")),
    LEGACY_VERSIONS,
    FeeModel::Legacy,
);

static ETHEREUM: CoinDescriptor = account_based(
    CoinType::Ethereum,
    "Ethereum",
    "ETH",
    18,
    Blockchain::Ethereum,
    PublicKeyType::Secp256k1Extended,
    60,
    AddressFamily::Ethereum,
);

static ETHEREUM_CLASSIC: CoinDescriptor = account_based(
    CoinType::EthereumClassic,
    "Ethereum Classic",
    "ETC",
    18,
    Blockchain::Ethereum,
    PublicKeyType::Secp256k1Extended,
    61,
    AddressFamily::Ethereum,
);

static POLYGON: CoinDescriptor = account_based(
    CoinType::Polygon,
    "Polygon",
    "POL",
    18,
    Blockchain::Ethereum,
    PublicKeyType::Secp256k1Extended,
    60,
    AddressFamily::Ethereum,
);

static AVALANCHE_C_CHAIN: CoinDescriptor = account_based(
    CoinType::AvalancheCChain,
    "Avalanche C-Chain",
    "AVAX",
    18,
    Blockchain::Ethereum,
    PublicKeyType::Secp256k1Extended,
    60,
    AddressFamily::Ethereum,
);

static SMART_CHAIN: CoinDescriptor = account_based(
    CoinType::SmartChain,
    "BNB Smart Chain",
    "BNB",
    18,
    Blockchain::Ethereum,
    PublicKeyType::Secp256k1Extended,
    60,
    AddressFamily::Ethereum,
);

static COSMOS: CoinDescriptor = account_based(
    CoinType::Cosmos,
    "Cosmos",
    "ATOM",
    6,
    Blockchain::Cosmos,
    PublicKeyType::Secp256k1,
    118,
    AddressFamily::Cosmos {
        hrp: "cosmos",
    },
);

static OSMOSIS: CoinDescriptor = account_based(
    CoinType::Osmosis,
    "Osmosis",
    "OSMO",
    6,
    Blockchain::Cosmos,
    PublicKeyType::Secp256k1,
    118,
    AddressFamily::Cosmos {
        hrp: "osmo",
    },
);

static KAVA: CoinDescriptor = account_based(
    CoinType::Kava,
    "Kava",
    "KAVA",
    6,
    Blockchain::Cosmos,
    PublicKeyType::Secp256k1,
    459,
    AddressFamily::Cosmos {
        hrp: "kava",
    },
);

static THORCHAIN: CoinDescriptor = account_based(
    CoinType::THORChain,
    "THORChain",
    "RUNE",
    8,
    Blockchain::Cosmos,
    PublicKeyType::Secp256k1,
    931,
    AddressFamily::Cosmos {
        hrp: "thor",
    },
);

static BINANCE: CoinDescriptor = account_based(
    CoinType::Binance,
    "BNB Beacon Chain",
    "BNB-BEP2",
    8,
    Blockchain::Cosmos,
    PublicKeyType::Secp256k1,
    714,
    AddressFamily::Cosmos {
        hrp: "bnb",
    },
);

static TRON: CoinDescriptor = account_based(
    CoinType::Tron,
    "Tron",
    "TRX",
    6,
    Blockchain::Tron,
    PublicKeyType::Secp256k1Extended,
    195,
    AddressFamily::Tron,
);

static RIPPLE: CoinDescriptor = account_based(
    CoinType::Ripple,
    "XRP",
    "XRP",
    6,
    Blockchain::Ripple,
    PublicKeyType::Secp256k1,
    144,
    AddressFamily::Ripple,
);

static SOLANA: CoinDescriptor = CoinDescriptor {
    curve: Curve::Ed25519,
    path_template: PathTemplate::AccountOnly,
    ..account_based(
        CoinType::Solana,
        "Solana",
        "SOL",
        9,
        Blockchain::Solana,
        PublicKeyType::Ed25519,
        501,
        AddressFamily::Solana,
    )
};

static NEO: CoinDescriptor = CoinDescriptor {
    curve: Curve::Nist256p1,
    ..account_based(
        CoinType::Neo,
        "NEO",
        "NEO",
        0,
        Blockchain::Neo,
        PublicKeyType::Nist256p1,
        888,
        AddressFamily::Neo,
    )
};
